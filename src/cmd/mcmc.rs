use super::{read_truth, TextInput};
use crate::reports;
use cipherforge::api;
use cipherforge::config::Config;
use cipherforge::error::CfResult;
use cipherforge::optimizer::runner::LogProgress;
use cipherforge::scorer::BigramTable;
use clap::Args;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct McmcArgs {
    #[command(flatten)]
    pub config: Config,

    #[command(flatten)]
    pub input: TextInput,

    /// File holding the true plaintext, for accuracy reporting.
    #[arg(long)]
    pub truth: Option<String>,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,
}

pub fn run(args: McmcArgs, config: &Config, table: Arc<BigramTable>) -> CfResult<()> {
    let ciphertext = args.input.read()?;
    let truth = read_truth(&args.truth)?;

    info!(
        "Breaking {} bytes of ciphertext with {} chain(s)",
        ciphertext.len(),
        config.search.chains
    );
    let result = api::crack_with_mcmc(&ciphertext, table, config, args.seed, LogProgress)?;

    reports::print_search_summary(&result);
    reports::print_candidates(&result.candidates, truth.as_deref());
    reports::print_key_grid("best", &result.best_cipher);

    println!("\nBest decoding:\n{}", result.best.text);
    Ok(())
}
