use super::{read_truth, TextInput};
use crate::reports;
use cipherforge::api;
use cipherforge::config::Config;
use cipherforge::error::CfResult;
use cipherforge::scorer::BigramTable;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct HmmArgs {
    #[command(flatten)]
    pub config: Config,

    #[command(flatten)]
    pub input: TextInput,

    #[arg(long)]
    pub truth: Option<String>,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,
}

pub fn run(args: HmmArgs, config: &Config, table: &BigramTable) -> CfResult<()> {
    let ciphertext = args.input.read()?;
    let truth = read_truth(&args.truth)?;

    let outcome = api::crack_with_hmm(&ciphertext, table, config, args.seed)?;

    reports::print_hmm_summary(&outcome, truth.as_deref());
    reports::print_mapping(&outcome.mapping);

    println!("\nViterbi decoding:\n{}", outcome.plaintext);
    Ok(())
}
