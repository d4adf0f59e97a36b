use crate::reports;
use cipherforge::alphabet::Alphabet;
use cipherforge::config::Config;
use cipherforge::corpus;
use cipherforge::error::{CfResult, CipherForgeError};
use cipherforge::evaluation::{self, TrialOptions};
use cipherforge::scorer::BigramTable;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub config: Config,

    /// Plaintext the subtexts are cut from.
    #[arg(long)]
    pub source: String,

    /// Comma-separated subtext lengths in words.
    #[arg(long, default_value = "50,100,200")]
    pub lengths: String,

    #[arg(long, default_value_t = 3)]
    pub trials: usize,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,
}

fn parse_lengths(s: &str) -> CfResult<Vec<usize>> {
    s.split(',')
        .map(|p| {
            p.trim().parse::<usize>().map_err(|_| {
                CipherForgeError::Config(format!("Invalid subtext length '{}'", p.trim()))
            })
        })
        .collect()
}

pub fn run(args: EvaluateArgs, config: &Config, table: Arc<BigramTable>) -> CfResult<()> {
    let lengths = parse_lengths(&args.lengths)?;
    let text = corpus::load_corpus(&args.source, &Alphabet::english())?;
    let subtexts = evaluation::prepare_subtexts(&text, &lengths);

    let opts = TrialOptions {
        trials: args.trials,
        iterations: config.search.iterations,
        restarts: config.search.restarts,
        top_n: config.search.top,
    };

    let results = evaluation::accuracy_by_length(&subtexts, table, &opts, args.seed);
    reports::print_accuracy_report(&results);
    Ok(())
}
