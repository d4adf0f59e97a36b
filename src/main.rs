use cipherforge::alphabet::Alphabet;
use cipherforge::api;
use cipherforge::config::Config;
use cipherforge::error::CfResult;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::process;
use std::sync::Arc;
use tracing::{error, info, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bigram source: a TSV n-gram file (`.tsv`) or a plain-text corpus.
    #[arg(global = true, short, long, default_value = "data/corpus.txt")]
    model: String,

    /// JSON config file; explicit command-line flags override it.
    #[arg(global = true, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt text under a random substitution key.
    Encrypt(cmd::encrypt::EncryptArgs),
    /// Break a ciphertext with Metropolis-Hastings search.
    Mcmc(cmd::mcmc::McmcArgs),
    /// Break a ciphertext with Baum-Welch and Viterbi.
    Hmm(cmd::hmm::HmmArgs),
    /// Measure search accuracy against text length.
    Evaluate(cmd::evaluate::EvaluateArgs),
}

fn resolve_config(
    cli_config: &Config,
    file: &Option<String>,
    sub_matches: &ArgMatches,
) -> CfResult<Config> {
    match file {
        Some(path) => {
            info!("Loading config from {}", path);
            let mut cfg = Config::load_from_file(path)?;
            cfg.merge_from_cli(cli_config, sub_matches);
            cfg.validate()?;
            Ok(cfg)
        }
        None => {
            cli_config.validate()?;
            Ok(cli_config.clone())
        }
    }
}

fn execute(cli: Cli, matches: &ArgMatches) -> CfResult<()> {
    let (cli_config, name) = match &cli.command {
        Commands::Encrypt(args) => return cmd::encrypt::run(args.clone()),
        Commands::Mcmc(args) => (&args.config, "mcmc"),
        Commands::Hmm(args) => (&args.config, "hmm"),
        Commands::Evaluate(args) => (&args.config, "evaluate"),
    };

    let Some(sub_matches) = matches.subcommand_matches(name) else {
        return Ok(());
    };
    let config = resolve_config(cli_config, &cli.config, sub_matches)?;

    info!("Loading language model: {}", cli.model);
    let table = Arc::new(api::load_model(&cli.model, &Alphabet::english())?);
    info!(
        "Model ready: {} distinct bigrams, fallback {:.3e}",
        table.len(),
        table.fallback()
    );

    match cli.command {
        Commands::Encrypt(_) => Ok(()),
        Commands::Mcmc(args) => cmd::mcmc::run(args, &config, table),
        Commands::Hmm(args) => cmd::hmm::run(args, &config, &table),
        Commands::Evaluate(args) => cmd::evaluate::run(args, &config, table),
    }
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute(cli, &matches) {
        error!("{}", e);
        process::exit(1);
    }
}
