use super::TextInput;
use crate::reports;
use cipherforge::api;
use cipherforge::error::CfResult;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct EncryptArgs {
    #[command(flatten)]
    pub input: TextInput,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// Print only the ciphertext.
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

pub fn run(args: EncryptArgs) -> CfResult<()> {
    let plaintext = args.input.read()?;
    let (key, ciphertext) = api::encrypt(plaintext.trim_end(), args.seed);

    if !args.quiet {
        reports::print_key_grid("random", &key);
        println!("\nCiphertext:");
    }
    println!("{}", ciphertext);
    Ok(())
}
