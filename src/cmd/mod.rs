pub mod encrypt;
pub mod evaluate;
pub mod hmm;
pub mod mcmc;

use cipherforge::error::{CfResult, CipherForgeError};
use clap::Args;
use std::fs;

/// Text given inline or read from a file.
#[derive(Args, Debug, Clone)]
pub struct TextInput {
    #[arg(short, long, conflicts_with = "file")]
    pub text: Option<String>,

    #[arg(short, long)]
    pub file: Option<String>,
}

impl TextInput {
    pub fn read(&self) -> CfResult<String> {
        match (&self.text, &self.file) {
            (Some(t), _) => Ok(t.clone()),
            (None, Some(path)) => Ok(fs::read_to_string(path)?),
            (None, None) => Err(CipherForgeError::Config(
                "Provide the input with --text or --file".to_string(),
            )),
        }
    }
}

/// Reads the optional known plaintext used for accuracy columns.
pub fn read_truth(path: &Option<String>) -> CfResult<Option<String>> {
    match path {
        Some(p) => Ok(Some(fs::read_to_string(p)?.trim().to_string())),
        None => Ok(None),
    }
}
