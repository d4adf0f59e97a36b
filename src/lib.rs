pub mod alphabet;
pub mod api;
pub mod cipher;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluation;
pub mod hmm;
pub mod optimizer;
pub mod scorer;

pub use error::{CfResult, CipherForgeError};
// cmd and reports belong to the binary crate (main.rs).
