use crate::error::{CfResult, CipherForgeError};
use crate::hmm::SpaceConstraint;
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub search: SearchParams,
    #[command(flatten)]
    pub hmm: HmmParams,
    #[command(flatten)]
    pub model: ModelParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Total Metropolis-Hastings iterations per chain, split over restarts.
    #[arg(long, default_value_t = 10_000)]
    pub iterations: usize,
    #[arg(long, default_value_t = 3)]
    pub restarts: usize,
    /// Independent chains run in parallel.
    #[arg(long, default_value_t = 1)]
    pub chains: usize,
    /// Proposals scored in parallel per iteration (1 = plain sampler).
    #[arg(long, default_value_t = 1)]
    pub fanout: usize,
    #[arg(long, default_value_t = 5)]
    pub top: usize,
    #[arg(long)]
    pub history_capacity: Option<usize>,
    #[arg(long)]
    pub log_interval: Option<usize>,
    #[arg(long)]
    pub max_time_secs: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            restarts: 3,
            chains: 1,
            fanout: 1,
            top: 5,
            history_capacity: None,
            log_interval: None,
            max_time_secs: None,
        }
    }
}

/// How the Baum-Welch emission matrix is initialised.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EmissionInit {
    #[default]
    Random,
    Uniform,
    Identity,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HmmParams {
    #[arg(long, default_value_t = 100)]
    pub max_iter: usize,
    #[arg(long, default_value_t = 1e-4)]
    pub tol: f64,
    #[arg(long, default_value_t = SpaceConstraint::RowAndColumn)]
    pub space_constraint: SpaceConstraint,
    #[arg(long, default_value_t = EmissionInit::Random)]
    pub emission_init: EmissionInit,
    /// Independent EM runs from different random starts; the best
    /// log-likelihood wins.
    #[arg(long, default_value_t = 1)]
    pub em_restarts: usize,
}

impl Default for HmmParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-4,
            space_constraint: SpaceConstraint::RowAndColumn,
            emission_init: EmissionInit::Random,
            em_restarts: 1,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Pseudo-count added to every transition before normalising.
    #[arg(long, default_value_t = 1e-6)]
    pub smoothing: f64,
    /// Only the first N words of the ciphertext are used (all if unset).
    #[arg(long)]
    pub max_words: Option<usize>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            smoothing: 1e-6,
            max_words: None,
        }
    }
}

impl Config {
    /// Parses a JSON config. Values are checked by `validate` once the
    /// command-line overrides have been merged in.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> CfResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let cfg: Config = serde_json::from_str(&content)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CfResult<()> {
        if self.search.top == 0 {
            return Err(CipherForgeError::Config("top must be at least 1".to_string()));
        }
        if !(self.hmm.tol.is_finite() && self.hmm.tol >= 0.0) {
            return Err(CipherForgeError::Config(format!(
                "tol must be a non-negative number, got {}",
                self.hmm.tol
            )));
        }
        if !(self.model.smoothing.is_finite() && self.model.smoothing >= 0.0) {
            return Err(CipherForgeError::Config(format!(
                "smoothing must be a non-negative number, got {}",
                self.model.smoothing
            )));
        }
        Ok(())
    }

    /// Copies every value the user typed on the command line over `self`,
    /// leaving file-provided values alone where the CLI only had defaults.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident, $arg_name:expr) => {
                if matches.value_source($arg_name) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(search.iterations, "iterations");
        update_if_present!(search.restarts, "restarts");
        update_if_present!(search.chains, "chains");
        update_if_present!(search.fanout, "fanout");
        update_if_present!(search.top, "top");
        update_if_present!(search.history_capacity, "history_capacity");
        update_if_present!(search.log_interval, "log_interval");
        update_if_present!(search.max_time_secs, "max_time_secs");

        update_if_present!(hmm.max_iter, "max_iter");
        update_if_present!(hmm.tol, "tol");
        update_if_present!(hmm.space_constraint, "space_constraint");
        update_if_present!(hmm.emission_init, "emission_init");
        update_if_present!(hmm.em_restarts, "em_restarts");

        update_if_present!(model.smoothing, "smoothing");
        update_if_present!(model.max_words, "max_words");
    }
}
