//! Hidden-Markov decoding of substitution ciphers.
//!
//! Hidden states are plaintext symbols, transitions come from the bigram
//! language model and the emission matrix relating hidden symbols to
//! ciphertext symbols is learned with scaled Baum-Welch. Viterbi then reads
//! off the single most likely plaintext.

pub mod baum_welch;
pub mod forward_backward;
pub mod matrix;
pub mod viterbi;

pub use self::baum_welch::{
    baum_welch, decode_with_emission, emission_to_mapping, BaumWelchOptions, BaumWelchReport,
    SpaceConstraint,
};
pub use self::forward_backward::{
    scaled_forward_backward, sequence_log_likelihood, Posteriors, ScaledMessages,
};
pub use self::matrix::StochasticMatrix;
pub use self::viterbi::{viterbi, ViterbiPath};
