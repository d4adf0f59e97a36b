use crate::error::{CfResult, CipherForgeError};

pub const LETTERS: usize = 26;
pub const ENGLISH: &[u8; 27] = b"abcdefghijklmnopqrstuvwxyz ";

const UNMAPPED: u8 = 255;

/// Fixed ordering of the symbols every matrix and permutation is indexed by.
///
/// Built once and never mutated: `index_of(symbol(i)) == Some(i)` for every
/// index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<u8>,
    lookup: [u8; 256],
}

impl Alphabet {
    /// Lowercase latin letters followed by the space character.
    pub fn english() -> Self {
        let mut lookup = [UNMAPPED; 256];
        for (i, &b) in ENGLISH.iter().enumerate() {
            lookup[b as usize] = i as u8;
        }
        Self {
            symbols: ENGLISH.to_vec(),
            lookup,
        }
    }

    pub fn new(symbols: &[u8]) -> CfResult<Self> {
        if symbols.is_empty() || symbols.len() >= UNMAPPED as usize {
            return Err(CipherForgeError::Validation(format!(
                "Alphabet must hold between 1 and 254 symbols, got {}",
                symbols.len()
            )));
        }

        let mut lookup = [UNMAPPED; 256];
        for (i, &b) in symbols.iter().enumerate() {
            if lookup[b as usize] != UNMAPPED {
                return Err(CipherForgeError::Validation(format!(
                    "Duplicate symbol '{}' in alphabet",
                    b as char
                )));
            }
            lookup[b as usize] = i as u8;
        }

        Ok(Self {
            symbols: symbols.to_vec(),
            lookup,
        })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[inline(always)]
    pub fn index_of(&self, byte: u8) -> Option<usize> {
        match self.lookup[byte as usize] {
            UNMAPPED => None,
            i => Some(i as usize),
        }
    }

    #[inline(always)]
    pub fn symbol(&self, index: usize) -> u8 {
        self.symbols[index]
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn space_index(&self) -> Option<usize> {
        self.index_of(b' ')
    }

    /// Maps text to an observation sequence. Rejects empty input and any
    /// byte outside the alphabet.
    pub fn to_indices(&self, text: &str) -> CfResult<Vec<usize>> {
        if text.is_empty() {
            return Err(CipherForgeError::Validation(
                "Observation sequence is empty".to_string(),
            ));
        }

        text.bytes()
            .enumerate()
            .map(|(pos, b)| {
                self.index_of(b).ok_or_else(|| {
                    CipherForgeError::Validation(format!(
                        "Character {:?} at position {} is not in the alphabet",
                        b as char, pos
                    ))
                })
            })
            .collect()
    }

    pub fn from_indices(&self, indices: &[usize]) -> String {
        indices
            .iter()
            .map(|&i| self.symbols[i] as char)
            .collect()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::english()
    }
}
