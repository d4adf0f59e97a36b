use crate::alphabet::LETTERS;
use crate::error::{CfResult, CipherForgeError};
use fastrand::Rng;
use std::fmt;

/// A substitution key over the 26 latin letters. Space and every other
/// non-letter pass through untouched.
///
/// `forward[p]` is the ciphertext letter for plaintext letter `p`;
/// `inverse` is kept in sync so decoding is a table lookup rather than a
/// search.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permutation {
    forward: [u8; LETTERS],
    inverse: [u8; LETTERS],
}

impl Permutation {
    pub fn identity() -> Self {
        let mut forward = [0u8; LETTERS];
        for (i, slot) in forward.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self {
            forward,
            inverse: forward,
        }
    }

    /// Uniformly random key (Fisher-Yates via `fastrand`).
    pub fn random(rng: &mut Rng) -> Self {
        let mut forward = Self::identity().forward;
        rng.shuffle(&mut forward);
        Self::from_forward(forward)
    }

    /// Parses a key written as the 26 ciphertext letters for `a..z`.
    pub fn from_letters(key: &str) -> CfResult<Self> {
        let bytes = key.trim().as_bytes();
        if bytes.len() != LETTERS {
            return Err(CipherForgeError::Validation(format!(
                "Key must contain exactly {} letters, got {}",
                LETTERS,
                bytes.len()
            )));
        }

        let mut forward = [0u8; LETTERS];
        let mut seen = [false; LETTERS];
        for (i, &b) in bytes.iter().enumerate() {
            if !b.is_ascii_alphabetic() {
                return Err(CipherForgeError::Validation(format!(
                    "Key contains non-letter {:?}",
                    b as char
                )));
            }
            let idx = (b.to_ascii_lowercase() - b'a') as usize;
            if seen[idx] {
                return Err(CipherForgeError::Validation(format!(
                    "Key repeats letter {:?}",
                    b as char
                )));
            }
            seen[idx] = true;
            forward[i] = idx as u8;
        }

        Ok(Self::from_forward(forward))
    }

    fn from_forward(forward: [u8; LETTERS]) -> Self {
        let mut inverse = [0u8; LETTERS];
        for (plain, &cipher) in forward.iter().enumerate() {
            inverse[cipher as usize] = plain as u8;
        }
        Self { forward, inverse }
    }

    /// Returns a copy with positions `i` and `j` exchanged.
    pub fn swapped(&self, i: usize, j: usize) -> Self {
        let mut next = *self;
        next.forward.swap(i, j);
        next.inverse[next.forward[i] as usize] = i as u8;
        next.inverse[next.forward[j] as usize] = j as u8;
        next
    }

    #[inline(always)]
    pub fn encode_byte(&self, b: u8) -> u8 {
        substitute(&self.forward, b)
    }

    #[inline(always)]
    pub fn decode_byte(&self, b: u8) -> u8 {
        substitute(&self.inverse, b)
    }

    pub fn encode(&self, text: &str) -> String {
        text.chars().map(|c| map_char(&self.forward, c)).collect()
    }

    pub fn decode(&self, text: &str) -> String {
        text.chars().map(|c| map_char(&self.inverse, c)).collect()
    }

    /// Decodes raw bytes into `out`, reusing its allocation.
    pub fn decode_into(&self, text: &[u8], out: &mut Vec<u8>) {
        out.clear();
        out.extend(text.iter().map(|&b| self.decode_byte(b)));
    }

    /// Ciphertext letter for plaintext letter index `plain`.
    pub fn cipher_of(&self, plain: usize) -> usize {
        self.forward[plain] as usize
    }

    /// Plaintext letter index for ciphertext letter index `cipher`.
    pub fn plain_of(&self, cipher: usize) -> usize {
        self.inverse[cipher] as usize
    }

    pub fn letters(&self) -> String {
        self.forward.iter().map(|&i| (b'a' + i) as char).collect()
    }
}

impl Default for Permutation {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letters())
    }
}

impl fmt::Debug for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "abcdefghijklmnopqrstuvwxyz")?;
        writeln!(f, "{}", self.letters())
    }
}

#[inline(always)]
fn substitute(table: &[u8; LETTERS], b: u8) -> u8 {
    if b.is_ascii_lowercase() {
        b'a' + table[(b - b'a') as usize]
    } else if b.is_ascii_uppercase() {
        b'A' + table[(b - b'A') as usize]
    } else {
        b
    }
}

fn map_char(table: &[u8; LETTERS], c: char) -> char {
    if c.is_ascii() {
        substitute(table, c as u8) as char
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapped_keeps_inverse_in_sync() {
        let mut rng = Rng::with_seed(7);
        let p = Permutation::random(&mut rng).swapped(3, 17);
        for i in 0..LETTERS {
            assert_eq!(p.plain_of(p.cipher_of(i)), i);
        }
    }

    #[test]
    fn test_case_is_preserved() {
        let p = Permutation::from_letters("bcdefghijklmnopqrstuvwxyza").unwrap();
        assert_eq!(p.encode("Hello, World"), "Ifmmp, Xpsme");
        assert_eq!(p.decode("Ifmmp, Xpsme"), "Hello, World");
    }
}
