use crate::alphabet::Alphabet;
use crate::error::CfResult;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Lowercases `text`, replaces every byte outside `alphabet` with a space
/// and collapses runs of whitespace into single spaces.
pub fn normalize(text: &str, alphabet: &Alphabet) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;

    for c in text.chars() {
        let lower = c.to_ascii_lowercase();
        let keep = lower.is_ascii() && lower != ' ' && alphabet.index_of(lower as u8).is_some();

        if keep {
            out.push(lower);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

pub fn load_corpus<P: AsRef<Path>>(path: P, alphabet: &Alphabet) -> CfResult<String> {
    let raw = fs::read_to_string(path.as_ref())?;
    let text = normalize(&raw, alphabet);
    debug!(
        "Corpus {:?}: {} raw bytes -> {} normalized bytes",
        path.as_ref(),
        raw.len(),
        text.len()
    );
    Ok(text)
}

/// The first `words` whitespace-separated words of `text`.
pub fn take_words(text: &str, words: usize) -> String {
    text.split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ")
}
