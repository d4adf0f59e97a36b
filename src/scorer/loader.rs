use crate::alphabet::Alphabet;
use crate::error::CfResult;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Raw bigram counts keyed by byte pair.
pub type BigramCounts = HashMap<[u8; 2], f64>;

/// Counts every adjacent byte pair of `text`.
pub fn count_bigrams(text: &str) -> BigramCounts {
    let mut counts = BigramCounts::new();
    for w in text.as_bytes().windows(2) {
        *counts.entry([w[0], w[1]]).or_insert(0.0) += 1.0;
    }
    counts
}

/// Outcome of reading an n-gram file.
#[derive(Debug, Default)]
pub struct NgramScan {
    pub counts: BigramCounts,
    pub lines_read: usize,
    /// Rows dropped as unreadable, malformed or outside the alphabet.
    pub skipped: usize,
}

/// Reads a tab-separated n-gram file (`<ngram>\t<count>`), keeping only
/// 2-grams made of alphabet symbols. Keys are lowercased but not trimmed,
/// so bigrams containing a space survive.
pub fn load_ngrams<R: Read>(reader: R, alphabet: &Alphabet) -> CfResult<BigramCounts> {
    Ok(scan_ngrams(reader, alphabet)?.counts)
}

/// Like `load_ngrams`, also reporting how many rows were read and dropped.
pub fn scan_ngrams<R: Read>(reader: R, alphabet: &Alphabet) -> CfResult<NgramScan> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut counts = BigramCounts::new();
    let mut lines_read = 0;
    let mut skipped = 0;

    for result in rdr.records() {
        lines_read += 1;
        let rec = match result {
            Ok(rec) => rec,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                debug!("[Row {}] TSV parse error: {}", lines_read, e);
                skipped += 1;
                continue;
            }
        };
        if rec.len() < 2 {
            skipped += 1;
            continue;
        }

        let key = rec[0].to_ascii_lowercase();
        let bytes = key.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(|&b| alphabet.index_of(b).is_some()) {
            skipped += 1;
            continue;
        }

        let count: f64 = match rec[1].trim().parse() {
            Ok(v) if f64::is_finite(v) && v > 0.0 => v,
            _ => {
                skipped += 1;
                continue;
            }
        };

        *counts.entry([bytes[0], bytes[1]]).or_insert(0.0) += count;
    }

    debug!(
        "Scanned {} n-gram lines: {} bigrams kept, {} skipped",
        lines_read,
        counts.len(),
        skipped
    );
    Ok(NgramScan {
        counts,
        lines_read,
        skipped,
    })
}

pub fn load_ngrams_file<P: AsRef<Path>>(path: P, alphabet: &Alphabet) -> CfResult<BigramCounts> {
    info!("Loading bigrams from {:?}", path.as_ref());
    let file = File::open(path)?;
    load_ngrams(file, alphabet)
}

/// Writes counts in the same TSV format `load_ngrams` reads, most frequent
/// first.
pub fn write_ngrams<W: Write>(counts: &BigramCounts, writer: W) -> CfResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);

    let mut rows: Vec<(&[u8; 2], &f64)> = counts.iter().collect();
    rows.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));

    for (pair, count) in rows {
        let key = String::from_utf8_lossy(pair);
        wtr.write_record([key.as_ref(), &count.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
