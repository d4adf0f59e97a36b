use std::collections::{BTreeMap, HashMap};

/// One archived decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub text: String,
    /// Iteration (within its restart) at which the text was first accepted.
    pub iteration: usize,
    pub log_likelihood: f64,
    pub restart: usize,
}

/// Append-only archive of accepted decodings, kept in discovery order.
///
/// The first discovery of a text wins; later re-discoveries are ignored. With
/// a capacity set, inserting past it evicts the lowest-likelihood entry other
/// than the seed (the entry recorded first).
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: BTreeMap<u64, Discovery>,
    index: HashMap<String, u64>,
    next_seq: u64,
    capacity: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            capacity: capacity.map(|c| c.max(1)),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.index.contains_key(text)
    }

    pub fn get(&self, text: &str) -> Option<&Discovery> {
        self.index.get(text).and_then(|seq| self.entries.get(seq))
    }

    /// Records `text` unless already present. Returns whether it was added.
    pub fn record(
        &mut self,
        text: &str,
        iteration: usize,
        log_likelihood: f64,
        restart: usize,
    ) -> bool {
        if self.index.contains_key(text) {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(text.to_string(), seq);
        self.entries.insert(
            seq,
            Discovery {
                text: text.to_string(),
                iteration,
                log_likelihood,
                restart,
            },
        );

        if let Some(cap) = self.capacity {
            if self.entries.len() > cap {
                self.evict_worst();
            }
        }
        true
    }

    fn evict_worst(&mut self) {
        let seed = self.entries.keys().next().copied();
        let worst = self
            .entries
            .iter()
            .filter(|(seq, _)| Some(**seq) != seed)
            .min_by(|a, b| a.1.log_likelihood.total_cmp(&b.1.log_likelihood))
            .map(|(seq, _)| *seq);

        if let Some(seq) = worst {
            if let Some(d) = self.entries.remove(&seq) {
                self.index.remove(&d.text);
            }
        }
    }

    /// Entries in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Discovery> {
        self.entries.values()
    }

    /// Up to `n` entries ranked by log-likelihood, highest first. Ties keep
    /// discovery order.
    pub fn best(&self, n: usize) -> Vec<&Discovery> {
        let mut ranked: Vec<&Discovery> = self.entries.values().collect();
        ranked.sort_by(|a, b| b.log_likelihood.total_cmp(&a.log_likelihood));
        ranked.truncate(n);
        ranked
    }

    /// Folds `other` into `self`; a text found by both keeps the earlier
    /// iteration.
    pub fn merge(&mut self, other: &History) {
        for d in other.iter() {
            match self.index.get(&d.text).copied() {
                Some(seq) => {
                    if let Some(existing) = self.entries.get_mut(&seq) {
                        if d.iteration < existing.iteration {
                            existing.iteration = d.iteration;
                            existing.restart = d.restart;
                        }
                    }
                }
                None => {
                    self.record(&d.text, d.iteration, d.log_likelihood, d.restart);
                }
            }
        }
    }
}
