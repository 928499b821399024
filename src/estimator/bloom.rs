use super::{Estimate, Estimator, EstimatorError};
use crate::source::Batch;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Fixed-size Bloom filter over strings.
///
/// Bit `i` of an element is derived from the first four bytes (big endian) of
/// `SHA-256("{i}|{element}")`, reduced modulo the bit count.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u8>,
    bit_count: usize,
    hash_count: u32,
    len: usize,
}

impl BloomFilter {
    pub fn new(bit_count: usize, hash_count: u32) -> Result<Self, EstimatorError> {
        if bit_count == 0 || hash_count == 0 {
            return Err(EstimatorError::InvalidBloomParameters {
                bit_count,
                hash_count,
            });
        }

        Ok(Self {
            bits: vec![0; bit_count.div_ceil(8)],
            bit_count,
            hash_count,
            len: 0,
        })
    }

    fn indices<'a>(&'a self, element: &'a str) -> impl Iterator<Item = usize> + 'a {
        (0..self.hash_count).map(move |i| {
            let digest = Sha256::digest(format!("{}|{}", i, element).as_bytes());
            let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
            prefix as usize % self.bit_count
        })
    }

    pub fn insert(&mut self, element: &str) {
        let indices: Vec<usize> = self.indices(element).collect();
        for idx in indices {
            self.bits[idx / 8] |= 1 << (idx % 8);
        }
        self.len += 1;
    }

    /// True if every one of the element's bits is set
    pub fn contains(&self, element: &str) -> bool {
        self.indices(element)
            .all(|idx| self.bits[idx / 8] & (1 << (idx % 8)) != 0)
    }

    /// Number of insertions performed
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Expected false positive rate for the current number of insertions:
    /// `(1 - e^(-k n / m))^k`
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let k = self.hash_count as f64;
        let n = self.len as f64;
        let m = self.bit_count as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }
}

/// Per-batch share of messages matching a set of known patterns.
///
/// The value and `oldest_considered` describe the current batch only;
/// `newest_considered` is the running maximum so it never moves backwards.
#[derive(Debug)]
pub struct BloomEstimator {
    filter: BloomFilter,
    newest: Option<f64>,
}

impl BloomEstimator {
    pub fn new(filter: BloomFilter) -> Self {
        Self {
            filter,
            newest: None,
        }
    }

    /// Build the filter from a pattern file, one literal message per line.
    ///
    /// Lines are trimmed and blank lines skipped.
    pub fn from_pattern_file(
        path: &Path,
        bit_count: usize,
        hash_count: u32,
    ) -> Result<Self, EstimatorError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| EstimatorError::PatternFile {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut filter = BloomFilter::new(bit_count, hash_count)?;
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            filter.insert(line);
        }

        info!(
            path = %path.display(),
            patterns = filter.len(),
            bit_count,
            hash_count,
            false_positive_rate = filter.estimated_false_positive_rate(),
            "Loaded pattern filter"
        );

        Ok(Self::new(filter))
    }

    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }
}

impl Estimator for BloomEstimator {
    fn name(&self) -> &'static str {
        "bloom"
    }

    fn consume(&mut self, batch: &Batch) -> Option<Estimate> {
        let (batch_newest, oldest) = (batch.newest()?, batch.oldest()?);
        let newest = self.newest.map_or(batch_newest, |n| n.max(batch_newest));
        self.newest = Some(newest);

        let hits = batch
            .events
            .iter()
            .filter(|e| self.filter.contains(&e.message))
            .count();

        Some(Estimate::new(
            hits as f64 / batch.len() as f64,
            newest,
            oldest,
        ))
    }
}
