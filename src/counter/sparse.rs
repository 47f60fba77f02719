//! Sparse counting shard: sorted (word, count) pairs.

use crate::codec::WordCodec;
use crate::config::CountConfig;
use crate::counter::{CountShard, RecordScanner, ShardStats};
use crate::table::KmerTable;

/// Counter for word spaces too large to enumerate exhaustively.
///
/// Occurrences are collected raw, sorted, and run-length compressed into
/// two parallel vectors: distinct words in strictly increasing order and
/// their counts. Sorting instead of hashing bounds memory and leaves the
/// result in the order the merge join expects.
pub struct SparseShard {
    codec: WordCodec,
    unstranded: bool,
    scanner: RecordScanner,
    raw: Vec<u32>,
    words: Vec<u32>,
    columns: Vec<Vec<u32>>,
}

impl CountShard for SparseShard {
    fn new(config: &CountConfig) -> Self {
        Self {
            codec: WordCodec::new(config.k),
            unstranded: config.unstranded(),
            scanner: RecordScanner::new(config.k),
            raw: Vec::new(),
            words: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn count_record(&mut self, seq: &[u8]) {
        let codec = self.codec;
        let unstranded = self.unstranded;
        let raw = &mut self.raw;
        self.scanner.scan(seq, |word| {
            raw.push(if unstranded { codec.canonical(word) } else { word });
        });
    }

    /// Sort the collected occurrences and compress each run of equal
    /// words into one (word, count) entry.
    fn finish(&mut self) {
        self.raw.sort_unstable();

        let mut words = Vec::new();
        let mut counts = Vec::new();
        let mut i = 0;
        while i < self.raw.len() {
            let word = self.raw[i];
            let mut j = i + 1;
            while j < self.raw.len() && self.raw[j] == word {
                j += 1;
            }
            words.push(word);
            counts.push((j - i) as u32);
            i = j;
        }

        self.words = words;
        self.columns = vec![counts];
        self.raw = Vec::new();
    }

    /// Two-pointer merge join over two sorted shards. Matching words sum
    /// their counts; unmatched entries copy through unchanged.
    fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.columns.len(), other.columns.len());
        let n_columns = self.columns.len();
        let capacity = self.words.len() + other.words.len();
        let mut words = Vec::with_capacity(capacity);
        let mut columns: Vec<Vec<u32>> =
            (0..n_columns).map(|_| Vec::with_capacity(capacity)).collect();

        let (mut ia, mut ib) = (0, 0);
        while ia < self.words.len() && ib < other.words.len() {
            match self.words[ia].cmp(&other.words[ib]) {
                std::cmp::Ordering::Less => {
                    words.push(self.words[ia]);
                    for (c, column) in columns.iter_mut().enumerate() {
                        column.push(self.columns[c][ia]);
                    }
                    ia += 1;
                }
                std::cmp::Ordering::Greater => {
                    words.push(other.words[ib]);
                    for (c, column) in columns.iter_mut().enumerate() {
                        column.push(other.columns[c][ib]);
                    }
                    ib += 1;
                }
                std::cmp::Ordering::Equal => {
                    words.push(self.words[ia]);
                    for (c, column) in columns.iter_mut().enumerate() {
                        column.push(self.columns[c][ia] + other.columns[c][ib]);
                    }
                    ia += 1;
                    ib += 1;
                }
            }
        }
        while ia < self.words.len() {
            words.push(self.words[ia]);
            for (c, column) in columns.iter_mut().enumerate() {
                column.push(self.columns[c][ia]);
            }
            ia += 1;
        }
        while ib < other.words.len() {
            words.push(other.words[ib]);
            for (c, column) in columns.iter_mut().enumerate() {
                column.push(other.columns[c][ib]);
            }
            ib += 1;
        }

        self.words = words;
        self.columns = columns;
        self.scanner.stats.absorb(other.scanner.stats);
        self
    }

    fn total(&self) -> u64 {
        self.columns
            .iter()
            .flat_map(|counts| counts.iter())
            .map(|&c| u64::from(c))
            .sum()
    }

    fn stats(&self) -> ShardStats {
        self.scanner.stats
    }

    fn into_table(self) -> KmerTable {
        KmerTable::sparse(self.codec.k(), self.words, self.columns, self.scanner.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::symbol_code;
    use crate::config::Strand;

    fn word(seq: &[u8]) -> u32 {
        let codec = WordCodec::new(seq.len());
        let codes: Vec<u32> = seq.iter().map(|&b| symbol_code(b)).collect();
        codec.encode_first(&codes)
    }

    fn finished(config: &CountConfig, records: &[&[u8]]) -> SparseShard {
        let mut shard = SparseShard::new(config);
        for record in records {
            shard.count_record(record);
        }
        shard.finish();
        shard
    }

    #[test]
    fn words_are_strictly_increasing_with_positive_counts() {
        let config = CountConfig::new(11);
        let shard = finished(
            &config,
            &[&b"ACGTACGTACGTACGTACGT"[..], &b"TTTTTTTTTTTT"[..]],
        );
        for pair in shard.words.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(shard.columns[0].iter().all(|&c| c >= 1));
        assert_eq!(shard.total(), 12);
    }

    #[test]
    fn stranded_acgt_counts_three_words() {
        let config = CountConfig::new(2);
        let shard = finished(&config, &[&b"ACGT"[..]]);
        assert_eq!(shard.words, vec![word(b"AC"), word(b"CG"), word(b"GT")]);
        assert_eq!(shard.columns[0], vec![1, 1, 1]);
    }

    #[test]
    fn unstranded_acgt_folds_ac_and_gt() {
        let config = CountConfig::new(2).with_strand(Strand::Unstranded);
        let shard = finished(&config, &[&b"ACGT"[..]]);
        // the canonical entry min(AC, GT) carries both occurrences,
        // GT never materializes
        assert_eq!(shard.words, vec![word(b"AC"), word(b"CG")]);
        assert_eq!(shard.columns[0], vec![2, 1]);
    }

    #[test]
    fn merge_joins_sorted_lists() {
        let config = CountConfig::new(2);
        let a = finished(&config, &[&b"ACGT"[..]]); // AC CG GT
        let b = finished(&config, &[&b"CGTT"[..]]); // CG GT TT
        let merged = a.merge(b);

        assert_eq!(
            merged.words,
            vec![word(b"AC"), word(b"CG"), word(b"GT"), word(b"TT")]
        );
        assert_eq!(merged.columns[0], vec![1, 2, 2, 1]);
        assert_eq!(merged.total(), 6);
    }

    #[test]
    fn merge_with_an_empty_shard_is_identity() {
        let config = CountConfig::new(2);
        let a = finished(&config, &[&b"ACGT"[..]]);
        let empty = finished(&config, &[]);
        let merged = a.merge(empty);
        assert_eq!(merged.words, vec![word(b"AC"), word(b"CG"), word(b"GT")]);
        assert_eq!(merged.columns[0], vec![1, 1, 1]);
    }
}
