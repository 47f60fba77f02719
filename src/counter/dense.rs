//! Dense counting shard: one slot per possible word.

use crate::codec::WordCodec;
use crate::config::CountConfig;
use crate::counter::{CountShard, RecordScanner, ShardStats};
use crate::table::KmerTable;

/// Counter backed by a directly indexed array of length `4^K`.
///
/// Appropriate while the word space is small enough to enumerate
/// exhaustively; the index of each slot is the word it counts.
pub struct DenseShard {
    codec: WordCodec,
    unstranded: bool,
    scanner: RecordScanner,
    columns: Vec<Vec<u32>>,
}

impl CountShard for DenseShard {
    fn new(config: &CountConfig) -> Self {
        let space = 1usize << (2 * config.k);
        Self {
            codec: WordCodec::new(config.k),
            unstranded: config.unstranded(),
            scanner: RecordScanner::new(config.k),
            columns: vec![vec![0u32; space]],
        }
    }

    fn count_record(&mut self, seq: &[u8]) {
        let counts = &mut self.columns[0];
        self.scanner.scan(seq, |word| counts[word as usize] += 1);
    }

    /// In unstranded mode, fold every word's count onto the smaller of
    /// the word and its reverse complement, in place. Each complementary
    /// pair is touched exactly once; palindromic words stay as counted.
    fn finish(&mut self) {
        if !self.unstranded {
            return;
        }
        let space = self.columns[0].len();
        let mut visited = vec![false; space];
        for i in 0..space {
            if visited[i] {
                continue;
            }
            let j = self.codec.reverse_complement(i as u32) as usize;
            visited[i] = true;
            visited[j] = true;
            if i != j {
                for counts in &mut self.columns {
                    counts[i] += counts[j];
                    counts[j] = 0;
                }
            }
        }
    }

    fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.columns.len(), other.columns.len());
        for (dst, src) in self.columns.iter_mut().zip(other.columns) {
            debug_assert_eq!(dst.len(), src.len());
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
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
        KmerTable::dense(self.codec.k(), self.columns, self.scanner.stats)
    }
}
