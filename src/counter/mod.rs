//! Per-worker counting shards and their pairwise reduction.

pub mod dense;
pub mod set;
pub mod sparse;

pub use dense::DenseShard;
pub use set::CounterSet;
pub use sparse::SparseShard;

use pulp::Arch;

use crate::codec::{WordCodec, symbol_code};
use crate::config::CountConfig;
use crate::table::KmerTable;

/// Tallies kept alongside the counts of a shard or a finished table.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShardStats {
    /// Records received.
    pub records: u64,
    /// Records shorter than K, skipped without contributing words.
    pub skipped: u64,
    /// `N`/`n` bytes silently mapped onto A's symbol code.
    pub masked: u64,
}

impl ShardStats {
    pub(crate) fn absorb(&mut self, other: ShardStats) {
        self.records += other.records;
        self.skipped += other.skipped;
        self.masked += other.masked;
    }
}

/// One worker's independently owned counting state.
///
/// A shard is populated by exactly one accumulation pass: records go in
/// through [`count_record`](CountShard::count_record), then
/// [`finish`](CountShard::finish) runs once when the input is exhausted,
/// and afterwards the shard only participates in merges. Shards never
/// share storage, so independent instances can accumulate concurrently
/// without locking.
pub trait CountShard: Sized + Send + 'static {
    fn new(config: &CountConfig) -> Self;

    /// Derive and count every word of one input record.
    fn count_record(&mut self, seq: &[u8]);

    /// Seal the shard after the last record.
    fn finish(&mut self);

    /// Absorb another finished shard. The survivor's total equals the sum
    /// of both inputs' totals; no word is lost or double counted.
    fn merge(self, other: Self) -> Self;

    /// Total occurrences across all words and columns.
    fn total(&self) -> u64;

    fn stats(&self) -> ShardStats;

    fn into_table(self) -> KmerTable;
}

/// Shared window derivation over one record.
///
/// Maps the record's bytes to symbol codes in one vectorizable pass,
/// then emits the first window's word followed by one slid word per
/// remaining symbol.
pub(crate) struct RecordScanner {
    codec: WordCodec,
    codes: Vec<u32>,
    pub(crate) stats: ShardStats,
}

impl RecordScanner {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            codec: WordCodec::new(k),
            codes: Vec::new(),
            stats: ShardStats::default(),
        }
    }

    pub(crate) fn scan(&mut self, seq: &[u8], mut emit: impl FnMut(u32)) {
        self.stats.records += 1;
        let codec = self.codec;
        let k = codec.k();
        if seq.len() < k {
            self.stats.skipped += 1;
            return;
        }
        self.stats.masked += (bytecount::count(seq, b'N') + bytecount::count(seq, b'n')) as u64;

        self.codes.clear();
        let codes = &mut self.codes;
        let arch = Arch::new();
        arch.dispatch(|| {
            codes.extend(seq.iter().map(|&b| symbol_code(b)));
        });

        let mut word = codec.encode_first(codes);
        emit(word);
        for &code in &codes[k..] {
            word = codec.slide(word, code);
            emit(word);
        }
    }
}
