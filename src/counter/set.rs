//! Pairwise reduction of a set of counting shards.

use std::mem;

use rayon::prelude::*;
use tracing::debug;

use crate::counter::CountShard;

/// State of one shard slot. A slot is tagged `Merged` once its shard has
/// been absorbed by a survivor, so round bookkeeping is a plain filter
/// over slot states.
enum Slot<S> {
    Live(S),
    Merged,
}

/// Indexed collection of shards, one slot per worker.
pub struct CounterSet<S> {
    slots: Vec<Slot<S>>,
}

impl<S: CountShard> CounterSet<S> {
    pub fn new(shards: Vec<S>) -> Self {
        Self {
            slots: shards.into_iter().map(Slot::Live).collect(),
        }
    }

    /// Number of shards not yet absorbed by a merge.
    pub fn live(&self) -> usize {
        self.live_indices().len()
    }

    fn live_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Live(_) => Some(index),
                Slot::Merged => None,
            })
            .collect()
    }

    fn take(&mut self, index: usize) -> S {
        match mem::replace(&mut self.slots[index], Slot::Merged) {
            Slot::Live(shard) => shard,
            Slot::Merged => panic!(
                "counter slot {index} was already merged; merge bookkeeping is inconsistent"
            ),
        }
    }

    /// Reduce all live shards to one.
    ///
    /// Each round pairs live slots left to right by index; an odd
    /// leftover is carried to the next round unmerged. The pairs of a
    /// round merge in parallel, and the round only ends once every merge
    /// has completed, so no shard is ever touched by two merges at once.
    ///
    /// # Panics
    ///
    /// Panics if a round finds fewer live shards than the previous round
    /// promised. That state is unreachable while slot indices are tracked
    /// correctly, and a wrong count would silently corrupt the result,
    /// so the run aborts instead.
    pub fn reduce(mut self) -> S {
        if self.slots.is_empty() {
            panic!("cannot reduce an empty counter set; counter bookkeeping is inconsistent");
        }
        let mut expected = self.slots.len();
        loop {
            let live = self.live_indices();
            if live.len() != expected {
                panic!(
                    "merge round expected {expected} live counters, found {}; \
                     counter bookkeeping is inconsistent",
                    live.len()
                );
            }
            if live.len() == 1 {
                return self.take(live[0]);
            }

            let n_pairs = live.len() / 2;
            let carried = live.len() % 2;
            debug!(live = live.len(), pairs = n_pairs, carried, "merge round");

            let pairs: Vec<(usize, S, S)> = live[..2 * n_pairs]
                .chunks_exact(2)
                .map(|pair| (pair[0], self.take(pair[0]), self.take(pair[1])))
                .collect();
            let merged: Vec<(usize, S)> = pairs
                .into_par_iter()
                .map(|(slot, survivor, absorbed)| (slot, survivor.merge(absorbed)))
                .collect();
            // collect() is the round barrier: survivors re-enter the set
            // only after every pair has merged
            for (slot, shard) in merged {
                self.slots[slot] = Slot::Live(shard);
            }

            expected = n_pairs + carried;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CountConfig, Strand};
    use crate::counter::{DenseShard, SparseShard};

    fn shard<S: CountShard>(config: &CountConfig, records: &[&[u8]]) -> S {
        let mut shard = S::new(config);
        for record in records {
            shard.count_record(record);
        }
        shard.finish();
        shard
    }

    #[test]
    fn four_dense_shards_conserve_the_total() {
        let config = CountConfig::new(2);
        let shards: Vec<DenseShard> = [
            &[&b"ACGTAC"[..]][..],
            &[&b"GGGG"[..], &b"TT"[..]],
            &[], // a worker that received no records
            &[&b"CATCAT"[..]],
        ]
        .iter()
        .map(|records| shard(&config, records))
        .collect();

        let sum: u64 = shards.iter().map(|s| s.total()).sum();
        let survivor = CounterSet::new(shards).reduce();
        assert_eq!(survivor.total(), sum);
    }

    #[test]
    fn four_sparse_shards_conserve_the_total() {
        let config = CountConfig::new(11).with_strand(Strand::Unstranded);
        let shards: Vec<SparseShard> = [
            &[&b"ACGTACGTACGTACGT"[..]][..],
            &[&b"TTTTTTTTTTTT"[..], &b"CCCCCCCCCCCC"[..]],
            &[],
            &[&b"GATTACAGATTACA"[..]],
        ]
        .iter()
        .map(|records| shard(&config, records))
        .collect();

        let sum: u64 = shards.iter().map(|s| s.total()).sum();
        let survivor = CounterSet::new(shards).reduce();
        assert_eq!(survivor.total(), sum);
    }

    #[test]
    fn odd_shard_counts_carry_the_leftover() {
        let config = CountConfig::new(2);
        for n in [1usize, 3, 5, 7] {
            let shards: Vec<DenseShard> =
                (0..n).map(|_| shard(&config, &[&b"ACGT"[..]])).collect();
            let survivor = CounterSet::new(shards).reduce();
            assert_eq!(survivor.total(), 3 * n as u64);
        }
    }

    #[test]
    fn pairing_order_does_not_change_the_result() {
        let config = CountConfig::new(2);
        let records: [&[u8]; 4] = [b"ACGTAC", b"GGGGT", b"CATCAT", b"TTACG"];

        let forward: Vec<DenseShard> =
            records.iter().map(|r| shard(&config, &[*r])).collect();
        let reversed: Vec<DenseShard> =
            records.iter().rev().map(|r| shard(&config, &[*r])).collect();

        let a = CounterSet::new(forward).reduce().into_table();
        let b = CounterSet::new(reversed).reduce().into_table();
        for word in 0..16u32 {
            assert_eq!(a.count(word), b.count(word));
        }
    }

    #[test]
    #[should_panic(expected = "counter bookkeeping is inconsistent")]
    fn reducing_an_empty_set_aborts() {
        let set: CounterSet<DenseShard> = CounterSet::new(Vec::new());
        let _ = set.reduce();
    }
}
