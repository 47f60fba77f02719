//! Parallel counting driver: distribution queue, worker pool, reduction.

use crossbeam::channel::bounded;
use tracing::{debug, info};

use crate::config::{CountConfig, CounterKind};
use crate::counter::{CountShard, CounterSet, DenseShard, SparseShard};
use crate::error::Result;
use crate::table::KmerTable;

/// Count every word of every record and reduce to one table.
///
/// Records are raw symbol buffers, one per input record; parsing them
/// out of whatever container they live in is the caller's business.
/// They are distributed to `config.threads` workers through a bounded
/// queue, so a slow consumer side backpressures the producer instead of
/// buffering the whole input. Each worker owns one shard; after all
/// workers have finished their accumulation pass the shards are merged
/// pairwise until one remains.
pub fn count<I>(config: &CountConfig, records: I) -> Result<KmerTable>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let table = match config.counter_kind()? {
        CounterKind::Dense => count_with::<DenseShard, I>(config, records),
        CounterKind::Sparse => count_with::<SparseShard, I>(config, records),
    };
    let stats = table.stats();
    info!(
        records = stats.records,
        skipped = stats.skipped,
        masked = stats.masked,
        total = table.total(),
        "counting complete"
    );
    Ok(table)
}

fn count_with<S, I>(config: &CountConfig, records: I) -> KmerTable
where
    S: CountShard,
    I: IntoIterator<Item = Vec<u8>>,
{
    let (tx, rx) = bounded::<Vec<u8>>(config.threads);

    let shards: Vec<S> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..config.threads)
            .map(|_| {
                let rx = rx.clone();
                let mut shard = S::new(config);
                scope.spawn(move || {
                    for seq in rx {
                        shard.count_record(&seq);
                    }
                    shard.finish();
                    shard
                })
            })
            .collect();
        drop(rx);

        for seq in records {
            if tx.send(seq).is_err() {
                break;
            }
        }
        drop(tx);

        // joining every worker is the accumulation barrier; no shard is
        // merged before its owner has sealed it
        workers
            .into_iter()
            .map(|worker| worker.join().expect("counting worker panicked"))
            .collect()
    });

    debug!(shards = shards.len(), "accumulation complete");
    CounterSet::new(shards).reduce().into_table()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strand;

    fn records() -> Vec<Vec<u8>> {
        // deterministic pseudo-random records, a few too short to count
        let mut state = 0x2545F491u32;
        let mut out = Vec::new();
        for i in 0..200 {
            let len = 1 + (i % 37);
            let mut seq = Vec::with_capacity(len);
            for _ in 0..len {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                seq.push(crate::codec::WORD_BASES[(state >> 30) as usize]);
            }
            out.push(seq);
        }
        out
    }

    #[test]
    fn dense_total_matches_the_window_count() {
        let records = records();
        let expected: u64 = records
            .iter()
            .filter(|r| r.len() >= 4)
            .map(|r| (r.len() - 3) as u64)
            .sum();
        let config = CountConfig::new(4).with_threads(3);
        let table = count(&config, records).unwrap();
        assert_eq!(table.total(), expected);
    }

    #[test]
    fn thread_count_does_not_change_the_result() {
        for strand in [Strand::Stranded, Strand::Unstranded] {
            let reference = count(
                &CountConfig::new(3).with_strand(strand),
                records(),
            )
            .unwrap();
            for threads in [2usize, 5, 8] {
                let config = CountConfig::new(3).with_strand(strand).with_threads(threads);
                let table = count(&config, records()).unwrap();
                for word in 0..64u32 {
                    assert_eq!(table.count(word), reference.count(word));
                }
            }
        }
    }

    #[test]
    fn more_workers_than_records_is_fine() {
        let config = CountConfig::new(2).with_threads(8);
        let table = count(&config, vec![b"ACGT".to_vec()]).unwrap();
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn empty_input_yields_an_empty_table() {
        let config = CountConfig::new(12).with_threads(4);
        let table = count(&config, Vec::new()).unwrap();
        assert_eq!(table.total(), 0);
        assert_eq!(table.n_words(), 0);
    }

    #[test]
    fn bad_configuration_is_rejected_before_counting() {
        let config = CountConfig::new(99);
        assert!(count(&config, vec![b"ACGT".to_vec()]).is_err());
    }
}
