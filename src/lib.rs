//! Parallel counting of fixed-length words over DNA sequences.
//!
//! Records are streamed to a pool of workers through a bounded queue;
//! each worker accumulates counts into its own shard, either densely
//! (one slot per possible word) or sparsely (sorted word/count pairs),
//! chosen from the word length. Shards are then merged pairwise until a
//! single [`KmerTable`] remains, ready for the text or binary writers.
//!
//! ```no_run
//! use kmer_tally::{CountConfig, Strand, count};
//!
//! let config = CountConfig::new(4)
//!     .with_strand(Strand::Unstranded)
//!     .with_threads(4);
//! let table = count(&config, vec![b"ACGTACGT".to_vec()])?;
//! kmer_tally::writer::write_tsv(&table, "kmer.tab")?;
//! # Ok::<(), kmer_tally::Error>(())
//! ```

pub mod codec;
pub mod config;
pub mod counter;
pub mod error;
pub mod pipeline;
pub mod table;
pub mod writer;

pub use codec::WordCodec;
pub use config::{CountConfig, CounterKind, Strand};
pub use counter::{CountShard, CounterSet, DenseShard, ShardStats, SparseShard};
pub use error::{ConfigError, Error, Result};
pub use pipeline::count;
pub use table::{KmerTable, TableKind};
