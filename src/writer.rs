//! Result writers: tab-separated text and the binary `ktab` format.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use xxhash_rust::xxh3::xxh3_64;

use crate::codec::WordCodec;
use crate::config::MAX_K_WORD32;
use crate::counter::ShardStats;
use crate::error::{Error, Result};
use crate::table::{KmerTable, TableKind};

const KTAB_MAGIC: &[u8; 4] = b"KTAB";
const KTAB_VERSION: u8 = 1;
const FLAG_SPARSE: u8 = 0b0000_0001;
const KTAB_ZSTD_LEVEL: i32 = 3;

/// Write the table as tab-separated text, skipping rows whose counts sum
/// to zero across all columns.
pub fn write_tsv(table: &KmerTable, path: impl AsRef<Path>) -> Result<()> {
    write_rows(table, path.as_ref(), false)
}

/// Write the table as tab-separated text, keeping zero-count rows.
///
/// Only a dense table materializes zero counts; for a sparse table this
/// is identical to [`write_tsv`].
pub fn write_tsv_all(table: &KmerTable, path: impl AsRef<Path>) -> Result<()> {
    write_rows(table, path.as_ref(), true)
}

fn write_rows(table: &KmerTable, path: &Path, keep_zero: bool) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    out.write_all(b"Kmer")?;
    for name in table.names() {
        write!(out, "\t{name}")?;
    }
    out.write_all(b"\n")?;

    let codec = WordCodec::new(table.k());
    let mut symbols = vec![0u8; table.k()];
    match table.kind() {
        TableKind::Dense { columns } => {
            for row in 0..columns[0].len() {
                let sum: u64 = columns.iter().map(|c| c[row] as u64).sum();
                if sum == 0 && !keep_zero {
                    continue;
                }
                codec.decode_into(row as u32, &mut symbols);
                out.write_all(&symbols)?;
                for column in columns {
                    write!(out, "\t{}", column[row])?;
                }
                out.write_all(b"\n")?;
            }
        }
        TableKind::Sparse { words, columns } => {
            for (row, &word) in words.iter().enumerate() {
                codec.decode_into(word, &mut symbols);
                out.write_all(&symbols)?;
                for column in columns {
                    write!(out, "\t{}", column[row])?;
                }
                out.write_all(b"\n")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

#[derive(bincode::Encode, bincode::Decode)]
struct KtabHeader {
    k: u8,
    flags: u8,
    n_libs: u16,
    n_words: u64,
    names: Vec<String>,
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Write the table in the binary `ktab` layout: magic and version, a
/// fixed-int header, a zstd-compressed payload holding the word and
/// count vectors, and an xxh3-64 checksum of the compressed payload.
pub fn write_ktab(table: &KmerTable, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);

    let empty: Vec<u32> = Vec::new();
    let (flags, words) = match table.kind() {
        TableKind::Dense { .. } => (0u8, &empty),
        TableKind::Sparse { words, .. } => (FLAG_SPARSE, words),
    };
    let columns = match table.kind() {
        TableKind::Dense { columns } => columns,
        TableKind::Sparse { columns, .. } => columns,
    };

    let header = KtabHeader {
        k: table.k() as u8,
        flags,
        n_libs: table.n_columns() as u16,
        n_words: table.n_words() as u64,
        names: table.names().to_vec(),
    };

    out.write_all(KTAB_MAGIC)?;
    out.write_all(&[KTAB_VERSION])?;
    bincode::encode_into_std_write(&header, &mut out, bincode_config())?;

    let payload = bincode::encode_to_vec((words, columns), bincode_config())?;
    let compressed = zstd::bulk::Compressor::new(KTAB_ZSTD_LEVEL)?.compress(&payload)?;
    bincode::encode_into_std_write(&compressed, &mut out, bincode_config())?;
    out.write_all(&xxh3_64(&compressed).to_le_bytes())?;
    out.flush()?;
    Ok(())
}

/// Read a table written by [`write_ktab`], validating magic, version,
/// checksum and the declared dimensions.
pub fn read_ktab(path: impl AsRef<Path>) -> Result<KmerTable> {
    let path = path.as_ref();
    let invalid = |reason: &str| Error::InvalidTable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut input = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if &magic != KTAB_MAGIC {
        return Err(invalid("bad magic"));
    }
    let mut version = [0u8; 1];
    input.read_exact(&mut version)?;
    if version[0] != KTAB_VERSION {
        return Err(invalid("unsupported version"));
    }

    let header: KtabHeader = bincode::decode_from_std_read(&mut input, bincode_config())?;
    let k = header.k as usize;
    if k == 0 || k > MAX_K_WORD32 {
        return Err(invalid("word length out of range"));
    }
    let n_words = header.n_words as usize;
    let n_libs = header.n_libs as usize;
    if header.names.len() != n_libs {
        return Err(invalid("library name count does not match the header"));
    }

    let compressed: Vec<u8> = bincode::decode_from_std_read(&mut input, bincode_config())?;
    let mut checksum = [0u8; 8];
    input.read_exact(&mut checksum)?;
    if xxh3_64(&compressed) != u64::from_le_bytes(checksum) {
        return Err(invalid("checksum mismatch"));
    }

    let capacity = 64 + 4 * n_words * (n_libs + 1) + 16 * n_libs;
    let payload = zstd::bulk::Decompressor::new()?.decompress(&compressed, capacity)?;
    let ((words, columns), _): ((Vec<u32>, Vec<Vec<u32>>), usize) =
        bincode::decode_from_slice(&payload, bincode_config())?;

    if columns.len() != n_libs || columns.iter().any(|c| c.len() != n_words) {
        return Err(invalid("count columns do not match the header"));
    }

    let kind = if header.flags & FLAG_SPARSE != 0 {
        if words.len() != n_words || words.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(invalid("word list is not strictly increasing"));
        }
        TableKind::Sparse { words, columns }
    } else {
        if !words.is_empty() {
            return Err(invalid("dense table carries a word list"));
        }
        if n_words != 1usize << (2 * k) {
            return Err(invalid("dense table does not cover the word space"));
        }
        TableKind::Dense { columns }
    };

    Ok(KmerTable::from_parts(
        k,
        header.names,
        kind,
        ShardStats::default(),
    ))
}
