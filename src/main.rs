use std::cell::RefCell;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use needletail::{Sequence, parse_fastx_file};
use tracing::info;

use kmer_tally::{CountConfig, Strand, count, writer};

/// Count fixed-length words in DNA sequence files.
#[derive(Parser)]
#[command(name = "kmer-count", version)]
struct Args {
    /// Word length
    #[arg(short, default_value_t = 4)]
    k: usize,

    /// Input sequence file(s), FASTA or FASTQ, optionally gzip-compressed
    #[arg(short, long = "input", required = true)]
    input: Vec<PathBuf>,

    /// Output file name
    #[arg(short, long, default_value = "kmer.tab")]
    output: PathBuf,

    /// Count words in unstranded mode
    #[arg(short, long)]
    unstranded: bool,

    /// Name of the library column
    #[arg(short, long, default_value = "lib")]
    name: String,

    /// Print all words, including zero counts
    #[arg(short, long)]
    all: bool,

    /// Write the binary ktab format instead of text
    #[arg(short, long)]
    binary: bool,

    /// Number of counting threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = CountConfig::new(args.k)
        .with_strand(if args.unstranded {
            Strand::Unstranded
        } else {
            Strand::Stranded
        })
        .with_threads(args.threads)
        .with_keep_zero(args.all);
    let kind = config.counter_kind()?;
    info!(k = args.k, ?kind, threads = args.threads, "initializing counter");

    // Parsing failures inside the lazy record stream are stashed here and
    // reported once counting stops pulling records.
    let read_error: RefCell<Option<anyhow::Error>> = RefCell::new(None);
    let records = {
        let read_error = &read_error;
        let mut files = args.input.clone().into_iter();
        let mut reader: Option<Box<dyn needletail::parser::FastxReader>> = None;
        std::iter::from_fn(move || loop {
            if let Some(current) = reader.as_mut() {
                match current.next() {
                    Some(Ok(record)) => {
                        let seq = record.seq();
                        let seq = seq.strip_returns();
                        return Some(seq.into_owned());
                    }
                    Some(Err(e)) => {
                        *read_error.borrow_mut() = Some(e.into());
                        return None;
                    }
                    None => {
                        reader = None;
                        continue;
                    }
                }
            }
            let path = files.next()?;
            info!(file = %path.display(), "reading sequences");
            match parse_fastx_file(&path) {
                Ok(opened) => reader = Some(opened),
                Err(e) => {
                    *read_error.borrow_mut() = Some(anyhow::Error::new(e).context(format!(
                        "cannot read sequences from {}",
                        path.display()
                    )));
                    return None;
                }
            }
        })
    };

    let mut table = count(&config, records)?;
    if let Some(error) = read_error.into_inner() {
        return Err(error);
    }

    table.set_name(0, &args.name)?;

    info!(output = %args.output.display(), "writing counts");
    if args.binary {
        writer::write_ktab(&table, &args.output)
    } else if args.all {
        writer::write_tsv_all(&table, &args.output)
    } else {
        writer::write_tsv(&table, &args.output)
    }
    .with_context(|| format!("cannot write {}", args.output.display()))?;

    info!("finished");
    Ok(())
}
