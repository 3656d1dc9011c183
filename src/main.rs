//! RangeDB command line interface
//!
//! Opens a file-backed store and runs one range operation against a
//! (possibly nested) range bucket.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rangedb::{
    BigInt, Error, FileStore, FileStoreConfig, Interval, RangeBucket, RangeIterOptions, Result,
};

/// Range-indexed key-value store
#[derive(Parser, Debug)]
#[command(name = "rangedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store log file
    #[arg(short, long, env = "RANGEDB_PATH", default_value = "rangedb.log")]
    path: PathBuf,

    /// Range bucket prefix; repeat to nest
    #[arg(short, long = "bucket", default_value = "ranges")]
    buckets: Vec<String>,

    /// Skip fsync after each write
    #[arg(long)]
    no_sync: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store VALUE over [START, END), splitting whatever it overlaps
    Put {
        start: BigInt,
        end: BigInt,
        value: String,
    },
    /// Print intervals intersecting [START, END)
    Get { start: BigInt, end: BigInt },
    /// Remove every interval intersecting [START, END)
    Del { start: BigInt, end: BigInt },
    /// Cut exactly [START, END) out, keeping the parts outside it
    Trim { start: BigInt, end: BigInt },
    /// Report whether any interval intersects [START, END)
    Has { start: BigInt, end: BigInt },
    /// Print every interval in the bucket
    Scan,
    /// Rewrite the log keeping only live entries
    Compact,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = FileStoreConfig::with_path(cli.path).with_sync_writes(!cli.no_sync);
    let store = Arc::new(FileStore::open(config)?);

    if let Commands::Compact = cli.command {
        let before = store.log_size();
        store.compact()?;
        println!("Compacted {} -> {} bytes", before, store.log_size());
        return Ok(());
    }

    let bucket = open_bucket(&store, &cli.buckets)?;
    match cli.command {
        Commands::Put { start, end, value } => bucket.put(start, end, value)?,
        Commands::Get { start, end } => print_all(&bucket.get(start, end)?),
        Commands::Del { start, end } => print_all(&bucket.del(start, end)?),
        Commands::Trim { start, end } => print_all(&bucket.trim(start, end)?),
        Commands::Has { start, end } => println!("{}", bucket.has_data_in_range(start, end)?),
        Commands::Scan => {
            let mut count = 0;
            for interval in bucket.iterator(RangeIterOptions::new())? {
                println!("{}", interval?);
                count += 1;
            }
            println!("Total: {count} intervals");
        }
        Commands::Compact => {}
    }
    Ok(())
}

fn open_bucket(store: &Arc<FileStore>, buckets: &[String]) -> Result<RangeBucket<FileStore>> {
    let (first, rest) = buckets
        .split_first()
        .ok_or_else(|| Error::Config("at least one bucket prefix is required".to_string()))?;
    let root = RangeBucket::new(Arc::clone(store), first.as_bytes());
    Ok(rest
        .iter()
        .fold(root, |bucket, child| bucket.range_bucket(child.as_bytes())))
}

fn print_all(intervals: &[Interval]) {
    for interval in intervals {
        println!("{interval}");
    }
}
