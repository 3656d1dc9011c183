//! Token ownership ledger
//!
//! Tracks which account owns each token id of a rollup deposit. Transfers of
//! contiguous token ranges split existing ownership intervals, and exits
//! remove them.

use std::sync::Arc;
use rangedb::{Bucket, Error, Interval, LockTable, MemoryStore, RangeIterOptions, SerializedRangeBucket};

fn show(title: &str, intervals: &[Interval]) {
    println!("{title}:");
    for interval in intervals {
        println!("  {interval}");
    }
}

fn main() -> Result<(), Error> {
    let store = Arc::new(MemoryStore::new());
    let ledger = Bucket::new(Arc::clone(&store), b"ledger/".to_vec());
    let locks = Arc::new(LockTable::new());

    // One ownership index per deposited token, nested under the ledger
    let owners = SerializedRangeBucket::new(ledger.range_bucket(b"token-a/"), Arc::clone(&locks));
    ledger.put(b"meta/token-a", b"ERC20 deposit #1")?;

    println!("=== Deposit ===");
    owners.put(0, 1_000, "alice")?;
    show("Owners of [0, 1000)", &owners.get(0, 1_000)?);

    println!("\n=== Transfers ===");
    owners.put(200, 300, "bob")?;
    owners.put(250, 600, "carol")?;
    show("After alice -> bob [200, 300) and -> carol [250, 600)", &owners.get(0, 1_000)?);

    println!("\n=== Queries ===");
    show("Owners of token 275", &owners.get(275, 276)?);
    println!("Anything in [1000, 2000)? {}", owners.inner().has_data_in_range(1_000, 2_000)?);

    println!("\n=== Exits ===");
    show("Exited (whole intervals)", &owners.del(210, 260)?);
    show("Partial exit of [700, 800)", &owners.trim(700, 800)?);

    println!("\n=== Final state ===");
    for interval in owners.inner().iterator(RangeIterOptions::new())? {
        let interval = interval?;
        println!("  {} tokens owned by {}", interval.len(), String::from_utf8_lossy(&interval.value));
    }
    println!(
        "Metadata: {}",
        ledger
            .get(b"meta/token-a")?
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .unwrap_or_default()
    );
    println!("Keys in store: {}", store.len());

    Ok(())
}
