use crate::config::FileStoreConfig;
use crate::kv::{FileStore, MemoryStore};
use crate::range::{Interval, RangeBucket, RangeIterOptions};
use crate::Result;
use num_bigint::BigInt;
use quickcheck::{Arbitrary, Gen, QuickCheck, TestResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Barrier};
use std::thread;

/// Points the model tracks; writes stay inside `[0, SPACE)`
const SPACE: u32 = 80;

#[derive(Debug, Clone)]
struct RangeWrite {
    start: u32,
    end: u32,
    value: u8,
}

impl Arbitrary for RangeWrite {
    fn arbitrary(g: &mut Gen) -> Self {
        let a = u32::arbitrary(g) % SPACE;
        let b = u32::arbitrary(g) % SPACE;
        let (start, end) = if a == b { (a, a + 1) } else { (a.min(b), a.max(b)) };
        RangeWrite {
            start,
            end,
            // Few distinct values so neighbours often share one
            value: u8::arbitrary(g) % 4,
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let this = self.clone();
        Box::new((this.start + 1..this.end).rev().map(move |end| RangeWrite { end, ..this.clone() }))
    }
}

fn stored(bucket: &RangeBucket<MemoryStore>) -> Vec<Interval> {
    bucket
        .iterator(RangeIterOptions::new())
        .unwrap()
        .collect::<Result<_>>()
        .unwrap()
}

fn is_disjoint(intervals: &[Interval]) -> bool {
    intervals.iter().all(|i| i.start < i.end) && intervals.windows(2).all(|w| w[0].end <= w[1].start)
}

/// Apply writes to a bucket and to a point model, then compare
fn matches_model(writes: Vec<RangeWrite>) -> bool {
    let bucket = RangeBucket::new(Arc::new(MemoryStore::new()), b"prop".to_vec());
    let mut model: Vec<Option<u8>> = vec![None; SPACE as usize];

    for w in &writes {
        bucket.put(w.start, w.end, [w.value]).unwrap();
        for point in w.start..w.end {
            model[point as usize] = Some(w.value);
        }
    }

    let intervals = stored(&bucket);
    if !is_disjoint(&intervals) {
        return false;
    }
    (0..SPACE).all(|point| {
        let p = BigInt::from(point);
        let found = intervals.iter().find(|i| i.contains(&p)).map(|i| i.value[0]);
        found == model[point as usize]
    })
}

#[cfg(test)]
mod property_tests {
    use super::*;

    #[test]
    fn prop_puts_match_point_model() {
        QuickCheck::new()
            .tests(300)
            .quickcheck(matches_model as fn(Vec<RangeWrite>) -> bool);
    }

    #[test]
    fn prop_get_is_idempotent() {
        fn prop(writes: Vec<RangeWrite>, query: RangeWrite) -> bool {
            let bucket = RangeBucket::new(Arc::new(MemoryStore::new()), b"p".to_vec());
            for w in &writes {
                bucket.put(w.start, w.end, [w.value]).unwrap();
            }
            let first = bucket.get(query.start, query.end).unwrap();
            let second = bucket.get(query.start, query.end).unwrap();
            first == second && first.iter().all(|i| i.intersects(&query.start.into(), &query.end.into()))
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<RangeWrite>, RangeWrite) -> bool);
    }

    #[test]
    fn prop_put_then_get_returns_exactly_it() {
        fn prop(writes: Vec<RangeWrite>, last: RangeWrite) -> bool {
            let bucket = RangeBucket::new(Arc::new(MemoryStore::new()), b"p".to_vec());
            for w in &writes {
                bucket.put(w.start, w.end, [w.value]).unwrap();
            }
            bucket.put(last.start, last.end, [last.value]).unwrap();
            bucket.get(last.start, last.end).unwrap() == vec![Interval::new(last.start, last.end, [last.value])]
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<RangeWrite>, RangeWrite) -> bool);
    }

    #[test]
    fn prop_reput_leaves_state_identical() {
        fn prop(writes: Vec<RangeWrite>) -> TestResult {
            let Some(last) = writes.last().cloned() else {
                return TestResult::discard();
            };
            let store = Arc::new(MemoryStore::new());
            let bucket = RangeBucket::new(Arc::clone(&store), b"p".to_vec());
            for w in &writes {
                bucket.put(w.start, w.end, [w.value]).unwrap();
            }
            let before = store.entries();
            bucket.put(last.start, last.end, [last.value]).unwrap();
            TestResult::from_bool(store.entries() == before)
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<RangeWrite>) -> TestResult);
    }

    #[test]
    fn prop_trim_clears_window_and_keeps_the_rest() {
        fn prop(writes: Vec<RangeWrite>, window: RangeWrite) -> bool {
            let bucket = RangeBucket::new(Arc::new(MemoryStore::new()), b"p".to_vec());
            for w in &writes {
                bucket.put(w.start, w.end, [w.value]).unwrap();
            }
            let before = stored(&bucket);
            bucket.trim(window.start, window.end).unwrap();
            let after = stored(&bucket);

            let (ws, we) = (BigInt::from(window.start), BigInt::from(window.end));
            let value_at = |set: &[Interval], p: &BigInt| set.iter().find(|i| i.contains(p)).map(|i| i.value.clone());
            is_disjoint(&after)
                && (0..SPACE).map(BigInt::from).all(|p| {
                    if ws <= p && p < we {
                        value_at(&after, &p).is_none()
                    } else {
                        value_at(&after, &p) == value_at(&before, &p)
                    }
                })
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<RangeWrite>, RangeWrite) -> bool);
    }

    #[test]
    fn stress_random_workload_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stress.log");
        let mut rng = StdRng::seed_from_u64(7);
        let mut model: Vec<Option<u32>> = vec![None; 1_000];

        {
            let config = FileStoreConfig::with_path(&path).with_sync_writes(false);
            let store = Arc::new(FileStore::open(config).unwrap());
            let bucket = RangeBucket::new(store, b"stress".to_vec());
            for round in 0..500u32 {
                let start = rng.gen_range(0..990u32);
                let end = rng.gen_range(start + 1..=(start + 10).min(1_000));
                if rng.gen_bool(0.2) {
                    for interval in bucket.del(start, end).unwrap() {
                        let s: usize = interval.start.try_into().unwrap();
                        let e: usize = interval.end.try_into().unwrap();
                        model[s..e].fill(None);
                    }
                } else {
                    bucket.put(start, end, round.to_be_bytes()).unwrap();
                    model[start as usize..end as usize].fill(Some(round));
                }
            }
        }

        let store = Arc::new(FileStore::open_path(&path).unwrap());
        let bucket = RangeBucket::new(store, b"stress".to_vec());
        let intervals: Vec<Interval> = bucket
            .iterator(RangeIterOptions::new())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(is_disjoint(&intervals));
        for (point, expected) in model.iter().enumerate() {
            let p = BigInt::from(point);
            let found = intervals
                .iter()
                .find(|i| i.contains(&p))
                .map(|i| u32::from_be_bytes(i.value[..4].try_into().unwrap()));
            assert_eq!(found, *expected, "point {point}");
        }
    }

    #[test]
    fn stress_concurrent_readers_see_disjoint_state() {
        let bucket = Arc::new(RangeBucket::new(Arc::new(MemoryStore::new()), b"c".to_vec()));
        let num_readers = 4;
        let barrier = Arc::new(Barrier::new(num_readers + 1));

        let writer = {
            let bucket = Arc::clone(&bucket);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..400u32 {
                    let start = (i * 37) % 500;
                    bucket.put(start, start + 40, [i as u8]).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..num_readers)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..200 {
                        let intervals = bucket.get(0, 600).unwrap();
                        assert!(is_disjoint(&intervals), "reader saw a half-applied split");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
