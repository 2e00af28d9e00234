mod common;

use bytes::Bytes;
use common::{key_of, value_of, write_test_data, TrackedStore};
use keyspread::{
    HashPrefix, KeyHasher, KeyRange, MemKvStore, RoundRobinPrefix, RowKeyDistributor, ScanState,
    SpreadError, SpreadResult, StoreError, Strategy,
};
use pretty_assertions::assert_eq;

#[ctor::ctor]
fn init() {
    dev_utils::setup_test_log();
}

fn distributors() -> Vec<RowKeyDistributor> {
    vec![
        RowKeyDistributor::hash(32).unwrap(),
        RowKeyDistributor::new(Strategy::from(
            HashPrefix::with_layout(37, 1, KeyHasher::xxh32()).unwrap(),
        )),
        RowKeyDistributor::round_robin(10).unwrap(),
        RowKeyDistributor::new(Strategy::from(RoundRobinPrefix::with_width(300, 2).unwrap())),
    ]
}

/// Write 500 values around 500, merge-scan `range`, and check order, bounds
/// and completeness.
fn check_simple_scan(
    distributor: &RowKeyDistributor,
    range: KeyRange,
    min: i64,
    max: i64,
) -> SpreadResult<usize> {
    let mut store = MemKvStore::new();
    let expected = write_test_data(&mut store, distributor, 500, 500, min, max);
    let store = TrackedStore::new(store);

    let mut previous: Option<Bytes> = None;
    let mut count = 0;
    for row in distributor.scan(&store, &range)? {
        let row = row?;
        count += 1;
        if let Some(previous) = &previous {
            assert!(row.original_key() > previous);
        }
        assert_eq!(
            distributor.original_key(row.physical_key())?,
            &row.original_key()[..]
        );
        let val = value_of(row.value());
        assert!(val >= min && val <= max, "{} not in [{}, {}]", val, min, max);
        assert_eq!(&row.original_key()[..], &key_of(val as u64)[..]);
        previous = Some(row.original_key().clone());
    }
    assert_eq!(count, expected);
    store.assert_all_closed_once();
    Ok(count)
}

#[test]
fn scan_bounded() -> SpreadResult<()> {
    for d in distributors() {
        let range = KeyRange::new(
            Bytes::copy_from_slice(&key_of(100)),
            Bytes::copy_from_slice(&key_of(899 + 1)),
        );
        assert_eq!(check_simple_scan(&d, range, 100, 899)?, 400);
    }
    Ok(())
}

#[test]
fn scan_unbounded() -> SpreadResult<()> {
    for d in distributors() {
        assert_eq!(check_simple_scan(&d, KeyRange::all(), 0, 999)?, 500);
    }
    Ok(())
}

#[test]
fn scan_without_stop_key() -> SpreadResult<()> {
    for d in distributors() {
        let range = KeyRange::from_start(Bytes::copy_from_slice(&key_of(100)));
        assert_eq!(check_simple_scan(&d, range, 100, 999)?, 450);
    }
    Ok(())
}

#[test]
fn scan_without_start_key() -> SpreadResult<()> {
    for d in distributors() {
        let range = KeyRange::until(Bytes::copy_from_slice(&key_of(500)));
        assert_eq!(check_simple_scan(&d, range, 0, 499)?, 250);
    }
    Ok(())
}

#[test]
fn dense_range() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(16)?;
    let mut store = MemKvStore::new();
    for val in 0..1000u64 {
        d.put(&mut store, &key_of(val), Bytes::from(val.to_be_bytes().to_vec()))?;
    }
    let range = KeyRange::new(
        Bytes::copy_from_slice(&key_of(100)),
        Bytes::copy_from_slice(&key_of(900)),
    );
    let vals: Vec<u64> = d
        .scan(&store, &range)?
        .map(|row| {
            let row = row.unwrap();
            u64::from_be_bytes(row.value()[..].try_into().unwrap())
        })
        .collect();
    assert_eq!(vals, (100..900).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn last_bucket_is_reached_without_stop_key() -> SpreadResult<()> {
    let d = RowKeyDistributor::round_robin(256)?;
    let mut store = MemKvStore::new();
    for val in 0..512u64 {
        d.put(&mut store, &key_of(val), Bytes::new())?;
    }
    let rows = d.scan(&store, &KeyRange::all())?.collect::<SpreadResult<Vec<_>>>()?;
    assert_eq!(rows.len(), 512);
    assert_eq!(rows.iter().filter(|r| r.bucket() == 255).count(), 2);
    Ok(())
}

#[test]
fn inverted_range_is_empty() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(8)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 100, 500, 0, 0);
    let range = KeyRange::new(
        Bytes::copy_from_slice(&key_of(600)),
        Bytes::copy_from_slice(&key_of(400)),
    );
    let mut scanner = d.scan(&store, &range)?;
    assert_eq!(scanner.next_row()?, None);
    assert_eq!(scanner.state(), ScanState::Exhausted);
    Ok(())
}

#[test]
fn batches() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(8)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 25, 500, 0, 0);
    let mut scanner = d.scan(&store, &KeyRange::all())?;
    assert_eq!(scanner.next_batch(10)?.len(), 10);
    assert_eq!(scanner.next_batch(10)?.len(), 10);
    let last = scanner.next_batch(10)?;
    assert_eq!(last.len(), 5);
    assert!(scanner.next_batch(10)?.is_empty());
    Ok(())
}

#[test]
fn exhaustion_releases_every_cursor() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(16)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 50, 500, 0, 0);
    let store = TrackedStore::new(store);

    let mut scanner = d.scan(&store, &KeyRange::all())?;
    assert_eq!(store.probes().len(), 16);
    while scanner.next_row()?.is_some() {}
    assert_eq!(scanner.state(), ScanState::Exhausted);
    assert_eq!(scanner.open_cursors(), 0);
    store.assert_all_closed_once();

    scanner.close();
    scanner.close();
    assert_eq!(scanner.state(), ScanState::Closed);
    assert!(matches!(scanner.next_row(), Err(SpreadError::ScannerClosed)));
    drop(scanner);
    store.assert_all_closed_once();
    Ok(())
}

#[test]
fn early_close_releases_every_cursor() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(16)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 200, 500, 0, 0);
    let store = TrackedStore::new(store);

    let mut scanner = d.scan(&store, &KeyRange::all())?;
    assert_eq!(scanner.next_batch(10)?.len(), 10);
    assert!(scanner.open_cursors() > 0);
    scanner.close();
    assert_eq!(scanner.open_cursors(), 0);
    store.assert_all_closed_once();
    assert!(matches!(scanner.next_row(), Err(SpreadError::ScannerClosed)));
    assert!(scanner.next().is_none());
    scanner.close();
    store.assert_all_closed_once();
    Ok(())
}

#[test]
fn drop_releases_every_cursor() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(4)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 40, 500, 0, 0);
    let store = TrackedStore::new(store);

    {
        let mut scanner = d.scan(&store, &KeyRange::all())?;
        scanner.next_row()?;
    }
    assert_eq!(store.probes().len(), 4);
    store.assert_all_closed_once();

    // never read at all
    drop(d.scan(&store, &KeyRange::all())?);
    assert_eq!(store.probes().len(), 8);
    store.assert_all_closed_once();
    Ok(())
}

#[test]
fn mid_scan_failure_closes_everything() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(8)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 200, 500, 0, 0);
    let store = TrackedStore::new(store).fail_after(3, 2);

    let mut scanner = d.scan(&store, &KeyRange::all())?;
    let mut ok_rows = 0;
    let err = loop {
        match scanner.next() {
            Some(Ok(_)) => ok_rows += 1,
            Some(Err(e)) => break e,
            None => panic!("the injected failure never surfaced"),
        }
    };
    ensure_cov::assert_cov("keyspread::scan::MergeScanner::abort");
    assert!(ok_rows < 200);
    assert_eq!(err.bucket(), Some(3));
    assert!(matches!(
        err,
        SpreadError::Store {
            source: StoreError::ConnectionLost(_),
            ..
        }
    ));
    assert_eq!(scanner.state(), ScanState::Closed);
    assert_eq!(scanner.open_cursors(), 0);
    store.assert_all_closed_once();

    assert!(scanner.next().is_none());
    assert!(matches!(scanner.next_row(), Err(SpreadError::ScannerClosed)));
    scanner.close();
    store.assert_all_closed_once();
    Ok(())
}

#[test]
fn failure_on_first_read() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(8)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 100, 500, 0, 0);
    let store = TrackedStore::new(store).fail_after(5, 0);

    let mut scanner = d.scan(&store, &KeyRange::all())?;
    let err = scanner.next_row().unwrap_err();
    assert_eq!(err.bucket(), Some(5));
    assert_eq!(scanner.state(), ScanState::Closed);
    store.assert_all_closed_once();
    Ok(())
}

#[test]
fn open_failure_releases_opened_cursors() -> SpreadResult<()> {
    let d = RowKeyDistributor::hash(8)?;
    let mut store = MemKvStore::new();
    write_test_data(&mut store, &d, 100, 500, 0, 0);
    let store = TrackedStore::new(store).fail_open(5);

    let err = d.scan(&store, &KeyRange::all()).unwrap_err();
    ensure_cov::assert_cov("keyspread::scan::MergeScanner::open::release_opened");
    assert_eq!(err.bucket(), Some(5));
    assert!(matches!(
        err,
        SpreadError::Store {
            source: StoreError::ShardUnavailable(_),
            ..
        }
    ));
    // buckets 0..5 were opened before the failure
    let probes = store.probes();
    assert_eq!(
        probes.iter().map(|p| p.bucket).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
    store.assert_all_closed_once();
    Ok(())
}

#[test]
fn wide_prefix_merge() -> SpreadResult<()> {
    let d = RowKeyDistributor::new(Strategy::from(HashPrefix::with_layout(
        1000,
        2,
        KeyHasher::Simple,
    )?));
    let mut store = MemKvStore::new();
    let expected = write_test_data(&mut store, &d, 500, 500, 100, 899);
    let range = KeyRange::new(
        Bytes::copy_from_slice(&key_of(100)),
        Bytes::copy_from_slice(&key_of(900)),
    );
    let rows = d.scan(&store, &range)?.collect::<SpreadResult<Vec<_>>>()?;
    assert_eq!(rows.len(), expected);
    assert!(rows.windows(2).all(|w| w[0].original_key() < w[1].original_key()));
    assert!(rows.iter().all(|r| r.bucket() < 1000));
    Ok(())
}

#[test]
fn random_keys_come_back_sorted() -> SpreadResult<()> {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(123);
    let d = RowKeyDistributor::new(Strategy::from(HashPrefix::with_layout(
        64,
        1,
        KeyHasher::xxh32(),
    )?));
    let mut store = MemKvStore::new();
    let mut expected = Vec::new();
    for _ in 0..2000 {
        let len = rng.gen_range(0..12);
        let key: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        d.put(&mut store, &key, Bytes::new())?;
        expected.push(key);
    }
    expected.sort();
    expected.dedup();

    let start = rng.gen::<[u8; 2]>();
    let stop = rng.gen::<[u8; 2]>();
    let range = KeyRange::new(
        Bytes::copy_from_slice(&start.min(stop)),
        Bytes::copy_from_slice(&start.max(stop)),
    );
    let in_range: Vec<_> = expected
        .iter()
        .filter(|k| range.contains(k))
        .cloned()
        .collect();

    let got: Vec<Vec<u8>> = d
        .scan(&store, &range)?
        .map(|row| row.map(|r| r.original_key().to_vec()))
        .collect::<SpreadResult<_>>()?;
    assert_eq!(got, in_range);
    Ok(())
}
