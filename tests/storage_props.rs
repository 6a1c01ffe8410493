//! Property-based tests for the clip store
//!
//! Run with: cargo test --test storage_props

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use tempfile::tempdir;
use videodiary::storage::{embedded_timestamp, format_megabytes, VideoStore};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Saves with distinct timestamps list newest first, whatever order they were made in
    #[test]
    fn saves_list_newest_first(
        seconds in prop::collection::btree_set(0i64..4_000_000_000, 1..12),
        shuffle_seed in any::<u64>(),
    ) {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.mp4");
        fs::write(&source, b"clip").unwrap();
        let store = VideoStore::new(dir.path().join("Videos"));

        let mut order: Vec<i64> = seconds.iter().copied().collect();
        let len = order.len();
        order.rotate_left((shuffle_seed as usize) % len);
        for secs in &order {
            store.save_at(&source, Utc.timestamp_opt(*secs, 0).unwrap()).unwrap();
        }

        let listed: Vec<f64> = store
            .list()
            .iter()
            .map(|p| embedded_timestamp(p).unwrap())
            .collect();
        let expected: Vec<f64> = seconds.iter().rev().map(|s| *s as f64).collect();
        prop_assert_eq!(listed, expected);
    }

    /// Deleted paths never come back in a listing
    #[test]
    fn deleted_paths_not_listed(
        stamps in prop::collection::btree_set(1u32..100_000, 1..10),
        delete_mask in any::<u16>(),
    ) {
        let dir = tempdir().unwrap();
        for stamp in &stamps {
            fs::write(dir.path().join(format!("{}.mp4", stamp)), b"clip").unwrap();
        }
        let store = VideoStore::new(dir.path());

        let mut deleted = BTreeSet::new();
        for (i, path) in store.list().into_iter().enumerate() {
            if delete_mask & (1 << i) != 0 {
                store.delete(&path);
                deleted.insert(path);
            }
        }

        let listed = store.list();
        prop_assert_eq!(listed.len(), stamps.len() - deleted.len());
        for path in &deleted {
            prop_assert!(!listed.contains(path));
        }
    }

    /// Used space is the formatted sum of listed file sizes
    #[test]
    fn used_space_sums_listed_files(sizes in prop::collection::vec(0usize..200_000, 0..6)) {
        let dir = tempdir().unwrap();
        for (i, size) in sizes.iter().enumerate() {
            fs::write(dir.path().join(format!("{}.mp4", i)), vec![0u8; *size]).unwrap();
        }
        let store = VideoStore::new(dir.path());

        let total: u64 = sizes.iter().map(|s| *s as u64).sum();
        prop_assert_eq!(store.used_bytes(), total);
        prop_assert_eq!(store.used_space(), format_megabytes(total));
    }
}
