use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::{MonitorConfig, PoolConfig};
use crate::monitor::MemoryMonitor;
use crate::{AvlTree, Error, Insertion};

fn shuffled(n: u32, seed: u64) -> Vec<u32> {
    let mut keys: Vec<u32> = (0..n).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(seed));
    keys
}

#[test]
fn empty_tree() {
    let mut tree: AvlTree<i32> = AvlTree::ordered();
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    assert_eq!(tree.first(), None);
    assert_eq!(tree.search(&1), None);
    assert_eq!(tree.remove(&1), None);
    assert!(tree.collect_all().is_empty());
    assert_eq!(tree.traverse(|_| ControlFlow::Break(())), ControlFlow::Continue(()));
    tree.assert_invariants();
}

#[test]
fn insert_and_search() {
    let mut tree = AvlTree::ordered();
    for key in [50, 20, 70, 10, 30, 60, 80] {
        assert!(tree.insert(key).unwrap().is_inserted());
    }
    assert_eq!(tree.len(), 7);
    for key in [50, 20, 70, 10, 30, 60, 80] {
        assert_eq!(tree.search(&key), Some(&key));
    }
    assert!(!tree.contains(&55));
    tree.assert_invariants();
}

#[test]
fn duplicate_is_rejected_without_overwrite() {
    type Entry = (u32, &'static str);
    let mut tree = AvlTree::new(|a: &Entry, b: &Entry| a.0.cmp(&b.0));
    tree.insert((1, "first")).unwrap();
    match tree.insert((1, "second")).unwrap() {
        Insertion::AlreadyPresent { existing, rejected } => {
            assert_eq!(existing.1, "first");
            assert_eq!(rejected.1, "second");
        }
        Insertion::Inserted => panic!("duplicate was stored"),
    }
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.search(&(1, "")).map(|v| v.1), Some("first"));
}

#[test]
fn ascending_insertion_stays_balanced() {
    let mut tree = AvlTree::ordered();
    for key in 0..1023_u32 {
        tree.insert(key).unwrap();
    }
    // A perfect tree of 1023 nodes has height 10.
    assert_eq!(tree.height(), 10);
    tree.assert_invariants();
}

#[test]
fn height_stays_logarithmic_for_random_order() {
    let mut tree = AvlTree::ordered();
    for key in shuffled(10_000, 7) {
        tree.insert(key).unwrap();
    }
    // 1.44 * log2(10_001) is about 19.1.
    assert!(tree.height() <= 19, "height {}", tree.height());
    tree.assert_invariants();
}

#[test]
fn all_rotation_cases() {
    // LL, RR, LR, RL on three nodes each.
    for keys in [[3, 2, 1], [1, 2, 3], [3, 1, 2], [1, 3, 2]] {
        let mut tree = AvlTree::ordered();
        for key in keys {
            tree.insert(key).unwrap();
            tree.assert_invariants();
        }
        assert_eq!(tree.height(), 2, "keys {keys:?}");
        assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}

#[test]
fn remove_every_shape() {
    let mut tree = AvlTree::ordered();
    for key in shuffled(200, 11) {
        tree.insert(key).unwrap();
    }
    for key in shuffled(200, 12) {
        assert_eq!(tree.remove(&key), Some(key));
        assert_eq!(tree.search(&key), None);
        tree.assert_invariants();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.stats().in_use, 0);
}

#[test]
fn remove_missing_leaves_tree_unchanged() {
    let mut tree = AvlTree::ordered();
    for key in (0..100).step_by(2) {
        tree.insert(key).unwrap();
    }
    let before: Vec<i32> = tree.iter().copied().collect();
    assert_eq!(tree.remove(&7), None);
    assert_eq!(tree.remove(&1000), None);
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), before);
    assert_eq!(tree.len(), 50);
    tree.assert_invariants();
}

#[test]
fn insert_remove_round_trip() {
    let mut tree = AvlTree::ordered();
    for key in shuffled(500, 3) {
        tree.insert(key).unwrap();
    }
    for key in (0..500).filter(|k| k % 3 == 0) {
        tree.remove(&key);
    }
    for key in (0..500).filter(|k| k % 3 == 0) {
        tree.insert(key).unwrap();
    }
    assert_eq!(tree.len(), 500);
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), (0..500).collect::<Vec<_>>());
    tree.assert_invariants();
}

#[test]
fn first_last_and_search_by() {
    let mut tree = AvlTree::ordered();
    tree.extend([40, 10, 90, 25]);
    assert_eq!(tree.first(), Some(&10));
    assert_eq!(tree.last(), Some(&90));
    let found = tree.search_by(|v| 25.cmp(v));
    assert_eq!(found, Some(&25));
}

#[test]
fn custom_comparator_orders_descending() {
    let mut tree = AvlTree::new(|a: &i32, b: &i32| b.cmp(a));
    tree.extend([1, 5, 3]);
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec![5, 3, 1]);
    assert_eq!(tree.first(), Some(&5));
}

#[test]
fn morris_traversal_restores_links_after_stop() {
    let mut tree = AvlTree::ordered();
    for key in shuffled(300, 5) {
        tree.insert(key).unwrap();
    }
    let mut seen = Vec::new();
    let flow = tree.traverse(|&key| {
        seen.push(key);
        if key == 41 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    });
    assert_eq!(flow, ControlFlow::Break(()));
    assert_eq!(seen, (0..=41).collect::<Vec<_>>());
    tree.assert_invariants();

    let mut count = 0;
    let flow = tree.traverse(|_| {
        count += 1;
        ControlFlow::Continue(())
    });
    assert_eq!(flow, ControlFlow::Continue(()));
    assert_eq!(count, 300);
}

#[test]
fn collect_all_matches_iter() {
    let mut tree = AvlTree::ordered();
    for key in shuffled(1000, 9) {
        tree.insert(key).unwrap();
    }
    let iterated: Vec<u32> = tree.iter().copied().collect();
    let collected: Vec<u32> = tree.collect_all().into_iter().copied().collect();
    assert_eq!(collected, iterated);
    assert_eq!(tree.iter().len(), 1000);
    tree.assert_invariants();
}

#[test]
fn million_keys_end_to_end() {
    let mut tree = AvlTree::with_config(u32::cmp, PoolConfig::bulk(), None).unwrap();
    for key in 0..1_000_000_u32 {
        assert!(tree.insert(key).unwrap().is_inserted());
    }
    assert_eq!(tree.len(), 1_000_000);

    let all = tree.collect_all();
    assert_eq!(all.len(), 1_000_000);
    assert!(all.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*all[0], 0);
    assert_eq!(*all[999_999], 999_999);

    let monitor = Arc::clone(tree.monitor());
    let mut destroyed = 0_usize;
    let freed = tree.destroy_with(|_| destroyed += 1);
    assert_eq!(freed, 1_000_000);
    assert_eq!(destroyed, 1_000_000);
    assert_eq!(monitor.bytes_used(), 0);
}

#[test]
fn clear_then_reuse() {
    let mut tree = AvlTree::ordered();
    tree.extend(0..100);
    let capacity = tree.stats().capacity;
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.stats().capacity, capacity);
    tree.extend(0..10);
    assert_eq!(tree.len(), 10);
    tree.assert_invariants();

    // Ten values fit in the first group; the second is idle.
    assert_eq!(tree.trim(), 64);
    assert_eq!(tree.stats().capacity, 64);
    tree.assert_invariants();
}

#[test]
fn out_of_memory_leaves_tree_unchanged() {
    let config = PoolConfig {
        initial_count: 0,
        expansion_increment: 4,
    };
    let chunk = AvlTree::<u64>::ordered().stats().chunk_size;
    let monitor = Arc::new(MemoryMonitor::with_config(MonitorConfig::with_limit(chunk * 8)));
    let mut tree = AvlTree::with_config(u64::cmp, config, Some(monitor)).unwrap();
    for key in 0..8_u64 {
        tree.insert(key).unwrap();
    }
    let before: Vec<u64> = tree.iter().copied().collect();

    let err = tree.insert(100).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { limit: Some(_), .. }));
    assert_eq!(tree.len(), 8);
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), before);
    tree.assert_invariants();

    // Freed chunks are reused without growing.
    assert_eq!(tree.remove(&3), Some(3));
    assert!(tree.insert(100).unwrap().is_inserted());
    tree.assert_invariants();
}

#[test]
fn clear_releases_every_group_on_trim() {
    let mut tree = AvlTree::ordered();
    tree.extend(0..100);
    tree.clear();
    assert_eq!(tree.trim(), 128);
    assert_eq!(tree.stats().capacity, 0);
}

#[test]
fn extend_stops_at_first_refusal() {
    let config = PoolConfig {
        initial_count: 0,
        expansion_increment: 4,
    };
    let chunk = AvlTree::<u64>::ordered().stats().chunk_size;
    let monitor = Arc::new(MemoryMonitor::with_config(MonitorConfig::with_limit(chunk * 4)));
    let mut tree = AvlTree::with_config(u64::cmp, config, Some(Arc::clone(&monitor))).unwrap();
    tree.extend(0..10);
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(monitor.stats().allocations, 1);
    tree.assert_invariants();
}

#[test]
fn extend_skips_duplicates() {
    let mut tree = AvlTree::ordered();
    tree.extend([3, 1, 3, 2, 1]);
    assert_eq!(tree.len(), 3);
    assert_eq!((&tree).into_iter().count(), 3);
}

#[test]
fn search_by_misses_between_keys() {
    let mut tree = AvlTree::new(|a: &i32, b: &i32| -> Ordering { a.cmp(b) });
    tree.extend([10, 20, 30]);
    assert_eq!(tree.search_by(|v| 15.cmp(v)), None);
    assert_eq!(tree.search_by(|v| 30.cmp(v)), Some(&30));
}
