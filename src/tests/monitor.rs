use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::monitor::MemoryMonitor;
use crate::{AvlTree, ByteTrie, Error, NibbleTrie, PoolConfig};

#[test]
fn bytes_used_tracks_outstanding_blocks() {
    let monitor = MemoryMonitor::new();
    let sizes = [16, 100, 1, 4096, 37];
    let mut blocks: Vec<_> = sizes
        .iter()
        .map(|&size| monitor.allocate(size).unwrap())
        .collect();
    assert_eq!(monitor.bytes_used(), sizes.iter().sum::<usize>());

    // Free 100 and 37.
    let freed = blocks.remove(4);
    monitor.free(freed);
    let freed = blocks.remove(1);
    monitor.free(freed);
    assert_eq!(monitor.bytes_used(), 16 + 1 + 4096);

    for block in blocks {
        monitor.free(block);
    }
    assert_eq!(monitor.bytes_used(), 0);

    let stats = monitor.stats();
    assert_eq!(stats.allocations, 5);
    assert_eq!(stats.frees, 5);
    assert_eq!(stats.peak_bytes, sizes.iter().sum::<usize>());
}

#[test]
fn block_carries_its_size() {
    let monitor = MemoryMonitor::new();
    let mut block = monitor.allocate(8).unwrap();
    assert_eq!(block.len(), 8);
    assert!(block.as_slice().iter().all(|&b| b == 0));
    block.as_mut_slice()[0] = 7;
    assert_eq!(block.as_slice()[0], 7);
    monitor.free(block);
}

#[test]
fn zero_sized_block() {
    let monitor = MemoryMonitor::new();
    let block = monitor.allocate(0).unwrap();
    assert!(block.is_empty());
    monitor.free(block);
    assert_eq!(monitor.bytes_used(), 0);
}

#[test]
fn limit_refuses_and_leaves_counters() {
    let monitor = MemoryMonitor::with_config(MonitorConfig::with_limit(64));
    let block = monitor.allocate(60).unwrap();
    let err = monitor.allocate(5).unwrap_err();
    assert_eq!(
        err,
        Error::OutOfMemory {
            requested: 5,
            used: 60,
            limit: Some(64),
        }
    );
    assert_eq!(monitor.bytes_used(), 60);
    assert_eq!(monitor.stats().allocations, 1);
    monitor.free(block);
}

#[test]
fn reallocate_preserves_prefix() {
    let monitor = MemoryMonitor::new();
    let mut block = monitor.allocate(4).unwrap();
    block.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);

    monitor.reallocate(&mut block, 6).unwrap();
    assert_eq!(block.as_slice(), &[1, 2, 3, 4, 0, 0]);
    assert_eq!(monitor.bytes_used(), 6);

    monitor.reallocate(&mut block, 2).unwrap();
    assert_eq!(block.as_slice(), &[1, 2]);
    assert_eq!(monitor.bytes_used(), 2);

    monitor.free(block);
    assert_eq!(monitor.bytes_used(), 0);
}

#[test]
fn reallocate_over_limit_keeps_block() {
    let monitor = MemoryMonitor::with_config(MonitorConfig::with_limit(10));
    let mut block = monitor.allocate(8).unwrap();
    block.as_mut_slice()[7] = 9;
    assert!(monitor.reallocate(&mut block, 11).is_err());
    assert_eq!(block.len(), 8);
    assert_eq!(block.as_slice()[7], 9);
    assert_eq!(monitor.bytes_used(), 8);
    monitor.free(block);
}

#[test]
fn usage_reports_megabytes() {
    let monitor = MemoryMonitor::new();
    let block = monitor.allocate(1024 * 1024).unwrap();
    let usage = monitor.usage();
    assert_eq!(usage.bytes, 1024 * 1024);
    assert!((usage.megabytes - 1.0).abs() < f64::EPSILON);
    monitor.free(block);
}

#[test]
fn structures_share_one_parent_monitor() {
    let monitor = MemoryMonitor::shared();
    let mut tree = AvlTree::with_config(u32::cmp, PoolConfig::small(), Some(Arc::clone(&monitor))).unwrap();
    let mut trie = NibbleTrie::with_config(PoolConfig::small(), Some(Arc::clone(&monitor))).unwrap();

    tree.insert(1).unwrap();
    let after_tree = monitor.bytes_used();
    assert!(after_tree > 0);
    trie.insert(b"k", ()).unwrap();
    assert!(monitor.bytes_used() > after_tree);
    assert_eq!(tree.memory_usage().bytes, trie.memory_usage().bytes);

    drop(tree);
    drop(trie);
    assert_eq!(monitor.bytes_used(), 0);
}

#[test]
fn dropping_a_trie_returns_every_byte() {
    let monitor = MemoryMonitor::shared();
    {
        let mut trie = ByteTrie::with_monitor(
            crate::TrieConfig::default(),
            crate::trie::codec::identity,
            Some(Arc::clone(&monitor)),
        )
        .unwrap();
        for word in ["alpha", "alps", "beta", ""] {
            trie.insert(word.as_bytes(), word.len()).unwrap();
        }
        trie.remove(b"alps");
    }
    assert_eq!(monitor.bytes_used(), 0);
}

#[test]
fn allocation_and_free_counts_balance() {
    let monitor = MemoryMonitor::shared();
    {
        let mut trie = ByteTrie::with_monitor(
            crate::TrieConfig::default(),
            crate::trie::codec::identity,
            Some(Arc::clone(&monitor)),
        )
        .unwrap();
        for word in ["abc", "ab", "bc", "xyz"] {
            trie.insert(word.as_bytes(), ()).unwrap();
        }
        trie.remove(b"xyz");

        let mut tree = AvlTree::with_config(u32::cmp, PoolConfig::small(), Some(Arc::clone(&monitor))).unwrap();
        tree.extend(0..100);
        tree.remove(&50);
        tree.trim();
    }
    let stats = monitor.stats();
    assert_eq!(monitor.bytes_used(), 0);
    assert!(stats.allocations > 0);
    assert_eq!(stats.allocations, stats.frees);
}
