use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

use proptest::prelude::*;

use crate::config::PoolConfig;
use crate::pool::ChunkPool;
use crate::{AvlTree, ByteTrie, NibbleTrie, RadixTree};

#[derive(Clone, Debug)]
enum SetOp {
    Insert(u16),
    Remove(u16),
}

#[derive(Clone, Debug)]
enum MapOp {
    Insert(Vec<u8>, u32),
    Remove(Vec<u8>),
    Search(Vec<u8>),
}

fn set_ops() -> impl Strategy<Value = Vec<SetOp>> {
    let op = prop_oneof![
        3 => any::<u16>().prop_map(|k| SetOp::Insert(k % 512)),
        2 => any::<u16>().prop_map(|k| SetOp::Remove(k % 512)),
    ];
    prop::collection::vec(op, 0..=600)
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // A small alphabet makes shared prefixes and removals of real keys common.
    prop::collection::vec(prop::sample::select(vec![0x00_u8, 0x0F, 0x10, 0xA5, b'a', b'b']), 0..=6)
}

fn map_ops() -> impl Strategy<Value = Vec<MapOp>> {
    let key = key_strategy();
    let op = prop_oneof![
        5 => (key.clone(), any::<u32>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        3 => key.clone().prop_map(MapOp::Remove),
        2 => key.prop_map(MapOp::Search),
    ];
    prop::collection::vec(op, 0..=400)
}

/// Every stored pair of a prefix structure, sorted by key.
fn sorted_pairs<F>(walk: F) -> Vec<(Vec<u8>, u32)>
where
    F: FnOnce(&mut dyn FnMut(&[u8], &u32) -> ControlFlow<()>),
{
    let mut pairs = Vec::new();
    walk(&mut |key, value| {
        pairs.push((key.to_vec(), *value));
        ControlFlow::Continue(())
    });
    pairs.sort();
    pairs
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_avl_matches_btreeset(ops in set_ops()) {
        let mut tree = AvlTree::with_config(u16::cmp, PoolConfig::small(), None).unwrap();
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                SetOp::Insert(k) => {
                    let inserted = tree.insert(k).unwrap().is_inserted();
                    prop_assert_eq!(inserted, model.insert(k));
                }
                SetOp::Remove(k) => {
                    prop_assert_eq!(tree.remove(&k), model.take(&k));
                }
            }
        }

        tree.assert_invariants();
        prop_assert_eq!(tree.len(), model.len());
        let walked: Vec<u16> = tree.collect_all().into_iter().copied().collect();
        let expected: Vec<u16> = model.iter().copied().collect();
        prop_assert_eq!(&walked, &expected);
        prop_assert_eq!(tree.first(), model.first());
        prop_assert_eq!(tree.last(), model.last());
    }

    #[test]
    fn prop_byte_trie_matches_btreemap(ops in map_ops()) {
        let mut trie = ByteTrie::bytes().unwrap();
        let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();

        for op in ops {
            match op {
                MapOp::Insert(key, value) => {
                    let inserted = trie.insert(&key, value).unwrap().is_inserted();
                    prop_assert_eq!(inserted, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                MapOp::Remove(key) => prop_assert_eq!(trie.remove(&key), model.remove(&key)),
                MapOp::Search(key) => prop_assert_eq!(trie.search(&key), model.get(&key)),
            }
        }

        trie.assert_invariants();
        prop_assert_eq!(trie.len(), model.len());
        let pairs = sorted_pairs(|visit| { let _ = trie.traverse(visit); });
        let expected: Vec<(Vec<u8>, u32)> = model.into_iter().collect();
        prop_assert_eq!(pairs, expected);
    }

    #[test]
    fn prop_nibble_trie_matches_btreemap(ops in map_ops()) {
        let mut trie = NibbleTrie::new().unwrap();
        let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();

        for op in ops {
            match op {
                MapOp::Insert(key, value) => {
                    let inserted = trie.insert(&key, value).unwrap().is_inserted();
                    prop_assert_eq!(inserted, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                MapOp::Remove(key) => prop_assert_eq!(trie.remove(&key), model.remove(&key)),
                MapOp::Search(key) => prop_assert_eq!(trie.search(&key), model.get(&key)),
            }
        }

        trie.assert_invariants();
        let pairs = sorted_pairs(|visit| { let _ = trie.traverse(visit); });
        let expected: Vec<(Vec<u8>, u32)> = model.into_iter().collect();
        prop_assert_eq!(pairs, expected);
    }

    #[test]
    fn prop_radix_matches_btreemap(ops in map_ops()) {
        let mut tree = RadixTree::new().unwrap();
        let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();

        for op in ops {
            match op {
                MapOp::Insert(key, value) => {
                    let inserted = tree.insert(&key, value).unwrap().is_inserted();
                    prop_assert_eq!(inserted, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                MapOp::Remove(key) => prop_assert_eq!(tree.remove(&key), model.remove(&key)),
                MapOp::Search(key) => prop_assert_eq!(tree.search(&key), model.get(&key)),
            }
        }

        tree.assert_invariants();
        let pairs = sorted_pairs(|visit| { let _ = tree.traverse(visit); });
        let expected: Vec<(Vec<u8>, u32)> = model.into_iter().collect();
        prop_assert_eq!(pairs, expected);
    }

    #[test]
    fn prop_pool_conserves_chunks(
        ops in prop::collection::vec((any::<bool>(), any::<u8>()), 0..=500),
        increment in 1_usize..16,
    ) {
        let config = PoolConfig { initial_count: 0, expansion_increment: increment };
        let mut pool = ChunkPool::new(config, None).unwrap();
        let mut held = Vec::new();

        for (alloc, pick) in ops {
            if alloc || held.is_empty() {
                held.push(pool.alloc(u32::from(pick)).unwrap());
            } else {
                let id = held.swap_remove(usize::from(pick) % held.len());
                prop_assert!(pool.free(id).is_some());
            }
            let stats = pool.stats();
            prop_assert_eq!(stats.capacity, stats.in_use + stats.free);
            prop_assert_eq!(stats.in_use, held.len());
            prop_assert_eq!(stats.capacity % increment, 0);
        }
    }
}
