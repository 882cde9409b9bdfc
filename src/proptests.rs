use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Checks every structural invariant: BST order, AVL balance, cached
/// heights, reachable-node count vs `len`, arena slot accounting, and
/// the AVL height bound.
pub(crate) fn validate_map<K: Ord, V>(map: &AvlMap<K, V>) {
    fn check<K: Ord, V>(
        map: &AvlMap<K, V>,
        id: NodeId,
        lo: Option<&K>,
        hi: Option<&K>,
    ) -> (usize, i32) {
        if id.is_nil() {
            return (0, 0);
        }
        let node = map.node(id);
        if let Some(lo) = lo {
            assert!(*lo < node.key, "left subtree key not below its ancestor");
        }
        if let Some(hi) = hi {
            assert!(node.key < *hi, "right subtree key not above its ancestor");
        }
        let (left_count, left_height) = check(map, node.left, lo, Some(&node.key));
        let (right_count, right_height) = check(map, node.right, Some(&node.key), hi);
        assert_eq!(
            node.height,
            1 + left_height.max(right_height),
            "cached height must match children"
        );
        assert!(
            (left_height - right_height).abs() <= 1,
            "AVL balance violated"
        );
        (left_count + right_count + 1, node.height)
    }

    let (count, height) = check(map, map.root, None, None);
    assert_eq!(count, map.len(), "reachable node count must match len");
    assert_eq!(
        map.arena.live(),
        map.len(),
        "live arena slots must match len"
    );
    let bound = (1.4405 * ((map.len() + 2) as f64).log2()).ceil() as i32;
    assert!(height <= bound, "height {height} exceeds AVL bound {bound}");
}

#[derive(Clone, Debug)]
enum Op<K, V> {
    Insert(K, V),
    Remove(K),
    RemoveAt(K),
    Get(K),
    LowerBound(K),
    Compact,
}

// A small key domain so inserts, removals, and probes collide often.
fn ops_strategy() -> impl Strategy<Value = Vec<Op<i64, u64>>> {
    let key = 0i64..64;
    let op = prop_oneof![
        40 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        20 => key.clone().prop_map(Op::Remove),
        10 => key.clone().prop_map(Op::RemoveAt),
        15 => key.clone().prop_map(Op::Get),
        10 => key.clone().prop_map(Op::LowerBound),
        5 => Just(Op::Compact),
    ];
    prop::collection::vec(op, 0..=2000)
}

fn ops_strategy_string() -> impl Strategy<Value = Vec<Op<String, u64>>> {
    let key = "[a-d]{0,3}";
    let op = prop_oneof![
        50 => (key, any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        25 => key.prop_map(Op::Remove),
        25 => key.prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=1000)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_i64(ops in ops_strategy()) {
        let mut map: AvlMap<i64, u64> = AvlMap::new();
        let mut model: BTreeMap<i64, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let expected_inserted = !model.contains_key(&key);
                    let (cursor, inserted) = map.insert(key, value);
                    prop_assert_eq!(inserted, expected_inserted);
                    prop_assert_eq!(cursor.key(), Some(&key));
                    model.entry(key).or_insert(value);
                    prop_assert_eq!(map.get(&key), model.get(&key));
                }
                Op::Remove(key) => {
                    prop_assert_eq!(map.remove(&key), model.remove(&key));
                }
                Op::RemoveAt(key) => {
                    let expected_next = model
                        .range((Bound::Excluded(key), Bound::Unbounded))
                        .next()
                        .map(|(k, _)| *k);
                    let mut cursor = map.find_mut(&key);
                    let removed = cursor.remove_current();
                    let next_key = cursor.key().copied();
                    drop(cursor);
                    prop_assert_eq!(removed, model.remove(&key));
                    if removed.is_some() {
                        prop_assert_eq!(next_key, expected_next);
                    }
                }
                Op::Get(key) => {
                    prop_assert_eq!(map.get(&key), model.get(&key));
                    prop_assert_eq!(map.contains_key(&key), model.contains_key(&key));
                }
                Op::LowerBound(key) => {
                    let expected = model.range(key..).next().map(|(k, _)| *k);
                    prop_assert_eq!(map.lower_bound(&key).key().copied(), expected);
                }
                Op::Compact => {
                    prop_assert_eq!(map.compact(), map.len());
                }
            }

            prop_assert_eq!(map.len(), model.len());
        }

        validate_map(&map);
        let got: Vec<(i64, u64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(i64, u64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_equivalence_string(ops in ops_strategy_string()) {
        let mut map: AvlMap<String, u64> = AvlMap::new();
        let mut model: BTreeMap<String, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let expected_inserted = !model.contains_key(&key);
                    let (_, inserted) = map.insert(key.clone(), value);
                    prop_assert_eq!(inserted, expected_inserted);
                    model.entry(key).or_insert(value);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(map.remove(&key), model.remove(&key));
                }
                Op::Get(key) => {
                    prop_assert_eq!(map.get(&key), model.get(&key));
                }
                Op::RemoveAt(_) | Op::LowerBound(_) | Op::Compact => unreachable!(),
            }

            prop_assert_eq!(map.len(), model.len());
        }

        validate_map(&map);
        let got: Vec<(String, u64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let expected: Vec<(String, u64)> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = [5i32, 3, 8, 1, 4, 7, 9];

    for_each_permutation(&keys, |perm| {
        let mut map: AvlMap<i32, i32> = AvlMap::new();
        let mut model: BTreeMap<i32, i32> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            let v = i as i32;
            map.insert(k, v);
            model.entry(k).or_insert(v);
            validate_map(&map);
        }

        let got: Vec<(i32, i32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(i32, i32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(got, expected);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = [5i32, 3, 8, 1, 4, 7];

    // Insert in a fixed order, then remove in all permutations.
    let mut base_map: AvlMap<i32, i32> = AvlMap::new();
    let mut base_model: BTreeMap<i32, i32> = BTreeMap::new();
    for (i, k) in keys.iter().enumerate() {
        let v = i as i32;
        base_map.insert(*k, v);
        base_model.insert(*k, v);
    }

    for_each_permutation(&keys, |perm| {
        let mut map = base_map.clone();
        let mut model = base_model.clone();

        for k in perm {
            assert_eq!(map.remove(&k), model.remove(&k));
            assert_eq!(map.len(), model.len());
            validate_map(&map);
        }
        assert_eq!(map.len(), 0);
        assert!(map.root.is_nil());
    });
}
