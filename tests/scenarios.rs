//! End-to-end scenarios exercised through the public API only.

use swiss_map::Error;
use swiss_map::HashMap;
use swiss_map::hash::FixedState;
use swiss_map::hash::hash_bytes;

#[test]
fn integer_round_trip() {
    let mut map: HashMap<i32, &str> = HashMap::new();
    assert!(map.insert(1, "a"));
    assert!(map.insert(2, "b"));
    assert!(map.insert(3, "c"));
    assert_eq!(map.len(), 3);

    assert_eq!(map.get(&2), Some(&"b"));
    assert!(map.remove(&2).is_some());
    assert_eq!(map.get(&2), None);
    assert_eq!(map.len(), 2);
}

#[test]
fn resize_crosses_load_threshold() {
    let mut map: HashMap<u64, u64> = HashMap::with_capacity(16);
    assert_eq!(map.capacity(), 16);

    for i in 0..=14u64 {
        assert!(map.insert(i, i * 10));
    }

    assert_eq!(map.len(), 15);
    assert_eq!(map.capacity(), 32);
    for i in 0..=14u64 {
        assert_eq!(map.get(&i), Some(&(i * 10)));
    }
}

#[test]
fn erased_keys_do_not_break_collided_neighbors() {
    // Strings sharing content prefixes stress tag plus full-key confirmation.
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("1".to_string(), "one".to_string());
    map.insert("17".to_string(), "seventeen".to_string());
    map.insert("33".to_string(), "thirty-three".to_string());
    assert_eq!(map.len(), 3);

    assert!(map.remove(&"17".to_string()).is_some());
    assert_eq!(map.get(&"1".to_string()).unwrap(), "one");
    assert_eq!(map.get(&"33".to_string()).unwrap(), "thirty-three");
    assert_eq!(map.get(&"17".to_string()), None);
}

#[test]
fn iteration_with_holes() {
    let mut map: HashMap<u32, u32> = HashMap::new();
    for k in 0..10 {
        map.insert(k, k);
    }
    map.remove(&3);
    map.remove(&7);

    let mut visited: Vec<u32> = map.keys().copied().collect();
    visited.sort_unstable();
    assert_eq!(visited, vec![0, 1, 2, 4, 5, 6, 8, 9]);
}

#[test]
fn copy_is_deep() {
    let mut m1: HashMap<i32, &str> = HashMap::new();
    m1.insert(1, "x");
    m1.insert(2, "y");

    let mut m2 = m1.clone();
    assert!(m2.insert(3, "z"));

    assert_eq!(m1.len(), 2);
    assert_eq!(m1.get(&3), None);
    assert_eq!(m2.len(), 3);
}

#[test]
fn move_leaves_a_valid_empty_source() {
    let mut m1: HashMap<i32, i32> = HashMap::new();
    m1.insert(1, 1);

    let m2 = std::mem::take(&mut m1);
    assert_eq!(m2.get(&1), Some(&1));
    assert_eq!(m1.len(), 0);

    assert!(m1.insert(2, 2));
    assert_eq!(m1.get(&2), Some(&2));
}

#[test]
fn insert_find_law() {
    let mut map: HashMap<u64, String> = HashMap::new();
    for k in 0..1000u64 {
        assert!(map.insert(k, format!("v{k}")));
        assert_eq!(map.get(&k).unwrap(), &format!("v{k}"));
    }

    // A duplicate insert neither overwrites nor disturbs other keys.
    assert!(!map.insert(500, "other".to_string()));
    assert_eq!(map.get(&500).unwrap(), "v500");
    assert_eq!(map.len(), 1000);
}

#[test]
fn clear_law() {
    let mut map: HashMap<u64, u64> = HashMap::new();
    for k in 0..100u64 {
        map.insert(k, k);
    }
    let capacity = map.capacity();

    map.clear();
    assert_eq!(map.len(), 0);
    assert_eq!(map.capacity(), capacity);
    for k in 0..100u64 {
        assert_eq!(map.get(&k), None);
    }
}

#[test]
fn resize_preserves_contents_across_many_growths() {
    let mut map: HashMap<u64, u64> = HashMap::new();
    for k in 0..10_000u64 {
        map.insert(k, !k);
        // Spot-check a stable early key as the table grows underneath it.
        assert_eq!(map.get(&0), Some(&!0));
    }
    for k in 0..10_000u64 {
        assert_eq!(map.get(&k), Some(&!k));
    }
}

#[test]
fn iteration_coverage_matches_live_set() {
    let mut map: HashMap<u64, u64> = HashMap::new();
    for k in 0..300u64 {
        map.insert(k, k);
    }
    for k in (0..300u64).step_by(3) {
        map.remove(&k);
    }

    let mut visited: Vec<u64> = map.keys().copied().collect();
    visited.sort_unstable();
    let expected: Vec<u64> = (0..300).filter(|k| k % 3 != 0).collect();
    assert_eq!(visited, expected);
}

#[test]
fn hash_is_deterministic_within_process() {
    let data = b"determinism probe";
    assert_eq!(hash_bytes(data, 42), hash_bytes(data, 42));

    let state = FixedState::with_seed(7);
    let mut map: HashMap<&str, u32, FixedState> = HashMap::with_hasher(state);
    map.insert("k", 1);
    assert_eq!(map.get(&"k"), Some(&1));
}

#[test]
fn checked_access_errors() {
    let mut map: HashMap<i32, i32> = HashMap::new();
    assert_eq!(map.at(&1), Err(Error::KeyNotFound));

    map.insert(1, 10);
    assert_eq!(map.at(&1), Ok(&10));
    assert!(map.at(&2).is_err());
}

#[test]
fn allocation_request_that_fits_succeeds() {
    let mut map: HashMap<u64, u64> = HashMap::try_with_capacity(64).unwrap();
    assert_eq!(map.try_reserve(1000), Ok(()));
    for k in 0..1000u64 {
        map.insert(k, k);
    }
    assert_eq!(map.len(), 1000);
}
