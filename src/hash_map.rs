//! A hash map backed by the SwissTable [`HashTable`].
//!
//! [`HashMap<K, V, S>`] stores key-value pairs where keys implement
//! `Hash + Eq`, using a configurable [`BuildHasher`] to derive the 64-bit
//! hashes the table probes with. The default hasher is the crate's own
//! [`FixedState`], which routes keys through the AES-accelerated byte hash.

use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::error::Error;
use crate::hash::FixedState;
use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;

/// A hash map implemented with SwissTable-style open addressing.
///
/// Key-value pairs are stored inline in a single flat allocation and located
/// by SIMD probing over control bytes; see the [`hash_table`] module docs for
/// the layout. Iteration order is arbitrary and changes across mutations.
///
/// Two behaviors differ from `std::collections::HashMap`:
///
/// - [`insert`] never overwrites: inserting a key that is already present
///   returns `false` and leaves the stored value untouched. Use the [`entry`]
///   API or [`get_mut`] to update in place.
/// - [`at`] provides checked access that reports a missing key as
///   [`Error::KeyNotFound`] instead of panicking or returning an `Option`.
///
/// Any mutation (insert, remove, clear, or a resize triggered by an insert)
/// invalidates references previously obtained from the map; the borrow
/// checker enforces this statically.
///
/// [`hash_table`]: crate::hash_table
/// [`insert`]: HashMap::insert
/// [`entry`]: HashMap::entry
/// [`get_mut`]: HashMap::get_mut
/// [`at`]: HashMap::at
///
/// # Examples
///
/// ```rust
/// use swiss_map::HashMap;
///
/// let mut map: HashMap<_, _> = HashMap::new();
/// map.insert("label", 3u32);
/// assert_eq!(map.get(&"label"), Some(&3));
/// assert!(!map.insert("label", 9));
/// assert_eq!(map.get(&"label"), Some(&3));
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, S = FixedState> {
    table: HashTable<(K, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates an empty map using the default hasher builder.
    ///
    /// No allocation happens until the first insert.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a map pre-sized for `capacity` slots using the default hasher
    /// builder.
    ///
    /// A non-zero capacity is rounded up to the next power of two, minimum
    /// 16.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }

    /// Fallible variant of [`with_capacity`]: reports allocation failure as
    /// [`Error::AllocationFailure`] instead of aborting.
    ///
    /// [`with_capacity`]: HashMap::with_capacity
    pub fn try_with_capacity(capacity: usize) -> Result<Self, Error> {
        Ok(Self {
            table: HashTable::try_with_capacity(capacity)?,
            hash_builder: S::default(),
        })
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a map pre-sized for `capacity` slots with the given hasher
    /// builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the slot capacity of the map.
    ///
    /// Zero before the first allocation, a power of two afterwards. The map
    /// grows once entries would exceed 7/8 of this.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all entries, keeping the allocated capacity.
    ///
    /// Tombstones left by earlier removals are reclaimed as well.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert(1, "a");
    /// let capacity = map.capacity();
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves capacity for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        let hasher = &self.hash_builder;
        self.table
            .reserve(additional, |(k, _)| hasher.hash_one(k));
    }

    /// Fallible variant of [`reserve`]: reports allocation failure as
    /// [`Error::AllocationFailure`] and leaves the map unchanged.
    ///
    /// [`reserve`]: HashMap::reserve
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        let hasher = &self.hash_builder;
        self.table
            .try_reserve(additional, |(k, _)| hasher.hash_one(k))
    }

    /// Inserts a key-value pair, returning `true` if the key was not already
    /// present.
    ///
    /// If the key exists the map is unchanged, the given pair is dropped, and
    /// `false` is returned. The stored value is never overwritten by this
    /// method; use [`entry`] or [`get_mut`] for updates.
    ///
    /// [`entry`]: HashMap::entry
    /// [`get_mut`]: HashMap::get_mut
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// assert!(map.insert(37, "a"));
    /// assert!(!map.insert(37, "b"));
    /// assert_eq!(map.get(&37), Some(&"a"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.hash_builder.hash_one(&key);
        let hasher = &self.hash_builder;
        match self
            .table
            .entry(hash, |(k, _)| k == &key, |(k, _)| hasher.hash_one(k))
        {
            TableEntry::Occupied(_) => false,
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                true
            }
        }
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hash_builder.hash_one(key);
        self.table.find(hash, |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_builder.hash_one(key);
        self.table.find_mut(hash, |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Checked access: returns a reference to the value for `key`, or
    /// [`Error::KeyNotFound`] if absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::{Error, HashMap};
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert(123, 333);
    /// assert_eq!(map.at(&123), Ok(&333));
    /// assert_eq!(map.at(&0), Err(Error::KeyNotFound));
    /// ```
    pub fn at(&self, key: &K) -> Result<&V, Error> {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Checked access: returns a mutable reference to the value for `key`, or
    /// [`Error::KeyNotFound`] if absent.
    pub fn at_mut(&mut self, key: &K) -> Result<&mut V, Error> {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map contains a value for the given key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// Removing an absent key returns `None`; it is not an error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes a key from the map, returning the stored key and value if the
    /// key was present.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hash_builder.hash_one(key);
        self.table.remove(hash, |(k, _)| k == key)
    }

    /// Removes the entry for `key` and yields it as a detachable [`Node`],
    /// or `None` if absent.
    ///
    /// The node owns the key and value and can be moved between maps without
    /// cloning via [`insert_node`].
    ///
    /// [`insert_node`]: HashMap::insert_node
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::HashMap;
    ///
    /// let mut a: HashMap<_, _> = HashMap::new();
    /// let mut b: HashMap<_, _> = HashMap::new();
    /// a.insert(1, "one");
    ///
    /// let node = a.extract(&1).unwrap();
    /// assert_eq!(node.key(), &1);
    /// assert!(b.insert_node(node));
    ///
    /// assert!(a.is_empty());
    /// assert_eq!(b.get(&1), Some(&"one"));
    /// ```
    pub fn extract(&mut self, key: &K) -> Option<Node<K, V>> {
        self.remove_entry(key).map(|(key, value)| Node { key, value })
    }

    /// Inserts a node extracted from this or another map.
    ///
    /// Follows [`insert`] semantics: returns `false` and drops the node if
    /// the key is already present.
    ///
    /// [`insert`]: HashMap::insert
    pub fn insert_node(&mut self, node: Node<K, V>) -> bool {
        self.insert(node.key, node.value)
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// `entry(key).or_default()` reproduces the indexing operation of
    /// C++-style maps: it returns a mutable reference to the stored value,
    /// inserting `V::default()` first when the key is absent. Use [`get`]
    /// when a lookup must not mutate the map.
    ///
    /// [`get`]: HashMap::get
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// *map.entry("hits").or_default() += 1;
    /// *map.entry("hits").or_default() += 1;
    /// assert_eq!(map.get(&"hits"), Some(&2));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        let hash = self.hash_builder.hash_one(&key);
        let hasher = &self.hash_builder;
        match self
            .table
            .entry(hash, |(k, _)| k == &key, |(k, _)| hasher.hash_one(k))
        {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Returns an iterator over the key-value pairs of the map.
    ///
    /// Pairs are yielded in slot order, which is arbitrary.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator that removes and yields all key-value pairs.
    ///
    /// After the iterator is consumed or dropped the map is empty with its
    /// capacity preserved.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_map::HashMap;
    ///
    /// let mut map: HashMap<_, _> = HashMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let mut pairs: Vec<_> = map.drain().collect();
    /// pairs.sort();
    /// assert_eq!(pairs, [(1, "a"), (2, "b")]);
    /// assert!(map.is_empty());
    /// ```
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An owned key-value pair detached from a map by [`extract`].
///
/// [`extract`]: HashMap::extract
#[derive(Debug, Clone)]
pub struct Node<K, V> {
    key: K,
    value: V,
}

impl<K, V> Node<K, V> {
    /// Returns a reference to the node's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns a reference to the node's value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns a mutable reference to the node's value.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Consumes the node, returning the key-value pair.
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V>),
}

impl<'a, K, V> Entry<'a, K, V> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference to the value.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V> Entry<'a, K, V>
where
    V: Default,
{
    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V> {
    entry: crate::hash_table::VacantEntry<'a, (K, V)>,
    key: K,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes ownership of the key without inserting.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V> {
    entry: crate::hash_table::OccupiedEntry<'a, (K, V)>,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Replaces the stored value, returning the old one.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of a [`HashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }
}

/// An iterator over the keys of a [`HashMap`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over the values of a [`HashMap`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// A draining iterator over the key-value pairs of a [`HashMap`].
pub struct Drain<'a, K, V> {
    inner: crate::hash_table::Drain<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Drain<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::hash::FloatKey;

    #[test]
    fn integer_round_trip() {
        let mut map: HashMap<i32, &str> = HashMap::new();
        assert!(map.insert(1, "a"));
        assert!(map.insert(2, "b"));
        assert!(map.insert(3, "c"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&2), Some(&"b"));

        assert_eq!(map.remove(&2), Some("b"));
        assert_eq!(map.get(&2), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut map: HashMap<i32, String> = HashMap::new();
        assert!(map.insert(1, "one".to_string()));
        assert!(!map.insert(1, "uno".to_string()));
        assert_eq!(map.get(&1).unwrap(), "one");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn removal_is_idempotent() {
        let mut map: HashMap<i32, &str> = HashMap::new();
        map.insert(1, "one");
        assert_eq!(map.remove(&1), Some("one"));
        assert_eq!(map.remove(&1), None);
    }

    #[test]
    fn growth_preserves_contents() {
        let mut map: HashMap<u64, u64> = HashMap::with_capacity(16);
        assert_eq!(map.capacity(), 16);

        for i in 0..=14u64 {
            assert!(map.insert(i, i * 10));
        }

        // The 15th insert crossed floor(16 * 7/8) and doubled the backing.
        assert_eq!(map.len(), 15);
        assert_eq!(map.capacity(), 32);
        for i in 0..=14u64 {
            assert_eq!(map.get(&i), Some(&(i * 10)));
        }
    }

    #[test]
    fn at_reports_missing_keys() {
        let mut map: HashMap<i32, i32> = HashMap::new();

        assert_eq!(map.at(&123), Err(Error::KeyNotFound));
        assert_eq!(map.at_mut(&123), Err(Error::KeyNotFound));

        *map.entry(123).or_default() = 333;
        assert_eq!(map.at(&123), Ok(&333));
        assert_eq!(map.at_mut(&123), Ok(&mut 333));

        assert_eq!(map.at(&0), Err(Error::KeyNotFound));
    }

    #[test]
    fn contains_and_clear() {
        let mut map: HashMap<u64, u64> = HashMap::new();

        assert!(!map.contains_key(&0));
        assert!(!map.contains_key(&123));
        map.entry(123).or_default();
        assert!(!map.contains_key(&0));
        assert!(map.contains_key(&123));

        map.clear();
        assert!(!map.contains_key(&0));
        assert!(!map.contains_key(&123));
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn iteration_with_holes() {
        let mut map: HashMap<u32, u32> = HashMap::new();
        for k in 0..10 {
            map.insert(k, k);
        }
        map.remove(&3);
        map.remove(&7);

        let mut keys: Vec<u32> = map.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![0, 1, 2, 4, 5, 6, 8, 9]);

        let mut values: Vec<u32> = map.values().copied().collect();
        values.sort_unstable();
        assert_eq!(values, keys);
    }

    #[test]
    fn iteration_visits_each_entry_once() {
        let mut map: HashMap<u64, u64> = HashMap::new();
        for k in 0..500u64 {
            map.insert(k, k);
        }

        let mut seen: Vec<u64> = (&map).into_iter().map(|(k, _)| *k).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn clone_is_deep() {
        let mut m1: HashMap<i32, &str> = HashMap::new();
        m1.insert(1, "x");
        m1.insert(2, "y");

        let mut m2 = m1.clone();
        assert!(m2.insert(3, "z"));

        assert_eq!(m1.len(), 2);
        assert_eq!(m1.get(&3), None);
        assert_eq!(m2.len(), 3);
        assert_eq!(m2.get(&3), Some(&"z"));
    }

    #[test]
    fn take_leaves_a_valid_empty_map() {
        let mut m1: HashMap<i32, i32> = HashMap::new();
        m1.insert(1, 1);

        let m2 = core::mem::take(&mut m1);
        assert_eq!(m2.get(&1), Some(&1));
        assert_eq!(m1.len(), 0);

        // The source is still usable.
        assert!(m1.insert(5, 50));
        assert_eq!(m1.get(&5), Some(&50));
    }

    #[test]
    fn extract_and_insert_node() {
        let mut a: HashMap<i32, String> = HashMap::new();
        let mut b: HashMap<i32, String> = HashMap::new();
        a.insert(1, "one".to_string());

        assert!(a.extract(&2).is_none());

        let mut node = a.extract(&1).unwrap();
        assert!(a.is_empty());
        assert_eq!(node.key(), &1);
        assert_eq!(node.value(), "one");
        node.value_mut().push_str("!");

        assert!(b.insert_node(node));
        assert_eq!(b.get(&1).unwrap(), "one!");

        // A node whose key is taken follows insert semantics.
        b.insert(2, "two".to_string());
        let node = b.extract(&2).unwrap();
        b.insert(2, "too".to_string());
        assert!(!b.insert_node(node));
        assert_eq!(b.get(&2).unwrap(), "too");
    }

    #[test]
    fn entry_api() {
        let mut map: HashMap<&str, i32> = HashMap::new();

        map.entry("a").or_insert(1);
        map.entry("a").or_insert(2);
        assert_eq!(map.get(&"a"), Some(&1));

        map.entry("a").and_modify(|v| *v += 10).or_insert(0);
        assert_eq!(map.get(&"a"), Some(&11));

        map.entry("b").and_modify(|v| *v += 10).or_insert(5);
        assert_eq!(map.get(&"b"), Some(&5));

        assert_eq!(map.entry("c").key(), &"c");

        match map.entry("a") {
            Entry::Occupied(entry) => {
                assert_eq!(entry.key(), &"a");
                assert_eq!(entry.remove(), 11);
            }
            Entry::Vacant(_) => panic!("entry should be occupied"),
        }
        assert!(!map.contains_key(&"a"));
    }

    #[test]
    fn drain_empties_the_map() {
        let mut map: HashMap<u32, u32> = HashMap::new();
        for k in 0..20 {
            map.insert(k, k * 2);
        }
        let capacity = map.capacity();

        let mut pairs: Vec<(u32, u32)> = map.drain().collect();
        pairs.sort_unstable();
        assert_eq!(pairs.len(), 20);
        assert_eq!(pairs[3], (3, 6));
        assert!(map.is_empty());
        assert_eq!(map.capacity(), capacity);
    }

    #[test]
    fn string_keys() {
        let mut map: HashMap<String, usize> = HashMap::new();
        let words = ["alpha", "beta", "gamma", "delta"];
        for (i, w) in words.iter().enumerate() {
            map.insert(w.to_string(), i);
        }

        for (i, w) in words.iter().enumerate() {
            assert_eq!(map.get(&w.to_string()), Some(&i));
        }
        assert_eq!(map.get(&"epsilon".to_string()), None);
    }

    #[test]
    fn float_keys_collapse_zeros() {
        let mut map: HashMap<FloatKey<f64>, &str> = HashMap::new();
        map.insert(FloatKey(0.0), "zero");
        assert!(!map.insert(FloatKey(-0.0), "negative zero"));
        assert_eq!(map.get(&FloatKey(-0.0)), Some(&"zero"));

        map.insert(FloatKey(1.25), "five quarters");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn custom_hasher_builder() {
        use crate::hash::FixedState;

        let mut map: HashMap<u64, u64, FixedState> =
            HashMap::with_hasher(FixedState::with_seed(0xdead_beef));
        for k in 0..64 {
            map.insert(k, k + 1);
        }
        for k in 0..64 {
            assert_eq!(map.get(&k), Some(&(k + 1)));
        }
    }
}
