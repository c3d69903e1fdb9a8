//! A high-performance hash table using SwissTable-style open addressing.
//!
//! The table is a flat array of entry slots shadowed by one signed control
//! byte per slot. A control byte either marks its slot EMPTY (never used, or
//! reclaimed by a rehash), DELETED (a tombstone left behind by an erase), or
//! holds the top 7 bits of the entry's hash. Lookups derive two values from a
//! key's 64-bit hash: H1 (`hash & (capacity - 1)`) selects the slot where
//! probing starts, and H2 (`hash >> 57`) is the 7-bit tag to scan for.
//! Control bytes are examined 16 at a time with a single SSE2
//! compare/movemask pair (see the group engine), so one load answers both
//! "which slots might hold this key" and "does the probe chain end here".
//! Tag hits are confirmed with a full key comparison; the false-positive rate
//! of a 7-bit tag is low enough that most lookups compare exactly one key.
//!
//! [`HashTable<V>`] stores values of type `V` and requires the caller to
//! provide hash values and equality predicates for each operation. Prefer the
//! [`HashMap<K, V, S>`] wrapper for a key-value interface unless you are
//! building your own map-like structure on top.
//!
//! ## Layout
//!
//! All storage lives in one contiguous, cache-line-aligned allocation:
//!
//! `[ ctrl (N + 16) | entries (N) | group bitmap (N/16 bits in u64 words) ]`
//!
//! The 16 bytes after `ctrl[N - 1]` replicate `ctrl[0..16]` (the sentinel
//! tail), so a 16-byte group load starting at any slot index stays inside the
//! allocation without wrapping logic on the hot path. Probing walks groups at
//! `(h1 + 16k) & (N - 1)`; because N is a power of two and a multiple of the
//! group width, masking each produced index is all the wrap handling needed.
//!
//! The group bitmap holds one bit per aligned 16-slot group, set while the
//! group has at least one occupied slot. Iteration uses it to skip empty
//! regions 64 groups at a time with a trailing-zero count, which makes
//! traversal linear in the number of live entries rather than in capacity.
//!
//! Splitting the three regions into separate allocations was considered and
//! rejected: the control bytes and entries for a probe are touched together,
//! and keeping them in one block keeps the prefetcher effective.
//!
//! ## Tombstones
//!
//! Erasing writes DELETED rather than EMPTY so probe chains running through
//! the slot stay intact; only EMPTY terminates a probe. An insert may reuse
//! the first tombstone seen on its probe path. Tombstones are reclaimed only
//! when the table rehashes. The table resizes when live entries would exceed
//! 7/8 of capacity, and additionally rehashes at the same capacity when live
//! entries plus tombstones would cross that threshold. The latter keeps at
//! least one eighth of all control bytes EMPTY at all times, which is what
//! guarantees every probe sequence terminates.
//!
//! ## Safety Invariants
//!
//! The implementation relies on the following key invariants:
//!
//! 1. **Initialization**: `ctrl[i] >= 0` iff `entries[i]` holds an
//!    initialized `V`; EMPTY and DELETED slots are uninitialized storage.
//! 2. **Tag consistency**: for every occupied slot, `ctrl[i]` equals the top
//!    7 bits of the hash of the entry stored there.
//! 3. **Sentinel mirror**: `ctrl[N + i] == ctrl[i]` for `i < 16` whenever
//!    `N > 0`, maintained by every control-byte write.
//! 4. **Termination**: `populated + tombstones <= floor(7N/8) < N`, so every
//!    group walk reaches an EMPTY byte.
//! 5. **Bitmap consistency**: bitmap bit `g` is set iff group `g` contains an
//!    occupied slot.
//!
//! [`HashMap<K, V, S>`]: crate::hash_map::HashMap

use alloc::alloc::handle_alloc_error;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::fmt::Debug;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::error::Error;
use crate::group::DELETED;
use crate::group::EMPTY;
use crate::group::GROUP_WIDTH;
use crate::group::Group;

/// Alignment of the backing block. Keeps any aligned group of control bytes
/// from straddling two cache lines.
const CACHE_LINE: usize = 64;

/// Maximum number of live entries for a given capacity: floor(N * 7/8).
#[inline(always)]
fn max_load(capacity: usize) -> usize {
    capacity / 8 * 7
}

/// The 7-bit tag stored in the control byte of an occupied slot.
///
/// Taken from the top of the hash so tags are uncorrelated with H1, which is
/// taken from the bottom. The result is always in `0..=127`, leaving the sign
/// bit to the EMPTY and DELETED states.
#[inline(always)]
fn h2(hash: u64) -> i8 {
    (hash >> 57) as i8
}

/// Number of u64 words in the group-occupancy bitmap.
#[inline(always)]
fn bitmap_words(capacity: usize) -> usize {
    (capacity / GROUP_WIDTH).div_ceil(64)
}

/// Capacity allocated for a user-provided capacity hint.
#[inline(always)]
fn initial_capacity(hint: usize) -> usize {
    if hint == 0 {
        0
    } else {
        hint.max(GROUP_WIDTH).next_power_of_two()
    }
}

#[derive(Debug, Clone, Copy)]
struct DataLayout {
    layout: Layout,
    entries_offset: usize,
    bitmap_offset: usize,
}

impl DataLayout {
    fn new<V>(capacity: usize) -> Self {
        debug_assert!(
            capacity == 0 || (capacity.is_power_of_two() && capacity >= GROUP_WIDTH),
            "capacity must be zero or a power of two >= {GROUP_WIDTH}"
        );

        let ctrl_bytes = if capacity == 0 {
            0
        } else {
            capacity + GROUP_WIDTH
        };
        let ctrl_layout =
            Layout::from_size_align(ctrl_bytes, CACHE_LINE).expect("allocation size overflow");
        let entries_layout = Layout::array::<V>(capacity).expect("allocation size overflow");
        let bitmap_layout =
            Layout::array::<u64>(bitmap_words(capacity)).expect("allocation size overflow");

        let (layout, entries_offset) = ctrl_layout.extend(entries_layout).unwrap();
        let (layout, bitmap_offset) = layout.extend(bitmap_layout).unwrap();

        DataLayout {
            layout: layout.pad_to_align(),
            entries_offset,
            bitmap_offset,
        }
    }
}

/// Outcome of a probe: the index of the matching slot when `found`, otherwise
/// the insertion candidate for the probed key.
struct FindResult {
    index: usize,
    found: bool,
}

/// A hash table storing values of type `V` in SwissTable-style open
/// addressing.
///
/// This is a low-level structure: every operation takes the value's hash and
/// an equality predicate, and mutating operations additionally take a
/// `rehash` closure used to re-derive hashes when the table resizes.
///
/// ## Performance Characteristics
///
/// - **Memory**: slightly over 1 byte per slot of overhead, plus the size of
///   `V`; capacity is a power of two, filled to at most 7/8.
pub struct HashTable<V> {
    layout: DataLayout,
    alloc: NonNull<u8>,

    /// Total slot count N. Zero until the first allocation.
    capacity: usize,
    populated: usize,
    tombstones: usize,

    _phantom: core::marker::PhantomData<V>,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::ToString;

        if self.capacity == 0 {
            return f
                .debug_struct("HashTable")
                .field("populated", &self.populated)
                .field("capacity", &self.capacity)
                .field("ctrl", &"unallocated")
                .finish();
        }

        // SAFETY: A non-zero capacity guarantees `self.alloc` points to a
        // valid allocation matching `self.layout`, making `ctrl_ptr` safe to
        // dereference for `capacity` bytes.
        unsafe {
            f.debug_struct("HashTable")
                .field("populated", &self.populated)
                .field("capacity", &self.capacity)
                .field("tombstones", &self.tombstones)
                .field(
                    "ctrl",
                    &self.ctrl_ptr().as_ref()[..self.capacity]
                        .chunks(GROUP_WIDTH)
                        .map(|group| {
                            group
                                .iter()
                                .map(|&c| {
                                    if c == EMPTY {
                                        "..".to_string()
                                    } else if c == DELETED {
                                        "xx".to_string()
                                    } else {
                                        format!("{c:02x}")
                                    }
                                })
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .collect::<Vec<_>>(),
                )
                .finish()
        }
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        let (layout, alloc) = Self::allocate(self.capacity)
            .unwrap_or_else(|_| handle_alloc_error(DataLayout::new::<V>(self.capacity).layout));

        let mut new_table = Self {
            layout,
            alloc,
            capacity: self.capacity,
            populated: 0,
            tombstones: 0,
            _phantom: core::marker::PhantomData,
        };

        if self.capacity == 0 {
            return new_table;
        }

        // SAFETY: Both tables share the same capacity and layout. Reading the
        // source is safe because occupied control bytes mark initialized
        // entries; writing the destination is safe because its slots are
        // uninitialized storage of the same length. Entries are written
        // before the control bytes are copied: if a clone panics midway, the
        // fresh table still has all-EMPTY control bytes and its drop will not
        // touch the partially written slots.
        unsafe {
            let src_ctrl = self.ctrl_ptr();
            let src_entries = self.entries_ptr();
            let mut dst_entries = new_table.entries_ptr();

            for index in 0..self.capacity {
                if *src_ctrl.as_ref().get_unchecked(index) >= 0 {
                    dst_entries.as_mut().get_unchecked_mut(index).write(
                        src_entries
                            .as_ref()
                            .get_unchecked(index)
                            .assume_init_ref()
                            .clone(),
                    );
                }
            }

            // Control bytes (sentinel included) and the group bitmap are
            // bitwise copies.
            core::ptr::copy_nonoverlapping(
                self.alloc.as_ptr(),
                new_table.alloc.as_ptr(),
                self.layout.entries_offset,
            );
            core::ptr::copy_nonoverlapping(
                self.alloc.as_ptr().add(self.layout.bitmap_offset),
                new_table.alloc.as_ptr().add(self.layout.bitmap_offset),
                self.layout.layout.size() - self.layout.bitmap_offset,
            );
        }

        new_table.populated = self.populated;
        new_table.tombstones = self.tombstones;
        new_table
    }
}

impl<V> Drop for HashTable<V> {
    fn drop(&mut self) {
        // SAFETY: Occupied control bytes mark initialized entries, so only
        // initialized values are dropped. The allocation is only freed when a
        // non-zero layout proves one was made.
        unsafe {
            if core::mem::needs_drop::<V>() && self.populated > 0 {
                for index in 0..self.capacity {
                    if self.ctrl(index) >= 0 {
                        self.entries_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            if self.layout.layout.size() != 0 {
                alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
            }
        }
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table without allocating.
    ///
    /// The backing block is allocated by the first insert.
    pub fn new() -> Self {
        Self {
            layout: DataLayout::new::<V>(0),
            alloc: NonNull::dangling(),
            capacity: 0,
            populated: 0,
            tombstones: 0,
            _phantom: core::marker::PhantomData,
        }
    }

    /// Creates a table pre-sized for `capacity_hint` slots.
    ///
    /// A non-zero hint is rounded up to the next power of two, with a minimum
    /// of 16. A zero hint defers allocation entirely.
    pub fn with_capacity(capacity_hint: usize) -> Self {
        Self::try_with_capacity(capacity_hint).unwrap_or_else(|_| {
            handle_alloc_error(DataLayout::new::<V>(initial_capacity(capacity_hint)).layout)
        })
    }

    /// Fallible variant of [`with_capacity`]: reports allocation failure
    /// instead of aborting.
    ///
    /// [`with_capacity`]: HashTable::with_capacity
    pub fn try_with_capacity(capacity_hint: usize) -> Result<Self, Error> {
        let capacity = initial_capacity(capacity_hint);
        let (layout, alloc) = Self::allocate(capacity)?;

        Ok(Self {
            layout,
            alloc,
            capacity,
            populated: 0,
            tombstones: 0,
            _phantom: core::marker::PhantomData,
        })
    }

    /// Allocates and initializes a backing block for `capacity` slots:
    /// control bytes (sentinel tail included) all EMPTY, bitmap all zero,
    /// entries uninitialized.
    fn allocate(capacity: usize) -> Result<(DataLayout, NonNull<u8>), Error> {
        let layout = DataLayout::new::<V>(capacity);
        if layout.layout.size() == 0 {
            return Ok((layout, NonNull::dangling()));
        }

        // SAFETY: The layout size was just checked to be non-zero, and the
        // initializing writes stay within the ranges the layout reserved for
        // the control bytes and the bitmap.
        unsafe {
            let raw = alloc::alloc::alloc(layout.layout);
            let Some(alloc) = NonNull::new(raw) else {
                return Err(Error::AllocationFailure {
                    size: layout.layout.size(),
                });
            };

            core::ptr::write_bytes(raw, EMPTY as u8, layout.entries_offset);
            core::ptr::write_bytes(
                raw.add(layout.bitmap_offset),
                0x0,
                layout.layout.size() - layout.bitmap_offset,
            );

            Ok((layout, alloc))
        }
    }

    fn ctrl_ptr(&self) -> NonNull<[i8]> {
        NonNull::slice_from_raw_parts(
            self.alloc.cast(),
            if self.capacity == 0 {
                0
            } else {
                self.capacity + GROUP_WIDTH
            },
        )
    }

    fn entries_ptr(&self) -> NonNull<[MaybeUninit<V>]> {
        // SAFETY: `entries_offset` is within the allocation whenever
        // `capacity > 0`; for a zero capacity the offset is zero on the
        // dangling base and the slice is empty.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.entries_offset).cast(),
                self.capacity,
            )
        }
    }

    fn bitmap_ptr(&self) -> NonNull<[u64]> {
        // SAFETY: `bitmap_offset` is within the allocation whenever
        // `capacity > 0`; for a zero capacity the offset is zero on the
        // dangling base and the slice is empty.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.bitmap_offset).cast(),
                bitmap_words(self.capacity),
            )
        }
    }

    /// Reads the control byte at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `capacity + GROUP_WIDTH`.
    #[inline(always)]
    unsafe fn ctrl(&self, index: usize) -> i8 {
        // SAFETY: Caller ensures `index` is within the control array.
        unsafe { *self.ctrl_ptr().as_ref().get_unchecked(index) }
    }

    /// Writes the control byte at `index`, mirroring into the sentinel tail
    /// when `index` falls in the first group.
    ///
    /// # Safety
    ///
    /// `index` must be less than `capacity`.
    #[inline(always)]
    unsafe fn set_ctrl(&mut self, index: usize, value: i8) {
        // SAFETY: Caller ensures `index < capacity`; the mirror write lands
        // at `index + capacity < capacity + GROUP_WIDTH`, inside the sentinel
        // tail.
        unsafe {
            let ctrl = self.ctrl_ptr().as_mut();
            *ctrl.get_unchecked_mut(index) = value;
            if index < GROUP_WIDTH {
                *ctrl.get_unchecked_mut(index + self.capacity) = value;
            }
        }
    }

    /// Marks group `group` as containing at least one occupied slot.
    ///
    /// # Safety
    ///
    /// `group` must be less than `capacity / GROUP_WIDTH`.
    #[inline(always)]
    unsafe fn set_group_bit(&mut self, group: usize) {
        // SAFETY: Caller ensures `group` indexes a valid group, so
        // `group / 64` is within the bitmap.
        unsafe {
            *self.bitmap_ptr().as_mut().get_unchecked_mut(group / 64) |= 1u64 << (group % 64);
        }
    }

    /// Clears the occupancy bit of `group` if none of its slots is occupied.
    ///
    /// # Safety
    ///
    /// `group` must be less than `capacity / GROUP_WIDTH`.
    #[inline(always)]
    unsafe fn clear_group_bit_if_unoccupied(&mut self, group: usize) {
        // SAFETY: The aligned group load spans `[group * 16, group * 16 + 16)`
        // which is within the control array for a valid group index.
        unsafe {
            let group_ctrl =
                Group::load(self.ctrl_ptr().as_ref().as_ptr().add(group * GROUP_WIDTH));
            if !group_ctrl.match_occupied().any() {
                *self.bitmap_ptr().as_mut().get_unchecked_mut(group / 64) &=
                    !(1u64 << (group % 64));
            }
        }
    }

    /// Core probe loop. Walks groups of 16 control bytes from H1, returning
    /// either the matching slot or the insertion candidate (the first
    /// tombstone seen on the probe path, else the empty slot that terminated
    /// it).
    fn find_impl(&self, hash: u64, eq: &impl Fn(&V) -> bool) -> FindResult {
        if self.capacity == 0 {
            return FindResult {
                index: 0,
                found: false,
            };
        }

        let mask = self.capacity - 1;
        let tag = h2(hash);
        let start = (hash as usize) & mask;
        let mut first_deleted = None;

        let mut offset = 0;
        loop {
            let group_base = (start + offset) & mask;
            // SAFETY: `group_base < capacity` and the load reads at most
            // GROUP_WIDTH bytes past `capacity - 1`, which the sentinel tail
            // covers.
            let group = unsafe { Group::load(self.ctrl_ptr().as_ref().as_ptr().add(group_base)) };

            for bit in group.match_tag(tag) {
                let index = (group_base + bit) & mask;
                // SAFETY: A tag match means the control byte at `index` is
                // non-negative (the mask folds sentinel positions back onto
                // the first group they mirror), so the entry is initialized.
                if eq(unsafe {
                    self.entries_ptr()
                        .as_ref()
                        .get_unchecked(index)
                        .assume_init_ref()
                }) {
                    return FindResult { index, found: true };
                }
            }

            if let Some(bit) = group.match_empty().lowest() {
                let empty_index = (group_base + bit) & mask;
                return FindResult {
                    index: first_deleted.unwrap_or(empty_index),
                    found: false,
                };
            }

            if first_deleted.is_none() {
                // No empty slot in this group, so every empty-or-deleted hit
                // is a tombstone.
                if let Some(bit) = group.match_empty_or_deleted().lowest() {
                    first_deleted = Some((group_base + bit) & mask);
                }
            }

            offset += GROUP_WIDTH;
            debug_assert!(
                offset <= self.capacity,
                "probe sequence failed to terminate"
            );
        }
    }

    /// First EMPTY slot on the probe sequence of `hash`.
    ///
    /// Used while re-placing entries during a rehash: the target table has no
    /// tombstones, so no candidate bookkeeping is needed.
    ///
    /// # Safety
    ///
    /// The capacity must be non-zero.
    unsafe fn first_empty_slot(&self, hash: u64) -> usize {
        let mask = self.capacity - 1;
        let start = (hash as usize) & mask;

        let mut offset = 0;
        loop {
            let group_base = (start + offset) & mask;
            // SAFETY: `group_base < capacity`; reads past the end are covered
            // by the sentinel tail.
            let group = unsafe { Group::load(self.ctrl_ptr().as_ref().as_ptr().add(group_base)) };

            if let Some(bit) = group.match_empty().lowest() {
                return (group_base + bit) & mask;
            }

            offset += GROUP_WIDTH;
            debug_assert!(offset <= self.capacity, "rehash target has no empty slot");
        }
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the total slot count of the table.
    ///
    /// This is the capacity N of the backing arrays: zero before the first
    /// allocation, a power of two afterwards. The table resizes once live
    /// entries would exceed 7/8 of it.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Finds a value by hash and equality predicate.
    ///
    /// Returns a reference to the value if found, or `None` if no matching
    /// value exists.
    #[inline]
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        if self.populated == 0 {
            return None;
        }

        let result = self.find_impl(hash, &eq);
        if !result.found {
            return None;
        }

        // SAFETY: A found result points at an occupied slot, which marks an
        // initialized entry.
        Some(unsafe {
            self.entries_ptr()
                .as_ref()
                .get_unchecked(result.index)
                .assume_init_ref()
        })
    }

    /// Finds a value by hash and equality predicate, returning a mutable
    /// reference.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        if self.populated == 0 {
            return None;
        }

        let result = self.find_impl(hash, &eq);
        if !result.found {
            return None;
        }

        // SAFETY: A found result points at an occupied slot, which marks an
        // initialized entry.
        Some(unsafe {
            self.entries_ptr()
                .as_mut()
                .get_unchecked_mut(result.index)
                .assume_init_mut()
        })
    }

    /// Finds the slot index holding a matching value.
    ///
    /// Slot indices are stable until the next mutation and can be fed to
    /// [`erase_slot`] and [`iter_from`].
    ///
    /// [`erase_slot`]: HashTable::erase_slot
    /// [`iter_from`]: HashTable::iter_from
    pub fn find_slot(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<usize> {
        if self.populated == 0 {
            return None;
        }

        let result = self.find_impl(hash, &eq);
        result.found.then_some(result.index)
    }

    /// Removes and returns a value by hash and equality predicate.
    ///
    /// The slot becomes a tombstone so probe chains through it stay intact;
    /// the storage is reused by a later insert or reclaimed by a rehash.
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        if self.populated == 0 {
            return None;
        }

        let result = self.find_impl(hash, &eq);
        if !result.found {
            return None;
        }

        // SAFETY: A found result points at an occupied slot.
        Some(unsafe { self.erase_index(result.index) })
    }

    /// Erases the occupied slot at `slot` and returns the index of the next
    /// occupied slot (or `capacity()` if none follows).
    ///
    /// The successor is located with the same group fast-forward the iterator
    /// uses, so [`iter_from`] on the returned index resumes traversal
    /// immediately past the erased position.
    ///
    /// [`iter_from`]: HashTable::iter_from
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of bounds or not occupied.
    pub fn erase_slot(&mut self, slot: usize) -> usize {
        assert!(slot < self.capacity, "slot index out of bounds");
        // SAFETY: `slot` was just bounds-checked, and the occupancy assert
        // rejects slots without an initialized entry.
        unsafe {
            assert!(self.ctrl(slot) >= 0, "slot is not occupied");
            drop(self.erase_index(slot));
        }

        self.next_occupied(slot + 1)
    }

    /// Erases the occupied slot at `index` and returns the stored value.
    ///
    /// # Safety
    ///
    /// `index` must be an occupied slot below `capacity`.
    unsafe fn erase_index(&mut self, index: usize) -> V {
        // SAFETY: Caller guarantees the slot is occupied, so the entry is
        // initialized and the control-byte and bitmap updates target a valid
        // slot and group.
        unsafe {
            debug_assert!(self.ctrl(index) >= 0);

            let value = self
                .entries_ptr()
                .as_ref()
                .get_unchecked(index)
                .assume_init_read();

            self.set_ctrl(index, DELETED);
            self.populated -= 1;
            self.tombstones += 1;
            self.clear_group_bit_if_unoccupied(index / GROUP_WIDTH);

            value
        }
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// The returned [`Entry`] either points at the matching value or at the
    /// slot a matching value would be inserted into. `rehash` re-derives the
    /// hash of a stored value and is invoked when the call triggers a resize.
    ///
    /// Note that the capacity check runs before the lookup, so a call that
    /// ends up occupied may still have grown the table.
    #[inline]
    pub fn entry(
        &mut self,
        hash: u64,
        eq: impl Fn(&V) -> bool,
        rehash: impl Fn(&V) -> u64,
    ) -> Entry<'_, V> {
        self.reserve_for_insert(&rehash);

        let FindResult { index, found } = self.find_impl(hash, &eq);
        if found {
            Entry::Occupied(OccupiedEntry { table: self, index })
        } else {
            Entry::Vacant(VacantEntry {
                table: self,
                hash,
                index,
            })
        }
    }

    /// Ensures the next insert has a valid candidate slot.
    ///
    /// Grows by doubling when live entries reach 7/8 of capacity; rehashes at
    /// the same capacity when live entries plus tombstones reach it, which
    /// reclaims the tombstones and preserves the terminating EMPTY bytes.
    #[inline]
    fn reserve_for_insert(&mut self, rehash: &dyn Fn(&V) -> u64) {
        if self.capacity == 0 {
            self.grow_or_abort(GROUP_WIDTH, rehash);
        } else if self.populated >= max_load(self.capacity) {
            self.grow_or_abort(self.capacity * 2, rehash);
        } else if self.populated + self.tombstones >= max_load(self.capacity) {
            self.grow_or_abort(self.capacity, rehash);
        }
    }

    #[inline]
    fn grow_or_abort(&mut self, new_capacity: usize, rehash: &dyn Fn(&V) -> u64) {
        if self.do_resize_rehash(new_capacity, rehash).is_err() {
            handle_alloc_error(DataLayout::new::<V>(new_capacity).layout);
        }
    }

    /// Allocates a fresh backing of `new_capacity` slots and re-places every
    /// live entry into it.
    ///
    /// Entries are moved, not re-inserted: placement probes for the first
    /// EMPTY slot only, with no key comparisons and no tombstone bookkeeping
    /// (the fresh table has neither). On allocation failure the old backing
    /// is untouched and the error is returned.
    #[cold]
    fn do_resize_rehash(
        &mut self,
        new_capacity: usize,
        rehash: &dyn Fn(&V) -> u64,
    ) -> Result<(), Error> {
        debug_assert!(new_capacity.is_power_of_two() && new_capacity >= GROUP_WIDTH);
        debug_assert!(self.populated <= max_load(new_capacity));

        log::trace!(
            "rehash: capacity {} -> {} ({} live, {} tombstones)",
            self.capacity,
            new_capacity,
            self.populated,
            self.tombstones,
        );

        let (new_layout, new_alloc) = Self::allocate(new_capacity)?;

        let old_layout = core::mem::replace(&mut self.layout, new_layout);
        let old_alloc = core::mem::replace(&mut self.alloc, new_alloc);
        let old_capacity = core::mem::replace(&mut self.capacity, new_capacity);
        self.tombstones = 0;

        if old_capacity == 0 {
            return Ok(());
        }

        // SAFETY: The old allocation is valid for `old_capacity` control
        // bytes and entries; occupied control bytes mark initialized values,
        // which are read out exactly once and written into uninitialized
        // slots of the new table. The old block is deallocated without
        // dropping the moved-out values, whose ownership has transferred.
        unsafe {
            let old_ctrl: NonNull<[i8]> =
                NonNull::slice_from_raw_parts(old_alloc.cast(), old_capacity);
            let old_entries: NonNull<[MaybeUninit<V>]> = NonNull::slice_from_raw_parts(
                old_alloc.add(old_layout.entries_offset).cast(),
                old_capacity,
            );

            for index in 0..old_capacity {
                if *old_ctrl.as_ref().get_unchecked(index) < 0 {
                    continue;
                }

                let value = old_entries.as_ref().get_unchecked(index).assume_init_read();
                let hash = rehash(&value);

                let slot = self.first_empty_slot(hash);
                self.set_ctrl(slot, h2(hash));
                self.set_group_bit(slot / GROUP_WIDTH);
                self.entries_ptr()
                    .as_mut()
                    .get_unchecked_mut(slot)
                    .write(value);
            }

            if old_layout.layout.size() != 0 {
                alloc::alloc::dealloc(old_alloc.as_ptr(), old_layout.layout);
            }
        }

        Ok(())
    }

    /// Capacity needed to hold `additional` more entries, or `None` if the
    /// current backing already suffices.
    fn target_capacity_for(&self, additional: usize) -> Option<usize> {
        let required = self.populated.saturating_add(additional);
        if required <= max_load(self.capacity) {
            return None;
        }

        let mut capacity = self.capacity.max(GROUP_WIDTH);
        while max_load(capacity) < required {
            capacity = capacity.checked_mul(2).expect("capacity overflow");
        }
        Some(capacity)
    }

    /// Reserves capacity for at least `additional` more elements.
    ///
    /// Does nothing if capacity is already sufficient. `rehash` re-derives
    /// stored values' hashes during the re-placement.
    pub fn reserve(&mut self, additional: usize, rehash: impl Fn(&V) -> u64) {
        if let Some(capacity) = self.target_capacity_for(additional) {
            self.grow_or_abort(capacity, &rehash);
        }
    }

    /// Fallible variant of [`reserve`]: reports allocation failure instead of
    /// aborting, leaving the table unchanged.
    ///
    /// [`reserve`]: HashTable::reserve
    pub fn try_reserve(
        &mut self,
        additional: usize,
        rehash: impl Fn(&V) -> u64,
    ) -> Result<(), Error> {
        match self.target_capacity_for(additional) {
            Some(capacity) => self.do_resize_rehash(capacity, &rehash),
            None => Ok(()),
        }
    }

    /// Removes all elements from the table.
    ///
    /// Every control byte, tombstones included, is reset to EMPTY and the
    /// group bitmap is zeroed. The allocated capacity is preserved.
    pub fn clear(&mut self) {
        // SAFETY: Occupied control bytes mark initialized entries; the reset
        // only runs when an allocation exists.
        unsafe {
            if core::mem::needs_drop::<V>() && self.populated > 0 {
                for index in 0..self.capacity {
                    if self.ctrl(index) >= 0 {
                        self.entries_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            if self.layout.layout.size() != 0 {
                self.reset_ctrl();
            }
        }

        self.populated = 0;
        self.tombstones = 0;
    }

    /// Resets every control byte (sentinel included) to EMPTY and zeroes the
    /// group bitmap. Entry storage is left as-is.
    ///
    /// # Safety
    ///
    /// The layout size must be non-zero, and the caller must have dropped or
    /// moved out all initialized entries (or otherwise accounted for their
    /// ownership).
    unsafe fn reset_ctrl(&mut self) {
        // SAFETY: Caller guarantees an allocation exists; the writes cover
        // exactly the control-byte and bitmap ranges of the layout.
        unsafe {
            core::ptr::write_bytes(self.alloc.as_ptr(), EMPTY as u8, self.layout.entries_offset);
            core::ptr::write_bytes(
                self.alloc.as_ptr().add(self.layout.bitmap_offset),
                0x0,
                self.layout.layout.size() - self.layout.bitmap_offset,
            );
        }
    }

    /// Index of the first occupied slot at or after `index`, or `capacity()`
    /// if none.
    ///
    /// Finishes the group `index` points into with a masked occupancy scan,
    /// then skips whole empty groups via the occupancy bitmap, a word of 64
    /// groups at a time.
    fn next_occupied(&self, index: usize) -> usize {
        if index >= self.capacity {
            return self.capacity;
        }

        // SAFETY: Aligned group loads stay within `[0, capacity)` because the
        // group index is bounded by `capacity / GROUP_WIDTH`; bitmap indices
        // are derived from the same bound.
        unsafe {
            let ctrl = self.ctrl_ptr().as_ref().as_ptr();
            let group_index = index / GROUP_WIDTH;

            let group = Group::load(ctrl.add(group_index * GROUP_WIDTH));
            let in_group = group.match_occupied().0 & (u16::MAX << (index % GROUP_WIDTH));
            if in_group != 0 {
                return group_index * GROUP_WIDTH + in_group.trailing_zeros() as usize;
            }

            let total_groups = self.capacity / GROUP_WIDTH;
            let next_group = group_index + 1;
            if next_group >= total_groups {
                return self.capacity;
            }

            let bitmap = self.bitmap_ptr().as_ref();
            let mut word_index = next_group / 64;
            let mut word = *bitmap.get_unchecked(word_index) & (!0u64 << (next_group % 64));

            loop {
                if word != 0 {
                    let group_index = word_index * 64 + word.trailing_zeros() as usize;
                    let occupied = Group::load(ctrl.add(group_index * GROUP_WIDTH)).match_occupied();
                    // A set bitmap bit guarantees an occupied slot in the
                    // group.
                    debug_assert!(occupied.any());
                    return group_index * GROUP_WIDTH + occupied.0.trailing_zeros() as usize;
                }

                word_index += 1;
                if word_index >= bitmap.len() {
                    return self.capacity;
                }
                word = *bitmap.get_unchecked(word_index);
            }
        }
    }

    /// Returns an iterator over all values in the table.
    ///
    /// The iterator yields `&V` references in slot order, which is arbitrary
    /// with respect to insertion and may change across mutations.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            table: self,
            index: self.next_occupied(0),
        }
    }

    /// Returns an iterator starting at the first occupied slot at or after
    /// `slot`.
    ///
    /// Together with [`erase_slot`] this resumes traversal after an erase.
    ///
    /// [`erase_slot`]: HashTable::erase_slot
    pub fn iter_from(&self, slot: usize) -> Iter<'_, V> {
        Iter {
            table: self,
            index: self.next_occupied(slot),
        }
    }

    /// Returns an iterator that removes and yields all values from the table.
    ///
    /// After calling `drain()` the table is empty with its capacity
    /// preserved. Leaking the iterator (via `mem::forget`) leaks the
    /// unyielded values without dropping them.
    pub fn drain(&mut self) -> Drain<'_, V> {
        if self.capacity == 0 {
            return Drain {
                ctrl: Box::new([]),
                table: self,
                index: 0,
            };
        }

        let mut snapshot = Box::new_uninit_slice(self.capacity);

        // SAFETY: The snapshot copy covers exactly `capacity` control bytes.
        // After the copy the table's control state is reset, so the table no
        // longer claims ownership of the entries; the snapshot is the only
        // record of which slots still hold values, and the `Drain` borrow
        // keeps the table unusable until they are moved out or dropped.
        let ctrl = unsafe {
            core::ptr::copy_nonoverlapping(
                self.ctrl_ptr().as_ref().as_ptr(),
                snapshot.as_mut_ptr().cast::<i8>(),
                self.capacity,
            );

            self.reset_ctrl();

            snapshot.assume_init()
        };

        self.populated = 0;
        self.tombstones = 0;

        Drain {
            ctrl,
            table: self,
            index: 0,
        }
    }
}

/// A view into a single entry in the hash table, which may be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V> {
    /// A vacant entry: no stored value matched, and the contained slot is the
    /// insertion candidate.
    Vacant(VacantEntry<'a, V>),
    /// An occupied entry pointing at the matching value.
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
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
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry; returns `None`
    /// without inserting when the entry is vacant.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the hash table.
///
/// Holds the insertion candidate produced by the probe: the first tombstone
/// seen on the probe path, or the empty slot that terminated it.
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u64,
    index: usize,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts a value into the vacant slot and returns a mutable reference
    /// to it.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;

        // SAFETY: `index` was produced by the probe as an insertion
        // candidate, so it is below capacity and its control byte is EMPTY or
        // DELETED; writing the entry, tag, and group bit therefore targets a
        // valid unoccupied slot. `entry` reserved capacity beforehand, so the
        // load invariants hold after the increment.
        unsafe {
            debug_assert!(table.ctrl(self.index) < 0);
            if table.ctrl(self.index) == DELETED {
                table.tombstones -= 1;
            }

            table.set_ctrl(self.index, h2(self.hash));
            table.set_group_bit(self.index / GROUP_WIDTH);
            table.populated += 1;

            table
                .entries_ptr()
                .as_mut()
                .get_unchecked_mut(self.index)
                .write(value)
        }
    }
}

/// A view into an occupied entry in the hash table.
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
}

// Safety invariant for OccupiedEntry methods:
// An `OccupiedEntry` is only created from a successful probe, so `index` is
// below capacity and its control byte is non-negative, meaning the entry
// slot holds an initialized value. `get_unchecked`, `assume_init_ref`,
// `assume_init_mut`, and `erase_index` are therefore safe on it.
impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe {
            self.table
                .entries_ptr()
                .as_ref()
                .get_unchecked(self.index)
                .assume_init_ref()
        }
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe {
            self.table
                .entries_ptr()
                .as_mut()
                .get_unchecked_mut(self.index)
                .assume_init_mut()
        }
    }

    /// Converts the entry into a mutable reference to the value with the
    /// lifetime of the table borrow.
    pub fn into_mut(self) -> &'a mut V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe {
            self.table
                .entries_ptr()
                .as_mut()
                .get_unchecked_mut(self.index)
                .assume_init_mut()
        }
    }

    /// Removes the entry from the table and returns the value, leaving a
    /// tombstone.
    pub fn remove(self) -> V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe { self.table.erase_index(self.index) }
    }
}

/// An iterator over the values in a [`HashTable`].
///
/// Created by [`iter`] and [`iter_from`]; yields `&V` in slot order, skipping
/// runs of empty groups through the occupancy bitmap.
///
/// [`iter`]: HashTable::iter
/// [`iter_from`]: HashTable::iter_from
pub struct Iter<'a, V> {
    table: &'a HashTable<V>,
    index: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.table.capacity {
            return None;
        }

        // SAFETY: `index` was produced by `next_occupied`, which only returns
        // occupied slots (or the capacity, handled above), so the entry is
        // initialized.
        let value = unsafe {
            self.table
                .entries_ptr()
                .as_ref()
                .get_unchecked(self.index)
                .assume_init_ref()
        };

        self.index = self.table.next_occupied(self.index + 1);
        Some(value)
    }
}

/// A draining iterator over the values in a [`HashTable`].
///
/// Created by [`drain`]; yields owned values and leaves the table empty.
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, V> {
    /// Snapshot of the control bytes taken before the table was reset; the
    /// only remaining record of which slots still hold values.
    ctrl: Box<[i8]>,
    table: &'a mut HashTable<V>,
    index: usize,
}

impl<V> Iterator for Drain<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.ctrl.len() {
            let index = self.index;
            self.index += 1;

            if self.ctrl[index] >= 0 {
                // SAFETY: The snapshot marks this slot as occupied at drain
                // time; the table's reset control bytes mean nothing else
                // will read or drop the value, so moving it out here is the
                // single transfer of ownership.
                return Some(unsafe {
                    self.table
                        .entries_ptr()
                        .as_ref()
                        .get_unchecked(index)
                        .assume_init_read()
                });
            }
        }

        None
    }
}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}
