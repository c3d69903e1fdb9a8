//! The byte-sequence hash used to derive probe indices, plus the adapters
//! that connect it to `core::hash`.
//!
//! [`hash_bytes`] maps a byte slice and a 64-bit seed to a 64-bit digest with
//! strong avalanche behavior. Two implementations exist and one is chosen per
//! process: an AES-NI path that mixes 16-byte blocks with three AES rounds,
//! and a portable multiply/rotate path. The two paths do not produce the same
//! bits as each other, but each is a pure function of its inputs for the
//! lifetime of the process.
//!
//! [`ByteHasher`] and [`FixedState`] adapt the byte hash to
//! [`core::hash::Hasher`]/[`BuildHasher`] so any `impl Hash` key type routes
//! through it. [`combine`] folds sub-hashes for hand-rolled composite keys,
//! and [`FloatKey`] makes floating-point keys usable by collapsing the two
//! IEEE zeros.

use core::hash::BuildHasher;
use core::hash::Hasher;

/// 64-bit golden-ratio constant used for seeding and combining.
const GOLDEN: u64 = 0x9e3779b97f4a7c15;

#[inline(always)]
fn mix64(a: u64, b: u64) -> u64 {
    let mut z = a ^ b;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

#[inline(always)]
fn final_avalanche(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^= x >> 33;
    x
}

#[inline(always)]
fn fetch_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_ne_bytes(buf)
}

#[inline(always)]
fn fetch_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(buf)
}

/// Hashes a byte slice with the given seed, returning a 64-bit digest.
///
/// Deterministic for a given input within one process. The AES-accelerated
/// path is used when the CPU reports support for it, the portable path
/// otherwise; which one is active never changes mid-process.
///
/// # Examples
///
/// ```rust
/// use swiss_map::hash::hash_bytes;
///
/// let a = hash_bytes(b"control bytes", 0);
/// let b = hash_bytes(b"control bytes", 0);
/// assert_eq!(a, b);
/// assert_ne!(hash_bytes(b"control bytes", 1), a);
/// ```
#[inline]
pub fn hash_bytes(data: &[u8], seed: u64) -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        if std::is_x86_feature_detected!("aes") {
            // SAFETY: The `aes` and `sse2` target features were just verified
            // to be available on the running CPU.
            return unsafe { hash_bytes_aes(data, seed) };
        }
    }

    hash_bytes_portable(data, seed)
}

/// Hashes `len` bytes starting at `data` with the given seed.
///
/// This is the raw-pointer entry point for callers that do not hold a slice.
/// A null `data` with `len == 0` produces a deterministic digest derived from
/// the seed. A null `data` with a non-zero `len` is a programmer error: debug
/// builds assert, release builds deterministically mix the seed with the
/// length and return.
///
/// # Safety
///
/// If `data` is non-null it must be valid for reads of `len` bytes.
pub unsafe fn hash_ptr(data: *const u8, len: usize, seed: u64) -> u64 {
    if data.is_null() {
        if len == 0 {
            return final_avalanche(seed ^ GOLDEN);
        }

        debug_assert!(false, "hash_ptr: null data with non-zero length");
        return final_avalanche(seed ^ (len as u64).wrapping_mul(GOLDEN));
    }

    // SAFETY: `data` is non-null and the caller guarantees it is valid for
    // `len` bytes of reads.
    hash_bytes(unsafe { core::slice::from_raw_parts(data, len) }, seed)
}

/// AES-NI block mixing path.
///
/// A 128-bit accumulator is seeded from the caller's seed, each 16-byte block
/// is XORed in and passed through three AES rounds with fixed round keys, and
/// the final partial block is zero-padded and given two rounds. The
/// accumulator halves are folded with the seed and the input length in bits
/// before the shared avalanche.
///
/// # Safety
///
/// The caller must ensure the CPU supports the `aes` and `sse2` target
/// features.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "aes", enable = "sse2")]
unsafe fn hash_bytes_aes(data: &[u8], seed: u64) -> u64 {
    use core::arch::x86_64::*;

    const C2: u64 = 0xc6a4a7935bd1e995;

    // SAFETY: All intrinsics used here require only `sse2`/`aes`, which the
    // caller guarantees. Loads go through 16-byte stack buffers or stay within
    // `data` bounds: the block loop only reads while at least 16 bytes remain.
    unsafe {
        let mut acc = _mm_set_epi64x((seed ^ GOLDEN) as i64, ((!seed) ^ C2) as i64);

        let rk1 = _mm_set_epi64x(0x243f6a8885a308d3u64 as i64, 0x13198a2e03707344u64 as i64);
        let rk2 = _mm_set_epi64x(0xa4093822299f31d0u64 as i64, 0x082efa98ec4e6c89u64 as i64);
        let rk3 = _mm_set_epi64x(0x452821e638d01377u64 as i64, 0xbe5466cf34e90c6cu64 as i64);

        let mut p = data.as_ptr();
        let mut remaining = data.len();

        while remaining >= 16 {
            let block = _mm_loadu_si128(p as *const __m128i);
            acc = _mm_xor_si128(acc, block);
            acc = _mm_aesenc_si128(acc, rk1);
            acc = _mm_aesenc_si128(acc, rk2);
            acc = _mm_aesenc_si128(acc, rk3);

            p = p.add(16);
            remaining -= 16;
        }

        if remaining > 0 {
            let mut tail = [0u8; 16];
            tail[..remaining].copy_from_slice(&data[data.len() - remaining..]);

            let block = _mm_loadu_si128(tail.as_ptr() as *const __m128i);
            acc = _mm_xor_si128(acc, block);
            acc = _mm_aesenc_si128(acc, rk2);
            acc = _mm_aesenc_si128(acc, rk3);
        }

        let mut acc_bytes = [0u8; 16];
        _mm_storeu_si128(acc_bytes.as_mut_ptr() as *mut __m128i, acc);
        let lo = u64::from_ne_bytes(acc_bytes[..8].try_into().unwrap());
        let hi = u64::from_ne_bytes(acc_bytes[8..].try_into().unwrap());

        let folded = hi ^ lo ^ seed ^ ((data.len() as u64) << 3);
        final_avalanche(folded)
    }
}

/// Portable mixing path with identical guarantees but different bits.
///
/// 16-byte chunks feed two 64-bit words through a multiply/rotate mix;
/// residual 8, 4 and 1-3 byte tails each use a distinct multiply constant so
/// inputs differing only in tail length cannot collide trivially.
fn hash_bytes_portable(data: &[u8], seed: u64) -> u64 {
    const MUL1: u64 = 0x9ddfea08eb382d69;

    let mut state = seed ^ GOLDEN;
    let mut at = 0;
    let mut remaining = data.len();

    while remaining >= 16 {
        let a = fetch_u64(data, at);
        let b = fetch_u64(data, at + 8);

        state = state.wrapping_add(a.wrapping_mul(MUL1));
        let m = mix64(
            a ^ (b.rotate_left(23).wrapping_add(state ^ (state >> 41))),
            b ^ state.wrapping_add(GOLDEN),
        );
        state ^= m;
        state = state.rotate_left(27).wrapping_mul(0x3c79ac492ba7b653);

        at += 16;
        remaining -= 16;
    }

    if remaining >= 8 {
        let a = fetch_u64(data, at);

        state = state.wrapping_add(a ^ GOLDEN);
        state = mix64(state, a);

        at += 8;
        remaining -= 8;
    }

    if remaining >= 4 {
        let a = fetch_u32(data, at) as u64;

        state = state.wrapping_add(a.wrapping_mul(0x85ebca6b));
        state = mix64(state, a);

        at += 4;
        remaining -= 4;
    }

    if remaining > 0 {
        let mut tail = 0u64;
        for (i, &byte) in data[at..].iter().enumerate() {
            tail |= (byte as u64) << (i * 8);
        }

        state = state.wrapping_add(tail.wrapping_mul(0x27d4eb2f165667c5));
        state = mix64(state, tail);
    }

    state ^= seed << 7;
    state = state.wrapping_add((data.len() as u64) << 3);
    final_avalanche(state)
}

/// Folds a sub-hash into a running seed.
///
/// The combining function for composite keys: hash each member, fold the
/// member digests left to right. Order-sensitive, so `(a, b)` and `(b, a)`
/// produce different digests.
///
/// # Examples
///
/// ```rust
/// use swiss_map::hash::{combine, hash_bytes};
///
/// let first = hash_bytes(b"host", 0);
/// let second = hash_bytes(b"port", 0);
/// let digest = combine(combine(0, first), second);
/// assert_ne!(digest, combine(combine(0, second), first));
/// ```
#[inline(always)]
pub fn combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(GOLDEN)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// A [`Hasher`] that routes every write through [`hash_bytes`].
///
/// Each `write` chains the running state as the seed of the next byte-hash
/// invocation, so a key hashed with a single `write` call (integers, strings,
/// byte slices) is digested in exactly one pass, and multi-field keys fold
/// their fields in order.
#[derive(Clone, Copy, Debug)]
pub struct ByteHasher {
    state: u64,
}

impl Hasher for ByteHasher {
    #[inline(always)]
    fn finish(&self) -> u64 {
        self.state
    }

    #[inline(always)]
    fn write(&mut self, bytes: &[u8]) {
        self.state = hash_bytes(bytes, self.state);
    }
}

/// A [`BuildHasher`] producing [`ByteHasher`]s from a fixed seed.
///
/// The default seed is zero, which makes hashing deterministic across
/// processes as well as within one. Use [`with_seed`] when a table needs its
/// own probe distribution.
///
/// [`with_seed`]: FixedState::with_seed
///
/// # Examples
///
/// ```rust
/// use core::hash::BuildHasher;
/// use swiss_map::hash::FixedState;
///
/// let state = FixedState::default();
/// assert_eq!(state.hash_one(42u64), state.hash_one(42u64));
/// assert_ne!(
///     FixedState::with_seed(7).hash_one(42u64),
///     state.hash_one(42u64),
/// );
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedState {
    seed: u64,
}

impl FixedState {
    /// Creates a state with seed zero.
    pub const fn new() -> Self {
        Self { seed: 0 }
    }

    /// Creates a state with the given seed.
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl BuildHasher for FixedState {
    type Hasher = ByteHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        ByteHasher { state: self.seed }
    }
}

/// A hashable wrapper for floating-point keys.
///
/// IEEE 754 has two zeros that compare equal; hashing their raw bits would
/// put equal keys in different probe chains. `FloatKey` substitutes the
/// positive-zero bit pattern for both zeros before hashing or comparing.
/// NaN values compare by bit pattern, so a NaN key can be stored and found
/// again with the same NaN.
///
/// # Examples
///
/// ```rust
/// use swiss_map::hash::FloatKey;
/// use swiss_map::HashMap;
///
/// let mut map: HashMap<_, _> = HashMap::new();
/// map.insert(FloatKey(0.0f64), "zero");
/// assert_eq!(map.get(&FloatKey(-0.0f64)), Some(&"zero"));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct FloatKey<T>(pub T);

impl FloatKey<f64> {
    #[inline(always)]
    fn normalized_bits(self) -> u64 {
        if self.0 == 0.0 { 0 } else { self.0.to_bits() }
    }
}

impl core::hash::Hash for FloatKey<f64> {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.normalized_bits());
    }
}

impl PartialEq for FloatKey<f64> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.normalized_bits() == other.normalized_bits()
    }
}

impl Eq for FloatKey<f64> {}

impl FloatKey<f32> {
    #[inline(always)]
    fn normalized_bits(self) -> u32 {
        if self.0 == 0.0 { 0 } else { self.0.to_bits() }
    }
}

impl core::hash::Hash for FloatKey<f32> {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.normalized_bits());
    }
}

impl PartialEq for FloatKey<f32> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.normalized_bits() == other.normalized_bits()
    }
}

impl Eq for FloatKey<f32> {}
