/// The error type for fallible map and table operations.
///
/// Most operations in this crate are infallible by design: a missing key is an
/// ordinary `None`/`false` result, not an error. The variants here cover the
/// two cases that genuinely are errors: checked access to an absent key and a
/// failed backing allocation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Checked access ([`HashMap::at`]) was performed with a key that is not
    /// present in the map.
    ///
    /// [`HashMap::at`]: crate::HashMap::at
    #[error("key not found")]
    KeyNotFound,

    /// The allocator failed to provide a backing block of the requested size.
    ///
    /// Surfaced by the `try_` constructors and `try_reserve`. The container is
    /// left untouched: a failed growth keeps the previous backing and all
    /// entries in place.
    #[error("allocation of {size} bytes for the table backing failed")]
    AllocationFailure {
        /// Size in bytes of the allocation that failed.
        size: usize,
    },
}
