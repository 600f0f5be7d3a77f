use thiserror::Error;

/// Failures reported by [`FreeListAllocator`](crate::FreeListAllocator).
///
/// Neither variant leaves the allocator in a partially updated state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The heap source refused to extend the heap, or the request could not
  /// even be expressed as a heap extension.
  #[error("heap exhausted while requesting {requested} bytes")]
  HeapExhausted { requested: usize },

  /// The address is not a currently allocated region: never issued, already
  /// released, or corrupted.
  #[error("invalid free of address {address:#x}")]
  InvalidFree { address: usize },
}

/// Inconsistencies found by [`FreeListAllocator::check`](crate::FreeListAllocator::check).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapCheckError {
  #[error("free list out of order: {previous:#x} is followed by {next:#x}")]
  Unordered { previous: usize, next: usize },

  #[error("adjacent free regions at {first:#x} and {second:#x} were not merged")]
  Unmerged { first: usize, second: usize },

  #[error("region at {first:#x} overlaps region at {second:#x}")]
  Overlap { first: usize, second: usize },

  #[error("region at {address:#x} lies outside the heap [{start:#x}, {end:#x})")]
  OutOfBounds {
    address: usize,
    start: usize,
    end: usize,
  },

  #[error("regions account for {accounted} bytes but the heap holds {heap} bytes")]
  Accounting { accounted: usize, heap: usize },
}
