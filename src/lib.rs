//! # brkalloc - A First-Fit, Coalescing Heap Allocator
//!
//! This crate manages a heap on its own: it grows the heap with `sbrk(2)` (or
//! any other [`HeapSource`]), hands out aligned regions, takes them back and
//! merges neighboring free regions so the heap does not fall apart into
//! unusable slivers.
//!
//! ## Overview
//!
//! ```text
//!   allocate(n)                               release(p)
//!       │                                         │
//!       ▼                                         ▼
//!   ┌────────────────┐  miss   ┌─────────────┐  ┌──────────────────────┐
//!   │ Free registry  │───────► │ Heap grower │  │ Allocation directory │
//!   │ (first fit)    │ ◄────── │ (sbrk)      │  │ (lookup by address)  │
//!   └────────────────┘  new    └─────────────┘  └──────────────────────┘
//!       │ hit: split or take whole                │ found
//!       ▼                                         ▼
//!   Allocation directory                      Free registry insert
//!                                             (merge with neighbors)
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Alignment unit and the align! macro
//!   ├── block      - Region header stored in front of every payload
//!   ├── source     - HeapSource trait, Sbrk and Arena
//!   ├── grower     - Heap growth and break bookkeeping
//!   ├── registry   - Address-ordered free list with coalescing
//!   ├── directory  - List of allocated regions
//!   ├── allocator  - FreeListAllocator: allocate / release
//!   ├── config     - Growth and split tuning
//!   ├── report     - Listings and statistics
//!   └── error      - AllocError, HeapCheckError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{Arena, FreeListAllocator};
//!
//! let mut allocator = FreeListAllocator::with_source(Arena::with_capacity(4096));
//!
//! let ptr = allocator.allocate(8).unwrap().as_ptr() as *mut u64;
//!
//! unsafe {
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//! }
//!
//! allocator.release(ptr as *mut u8).unwrap();
//! assert!(allocator.release(ptr as *mut u8).is_err());
//! ```
//!
//! ## How It Works
//!
//! Every region carries a header right in front of its usable memory:
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ next: ptr/none  │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │      16 bytes         │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! `size` excludes the header, so a region ends at
//! `header + 16 + size`. Two free regions are merged exactly when one ends
//! where the other's header begins.
//!
//! Splitting an oversized free region keeps the low part for the caller and
//! leaves the rest, with a header of its own, in the free list:
//!
//! ```text
//!   before:  [H | 64 free                          ]
//!   after:   [H | 16 used ][H | 32 free            ]
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization, not `Send`/`Sync`
//! - **Heap only grows**: released memory is reused, never returned to the OS
//! - **Fixed alignment**: every payload is aligned to 16 bytes, nothing more
//! - **Trusting**: corrupted headers are not detected
//!
//! ## Safety
//!
//! `allocate` and `release` are safe to call. Reading or writing through the
//! returned pointers is up to the caller, within the requested size and only
//! until the region is released.

pub mod align;
mod allocator;
mod block;
mod config;
mod directory;
mod error;
mod grower;
mod registry;
mod report;
mod source;

pub use allocator::FreeListAllocator;
pub use block::HEADER_SIZE;
pub use config::Config;
pub use error::{AllocError, HeapCheckError};
pub use report::{FreeListReport, HeapStats, RegionInfo};
pub use source::{Arena, HeapSource, Sbrk};
