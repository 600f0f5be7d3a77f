//! Where heap memory comes from.
//!
//! A [`HeapSource`] is the single primitive the allocator needs from the
//! operating system: "move the break up by N bytes and hand me the old one".

use std::{alloc, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};
use log::{debug, warn};

use crate::align::ALIGNMENT;

/// A monotonically growing range of raw memory.
///
/// # Safety
///
/// Implementors must guarantee that a pointer returned by `extend(n)`:
///
/// - is aligned to [`ALIGNMENT`],
/// - is valid for reads and writes of `n` bytes for as long as the source
///   lives,
/// - does not overlap any range returned earlier.
///
/// A failed extension must not move the break.
pub unsafe trait HeapSource {
  /// Extends the heap by `increment` bytes and returns the old break, or
  /// `None` when no more memory is available.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>>;

  /// The current upper limit of the memory handed out so far.
  fn current_break(&self) -> usize;
}

/// The process data segment, grown with `sbrk(2)`.
///
/// Every `FreeListAllocator` using this source shares the one program break,
/// and so does anything else in the process calling `brk`/`sbrk`. Regions
/// from different sources are never adjacent unless the memory really is, so
/// coalescing stays correct even if someone else moves the break in between.
#[derive(Debug, Default)]
pub struct Sbrk {
  aligned: bool,
}

impl Sbrk {
  pub const fn new() -> Self {
    Self { aligned: false }
  }

  /// Pads the break up to `ALIGNMENT` once, before the first extension.
  unsafe fn align_break(&mut self) -> bool {
    unsafe {
      let current = sbrk(0) as usize;
      let padding = current.wrapping_neg() & (ALIGNMENT - 1);

      if padding != 0 && sbrk(padding as intptr_t) == usize::MAX as *mut c_void {
        return false;
      }

      debug!("program break aligned by {padding} bytes");
      self.aligned = true;
      true
    }
  }
}

unsafe impl HeapSource for Sbrk {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let Ok(delta) = intptr_t::try_from(increment) else {
      warn!("sbrk: increment of {increment} bytes does not fit intptr_t");
      return None;
    };

    unsafe {
      if !self.aligned && !self.align_break() {
        warn!("sbrk: unable to align the program break");
        return None;
      }

      let address = sbrk(delta);

      if address == usize::MAX as *mut c_void {
        warn!("sbrk: the OS refused {increment} more bytes");
        return None;
      }

      NonNull::new(address as *mut u8)
    }
  }

  fn current_break(&self) -> usize {
    unsafe { sbrk(0) as usize }
  }
}

/// A fixed block of memory obtained once from the global allocator and handed
/// out front to back. Useful where a process-wide break is unwelcome, and in
/// tests, where [`Arena::set_limit`] simulates an exhausted OS.
pub struct Arena {
  base: NonNull<u8>,
  layout: alloc::Layout,
  used: usize,
  limit: usize,
}

impl Arena {
  /// # Panics
  ///
  /// Panics if `capacity` rounded up to [`ALIGNMENT`] exceeds `isize::MAX`.
  pub fn with_capacity(capacity: usize) -> Self {
    let size = crate::align!(capacity.max(1));

    let layout = match alloc::Layout::from_size_align(size, ALIGNMENT) {
      Ok(layout) => layout,
      Err(_) => panic!("arena capacity {capacity} is too large"),
    };

    let base = unsafe { alloc::alloc_zeroed(layout) };

    let Some(base) = NonNull::new(base) else {
      alloc::handle_alloc_error(layout);
    };

    Self {
      base,
      layout,
      used: 0,
      limit: capacity,
    }
  }

  /// Caps how many bytes in total may be handed out. Lowering the limit below
  /// what is already used just makes every further extension fail.
  pub fn set_limit(
    &mut self,
    limit: usize,
  ) {
    self.limit = limit.min(self.layout.size());
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  pub fn used(&self) -> usize {
    self.used
  }

  pub fn base(&self) -> usize {
    self.base.as_ptr() as usize
  }
}

unsafe impl HeapSource for Arena {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.used.checked_add(increment)?;

    if end > self.limit {
      warn!(
        "arena: {increment} more bytes requested, {} of {} available",
        self.limit.saturating_sub(self.used),
        self.limit
      );
      return None;
    }

    let old_break = unsafe { self.base.add(self.used) };
    self.used = end;

    Some(old_break)
  }

  fn current_break(&self) -> usize {
    self.base() + self.used
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arena_hands_out_consecutive_ranges() {
    let mut arena = Arena::with_capacity(256);

    let first = arena.extend(32).unwrap();
    let second = arena.extend(48).unwrap();

    assert_eq!(first.as_ptr() as usize, arena.base());
    assert_eq!(second.as_ptr() as usize, arena.base() + 32);
    assert_eq!(arena.current_break(), arena.base() + 80);
    assert_eq!(first.as_ptr() as usize % ALIGNMENT, 0);
  }

  #[test]
  fn arena_refuses_past_limit_without_moving() {
    let mut arena = Arena::with_capacity(256);
    arena.set_limit(64);

    assert!(arena.extend(48).is_some());
    let before = arena.current_break();

    assert!(arena.extend(32).is_none());
    assert!(arena.extend(usize::MAX).is_none());
    assert_eq!(arena.current_break(), before);
    assert_eq!(arena.used(), 48);

    assert!(arena.extend(16).is_some());
  }

  #[test]
  fn arena_limit_is_clamped_to_capacity() {
    let mut arena = Arena::with_capacity(100);
    arena.set_limit(usize::MAX);

    assert_eq!(arena.capacity(), 112);
    assert!(arena.extend(112).is_some());
    assert!(arena.extend(1).is_none());
  }

  #[test]
  fn sbrk_rejects_increments_beyond_intptr() {
    let mut source = Sbrk::new();

    assert!(source.extend(usize::MAX).is_none());
  }
}
