use std::ptr::NonNull;

use log::debug;

use crate::{
  align,
  block::{Block, HEADER_SIZE},
  config::Config,
  error::AllocError,
  source::HeapSource,
};

/// The only component allowed to move the heap boundary.
pub struct HeapGrower<S> {
  source: S,
  start: Option<usize>,
  brk: usize,
  obtained: usize,
}

impl<S: HeapSource> HeapGrower<S> {
  pub fn new(source: S) -> Self {
    Self {
      source,
      start: None,
      brk: 0,
      obtained: 0,
    }
  }

  /// Obtains a fresh free region with at least `min_bytes` usable bytes.
  ///
  /// Nothing changes when the source refuses: the failure is handed back as
  /// [`AllocError::HeapExhausted`] without retrying.
  pub fn grow(
    &mut self,
    min_bytes: usize,
    config: &Config,
  ) -> Result<NonNull<Block>, AllocError> {
    let exhausted = AllocError::HeapExhausted { requested: min_bytes };

    // `grow_chunk` is a public field, so it may arrive unaligned.
    let chunk = align::align_up(config.grow_chunk).ok_or(exhausted)?;
    let usable = align::align_up(min_bytes).ok_or(exhausted)?.max(chunk);
    let increment = usable.checked_add(HEADER_SIZE).ok_or(exhausted)?;

    debug!("growing heap by {increment} bytes ({usable} usable)");

    let address = self.source.extend(increment).ok_or(exhausted)?;

    let start = address.as_ptr() as usize;
    if self.start.is_none() {
      self.start = Some(start);
    }
    self.brk = self.brk.max(start + increment);
    self.obtained += increment;

    Ok(unsafe { Block::write(address.as_ptr(), usable) })
  }

  /// Lowest address ever obtained, if any.
  pub fn heap_start(&self) -> Option<usize> {
    self.start
  }

  /// High-water mark of the heap. Never decreases.
  pub fn heap_break(&self) -> usize {
    self.brk
  }

  /// Total bytes obtained, headers included.
  pub fn heap_bytes(&self) -> usize {
    self.obtained
  }

  /// Stops accounting for everything obtained so far. The memory itself is
  /// kept; the break is not moved.
  pub fn forget(&mut self) {
    self.start = None;
    self.obtained = 0;
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn source_mut(&mut self) -> &mut S {
    &mut self.source
  }
}
