//! The free list: every unused region, sorted by address.
//!
//! ```text
//!   sentinel ──► [A | 64] ──► [C | 32] ──► [F | 0] ──► ∅
//!                  ▲            ▲
//!                  │            └── C.addr > A.end: a gap (allocated B) sits between
//!                  └── lowest free region
//! ```
//!
//! Two free regions are never adjacent: whenever `a.end() == b.addr` the two
//! are merged on insertion.

use std::ptr::NonNull;

use log::trace;

use crate::block::{Block, HEADER_SIZE};

/// A region found by [`FreeRegistry::first_fit`], together with its
/// predecessor so it can be unlinked or replaced in place.
#[derive(Debug, Clone, Copy)]
pub struct Fit {
  prev: Option<NonNull<Block>>,
  pub block: NonNull<Block>,
}

pub struct FreeRegistry {
  // Anchors the list head. Nothing ever points at it, so moving the registry
  // around is fine.
  sentinel: Block,
  len: usize,
}

impl FreeRegistry {
  pub const fn new() -> Self {
    Self {
      sentinel: Block::new(0, None),
      len: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Inserts a free region at its sorted position, merging it with whichever
  /// neighbors it touches.
  ///
  /// # Safety
  ///
  /// `region` must be a live header that is in neither list and does not
  /// overlap any region already in the registry.
  pub unsafe fn insert(
    &mut self,
    region: NonNull<Block>,
  ) {
    unsafe {
      let addr = Block::addr(region);
      trace!("free list: inserting {addr:#x} ({} bytes)", (*region.as_ptr()).size);

      let mut prev: Option<NonNull<Block>> = None;
      let mut next = self.sentinel.next;

      while let Some(candidate) = next {
        if Block::addr(candidate) > addr {
          break;
        }
        prev = Some(candidate);
        next = (*candidate.as_ptr()).next;
      }

      // Both checks use the region's original bounds: merging forward only
      // grows it upwards, its start does not move.
      let end = Block::end(region);

      match next {
        Some(following) if end == Block::addr(following) => {
          trace!("free list: merging {addr:#x} with following {:#x}", Block::addr(following));
          (*region.as_ptr()).size += HEADER_SIZE + (*following.as_ptr()).size;
          (*region.as_ptr()).next = (*following.as_ptr()).next;
          self.len -= 1;
        }
        _ => (*region.as_ptr()).next = next,
      }

      match prev {
        Some(preceding) if Block::end(preceding) == addr => {
          trace!("free list: merging {addr:#x} into preceding {:#x}", Block::addr(preceding));
          (*preceding.as_ptr()).size += HEADER_SIZE + (*region.as_ptr()).size;
          (*preceding.as_ptr()).next = (*region.as_ptr()).next;
        }
        _ => {
          self.link_after(prev, Some(region));
          self.len += 1;
        }
      }
    }
  }

  /// First region, in address order, with at least `size` usable bytes.
  pub fn first_fit(
    &self,
    size: usize,
  ) -> Option<Fit> {
    let mut prev = None;
    let mut current = self.sentinel.next;

    while let Some(block) = current {
      let block_size = unsafe { (*block.as_ptr()).size };

      if block_size >= size {
        trace!("free list: first fit for {size} is {:#x} ({block_size} bytes)", Block::addr(block));
        return Some(Fit { prev, block });
      }

      prev = Some(block);
      current = unsafe { (*block.as_ptr()).next };
    }

    None
  }

  /// Removes a fitting region from the list.
  ///
  /// # Safety
  ///
  /// `fit` must come from [`first_fit`](Self::first_fit) with no other change
  /// to the registry in between.
  pub unsafe fn unlink(
    &mut self,
    fit: Fit,
  ) {
    unsafe {
      let following = (*fit.block.as_ptr()).next;
      self.link_after(fit.prev, following);
      (*fit.block.as_ptr()).next = None;
      self.len -= 1;
    }
  }

  /// Puts `replacement` where the fitting region was. Used for the upper part
  /// of a split, whose address sorts into the very same position.
  ///
  /// # Safety
  ///
  /// Same as [`unlink`](Self::unlink); additionally `replacement` must be a
  /// live header lying strictly between the fitting region and its successor.
  pub unsafe fn replace(
    &mut self,
    fit: Fit,
    replacement: NonNull<Block>,
  ) {
    unsafe {
      (*replacement.as_ptr()).next = (*fit.block.as_ptr()).next;
      self.link_after(fit.prev, Some(replacement));
      (*fit.block.as_ptr()).next = None;
    }
  }

  pub fn iter(&self) -> Iter<'_> {
    Iter {
      current: self.sentinel.next,
      _registry: std::marker::PhantomData,
    }
  }

  /// Drops every region from the list without touching their memory.
  pub fn clear(&mut self) {
    self.sentinel.next = None;
    self.len = 0;
  }

  unsafe fn link_after(
    &mut self,
    prev: Option<NonNull<Block>>,
    next: Option<NonNull<Block>>,
  ) {
    match prev {
      Some(prev) => unsafe { (*prev.as_ptr()).next = next },
      None => self.sentinel.next = next,
    }
  }
}

impl Default for FreeRegistry {
  fn default() -> Self {
    Self::new()
  }
}

/// Walks the free list in address order.
pub struct Iter<'a> {
  current: Option<NonNull<Block>>,
  _registry: std::marker::PhantomData<&'a FreeRegistry>,
}

impl Iterator for Iter<'_> {
  type Item = NonNull<Block>;

  fn next(&mut self) -> Option<Self::Item> {
    let block = self.current?;
    self.current = unsafe { (*block.as_ptr()).next };
    Some(block)
  }
}
