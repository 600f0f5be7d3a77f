use std::ptr::NonNull;

use crate::block::Block;

/// Regions currently handed out to callers. Unordered: new regions go to the
/// front, and a release searches by header address.
pub struct AllocationDirectory {
  head: Option<NonNull<Block>>,
  len: usize,
}

impl AllocationDirectory {
  pub const fn new() -> Self {
    Self { head: None, len: 0 }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// # Safety
  ///
  /// `block` must be a live header that is in neither list.
  pub unsafe fn push(
    &mut self,
    block: NonNull<Block>,
  ) {
    unsafe { (*block.as_ptr()).next = self.head };
    self.head = Some(block);
    self.len += 1;
  }

  /// Unlinks the region whose header sits at `header_addr`, if it is one of
  /// ours. Only headers already in the directory are dereferenced.
  pub fn remove(
    &mut self,
    header_addr: usize,
  ) -> Option<NonNull<Block>> {
    let mut prev: Option<NonNull<Block>> = None;
    let mut current = self.head;

    while let Some(block) = current {
      let next = unsafe { (*block.as_ptr()).next };

      if Block::addr(block) == header_addr {
        match prev {
          Some(prev) => unsafe { (*prev.as_ptr()).next = next },
          None => self.head = next,
        }
        unsafe { (*block.as_ptr()).next = None };
        self.len -= 1;
        return Some(block);
      }

      prev = Some(block);
      current = next;
    }

    None
  }

  pub fn iter(&self) -> impl Iterator<Item = NonNull<Block>> + '_ {
    std::iter::successors(self.head, |block| unsafe { (*block.as_ptr()).next })
  }

  /// Forgets every region without touching their memory.
  pub fn clear(&mut self) {
    self.head = None;
    self.len = 0;
  }
}

impl Default for AllocationDirectory {
  fn default() -> Self {
    Self::new()
  }
}
