use std::ptr::NonNull;

/// Header stored immediately before the usable memory of every region.
///
/// `size` never includes the header itself. `next` links the region into
/// whichever list currently owns it: the free registry or the allocation
/// directory, never both.
#[repr(C, align(16))]
pub struct Block {
  pub size: usize,
  pub next: Option<NonNull<Block>>,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<Block>();

impl Block {
  pub const fn new(
    size: usize,
    next: Option<NonNull<Block>>,
  ) -> Self {
    Self { size, next }
  }

  /// Writes a fresh, unlinked header at `at`.
  ///
  /// # Safety
  ///
  /// `at` must be non-null, aligned to [`HEADER_SIZE`] and valid for writes of
  /// `HEADER_SIZE + size` bytes.
  pub unsafe fn write(
    at: *mut u8,
    size: usize,
  ) -> NonNull<Block> {
    unsafe {
      let block = at as *mut Block;
      block.write(Block::new(size, None));
      NonNull::new_unchecked(block)
    }
  }

  pub fn addr(block: NonNull<Block>) -> usize {
    block.as_ptr() as usize
  }

  /// First address past the region's usable memory.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn end(block: NonNull<Block>) -> usize {
    unsafe { Block::addr(block) + HEADER_SIZE + (*block.as_ptr()).size }
  }

  pub fn payload(block: NonNull<Block>) -> NonNull<u8> {
    // A header is never placed at the very top of the address space, so the
    // payload address is non-null as well.
    unsafe { NonNull::new_unchecked((block.as_ptr() as *mut u8).add(HEADER_SIZE)) }
  }

  /// Header address for a payload pointer. Does not dereference anything, so
  /// it is fine to call on pointers that were never issued.
  pub fn header_addr(payload: *mut u8) -> usize {
    (payload as usize).wrapping_sub(HEADER_SIZE)
  }
}
