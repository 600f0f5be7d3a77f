use std::ptr::NonNull;

use log::{debug, warn};

use crate::{
  align,
  block::{Block, HEADER_SIZE},
  config::Config,
  directory::AllocationDirectory,
  error::{AllocError, HeapCheckError},
  grower::HeapGrower,
  registry::{Fit, FreeRegistry},
  report::{FreeListReport, HeapStats, RegionInfo},
  source::{HeapSource, Sbrk},
};

/// First-fit allocator over an address-ordered, coalescing free list.
///
/// Single-threaded: it is neither `Send` nor `Sync`, and every operation runs
/// to completion on the caller's thread.
pub struct FreeListAllocator<S: HeapSource = Sbrk> {
  config: Config,
  grower: HeapGrower<S>,
  free: FreeRegistry,
  allocated: AllocationDirectory,
}

impl FreeListAllocator<Sbrk> {
  /// An allocator growing the process data segment.
  pub fn new() -> Self {
    Self::with_source(Sbrk::new())
  }
}

impl Default for FreeListAllocator<Sbrk> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: HeapSource> FreeListAllocator<S> {
  pub fn with_source(source: S) -> Self {
    Self::with_config(source, Config::default())
  }

  pub fn with_config(
    source: S,
    config: Config,
  ) -> Self {
    Self {
      config,
      grower: HeapGrower::new(source),
      free: FreeRegistry::new(),
      allocated: AllocationDirectory::new(),
    }
  }

  /// Hands out at least `size` bytes aligned to [`ALIGNMENT`](crate::align::ALIGNMENT).
  ///
  /// A zero-size request still gets its own, distinct address. The memory is
  /// valid until released or until the allocator is dropped or reset.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let exhausted = AllocError::HeapExhausted { requested: size };
    let rounded = align::align_up(size).ok_or(exhausted)?;

    debug!("allocate: {size} bytes, looking for {rounded}");

    let fit = match self.free.first_fit(rounded) {
      Some(fit) => fit,
      None => {
        let region = self
          .grower
          .grow(rounded, &self.config)
          .map_err(|_| exhausted)?;
        unsafe { self.free.insert(region) };
        self.free.first_fit(rounded).ok_or(exhausted)?
      }
    };

    let block = unsafe { self.take(fit, rounded) };
    let payload = Block::payload(block);

    debug!(
      "allocate: {size} bytes at {:p} (region {:#x}, {} bytes)",
      payload,
      Block::addr(block),
      unsafe { block.as_ref().size }
    );

    Ok(payload)
  }

  /// Returns a region to the free list, merging it with free neighbors.
  ///
  /// Anything that is not a currently allocated address, including a second
  /// release of the same address, is rejected with
  /// [`AllocError::InvalidFree`] and changes nothing.
  pub fn release(
    &mut self,
    ptr: *mut u8,
  ) -> Result<(), AllocError> {
    let header = Block::header_addr(ptr);

    let Some(block) = self.allocated.remove(header) else {
      warn!("release: {ptr:p} is not an allocated region");
      return Err(AllocError::InvalidFree { address: ptr as usize });
    };

    debug!("release: {ptr:p} ({} bytes)", unsafe { block.as_ref().size });

    unsafe { self.free.insert(block) };

    Ok(())
  }

  /// Moves a fitting free region into the directory, splitting off the part
  /// beyond `size` when that leaves a large enough remainder.
  unsafe fn take(
    &mut self,
    fit: Fit,
    size: usize,
  ) -> NonNull<Block> {
    unsafe {
      let block = fit.block;
      let available = block.as_ref().size;
      let remainder = available
        .checked_sub(size + HEADER_SIZE)
        .filter(|&remainder| remainder >= self.config.min_split_remainder);

      match remainder {
        Some(remainder) => {
          let upper = (block.as_ptr() as *mut u8).add(HEADER_SIZE + size);
          let upper = Block::write(upper, remainder);
          debug!("split: {:#x} keeps {size}, {remainder} left at {:#x}", Block::addr(block), Block::addr(upper));

          self.free.replace(fit, upper);
          (*block.as_ptr()).size = size;
        }
        None => self.free.unlink(fit),
      }

      self.allocated.push(block);
      block
    }
  }

  /// Free regions in address order.
  pub fn free_regions(&self) -> Vec<RegionInfo> {
    self.free.iter().map(region_info).collect()
  }

  /// Allocated regions, most recently allocated first.
  pub fn allocated_regions(&self) -> Vec<RegionInfo> {
    self.allocated.iter().map(region_info).collect()
  }

  pub fn free_list_report(&self) -> FreeListReport {
    FreeListReport(self.free_regions())
  }

  pub fn stats(&self) -> HeapStats {
    let sum = |regions: Vec<RegionInfo>| regions.iter().map(|region| region.size).sum::<usize>();

    HeapStats {
      heap_bytes: self.grower.heap_bytes(),
      free_bytes: sum(self.free_regions()),
      allocated_bytes: sum(self.allocated_regions()),
      free_regions: self.free.len(),
      allocated_regions: self.allocated.len(),
    }
  }

  /// Verifies the heap invariants: the free list is sorted and holds no two
  /// adjacent regions, no regions overlap, all of them lie between the heap
  /// start and the break, and together they account for every byte obtained.
  pub fn check(&self) -> Result<(), HeapCheckError> {
    let free = self.free_regions();

    for pair in free.windows(2) {
      let (first, second) = (pair[0], pair[1]);

      if first.address >= second.address {
        return Err(HeapCheckError::Unordered {
          previous: first.address,
          next: second.address,
        });
      }
      if first.address + HEADER_SIZE + first.size == second.address {
        return Err(HeapCheckError::Unmerged {
          first: first.address,
          second: second.address,
        });
      }
    }

    let mut regions = free;
    regions.extend(self.allocated_regions());
    regions.sort_by_key(|region| region.address);

    let start = self.grower.heap_start().unwrap_or(0);
    let end = self.grower.heap_break();

    for region in &regions {
      if region.address < start || region.address + HEADER_SIZE + region.size > end {
        return Err(HeapCheckError::OutOfBounds {
          address: region.address,
          start,
          end,
        });
      }
    }

    for pair in regions.windows(2) {
      if pair[0].address + HEADER_SIZE + pair[0].size > pair[1].address {
        return Err(HeapCheckError::Overlap {
          first: pair[0].address,
          second: pair[1].address,
        });
      }
    }

    let accounted: usize = regions.iter().map(|region| HEADER_SIZE + region.size).sum();
    let heap = self.grower.heap_bytes();

    if accounted != heap {
      return Err(HeapCheckError::Accounting { accounted, heap });
    }

    Ok(())
  }

  /// Forgets every region, free or allocated. The memory stays reserved and
  /// the break does not move; pointers issued earlier become invalid frees.
  pub fn reset(&mut self) {
    debug!("reset: dropping {} free and {} allocated regions", self.free.len(), self.allocated.len());

    self.free.clear();
    self.allocated.clear();
    self.grower.forget();
  }

  /// Lowest heap address obtained since creation or the last reset.
  pub fn heap_start(&self) -> Option<usize> {
    self.grower.heap_start()
  }

  /// High-water mark of the heap.
  pub fn heap_break(&self) -> usize {
    self.grower.heap_break()
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn source(&self) -> &S {
    self.grower.source()
  }

  pub fn source_mut(&mut self) -> &mut S {
    self.grower.source_mut()
  }
}

fn region_info(block: NonNull<Block>) -> RegionInfo {
  let header = unsafe { block.as_ref() };

  RegionInfo {
    address: Block::addr(block),
    size: header.size,
    next: header.next.map(Block::addr),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::Arena;

  fn allocator() -> FreeListAllocator<Arena> {
    FreeListAllocator::with_source(Arena::with_capacity(4096))
  }

  #[test]
  fn test_alloc() {
    let mut allocator = allocator();

    unsafe {
      let first_addr = allocator.allocate(8).unwrap().as_ptr() as *mut u64;

      *first_addr = 3u64;

      assert_eq!(*first_addr, 3);

      let size: usize = 6;

      let second_addr = allocator.allocate(size * 2).unwrap().as_ptr() as *mut u16;

      for i in 0..size {
        *(second_addr.add(i)) = (i + 1) as u16;
      }

      assert_eq!(*first_addr, 3);

      for i in 0..size {
        assert_eq!((i + 1) as u16, *(second_addr.add(i)))
      }

      allocator.release(first_addr as *mut u8).unwrap();

      let third_addr = allocator.allocate(4).unwrap().as_ptr() as *mut u32;

      assert_eq!(first_addr as *mut u32, third_addr);

      allocator.release(third_addr as *mut u8).unwrap();

      let fourth_addr = allocator.allocate(16).unwrap().as_ptr() as *mut u128;

      *fourth_addr = 25;

      assert_eq!(fourth_addr as *mut u32, third_addr);
      assert_eq!(*fourth_addr, 25);
    }

    allocator.check().unwrap();
  }

  #[test]
  fn exact_fit_moves_whole_region() {
    let mut allocator = allocator();

    let a = allocator.allocate(32).unwrap();
    let _b = allocator.allocate(32).unwrap();
    allocator.release(a.as_ptr()).unwrap();

    assert_eq!(allocator.free_regions().len(), 1);

    let again = allocator.allocate(17).unwrap();

    assert_eq!(again, a);
    assert!(allocator.free_regions().is_empty());
    allocator.check().unwrap();
  }

  #[test]
  fn split_leaves_remainder_in_place() {
    let mut allocator = allocator();

    let a = allocator.allocate(64).unwrap();
    let _b = allocator.allocate(0).unwrap();
    allocator.release(a.as_ptr()).unwrap();

    let small = allocator.allocate(16).unwrap();

    assert_eq!(small, a);
    assert_eq!(
      allocator.free_regions(),
      vec![RegionInfo {
        address: a.as_ptr() as usize + 16,
        size: 64 - 16 - HEADER_SIZE,
        next: None,
      }]
    );
    allocator.check().unwrap();
  }

  #[test]
  fn zero_size_remainder_is_kept() {
    let mut allocator = allocator();

    let a = allocator.allocate(32).unwrap();
    let _b = allocator.allocate(0).unwrap();
    allocator.release(a.as_ptr()).unwrap();

    allocator.allocate(16).unwrap();

    let free = allocator.free_regions();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].size, 0);
    allocator.check().unwrap();
  }

  #[test]
  fn small_remainder_is_not_split_off() {
    let config = Config::default().with_min_split_remainder(32);
    let mut allocator = FreeListAllocator::with_config(Arena::with_capacity(4096), config);

    let a = allocator.allocate(64).unwrap();
    let _b = allocator.allocate(0).unwrap();
    allocator.release(a.as_ptr()).unwrap();

    // 64 - 32 - header leaves 16, below the threshold
    let c = allocator.allocate(32).unwrap();

    assert_eq!(c, a);
    assert!(allocator.free_regions().is_empty());
    assert_eq!(allocator.allocated_regions()[0].size, 64);
    allocator.check().unwrap();
  }

  #[test]
  fn grow_chunk_is_split_for_following_requests() {
    let config = Config::default().with_grow_chunk(1024);
    let mut allocator = FreeListAllocator::with_config(Arena::with_capacity(4096), config);

    let a = allocator.allocate(10).unwrap();
    let b = allocator.allocate(10).unwrap();

    assert_eq!(b.as_ptr() as usize, a.as_ptr() as usize + 16 + HEADER_SIZE);
    assert_eq!(allocator.stats().heap_bytes, 1024 + HEADER_SIZE);
    assert_eq!(allocator.source().used(), 1024 + HEADER_SIZE);
    allocator.check().unwrap();
  }

  #[test]
  fn release_of_foreign_pointers_is_rejected() {
    let mut allocator = allocator();
    let a = allocator.allocate(16).unwrap();

    let mut local = 0u64;
    let foreign = &mut local as *mut u64 as *mut u8;

    assert_eq!(
      allocator.release(foreign),
      Err(AllocError::InvalidFree { address: foreign as usize })
    );
    assert_eq!(
      allocator.release(std::ptr::null_mut()),
      Err(AllocError::InvalidFree { address: 0 })
    );
    assert_eq!(
      allocator.release(unsafe { a.as_ptr().add(1) }),
      Err(AllocError::InvalidFree { address: a.as_ptr() as usize + 1 })
    );

    assert_eq!(allocator.allocated_regions().len(), 1);
    allocator.release(a.as_ptr()).unwrap();
    allocator.check().unwrap();
  }

  #[test]
  fn maximal_request_is_exhaustion_not_panic() {
    let mut allocator = allocator();

    assert_eq!(
      allocator.allocate(usize::MAX),
      Err(AllocError::HeapExhausted { requested: usize::MAX })
    );
    assert_eq!(
      allocator.allocate(usize::MAX - HEADER_SIZE),
      Err(AllocError::HeapExhausted { requested: usize::MAX - HEADER_SIZE })
    );
    assert_eq!(allocator.stats(), HeapStats::default());
  }

  #[test]
  fn reset_forgets_everything() {
    let mut allocator = allocator();

    let a = allocator.allocate(48).unwrap();
    let b = allocator.allocate(48).unwrap();
    allocator.release(b.as_ptr()).unwrap();
    let brk = allocator.heap_break();

    allocator.reset();

    assert!(allocator.free_regions().is_empty());
    assert!(allocator.allocated_regions().is_empty());
    assert_eq!(allocator.heap_break(), brk);
    assert_eq!(allocator.heap_start(), None);
    assert!(matches!(allocator.release(a.as_ptr()), Err(AllocError::InvalidFree { .. })));

    let c = allocator.allocate(48).unwrap();
    assert!(c.as_ptr() as usize >= brk);
    allocator.check().unwrap();
  }

  #[test]
  fn stats_track_both_lists() {
    let mut allocator = allocator();

    let a = allocator.allocate(32).unwrap();
    let _b = allocator.allocate(64).unwrap();
    allocator.release(a.as_ptr()).unwrap();

    assert_eq!(
      allocator.stats(),
      HeapStats {
        heap_bytes: 32 + 64 + 2 * HEADER_SIZE,
        free_bytes: 32,
        allocated_bytes: 64,
        free_regions: 1,
        allocated_regions: 1,
      }
    );
  }
}
