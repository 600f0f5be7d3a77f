use crate::align;

/// Tuning knobs for [`FreeListAllocator`](crate::FreeListAllocator).
///
/// The default grows the heap by exactly what a request needs and always
/// splits oversized regions, keeping even zero-size remainders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
  /// Minimum usable bytes obtained per heap extension. Rounded up to the
  /// alignment unit. Requests larger than this grow by exactly their size.
  pub grow_chunk: usize,

  /// Smallest usable size a split remainder may have. A fit whose remainder
  /// would be smaller is handed out whole.
  pub min_split_remainder: usize,
}

impl Config {
  pub fn with_grow_chunk(
    mut self,
    bytes: usize,
  ) -> Self {
    self.grow_chunk = align::align_up(bytes).unwrap_or(usize::MAX & !(align::ALIGNMENT - 1));
    self
  }

  pub fn with_min_split_remainder(
    mut self,
    bytes: usize,
  ) -> Self {
    self.min_split_remainder = bytes;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_is_exact() {
    let config = Config::default();

    assert_eq!(config.grow_chunk, 0);
    assert_eq!(config.min_split_remainder, 0);
  }

  #[test]
  fn grow_chunk_is_aligned() {
    assert_eq!(Config::default().with_grow_chunk(1000).grow_chunk, 1008);
    assert_eq!(Config::default().with_grow_chunk(4096).grow_chunk, 4096);
    assert_eq!(
      Config::default().with_grow_chunk(usize::MAX).grow_chunk % align::ALIGNMENT,
      0
    );
  }
}
