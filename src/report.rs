use std::fmt;

/// One region as seen by the diagnostic listings. `address` is the header
/// address; the usable memory starts one header later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
  pub address: usize,
  pub size: usize,
  pub next: Option<usize>,
}

/// Byte and region counts at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
  /// Everything obtained from the heap source, headers included.
  pub heap_bytes: usize,
  pub free_bytes: usize,
  pub allocated_bytes: usize,
  pub free_regions: usize,
  pub allocated_regions: usize,
}

/// Printable free list, one region per line.
pub struct FreeListReport(pub Vec<RegionInfo>);

impl fmt::Display for FreeListReport {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "free list contains {} region(s)", self.0.len())?;

    for region in &self.0 {
      write!(f, "  address: {:#x}, size: {}, next: ", region.address, region.size)?;
      match region.next {
        Some(next) => writeln!(f, "{next:#x}")?,
        None => writeln!(f, "none")?,
      }
    }

    Ok(())
  }
}

impl fmt::Display for HeapStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "heap {} bytes: {} free in {} region(s), {} allocated in {} region(s)",
      self.heap_bytes, self.free_bytes, self.free_regions, self.allocated_bytes, self.allocated_regions
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn report_lists_every_region() {
    let report = FreeListReport(vec![
      RegionInfo {
        address: 0x1000,
        size: 64,
        next: Some(0x1100),
      },
      RegionInfo {
        address: 0x1100,
        size: 0,
        next: None,
      },
    ]);

    assert_eq!(
      report.to_string(),
      "free list contains 2 region(s)\n  \
       address: 0x1000, size: 64, next: 0x1100\n  \
       address: 0x1100, size: 0, next: none\n"
    );
  }

  #[test]
  fn empty_report() {
    assert_eq!(FreeListReport(Vec::new()).to_string(), "free list contains 0 region(s)\n");
  }
}
