use crate::block::Block;

/// The allocation unit. Every payload size is a multiple of this, and it is
/// also the size of a region header, so headers and payloads never straddle
/// a misaligned boundary.
pub const ALIGNMENT: usize = std::mem::size_of::<Block>();

const _: () = assert!(ALIGNMENT.is_power_of_two());

/// Rounds the given size up to [`ALIGNMENT`].
///
/// Only meant for values that cannot overflow; caller-provided sizes go
/// through [`align_up`].
///
/// # Examples
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(50), 64);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Checked version of [`align!`]. Returns `None` when rounding would overflow.
pub fn align_up(value: usize) -> Option<usize> {
  value
    .checked_add(ALIGNMENT - 1)
    .map(|v| v & !(ALIGNMENT - 1))
}
