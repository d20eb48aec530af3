//! Alignment arithmetic.

/// Align `size` up to `align`, which must be a power of two.
#[inline]
pub const fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

/// Whether `value` is a multiple of `align` (a power of two).
#[inline]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Number of bytes to skip from `addr` to reach the next `align` boundary.
#[inline]
pub const fn align_offset(addr: usize, align: usize) -> usize {
    align_up(addr, align) - addr
}

/// Integer division rounding up.
#[inline]
pub const fn div_ceil(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}
