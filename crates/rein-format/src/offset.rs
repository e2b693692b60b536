//! Pointer ⇄ block-relative offset translation.
//!
//! The on-disk format stores every reference as a signed 64-bit offset from
//! the start of its containing block, so a loaded blob is valid at any base
//! address. The raw codec below is only sound on platforms whose pointers
//! are exactly as wide as the stored offsets; anything else is a fatal
//! configuration error, checked up front, never narrowed silently.

use std::mem::size_of;

use tracing::error;

use crate::error::{FormatError, Result};

/// Fail if this platform cannot use the 64-bit offset format at all.
pub fn pointer_width_check() -> Result<()> {
    let width = size_of::<*const u8>() * 8;
    if size_of::<*const u8>() != size_of::<i64>() {
        error!(width, "platform pointer width is incompatible with the binary model format");
        return Err(FormatError::PointerWidth { width });
    }
    Ok(())
}

/// Translate a pointer inside a block to its block-relative offset.
pub fn pointer_to_offset(block_base: *const u8, ptr: *const u8) -> Result<i64> {
    pointer_width_check()?;
    Ok((ptr as usize as i64).wrapping_sub(block_base as usize as i64))
}

/// Translate a block-relative offset back to a pointer.
///
/// Exact inverse of [`pointer_to_offset`] for any pointer within the block.
pub fn offset_to_pointer(block_base: *const u8, offset: i64) -> Result<*const u8> {
    pointer_width_check()?;
    Ok((block_base as usize as i64).wrapping_add(offset) as usize as *const u8)
}
