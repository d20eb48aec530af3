//! Buffer construction.

use std::sync::Arc;

use crate::alloc::allocate;
use crate::context::Context;
use crate::error::{MemError, MemResult};
use crate::flags::MemFlags;
use crate::object::{MemObject, MemObjectType};

/// Create a buffer of `size` bytes.
///
/// With [`MemFlags::COPY_HOST_PTR`], the first `size` bytes of `data` are
/// uploaded verbatim. `data` must be given exactly when that flag is set.
pub fn create_buffer(
    context: &Arc<Context>,
    flags: MemFlags,
    size: usize,
    data: Option<&[u8]>,
) -> MemResult<Arc<MemObject>> {
    let initial = match (flags.contains(MemFlags::COPY_HOST_PTR), data) {
        (true, Some(data)) if data.len() >= size => Some(data),
        (false, None) => None,
        _ => return Err(MemError::InvalidHostPtr),
    };

    let mut allocation = allocate(context, flags, MemObjectType::Buffer, size, false)?;
    if let Some(data) = initial {
        allocation.buffer_mut()?.write_subdata(0, &data[..size])?;
    }
    allocation.into_object(None)
}
