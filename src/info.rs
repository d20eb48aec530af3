//! Memory object queries.

use std::mem::size_of;

use crate::context::ContextId;
use crate::error::{MemError, MemResult};
use crate::flags::MemFlags;
use crate::object::{MemObject, MemObjectType};

/// Queryable properties of a memory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemInfoParam {
    Type,
    Flags,
    Size,
    HostPtr,
    MapCount,
    ReferenceCount,
    Context,
}

impl MemInfoParam {
    pub const ALL: [MemInfoParam; 7] = [
        MemInfoParam::Type,
        MemInfoParam::Flags,
        MemInfoParam::Size,
        MemInfoParam::HostPtr,
        MemInfoParam::MapCount,
        MemInfoParam::ReferenceCount,
        MemInfoParam::Context,
    ];

    /// OpenCL parameter code.
    pub fn raw(self) -> u32 {
        match self {
            MemInfoParam::Type => 0x1100,
            MemInfoParam::Flags => 0x1101,
            MemInfoParam::Size => 0x1102,
            MemInfoParam::HostPtr => 0x1103,
            MemInfoParam::MapCount => 0x1104,
            MemInfoParam::ReferenceCount => 0x1105,
            MemInfoParam::Context => 0x1106,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.raw() == raw)
    }

    /// Bytes needed to hold the value in raw form.
    pub fn value_size(self) -> usize {
        match self {
            MemInfoParam::Type | MemInfoParam::MapCount | MemInfoParam::ReferenceCount => {
                size_of::<u32>()
            }
            MemInfoParam::Flags | MemInfoParam::Context => size_of::<u64>(),
            MemInfoParam::Size | MemInfoParam::HostPtr => size_of::<usize>(),
        }
    }
}

/// A queried property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemInfo {
    Type(MemObjectType),
    Flags(MemFlags),
    Size(usize),
    /// Address of caller memory backing the object. Always 0: objects never
    /// alias host memory.
    HostPtr(usize),
    MapCount(u32),
    ReferenceCount(u32),
    Context(ContextId),
}

impl MemInfo {
    /// Native-endian encoding, [`MemInfoParam::value_size`] bytes long.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match *self {
            MemInfo::Type(kind) => kind.raw().to_ne_bytes().to_vec(),
            MemInfo::Flags(flags) => flags.bits().to_ne_bytes().to_vec(),
            MemInfo::Size(size) => size.to_ne_bytes().to_vec(),
            MemInfo::HostPtr(addr) => addr.to_ne_bytes().to_vec(),
            MemInfo::MapCount(n) | MemInfo::ReferenceCount(n) => n.to_ne_bytes().to_vec(),
            MemInfo::Context(id) => id.get().to_ne_bytes().to_vec(),
        }
    }
}

impl MemObject {
    /// Query one property.
    pub fn query_info(&self, param: MemInfoParam) -> MemResult<MemInfo> {
        if self.is_destroyed() {
            return Err(MemError::InvalidMemObject);
        }

        Ok(match param {
            MemInfoParam::Type => MemInfo::Type(self.kind()),
            MemInfoParam::Flags => MemInfo::Flags(self.flags()),
            MemInfoParam::Size => MemInfo::Size(self.size()),
            MemInfoParam::HostPtr => MemInfo::HostPtr(0),
            MemInfoParam::MapCount => MemInfo::MapCount(self.map_count()),
            MemInfoParam::ReferenceCount => MemInfo::ReferenceCount(self.reference_count()),
            MemInfoParam::Context => MemInfo::Context(self.context_id()),
        })
    }

    /// Query by raw parameter code.
    ///
    /// With `out == None` only the required size is returned. Otherwise the
    /// value is written to the front of `out` and its size returned.
    pub fn query_info_raw(&self, raw: u32, out: Option<&mut [u8]>) -> MemResult<usize> {
        let param = MemInfoParam::from_raw(raw).ok_or(MemError::InvalidValue)?;
        let size = param.value_size();

        let out = match out {
            Some(out) => out,
            None => return Ok(size),
        };
        if out.len() < size {
            return Err(MemError::InvalidValue);
        }

        let bytes = self.query_info(param)?.to_ne_bytes();
        out[..size].copy_from_slice(&bytes);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::create_buffer;
    use crate::bufmgr::HostBufferManager;
    use crate::config::DeviceInfo;
    use crate::context::Context;
    use std::sync::Arc;

    fn setup() -> Arc<Context> {
        Context::new(DeviceInfo::default(), Arc::new(HostBufferManager::new()))
    }

    #[test]
    fn test_raw_codes() {
        for param in MemInfoParam::ALL {
            assert_eq!(MemInfoParam::from_raw(param.raw()), Some(param));
        }
        assert_eq!(MemInfoParam::from_raw(0x10FF), None);
        assert_eq!(MemInfoParam::from_raw(0x1107), None);
    }

    #[test]
    fn test_query_values() {
        let ctx = setup();
        let mem = create_buffer(&ctx, MemFlags::READ_ONLY, 48, None).unwrap();
        mem.retain().unwrap();
        mem.map().unwrap();

        assert_eq!(mem.query_info(MemInfoParam::Type), Ok(MemInfo::Type(MemObjectType::Buffer)));
        assert_eq!(mem.query_info(MemInfoParam::Flags), Ok(MemInfo::Flags(MemFlags::READ_ONLY)));
        assert_eq!(mem.query_info(MemInfoParam::Size), Ok(MemInfo::Size(48)));
        assert_eq!(mem.query_info(MemInfoParam::HostPtr), Ok(MemInfo::HostPtr(0)));
        assert_eq!(mem.query_info(MemInfoParam::MapCount), Ok(MemInfo::MapCount(1)));
        assert_eq!(mem.query_info(MemInfoParam::ReferenceCount), Ok(MemInfo::ReferenceCount(2)));
        assert_eq!(mem.query_info(MemInfoParam::Context), Ok(MemInfo::Context(ctx.id())));
        for param in MemInfoParam::ALL {
            let value = mem.query_info(param).unwrap();
            assert_eq!(value.to_ne_bytes().len(), param.value_size(), "{:?}", param);
        }

        mem.unmap().unwrap();
        mem.release().unwrap();
        mem.release().unwrap();
        assert_eq!(mem.query_info(MemInfoParam::Size), Err(MemError::InvalidMemObject));
    }

    #[test]
    fn test_raw_size_semantics() {
        let ctx = setup();
        let mem = create_buffer(&ctx, MemFlags::empty(), 100, None).unwrap();
        let size_code = MemInfoParam::Size.raw();

        // Size only
        assert_eq!(mem.query_info_raw(size_code, None), Ok(size_of::<usize>()));

        // Too short
        let mut short = [0u8; 2];
        assert_eq!(mem.query_info_raw(size_code, Some(&mut short)), Err(MemError::InvalidValue));

        // Larger than needed
        let mut out = [0xAAu8; 16];
        assert_eq!(mem.query_info_raw(size_code, Some(&mut out)), Ok(size_of::<usize>()));
        assert_eq!(out[..size_of::<usize>()], 100usize.to_ne_bytes());
        assert_eq!(out[size_of::<usize>()..], [0xAA; 16][size_of::<usize>()..]);

        let mut count = [0u8; 4];
        let code = MemInfoParam::ReferenceCount.raw();
        assert_eq!(mem.query_info_raw(code, Some(&mut count)), Ok(4));
        assert_eq!(u32::from_ne_bytes(count), 1);

        assert_eq!(mem.query_info_raw(0x2000, None), Err(MemError::InvalidValue));
        mem.release().unwrap();
    }
}
