//! # gpumem
//!
//! Memory objects for an integrated-GPU compute runtime.
//!
//! ## Features
//!
//! - Buffers and 1D/2D/3D images backed by a pluggable buffer manager
//! - Hardware X/Y tiling with bit-exact host upload and readback
//! - Thread-safe retain/release with exactly-once destruction
//! - Per-context registry of live objects
//! - CPU and GTT mapping, pinning with RAII guards
//! - OpenCL-style property queries
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use gpumem::{create_buffer, Context, DeviceInfo, HostBufferManager, MemFlags};
//!
//! let ctx = Context::new(DeviceInfo::gen7(), Arc::new(HostBufferManager::new()));
//! let data = [1u8; 16];
//! let buf = create_buffer(&ctx, MemFlags::COPY_HOST_PTR, 16, Some(&data)).unwrap();
//!
//! let mut out = [0u8; 16];
//! buf.read(0, &mut out).unwrap();
//! assert_eq!(out, data);
//!
//! assert!(buf.release().unwrap());
//! assert_eq!(ctx.object_count(), 0);
//! ```
//!
//! ## Cargo features
//!
//! - `parking_lot`: use `parking_lot` mutexes
//! - `log`: forward diagnostics and trace allocation through the `log` crate
//! - `diagnostics`: print diagnostics to stderr in release builds

#[macro_use]
pub mod diagnostics;

pub mod buffer;
pub mod bufmgr;
pub mod config;
pub mod context;
pub mod error;
pub mod flags;
pub mod format;
pub mod image;
pub mod info;
pub mod object;
pub mod registry;
pub mod tiling;

mod alloc;
mod sync;
mod util;

pub use buffer::create_buffer;
pub use bufmgr::{BackingBuffer, BufferError, BufferManager, HostBufferManager, HostBufferStats};
pub use config::DeviceInfo;
pub use context::{Context, ContextId};
pub use error::{MemError, MemResult};
pub use flags::MemFlags;
pub use format::{ChannelOrder, ChannelType, FormatCatalog, ImageFormat, StandardFormats};
pub use image::{create_image, ImageDesc};
pub use info::{MemInfo, MemInfoParam};
pub use object::{ImageInfo, MemObject, MemObjectType, PinGuard};
pub use registry::{RegistryEntry, RegistryKey};
pub use tiling::{SurfaceLayout, TilingMode};
