//! Device descriptor.
//!
//! The memory-object layer only needs the allocation and image limits of
//! the device plus its hardware generation, which gates tiling support.

use crate::tiling::TilingMode;
use crate::util::size::mib;

/// Limits and capabilities of the device a context talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Largest single allocation in bytes.
    pub max_alloc_size: usize,

    /// Largest 2D image width in pixels
    pub image2d_max_width: usize,
    /// Largest 2D image height in pixels
    pub image2d_max_height: usize,

    /// Largest 3D image width in pixels
    pub image3d_max_width: usize,
    /// Largest 3D image height in pixels
    pub image3d_max_height: usize,
    /// Largest 3D image depth in slices
    pub image3d_max_depth: usize,

    /// Hardware generation (6 = Sandy Bridge, 7 = Ivy Bridge, 75 = Haswell).
    pub hardware_generation: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::gen7()
    }
}

impl DeviceInfo {
    /// Sandy Bridge: no hardware tiling for images.
    pub fn gen6() -> Self {
        Self {
            hardware_generation: 6,
            ..Self::gen7()
        }
    }

    /// Ivy Bridge.
    pub fn gen7() -> Self {
        Self {
            max_alloc_size: mib(256),
            image2d_max_width: 8192,
            image2d_max_height: 8192,
            image3d_max_width: 8192,
            image3d_max_height: 8192,
            image3d_max_depth: 2048,
            hardware_generation: 7,
        }
    }

    /// Haswell.
    pub fn gen75() -> Self {
        Self {
            hardware_generation: 75,
            ..Self::gen7()
        }
    }

    /// Builder pattern: set the allocation limit.
    pub fn with_max_alloc_size(mut self, size: usize) -> Self {
        self.max_alloc_size = size;
        self
    }

    /// Builder pattern: set the 2D image limits.
    pub fn with_image2d_max(mut self, width: usize, height: usize) -> Self {
        self.image2d_max_width = width;
        self.image2d_max_height = height;
        self
    }

    /// Builder pattern: set the 3D image limits.
    pub fn with_image3d_max(mut self, width: usize, height: usize, depth: usize) -> Self {
        self.image3d_max_width = width;
        self.image3d_max_height = height;
        self.image3d_max_depth = depth;
        self
    }

    /// Builder pattern: set the hardware generation.
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.hardware_generation = generation;
        self
    }

    /// Tiling used for 2D and 3D images on this device.
    ///
    /// Generation 6 samplers cannot read tiled images from compute
    /// kernels, so images stay linear there.
    pub fn image_tiling(&self) -> TilingMode {
        if self.hardware_generation == 6 {
            TilingMode::None
        } else {
            TilingMode::TileY
        }
    }
}
