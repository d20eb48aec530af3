//! Image construction and readback.

use std::sync::Arc;

use crate::alloc::allocate;
use crate::bufmgr::BackingBuffer;
use crate::config::DeviceInfo;
use crate::context::Context;
use crate::error::{MemError, MemResult};
use crate::flags::MemFlags;
use crate::format::ImageFormat;
use crate::object::{ImageInfo, MemObject, MemObjectType};
use crate::tiling::{decode, encode, HostSurface, HostSurfaceMut, SurfaceLayout, TilingMode};

/// Shape of an image to create.
///
/// Pitches describe the caller's host data and must be zero when no data
/// is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub image_type: MemObjectType,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub row_pitch: usize,
    pub slice_pitch: usize,
}

impl ImageDesc {
    pub fn image_1d(width: usize) -> Self {
        Self::new(MemObjectType::Image1D, width, 1, 1)
    }

    pub fn image_2d(width: usize, height: usize) -> Self {
        Self::new(MemObjectType::Image2D, width, height, 1)
    }

    pub fn image_3d(width: usize, height: usize, depth: usize) -> Self {
        Self::new(MemObjectType::Image3D, width, height, depth)
    }

    fn new(image_type: MemObjectType, width: usize, height: usize, depth: usize) -> Self {
        Self {
            image_type,
            width,
            height,
            depth,
            row_pitch: 0,
            slice_pitch: 0,
        }
    }

    /// Builder pattern: set the host row pitch.
    pub fn with_row_pitch(mut self, pitch: usize) -> Self {
        self.row_pitch = pitch;
        self
    }

    /// Builder pattern: set the host slice pitch.
    pub fn with_slice_pitch(mut self, pitch: usize) -> Self {
        self.slice_pitch = pitch;
        self
    }
}

/// Validated dimensions plus the host pitches the upload reads with.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    width: usize,
    height: usize,
    depth: usize,
    row_pitch: usize,
    slice_pitch: usize,
    tiling: TilingMode,
}

impl Geometry {
    /// Bytes of host data the upload needs to see, `None` on overflow.
    fn host_extent(&self, bpp: usize) -> Option<usize> {
        let slices = self.slice_pitch.checked_mul(self.depth - 1)?;
        let rows = self.row_pitch.checked_mul(self.height - 1)?;
        slices.checked_add(rows)?.checked_add(self.width * bpp)
    }
}

fn validate_geometry(
    device: &DeviceInfo,
    desc: &ImageDesc,
    bpp: usize,
    has_data: bool,
) -> MemResult<Geometry> {
    let width = desc.width;
    let height = match desc.image_type {
        MemObjectType::Image1D => 1,
        _ => desc.height,
    };
    if width == 0 || height == 0 {
        return Err(MemError::InvalidImageSize);
    }

    // Device caps bound width, height and depth before any product is formed.
    let depth = match desc.image_type {
        MemObjectType::Image1D | MemObjectType::Image2D => {
            if width > device.image2d_max_width || height > device.image2d_max_height {
                return Err(MemError::InvalidImageSize);
            }
            1
        }
        MemObjectType::Image3D => {
            let depth = desc.depth;
            if width > device.image3d_max_width
                || height > device.image3d_max_height
                || depth == 0
                || depth > device.image3d_max_depth
            {
                return Err(MemError::InvalidImageSize);
            }
            depth
        }
        _ => return Err(MemError::InvalidValue),
    };

    let min_pitch = bpp * width;
    let row_pitch = if has_data && desc.row_pitch == 0 {
        min_pitch
    } else {
        desc.row_pitch
    };
    if has_data && row_pitch < min_pitch {
        return Err(MemError::InvalidImageSize);
    }
    if !has_data && row_pitch != 0 {
        return Err(MemError::InvalidImageSize);
    }

    let (slice_pitch, tiling) = match desc.image_type {
        MemObjectType::Image1D => (0, TilingMode::None),
        MemObjectType::Image2D => (0, device.image_tiling()),
        _ => {
            let min_slice_pitch = min_pitch * height;
            let slice_pitch = if has_data && desc.slice_pitch == 0 {
                min_slice_pitch
            } else {
                desc.slice_pitch
            };
            if has_data && slice_pitch < min_slice_pitch {
                return Err(MemError::InvalidImageSize);
            }
            if !has_data && slice_pitch != 0 {
                return Err(MemError::InvalidImageSize);
            }
            (slice_pitch, device.image_tiling())
        }
    };

    Ok(Geometry {
        width,
        height,
        depth,
        row_pitch,
        slice_pitch,
        tiling,
    })
}

/// Create an image.
///
/// 2D and 3D images are Y-tiled except on generation 6 hardware, where
/// they stay linear; 1D images are always linear. With
/// [`MemFlags::COPY_HOST_PTR`], `data` is uploaded through the tiling
/// transform slice by slice.
pub fn create_image(
    context: &Arc<Context>,
    flags: MemFlags,
    format: &ImageFormat,
    desc: &ImageDesc,
    data: Option<&[u8]>,
) -> MemResult<Arc<MemObject>> {
    match desc.image_type {
        MemObjectType::Image1D | MemObjectType::Image2D | MemObjectType::Image3D => {}
        MemObjectType::Buffer => return Err(MemError::InvalidValue),
        _ => return Err(MemError::NotSupported("image arrays and buffer-backed images")),
    }

    if flags.contains(MemFlags::COPY_HOST_PTR) != data.is_some() {
        return Err(MemError::InvalidHostPtr);
    }

    let formats = context.formats();
    let bpp = formats
        .bytes_per_pixel(format)
        .ok_or(MemError::InvalidImageFormatDescriptor)? as usize;
    let device_code = formats
        .device_code(format)
        .ok_or(MemError::InvalidImageFormatDescriptor)?;

    let geometry = validate_geometry(context.device(), desc, bpp, data.is_some())?;
    if let Some(data) = data {
        match geometry.host_extent(bpp) {
            Some(extent) if data.len() >= extent => {}
            _ => return Err(MemError::InvalidHostPtr),
        }
    }

    let layout = geometry
        .tiling
        .surface_layout(geometry.width, geometry.height, bpp);
    let size = layout
        .size()
        .checked_mul(geometry.depth)
        .ok_or(MemError::InvalidBufferSize)?;

    let mut allocation = allocate(
        context,
        flags,
        desc.image_type,
        size,
        geometry.tiling.is_tiled(),
    )?;

    if let Some(data) = data {
        upload(allocation.buffer_mut()?, &geometry, &layout, bpp, data)?;
    }

    allocation.into_object(Some(ImageInfo {
        width: geometry.width,
        height: geometry.height,
        depth: geometry.depth,
        row_pitch: layout.pitch,
        aligned_height: layout.aligned_height,
        slice_size: layout.size(),
        bytes_per_pixel: bpp,
        format: *format,
        device_code,
        tiling: geometry.tiling,
    }))
}

/// Transform every slice of `data` into the mapped backing buffer.
fn upload(
    buffer: &mut dyn BackingBuffer,
    geometry: &Geometry,
    layout: &SurfaceLayout,
    bpp: usize,
    data: &[u8],
) -> MemResult<()> {
    buffer.map(true)?;

    let slice = layout.size();
    let result = match buffer.mapped_bytes() {
        Some(bytes) => (0..geometry.depth).try_for_each(|z| {
            let src = HostSurface {
                data: &data[z * geometry.slice_pitch..],
                width: geometry.width,
                height: geometry.height,
                pitch: geometry.row_pitch,
                bpp,
            };
            encode(geometry.tiling, &src, &mut bytes[z * slice..(z + 1) * slice])
        }),
        None => Err(MemError::MapFailure),
    };

    buffer.unmap()?;
    result
}

impl MemObject {
    /// Copy the image back into host-linear `dst`.
    ///
    /// A zero `row_pitch` means tightly packed rows; a zero `slice_pitch`
    /// means `row_pitch * height`.
    pub fn read_image(&self, dst: &mut [u8], row_pitch: usize, slice_pitch: usize) -> MemResult<()> {
        let info = *self.image().ok_or(MemError::InvalidMemObject)?;
        let bpp = info.bytes_per_pixel;
        let row_bytes = info.width * bpp;

        let row_pitch = if row_pitch == 0 { row_bytes } else { row_pitch };
        let min_slice_pitch = row_pitch
            .checked_mul(info.height)
            .ok_or(MemError::InvalidValue)?;
        let slice_pitch = if slice_pitch == 0 {
            min_slice_pitch
        } else {
            slice_pitch
        };
        if row_pitch < row_bytes || slice_pitch < min_slice_pitch {
            return Err(MemError::InvalidValue);
        }

        let needed = slice_pitch
            .checked_mul(info.depth - 1)
            .and_then(|n| n.checked_add(min_slice_pitch - row_pitch + row_bytes))
            .ok_or(MemError::InvalidValue)?;
        if dst.len() < needed {
            return Err(MemError::InvalidValue);
        }

        self.with_mapped(|bytes| {
            (0..info.depth).try_for_each(|z| {
                let src = &bytes[z * info.slice_size..(z + 1) * info.slice_size];
                let mut surface = HostSurfaceMut {
                    data: &mut dst[z * slice_pitch..],
                    width: info.width,
                    height: info.height,
                    pitch: row_pitch,
                    bpp,
                };
                decode(info.tiling, src, &mut surface)
            })
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bufmgr::HostBufferManager;
    use crate::format::{ChannelOrder, ChannelType};

    const RGBA8: ImageFormat = ImageFormat::new(ChannelOrder::RGBA, ChannelType::UnormInt8);
    const R8: ImageFormat = ImageFormat::new(ChannelOrder::R, ChannelType::UnormInt8);

    fn context(device: DeviceInfo) -> Arc<Context> {
        Context::new(device, Arc::new(HostBufferManager::new()))
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 253) as u8).collect()
    }

    #[test]
    fn test_tiled_layout_without_data() {
        let ctx = context(DeviceInfo::gen7());
        let img = create_image(&ctx, MemFlags::READ_ONLY, &RGBA8, &ImageDesc::image_2d(10, 3), None)
            .unwrap();

        let info = img.image().unwrap();
        assert_eq!(info.tiling, TilingMode::TileY);
        assert_eq!(info.row_pitch, 128);
        assert_eq!(info.aligned_height, 32);
        assert_eq!(img.size(), 4096);
        assert_eq!(info.bytes_per_pixel, 4);
        assert_eq!(info.device_code, 0x0C7);
        assert_eq!(img.kind(), MemObjectType::Image2D);
        img.release().unwrap();
    }

    #[test]
    fn test_gen6_is_linear() {
        let ctx = context(DeviceInfo::gen6());
        let img = create_image(&ctx, MemFlags::empty(), &RGBA8, &ImageDesc::image_2d(10, 3), None)
            .unwrap();

        let info = img.image().unwrap();
        assert_eq!(info.tiling, TilingMode::None);
        assert_eq!((info.row_pitch, info.aligned_height), (40, 3));
        assert_eq!(img.size(), 120);
        img.release().unwrap();
    }

    #[test]
    fn test_zero_dimensions() {
        let ctx = context(DeviceInfo::gen7());
        let descs = [
            ImageDesc::image_2d(0, 4),
            ImageDesc::image_2d(4, 0),
            ImageDesc::image_3d(0, 4, 2),
            ImageDesc::image_3d(4, 0, 2),
            ImageDesc::image_3d(4, 4, 0),
        ];
        for desc in descs {
            let err = create_image(&ctx, MemFlags::empty(), &RGBA8, &desc, None).unwrap_err();
            assert_eq!(err, MemError::InvalidImageSize, "{:?}", desc);
        }
        assert_eq!(ctx.object_count(), 0);
    }

    #[test]
    fn test_pitch_rules() {
        let ctx = context(DeviceInfo::gen7());
        let data = vec![0u8; 4096];

        let short = ImageDesc::image_2d(8, 4).with_row_pitch(31);
        let err = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &short, Some(&data));
        assert_eq!(err.unwrap_err(), MemError::InvalidImageSize);

        let pitch_without_data = ImageDesc::image_2d(8, 4).with_row_pitch(32);
        let err = create_image(&ctx, MemFlags::empty(), &RGBA8, &pitch_without_data, None);
        assert_eq!(err.unwrap_err(), MemError::InvalidImageSize);

        let slice_without_data = ImageDesc::image_3d(8, 4, 2).with_slice_pitch(128);
        let err = create_image(&ctx, MemFlags::empty(), &RGBA8, &slice_without_data, None);
        assert_eq!(err.unwrap_err(), MemError::InvalidImageSize);

        let short_slice = ImageDesc::image_3d(8, 4, 2).with_slice_pitch(127);
        let err = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &short_slice, Some(&data));
        assert_eq!(err.unwrap_err(), MemError::InvalidImageSize);
    }

    #[test]
    fn test_device_limits() {
        let device = DeviceInfo::gen7().with_image2d_max(16, 16).with_image3d_max(8, 8, 4);
        let ctx = context(device);

        for desc in [
            ImageDesc::image_2d(17, 1),
            ImageDesc::image_2d(1, 17),
            ImageDesc::image_3d(9, 1, 1),
            ImageDesc::image_3d(1, 1, 5),
            ImageDesc::image_1d(17),
        ] {
            let err = create_image(&ctx, MemFlags::empty(), &RGBA8, &desc, None).unwrap_err();
            assert_eq!(err, MemError::InvalidImageSize, "{:?}", desc);
        }
    }

    #[test]
    fn test_overflowing_sizes_are_rejected() {
        let ctx = context(DeviceInfo::gen7());

        for desc in [
            ImageDesc::image_2d(usize::MAX / 2, 1),
            ImageDesc::image_3d(usize::MAX / 2, 1, 1),
            ImageDesc::image_1d(usize::MAX),
        ] {
            let err = create_image(&ctx, MemFlags::empty(), &RGBA8, &desc, None).unwrap_err();
            assert_eq!(err, MemError::InvalidImageSize, "{:?}", desc);
        }

        let data = vec![0u8; 64];
        let huge_rows = ImageDesc::image_2d(4, 2).with_row_pitch(usize::MAX);
        let err = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &huge_rows, Some(&data));
        assert_eq!(err.unwrap_err(), MemError::InvalidHostPtr);

        let huge_slices = ImageDesc::image_3d(4, 2, 2).with_slice_pitch(usize::MAX);
        let err = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &huge_slices, Some(&data));
        assert_eq!(err.unwrap_err(), MemError::InvalidHostPtr);
        assert_eq!(ctx.object_count(), 0);
    }

    #[test]
    fn test_huge_pitch_on_single_row() {
        let ctx = context(DeviceInfo::gen7());
        let data = pattern(16);
        let desc = ImageDesc::image_2d(4, 1).with_row_pitch(usize::MAX);

        let img = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &desc, Some(&data)).unwrap();
        let mut back = [0u8; 16];
        img.read_image(&mut back, 0, 0).unwrap();
        assert_eq!(&back[..], &data[..]);
        img.release().unwrap();
    }

    #[test]
    fn test_3d_default_slice_pitch_ignores_row_padding() {
        let ctx = context(DeviceInfo::gen7());
        let (w, h, d, pitch) = (4, 2, 2, 24);
        let row = w * 4;
        // Slices start every `row * h` bytes even though rows are padded
        let data = pattern(row * h + pitch + row);
        let desc = ImageDesc::image_3d(w, h, d).with_row_pitch(pitch);

        let img = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &desc, Some(&data)).unwrap();
        let mut back = vec![0u8; row * h * d];
        img.read_image(&mut back, 0, 0).unwrap();

        assert_eq!(&back[0..16], &data[0..16]);
        assert_eq!(&back[16..32], &data[24..40]);
        assert_eq!(&back[32..48], &data[32..48]);
        assert_eq!(&back[48..64], &data[56..72]);

        assert_eq!(img.read_image(&mut back, usize::MAX, 0), Err(MemError::InvalidValue));
        assert_eq!(img.read_image(&mut back, 0, usize::MAX), Err(MemError::InvalidValue));
        img.release().unwrap();

        // One byte short of the last row of the last slice
        let short = &data[..data.len() - 1];
        let err = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &desc, Some(short));
        assert_eq!(err.unwrap_err(), MemError::InvalidHostPtr);
    }

    #[test]
    fn test_format_validation() {
        let ctx = context(DeviceInfo::gen7());
        let desc = ImageDesc::image_2d(4, 4);

        let no_size = ImageFormat::new(ChannelOrder::RGB, ChannelType::Float);
        let no_code = ImageFormat::new(ChannelOrder::Luminance, ChannelType::UnormInt8);
        for format in [no_size, no_code] {
            let err = create_image(&ctx, MemFlags::empty(), &format, &desc, None).unwrap_err();
            assert_eq!(err, MemError::InvalidImageFormatDescriptor);
        }
    }

    #[test]
    fn test_unsupported_types() {
        let ctx = context(DeviceInfo::gen7());
        let mut desc = ImageDesc::image_2d(4, 4);

        desc.image_type = MemObjectType::Image2DArray;
        let err = create_image(&ctx, MemFlags::empty(), &RGBA8, &desc, None).unwrap_err();
        assert!(matches!(err, MemError::NotSupported(_)));

        desc.image_type = MemObjectType::Buffer;
        let err = create_image(&ctx, MemFlags::empty(), &RGBA8, &desc, None).unwrap_err();
        assert_eq!(err, MemError::InvalidValue);
    }

    #[test]
    fn test_host_data_consistency() {
        let ctx = context(DeviceInfo::gen7());
        let desc = ImageDesc::image_2d(4, 4);
        let data = vec![0u8; 63];

        let err = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &desc, None).unwrap_err();
        assert_eq!(err, MemError::InvalidHostPtr);

        let err = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &desc, Some(&data)).unwrap_err();
        assert_eq!(err, MemError::InvalidHostPtr);
    }

    #[test]
    fn test_upload_uses_tiled_layout() {
        let ctx = context(DeviceInfo::gen7());
        let (w, h, pitch) = (40, 5, 168);
        let data = pattern(pitch * h);
        let desc = ImageDesc::image_2d(w, h).with_row_pitch(pitch);

        let img = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &desc, Some(&data)).unwrap();
        let info = *img.image().unwrap();
        let layout = info.tiling.surface_layout(w, h, 4);
        assert_eq!(info.row_pitch, 256);

        img.with_mapped(|bytes| {
            for y in 0..h {
                for x in (0..w * 4).step_by(7) {
                    assert_eq!(bytes[layout.offset_of(x, y)], data[y * pitch + x]);
                }
            }
        })
        .unwrap();

        let mut back = vec![0u8; w * 4 * h];
        img.read_image(&mut back, 0, 0).unwrap();
        for y in 0..h {
            assert_eq!(back[y * w * 4..(y + 1) * w * 4], data[y * pitch..y * pitch + w * 4]);
        }
        img.release().unwrap();
    }

    #[test]
    fn test_3d_slices_are_tiled_independently() {
        let ctx = context(DeviceInfo::gen75());
        let (w, h, d) = (9, 33, 3);
        let row = w * 4;
        let slice_pitch = row * h + 20;
        let data = pattern(slice_pitch * d);
        let desc = ImageDesc::image_3d(w, h, d).with_slice_pitch(slice_pitch);

        let img = create_image(&ctx, MemFlags::COPY_HOST_PTR, &RGBA8, &desc, Some(&data)).unwrap();
        let info = *img.image().unwrap();
        assert_eq!(info.slice_size, 128 * 64);
        assert_eq!(img.size(), 128 * 64 * 3);

        let mut back = vec![0u8; row * h * d];
        img.read_image(&mut back, 0, 0).unwrap();
        for z in 0..d {
            for y in 0..h {
                let got = &back[z * row * h + y * row..][..row];
                let want = &data[z * slice_pitch + y * row..][..row];
                assert_eq!(got, want, "slice {} row {}", z, y);
            }
        }
        img.release().unwrap();
    }

    #[test]
    fn test_linear_upload_on_gen6() {
        let ctx = context(DeviceInfo::gen6());
        let data = pattern(6 * 2);
        let desc = ImageDesc::image_2d(3, 2).with_row_pitch(6);

        let img = create_image(&ctx, MemFlags::COPY_HOST_PTR, &R8, &desc, Some(&data)).unwrap();
        let mut raw = [0u8; 6];
        img.read(0, &mut raw).unwrap();
        assert_eq!(raw, [data[0], data[1], data[2], data[6], data[7], data[8]]);
        img.release().unwrap();
    }

    #[test]
    fn test_image_1d() {
        let ctx = context(DeviceInfo::gen7());
        let data = pattern(64);
        let img = create_image(
            &ctx,
            MemFlags::COPY_HOST_PTR,
            &RGBA8,
            &ImageDesc::image_1d(16),
            Some(&data),
        )
        .unwrap();

        let info = img.image().unwrap();
        assert_eq!(info.tiling, TilingMode::None);
        assert_eq!((info.height, info.depth), (1, 1));
        assert_eq!(img.size(), 64);

        let mut back = [0u8; 64];
        img.read(0, &mut back).unwrap();
        assert_eq!(&back[..], &data[..]);
        img.release().unwrap();
    }

    #[test]
    fn test_read_image_on_buffer() {
        let ctx = context(DeviceInfo::gen7());
        let buf = crate::buffer::create_buffer(&ctx, MemFlags::empty(), 16, None).unwrap();
        let mut out = [0u8; 16];
        assert_eq!(buf.read_image(&mut out, 0, 0), Err(MemError::InvalidMemObject));
        buf.release().unwrap();
    }
}
