//! Image formats and the device format catalog.

/// Component layout of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    R,
    A,
    RG,
    RA,
    RGB,
    RGBA,
    BGRA,
    ARGB,
    Intensity,
    Luminance,
}

/// Storage type of each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    SnormInt8,
    SnormInt16,
    UnormInt8,
    UnormInt16,
    UnormShort565,
    UnormShort555,
    UnormInt101010,
    SignedInt8,
    SignedInt16,
    SignedInt32,
    UnsignedInt8,
    UnsignedInt16,
    UnsignedInt32,
    HalfFloat,
    Float,
}

impl ChannelType {
    /// Bytes per component, or `None` for packed types.
    fn component_size(self) -> Option<u32> {
        use ChannelType::*;
        match self {
            SnormInt8 | UnormInt8 | SignedInt8 | UnsignedInt8 => Some(1),
            SnormInt16 | UnormInt16 | SignedInt16 | UnsignedInt16 | HalfFloat => Some(2),
            SignedInt32 | UnsignedInt32 | Float => Some(4),
            UnormShort565 | UnormShort555 | UnormInt101010 => None,
        }
    }

    fn is_8bit(self) -> bool {
        self.component_size() == Some(1)
    }

    fn is_normalized_or_float(self) -> bool {
        use ChannelType::*;
        matches!(
            self,
            SnormInt8 | SnormInt16 | UnormInt8 | UnormInt16 | HalfFloat | Float
        )
    }
}

/// An image format: channel order plus channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFormat {
    pub order: ChannelOrder,
    pub data_type: ChannelType,
}

impl ImageFormat {
    pub const fn new(order: ChannelOrder, data_type: ChannelType) -> Self {
        Self { order, data_type }
    }
}

/// Maps image formats to pixel sizes and device surface codes.
pub trait FormatCatalog: Send + Sync {
    /// Size of one pixel in bytes, or `None` if the combination is
    /// meaningless.
    fn bytes_per_pixel(&self, format: &ImageFormat) -> Option<u32>;

    /// Device surface format code, or `None` if the device cannot sample
    /// this format.
    fn device_code(&self, format: &ImageFormat) -> Option<u32>;
}

/// The format catalog of the supported Intel GPUs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFormats;

impl FormatCatalog for StandardFormats {
    fn bytes_per_pixel(&self, format: &ImageFormat) -> Option<u32> {
        use ChannelOrder::*;
        use ChannelType::*;

        let ty = format.data_type;
        match format.order {
            R | A => ty.component_size(),
            Intensity | Luminance => {
                if ty.is_normalized_or_float() {
                    ty.component_size()
                } else {
                    None
                }
            }
            RG | RA => ty.component_size().map(|s| s * 2),
            RGB => match ty {
                UnormShort565 | UnormShort555 => Some(2),
                UnormInt101010 => Some(4),
                _ => None,
            },
            RGBA => ty.component_size().map(|s| s * 4),
            BGRA | ARGB => {
                if ty.is_8bit() {
                    Some(4)
                } else {
                    None
                }
            }
        }
    }

    fn device_code(&self, format: &ImageFormat) -> Option<u32> {
        use ChannelOrder::*;
        use ChannelType::*;

        let code = match (format.order, format.data_type) {
            (RGBA, Float) => 0x000,
            (RGBA, SignedInt32) => 0x001,
            (RGBA, UnsignedInt32) => 0x002,
            (RGBA, UnormInt16) => 0x080,
            (RGBA, SnormInt16) => 0x081,
            (RGBA, SignedInt16) => 0x082,
            (RGBA, UnsignedInt16) => 0x083,
            (RGBA, HalfFloat) => 0x084,
            (RG, Float) => 0x085,
            (RG, SignedInt32) => 0x086,
            (RG, UnsignedInt32) => 0x087,
            (BGRA, UnormInt8) => 0x0C0,
            (RGBA, UnormInt8) => 0x0C7,
            (RGBA, SnormInt8) => 0x0C9,
            (RGBA, SignedInt8) => 0x0CA,
            (RGBA, UnsignedInt8) => 0x0CB,
            (RG, UnormInt16) => 0x0CC,
            (RG, SnormInt16) => 0x0CD,
            (RG, SignedInt16) => 0x0CE,
            (RG, UnsignedInt16) => 0x0CF,
            (RG, HalfFloat) => 0x0D0,
            (R, SignedInt32) => 0x0D6,
            (R, UnsignedInt32) => 0x0D7,
            (R, Float) => 0x0D8,
            (RG, UnormInt8) => 0x106,
            (RG, SnormInt8) => 0x107,
            (RG, SignedInt8) => 0x108,
            (RG, UnsignedInt8) => 0x109,
            (R, UnormInt16) => 0x10A,
            (R, SnormInt16) => 0x10B,
            (R, SignedInt16) => 0x10C,
            (R, UnsignedInt16) => 0x10D,
            (R, HalfFloat) => 0x10E,
            (R, UnormInt8) => 0x140,
            (R, SnormInt8) => 0x141,
            (R, SignedInt8) => 0x142,
            (R, UnsignedInt8) => 0x143,
            _ => return None,
        };
        Some(code)
    }
}
