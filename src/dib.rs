//! Packed device-independent bitmaps.
//!
//! A packed DIB is an info header (40 bytes for the legacy layout, 124 bytes for the v5 layout),
//! optionally followed by three colour masks, then the colour table, then the pixel rows, bottom
//! row first unless the height is negative.

use bytes::{Buf, BufMut};

/// Size of the legacy info header.
pub const INFO_HEADER_SIZE: usize = 40;

/// Size of the v5 info header.
pub const V5_HEADER_SIZE: usize = 124;

/// Size of the old core header, which is not supported.
const CORE_HEADER_SIZE: usize = 12;

/// Uncompressed pixels.
pub const BI_RGB: u32 = 0;

/// Uncompressed pixels described by three colour masks.
pub const BI_BITFIELDS: u32 = 3;

/// sRGB colour space tag of the v5 header.
const LCS_SRGB: u32 = 0x7352_4742;

/// Offset of the colour space tag in the v5 header.
const V5_CS_TYPE_OFFSET: usize = 56;

/// Offset of the rendering intent in the v5 header.
const V5_INTENT_OFFSET: usize = 108;

/// Pictures rendering intent of the v5 header.
const LCS_GM_IMAGES: u32 = 4;

/// The fields of the legacy info header, shared by the v5 layout.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct DibHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

impl DibHeader {
    /// Creates a header for uncompressed pixels, bottom row first.
    pub fn new(width: i32, height: i32, bit_count: u16) -> Self {
        let size_image = row_stride(width, bit_count) * height.unsigned_abs() as usize;
        Self {
            size: INFO_HEADER_SIZE as u32,
            width,
            height,
            planes: 1,
            bit_count,
            compression: BI_RGB,
            size_image: size_image as u32,
            ..Default::default()
        }
    }

    /// Parses the info header at the start of a packed DIB.
    ///
    /// Returns `None` for buffers shorter than the header they claim and for core headers.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < INFO_HEADER_SIZE {
            return None;
        }

        let mut buf = data;
        let header = DibHeader {
            size: buf.get_u32_le(),
            width: buf.get_i32_le(),
            height: buf.get_i32_le(),
            planes: buf.get_u16_le(),
            bit_count: buf.get_u16_le(),
            compression: buf.get_u32_le(),
            size_image: buf.get_u32_le(),
            x_pels_per_meter: buf.get_i32_le(),
            y_pels_per_meter: buf.get_i32_le(),
            clr_used: buf.get_u32_le(),
            clr_important: buf.get_u32_le(),
        };

        let size = header.size as usize;
        if size == CORE_HEADER_SIZE || size < INFO_HEADER_SIZE || size > data.len() {
            return None;
        }

        Some(header)
    }

    /// Number of colour table entries.
    pub fn colors(&self) -> usize {
        if self.clr_used != 0 {
            return (self.clr_used as usize).min(256);
        }
        if self.bit_count <= 8 {
            1 << self.bit_count
        } else {
            0
        }
    }

    /// Size of the header plus the colour masks, if the pixels are described by masks.
    pub fn header_and_masks_size(&self) -> usize {
        let masks = if self.compression == BI_BITFIELDS { 3 * 4 } else { 0 };
        (self.size as usize).max(INFO_HEADER_SIZE + masks)
    }

    /// Size of everything that precedes the pixel rows.
    pub fn info_size(&self) -> usize {
        self.header_and_masks_size() + self.colors() * 4
    }

    /// Size of the pixel rows.
    pub fn bits_size(&self) -> usize {
        row_stride(self.width, self.bit_count) * self.height.unsigned_abs() as usize
    }

    /// Writes the header in the legacy or the v5 layout.
    ///
    /// The v5 layout is tagged as sRGB with no masks.
    pub fn write(&self, v5: bool, buf: &mut impl BufMut) {
        let size = if v5 { V5_HEADER_SIZE } else { INFO_HEADER_SIZE };

        let mut header = Vec::with_capacity(size);
        header.put_u32_le(size as u32);
        header.put_i32_le(self.width);
        header.put_i32_le(self.height);
        header.put_u16_le(self.planes);
        header.put_u16_le(self.bit_count);
        header.put_u32_le(self.compression);
        header.put_u32_le(self.size_image);
        header.put_i32_le(self.x_pels_per_meter);
        header.put_i32_le(self.y_pels_per_meter);
        header.put_u32_le(self.clr_used);
        header.put_u32_le(self.clr_important);

        if v5 {
            header.resize(V5_HEADER_SIZE, 0);
            header[V5_CS_TYPE_OFFSET..V5_CS_TYPE_OFFSET + 4].copy_from_slice(&LCS_SRGB.to_le_bytes());
            header[V5_INTENT_OFFSET..V5_INTENT_OFFSET + 4]
                .copy_from_slice(&LCS_GM_IMAGES.to_le_bytes());
        }

        buf.put_slice(&header);
    }
}

/// Size of one pixel row, padded to 4 bytes.
pub fn row_stride(width: i32, bit_count: u16) -> usize {
    (width.unsigned_abs() as usize * bit_count as usize).div_ceil(32) * 4
}

/// Rewrites a packed DIB with the legacy or the v5 header layout.
///
/// The fields the two layouts share are kept, the colour masks stay right after the fixed
/// header, and the colour table and pixel rows are copied as they are. Returns `None` if the
/// source header cannot be parsed or nothing follows the colour table.
pub fn convert_header(src: &[u8], v5: bool) -> Option<Vec<u8>> {
    let header = DibHeader::parse(src)?;

    let info_size = header.info_size();
    if src.len() <= info_size {
        return None;
    }

    let masks = if header.compression == BI_BITFIELDS { 3 * 4 } else { 0 };
    let src_fixed = header.header_and_masks_size();
    let dst_fixed = if v5 {
        V5_HEADER_SIZE
    } else {
        INFO_HEADER_SIZE + masks
    };

    let colors = &src[src_fixed..info_size];
    let bits = &src[info_size..];

    let mut out = vec![0; dst_fixed];
    let copied = dst_fixed.min(src_fixed);
    out[..copied].copy_from_slice(&src[..copied]);

    let size = if v5 { V5_HEADER_SIZE } else { INFO_HEADER_SIZE } as u32;
    out[..4].copy_from_slice(&size.to_le_bytes());

    out.reserve(colors.len() + bits.len());
    out.extend_from_slice(colors);
    out.extend_from_slice(bits);
    Some(out)
}
