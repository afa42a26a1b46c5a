//! Marshaling of clipboard data across the process boundary.
//!
//! Most formats are plain memory blocks and travel as they are. Bitmaps, palettes and metafiles
//! are graphics objects known by a process-local handle: they are flattened into bytes through the
//! graphics subsystem before a put, and registered back with it after a get.

use bytes::{Buf, BufMut};

use crate::format::Format;
use crate::gdi::{fetch_bits, BitsKind, GdiHandle, Graphics};

/// Size of the flattened bitmap header.
pub const BITMAP_HEADER_SIZE: usize = 32;

/// Size of the flattened palette header.
pub const PALETTE_HEADER_SIZE: usize = 4;

/// Size of one flattened palette entry.
pub const PALETTE_ENTRY_SIZE: usize = 4;

/// Size of the flattened metafile picture header.
pub const METAFILE_PICT_SIZE: usize = 16;

/// Palette version written into flattened palettes.
const PALETTE_VERSION: u16 = 0x300;

/// Clipboard data as the owning process sees it.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum ClipboardData {
    /// A plain memory block.
    Bytes(Vec<u8>),
    /// A device-dependent bitmap ([`Format::BITMAP`], [`Format::DSPBITMAP`]).
    Bitmap(GdiHandle),
    /// A palette ([`Format::PALETTE`]).
    Palette(GdiHandle),
    /// An enhanced metafile ([`Format::ENHMETAFILE`], [`Format::DSPENHMETAFILE`]).
    EnhMetafile(GdiHandle),
    /// A legacy metafile picture ([`Format::METAFILEPICT`], [`Format::DSPMETAFILEPICT`]).
    MetafilePict(MetafilePict),
}

impl ClipboardData {
    /// Creates wide text data, terminated by a null character.
    pub fn unicode_text(text: &str) -> Self {
        let mut data: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        data.extend_from_slice(&[0, 0]);
        ClipboardData::Bytes(data)
    }

    /// Returns the memory block, if this is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ClipboardData::Bytes(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the graphics object handle, if this is one.
    pub fn handle(&self) -> Option<GdiHandle> {
        match self {
            ClipboardData::Bitmap(handle)
            | ClipboardData::Palette(handle)
            | ClipboardData::EnhMetafile(handle) => Some(*handle),
            ClipboardData::MetafilePict(pict) => pict.hmf,
            ClipboardData::Bytes(_) => None,
        }
    }
}

/// The header of a device-dependent bitmap.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Hash)]
pub struct BitmapHeader {
    pub bm_type: i32,
    pub width: i32,
    pub height: i32,
    pub width_bytes: i32,
    pub planes: u16,
    pub bits_pixel: u16,
    /// Address of pixel memory owned by someone else; 0 when the bitmap owns its pixels.
    pub bits: u64,
}

impl BitmapHeader {
    /// Creates the header of a bitmap that owns its pixels.
    pub fn new(width: i32, height: i32, bits_pixel: u16) -> Self {
        Self {
            bm_type: 0,
            width,
            height,
            width_bytes: row_bytes(width, bits_pixel) as i32,
            planes: 1,
            bits_pixel,
            bits: 0,
        }
    }

    pub fn parse(mut data: &[u8]) -> Option<Self> {
        if data.len() < BITMAP_HEADER_SIZE {
            return None;
        }

        let bm_type = data.get_i32_le();
        let width = data.get_i32_le();
        let height = data.get_i32_le();
        let width_bytes = data.get_i32_le();
        let planes = data.get_u16_le();
        let bits_pixel = data.get_u16_le();
        // Padding before the pointer-sized `bits`.
        data.advance(4);
        let bits = data.get_u64_le();

        Some(Self {
            bm_type,
            width,
            height,
            width_bytes,
            planes,
            bits_pixel,
            bits,
        })
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.bm_type);
        buf.put_i32_le(self.width);
        buf.put_i32_le(self.height);
        buf.put_i32_le(self.width_bytes);
        buf.put_u16_le(self.planes);
        buf.put_u16_le(self.bits_pixel);
        buf.put_u32_le(0);
        buf.put_u64_le(self.bits);
    }

    /// Size of the pixel rows, each padded to 2 bytes.
    pub fn bits_size(&self) -> usize {
        row_bytes(self.width, self.bits_pixel) * self.height.unsigned_abs() as usize
    }
}

/// Size of one device-dependent bitmap row, padded to 2 bytes.
pub fn row_bytes(width: i32, bits_pixel: u16) -> usize {
    ((width.unsigned_abs() as usize * bits_pixel as usize + 15) >> 3) & !1
}

/// A legacy metafile picture: the metafile plus how to map it.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Hash)]
pub struct MetafilePict {
    /// Mapping mode.
    pub mm: i32,
    pub x_ext: i32,
    pub y_ext: i32,
    /// The metafile.
    pub hmf: Option<GdiHandle>,
}

impl MetafilePict {
    pub fn parse(mut data: &[u8]) -> Option<Self> {
        if data.len() < METAFILE_PICT_SIZE {
            return None;
        }

        Some(Self {
            mm: data.get_i32_le(),
            x_ext: data.get_i32_le(),
            y_ext: data.get_i32_le(),
            hmf: GdiHandle::new(data.get_u32_le()),
        })
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.mm);
        buf.put_i32_le(self.x_ext);
        buf.put_i32_le(self.y_ext);
        buf.put_u32_le(self.hmf.map_or(0, GdiHandle::get));
    }
}

/// Errors that can occur when marshaling clipboard data.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("{0} data must be given as {1}")]
    Mismatch(Format, &'static str),

    #[error("Empty data cannot be put")]
    Empty,

    #[error("{0} bytes of data do not fit the wire size")]
    TooLarge(usize),

    #[error("The graphics object {0:?} has no {1:?} representation")]
    ObjectUnavailable(GdiHandle, BitsKind),

    #[error("Malformed {format} payload: {reason}")]
    Malformed {
        format: Format,
        reason: &'static str,
    },

    #[error("{0} payloads cannot be transferred between processes")]
    UnsupportedCrossProcess(Format),

    #[error("The graphics subsystem refused the {0} payload")]
    Reconstruct(Format),
}

impl Error {
    fn malformed(format: Format, reason: &'static str) -> Self {
        Error::Malformed { format, reason }
    }
}

/// Flattens `data` for a put of `format`.
pub fn encode<G: Graphics + ?Sized>(
    graphics: &G,
    format: Format,
    data: &ClipboardData,
) -> Result<Vec<u8>, Error> {
    let bytes = match (format, data) {
        (Format::BITMAP | Format::DSPBITMAP, ClipboardData::Bitmap(handle)) => {
            let header = fetch_bits(graphics, BitsKind::BitmapHeader, *handle)
                .ok_or(Error::ObjectUnavailable(*handle, BitsKind::BitmapHeader))?;
            let bitmap = BitmapHeader::parse(&header)
                .ok_or(Error::ObjectUnavailable(*handle, BitsKind::BitmapHeader))?;

            let size = bitmap.bits_size();
            let mut out = Vec::with_capacity(BITMAP_HEADER_SIZE + size);
            bitmap.write(&mut out);
            out.resize(BITMAP_HEADER_SIZE + size, 0);
            if !graphics.extract_bits(BitsKind::BitmapBits, *handle, &mut out[BITMAP_HEADER_SIZE..])
            {
                return Err(Error::ObjectUnavailable(*handle, BitsKind::BitmapBits));
            }
            out
        }
        (Format::BITMAP | Format::DSPBITMAP, _) => return Err(Error::Mismatch(format, "a bitmap")),

        (Format::PALETTE, ClipboardData::Palette(handle)) => {
            let entries = fetch_bits(graphics, BitsKind::Palette, *handle)
                .ok_or(Error::ObjectUnavailable(*handle, BitsKind::Palette))?;
            let count = u16::try_from(entries.len() / PALETTE_ENTRY_SIZE)
                .map_err(|_| Error::TooLarge(entries.len()))?;

            let mut out = Vec::with_capacity(PALETTE_HEADER_SIZE + entries.len());
            out.put_u16_le(PALETTE_VERSION);
            out.put_u16_le(count);
            out.put_slice(&entries[..count as usize * PALETTE_ENTRY_SIZE]);
            out
        }
        (Format::PALETTE, _) => return Err(Error::Mismatch(format, "a palette")),

        (Format::ENHMETAFILE | Format::DSPENHMETAFILE, ClipboardData::EnhMetafile(handle)) => {
            fetch_bits(graphics, BitsKind::EnhMetafile, *handle)
                .ok_or(Error::ObjectUnavailable(*handle, BitsKind::EnhMetafile))?
        }
        (Format::ENHMETAFILE | Format::DSPENHMETAFILE, _) => {
            return Err(Error::Mismatch(format, "an enhanced metafile"))
        }

        (Format::METAFILEPICT | Format::DSPMETAFILEPICT, ClipboardData::MetafilePict(pict)) => {
            let hmf = pict.hmf.ok_or(Error::malformed(format, "no metafile"))?;
            let bits = fetch_bits(graphics, BitsKind::Metafile, hmf)
                .ok_or(Error::ObjectUnavailable(hmf, BitsKind::Metafile))?;

            let mut out = Vec::with_capacity(METAFILE_PICT_SIZE + bits.len());
            pict.write(&mut out);
            out.put_slice(&bits);
            out
        }
        (Format::METAFILEPICT | Format::DSPMETAFILEPICT, _) => {
            return Err(Error::Mismatch(format, "a metafile picture"))
        }

        (_, ClipboardData::Bytes(data)) => {
            if data.is_empty() {
                return Err(Error::Empty);
            }
            data.clone()
        }
        (_, _) => return Err(Error::Mismatch(format, "a memory block")),
    };

    if u32::try_from(bytes.len()).is_err() {
        return Err(Error::TooLarge(bytes.len()));
    }

    Ok(bytes)
}

/// Rebuilds the data of `format` from a received payload.
pub fn decode<G: Graphics + ?Sized>(
    graphics: &mut G,
    format: Format,
    data: Vec<u8>,
) -> Result<ClipboardData, Error> {
    match format {
        Format::BITMAP => {
            let header = BitmapHeader::parse(&data)
                .ok_or(Error::malformed(format, "truncated header"))?;

            let bits_size = usize::try_from(header.width_bytes)
                .ok()
                .and_then(|width| width.checked_mul(header.height.unsigned_abs() as usize))
                .ok_or(Error::malformed(format, "invalid row size"))?;
            if data.len() - BITMAP_HEADER_SIZE < bits_size {
                return Err(Error::malformed(format, "truncated bits"));
            }

            if header.bits != 0 {
                return Err(Error::UnsupportedCrossProcess(format));
            }

            graphics
                .reconstruct(BitsKind::BitmapBits, &data)
                .map(ClipboardData::Bitmap)
                .ok_or(Error::Reconstruct(format))
        }
        Format::DSPBITMAP => Err(Error::UnsupportedCrossProcess(format)),
        Format::PALETTE => {
            let count = match data.get(2..PALETTE_HEADER_SIZE) {
                Some(mut count) => count.get_u16_le() as usize,
                None => return Err(Error::malformed(format, "truncated header")),
            };

            let size = PALETTE_HEADER_SIZE + count * PALETTE_ENTRY_SIZE;
            if data.len() < size {
                return Err(Error::malformed(format, "truncated entries"));
            }

            graphics
                .reconstruct(BitsKind::Palette, &data[..size])
                .map(ClipboardData::Palette)
                .ok_or(Error::Reconstruct(format))
        }
        Format::ENHMETAFILE | Format::DSPENHMETAFILE => graphics
            .reconstruct(BitsKind::EnhMetafile, &data)
            .map(ClipboardData::EnhMetafile)
            .ok_or(Error::Reconstruct(format)),
        Format::METAFILEPICT | Format::DSPMETAFILEPICT => {
            if data.len() <= METAFILE_PICT_SIZE {
                return Err(Error::malformed(format, "no metafile bits"));
            }

            let mut pict = MetafilePict::parse(&data)
                .ok_or(Error::malformed(format, "truncated header"))?;
            pict.hmf = Some(
                graphics
                    .reconstruct(BitsKind::Metafile, &data[METAFILE_PICT_SIZE..])
                    .ok_or(Error::Reconstruct(format))?,
            );
            Ok(ClipboardData::MetafilePict(pict))
        }
        _ => Ok(ClipboardData::Bytes(data)),
    }
}
