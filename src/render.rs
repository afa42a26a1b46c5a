//! Conversions producing a derivable format from the format it was planned from.
//!
//! [`Clipboard::get`](crate::clipboard::Clipboard::get) fetches the source, runs [`convert`] and
//! publishes the result under the target format.

use bytes::Buf;

use crate::codec::{ClipboardData, MetafilePict};
use crate::codepage::{format_code_page, wide_from_bytes, wide_to_bytes, CodePage, Lcid};
use crate::dib;
use crate::format::Format;
use crate::gdi::{fetch_bits, BitsKind, Graphics};

/// Mapping mode of metafile pictures rendered from enhanced metafiles.
pub const MM_ISOTROPIC: i32 = 7;

/// How narrow text is interpreted.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct TextSettings {
    /// The clipboard locale.
    pub locale: Lcid,
    /// (ANSI, OEM) code pages for locales without known code pages.
    pub default_code_pages: (CodePage, CodePage),
}

impl TextSettings {
    fn code_page(&self, format: Format) -> CodePage {
        format_code_page(self.locale, format, self.default_code_pages)
    }
}

/// Errors that can occur when converting between formats.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("{target} cannot be derived from {from}")]
    Unsupported { target: Format, from: Format },

    #[error("{0} data has an unexpected shape")]
    Shape(Format),

    #[error("Malformed {0} data")]
    Malformed(Format),

    #[error("The graphics subsystem couldn't produce {0}")]
    Graphics(Format),
}

/// Converts `data` of format `from` into format `target`.
pub fn convert<G: Graphics + ?Sized>(
    graphics: &mut G,
    target: Format,
    from: Format,
    data: &ClipboardData,
    text: &TextSettings,
) -> Result<ClipboardData, Error> {
    match (target, from) {
        (Format::TEXT | Format::OEMTEXT, Format::UNICODETEXT) => {
            let wide = wide_from_bytes(bytes(from, data)?);
            Ok(ClipboardData::Bytes(text.code_page(target).from_wide(&wide)))
        }
        (Format::TEXT | Format::OEMTEXT, Format::TEXT | Format::OEMTEXT) => {
            let wide = text.code_page(from).to_wide(bytes(from, data)?);
            Ok(ClipboardData::Bytes(text.code_page(target).from_wide(&wide)))
        }
        (Format::UNICODETEXT, Format::TEXT | Format::OEMTEXT) => {
            let wide = text.code_page(from).to_wide(bytes(from, data)?);
            Ok(ClipboardData::Bytes(wide_to_bytes(&wide)))
        }

        (Format::BITMAP, Format::DIB | Format::DIBV5) => {
            let packed = bytes(from, data)?;
            dib::DibHeader::parse(packed).ok_or(Error::Malformed(from))?;

            let kind = if from == Format::DIBV5 {
                BitsKind::DibV5
            } else {
                BitsKind::Dib
            };
            graphics
                .reconstruct(kind, packed)
                .map(ClipboardData::Bitmap)
                .ok_or(Error::Graphics(target))
        }
        (Format::DIB | Format::DIBV5, Format::BITMAP) => {
            let ClipboardData::Bitmap(handle) = data else {
                return Err(Error::Shape(from));
            };

            let kind = if target == Format::DIBV5 {
                BitsKind::DibV5
            } else {
                BitsKind::Dib
            };
            fetch_bits(graphics, kind, *handle)
                .map(ClipboardData::Bytes)
                .ok_or(Error::Graphics(target))
        }
        (Format::DIB | Format::DIBV5, Format::DIB | Format::DIBV5) => {
            dib::convert_header(bytes(from, data)?, target == Format::DIBV5)
                .map(ClipboardData::Bytes)
                .ok_or(Error::Malformed(from))
        }

        (Format::METAFILEPICT, Format::ENHMETAFILE) => {
            let ClipboardData::EnhMetafile(handle) = data else {
                return Err(Error::Shape(from));
            };

            let frame = fetch_bits(graphics, BitsKind::EnhMetafileFrame, *handle)
                .filter(|frame| frame.len() >= 16)
                .ok_or(Error::Graphics(target))?;
            let mut frame = &frame[..];
            let (left, top) = (frame.get_i32_le(), frame.get_i32_le());
            let (right, bottom) = (frame.get_i32_le(), frame.get_i32_le());

            let bits = fetch_bits(graphics, BitsKind::WinMetafile, *handle)
                .ok_or(Error::Graphics(target))?;
            let hmf = graphics
                .reconstruct(BitsKind::Metafile, &bits)
                .ok_or(Error::Graphics(target))?;

            Ok(ClipboardData::MetafilePict(MetafilePict {
                mm: MM_ISOTROPIC,
                x_ext: right.wrapping_sub(left),
                y_ext: bottom.wrapping_sub(top),
                hmf: Some(hmf),
            }))
        }
        (Format::ENHMETAFILE, Format::METAFILEPICT) => {
            let ClipboardData::MetafilePict(pict) = data else {
                return Err(Error::Shape(from));
            };
            let hmf = pict.hmf.ok_or(Error::Malformed(from))?;

            let bits = fetch_bits(graphics, BitsKind::Metafile, hmf)
                .ok_or(Error::Graphics(target))?;
            let mut picture = Vec::with_capacity(crate::codec::METAFILE_PICT_SIZE + bits.len());
            pict.write(&mut picture);
            picture.extend_from_slice(&bits);

            graphics
                .reconstruct(BitsKind::WinMetafile, &picture)
                .map(ClipboardData::EnhMetafile)
                .ok_or(Error::Graphics(target))
        }

        _ => Err(Error::Unsupported { target, from }),
    }
}

fn bytes(format: Format, data: &ClipboardData) -> Result<&[u8], Error> {
    data.as_bytes().ok_or(Error::Shape(format))
}
