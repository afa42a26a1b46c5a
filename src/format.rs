//! Clipboard format identifiers.

use std::fmt;

/// A clipboard format identifier.
///
/// A small set of well-known values names the standard data shapes (text, bitmaps, pictures,
/// the locale tag and a few opaque blobs). Values in the registered range are allocated at
/// runtime by name, see [`Clipboard::register_format`](crate::clipboard::Clipboard::register_format).
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Format(pub u32);

impl Format {
    pub const TEXT: Format = Format(1);
    pub const BITMAP: Format = Format(2);
    pub const METAFILEPICT: Format = Format(3);
    pub const SYLK: Format = Format(4);
    pub const DIF: Format = Format(5);
    pub const TIFF: Format = Format(6);
    pub const OEMTEXT: Format = Format(7);
    pub const DIB: Format = Format(8);
    pub const PALETTE: Format = Format(9);
    pub const PENDATA: Format = Format(10);
    pub const RIFF: Format = Format(11);
    pub const WAVE: Format = Format(12);
    pub const UNICODETEXT: Format = Format(13);
    pub const ENHMETAFILE: Format = Format(14);
    pub const HDROP: Format = Format(15);
    pub const LOCALE: Format = Format(16);
    pub const DIBV5: Format = Format(17);
    pub const OWNERDISPLAY: Format = Format(0x0080);
    pub const DSPTEXT: Format = Format(0x0081);
    pub const DSPBITMAP: Format = Format(0x0082);
    pub const DSPMETAFILEPICT: Format = Format(0x0083);
    pub const DSPENHMETAFILE: Format = Format(0x008e);

    /// First value past the well-known formats.
    pub const WELL_KNOWN_END: u32 = 18;

    /// First value of the registered (named) range.
    pub const REGISTERED_FIRST: u32 = 0xc000;

    /// Last value of the registered (named) range.
    pub const REGISTERED_LAST: u32 = 0xffff;

    /// The "no format" value, also the end marker of format enumeration.
    pub const NONE: Format = Format(0);

    /// Returns the raw identifier.
    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns `true` for the fixed well-known formats, the only ones that take part in format
    /// synthesis.
    #[inline]
    pub fn is_well_known(self) -> bool {
        self.0 != 0 && self.0 < Self::WELL_KNOWN_END
    }

    /// Returns `true` for formats allocated by name.
    #[inline]
    pub fn is_registered(self) -> bool {
        (Self::REGISTERED_FIRST..=Self::REGISTERED_LAST).contains(&self.0)
    }

    /// Returns the constant name of a well-known or display format.
    pub fn builtin_name(self) -> Option<&'static str> {
        let name = match self {
            Format::TEXT => "CF_TEXT",
            Format::BITMAP => "CF_BITMAP",
            Format::METAFILEPICT => "CF_METAFILEPICT",
            Format::SYLK => "CF_SYLK",
            Format::DIF => "CF_DIF",
            Format::TIFF => "CF_TIFF",
            Format::OEMTEXT => "CF_OEMTEXT",
            Format::DIB => "CF_DIB",
            Format::PALETTE => "CF_PALETTE",
            Format::PENDATA => "CF_PENDATA",
            Format::RIFF => "CF_RIFF",
            Format::WAVE => "CF_WAVE",
            Format::UNICODETEXT => "CF_UNICODETEXT",
            Format::ENHMETAFILE => "CF_ENHMETAFILE",
            Format::HDROP => "CF_HDROP",
            Format::LOCALE => "CF_LOCALE",
            Format::DIBV5 => "CF_DIBV5",
            Format::OWNERDISPLAY => "CF_OWNERDISPLAY",
            Format::DSPTEXT => "CF_DSPTEXT",
            Format::DSPBITMAP => "CF_DSPBITMAP",
            Format::DSPMETAFILEPICT => "CF_DSPMETAFILEPICT",
            Format::DSPENHMETAFILE => "CF_DSPENHMETAFILE",
            _ => return None,
        };
        Some(name)
    }

    /// Returns the synthesis family this format belongs to, if any.
    pub fn family(self) -> Option<Family> {
        Family::ALL
            .into_iter()
            .find(|family| family.members().contains(&self))
    }
}

impl From<u32> for Format {
    #[inline]
    fn from(id: u32) -> Self {
        Format(id)
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:04x}", self.0),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A group of formats that can be derived from one another.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, PartialOrd, Ord)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Family {
    /// Wide text and the two narrow code page encodings.
    Text,
    /// Device-dependent bitmaps and device-independent bitmaps.
    Raster,
    /// Enhanced and legacy metafile pictures.
    Vector,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Text, Family::Raster, Family::Vector];

    /// Members of the family, richest representation first.
    ///
    /// The first present member is the one every absent member is derived from.
    pub fn members(self) -> &'static [Format] {
        match self {
            Family::Text => &[Format::UNICODETEXT, Format::TEXT, Format::OEMTEXT],
            Family::Raster => &[Format::BITMAP, Format::DIBV5, Format::DIB],
            Family::Vector => &[Format::ENHMETAFILE, Format::METAFILEPICT],
        }
    }
}

/// Produces the name used for a format in log messages.
///
/// Registered formats are shown together with their name when one is known.
pub(crate) fn debug_name(format: Format, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{:04x} {:?}", format.0, name),
        None => format!("{:?}", format),
    }
}
