//! Locale code pages and 8-bit text transcoding.
//!
//! Narrow clipboard text is stored in one of two code pages picked by the clipboard locale: the
//! "ANSI" one for [`Format::TEXT`] and the "OEM" one for [`Format::OEMTEXT`]. Wide text is UTF-16LE.

use crate::format::Format;

/// Locale identifier as stored in [`Format::LOCALE`].
pub type Lcid = u32;

/// English (United States).
pub const LCID_EN_US: Lcid = 0x0409;

/// The invariant locale.
pub const LCID_INVARIANT: Lcid = 0x007f;

/// Code pages narrow clipboard text can be converted from and to.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CodePage {
    /// Windows-1252, Western European.
    Windows1252,
    /// IBM437, the original DOS code page.
    Cp437,
    /// UTF-8.
    Utf8,
}

impl CodePage {
    /// Returns the code page with the given number, if it is supported.
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1252 => Some(CodePage::Windows1252),
            437 => Some(CodePage::Cp437),
            65001 => Some(CodePage::Utf8),
            _ => None,
        }
    }

    /// Returns the code page number.
    pub fn id(self) -> u32 {
        match self {
            CodePage::Windows1252 => 1252,
            CodePage::Cp437 => 437,
            CodePage::Utf8 => 65001,
        }
    }

    /// Decodes narrow text into UTF-16 code units.
    pub fn to_wide(self, data: &[u8]) -> Vec<u16> {
        match self {
            CodePage::Windows1252 => data
                .iter()
                .flat_map(|&b| windows1252_to_char(b).encode_utf16(&mut [0; 2]).to_vec())
                .collect(),
            CodePage::Cp437 => data
                .iter()
                .flat_map(|&b| cp437_to_char(b).encode_utf16(&mut [0; 2]).to_vec())
                .collect(),
            CodePage::Utf8 => String::from_utf8_lossy(data).encode_utf16().collect(),
        }
    }

    /// Encodes UTF-16 code units as narrow text.
    ///
    /// Characters the code page cannot represent, and unpaired surrogates, become `?`.
    pub fn from_wide(self, data: &[u16]) -> Vec<u8> {
        let chars = char::decode_utf16(data.iter().copied()).map(|c| c.unwrap_or('?'));
        match self {
            CodePage::Windows1252 => chars.map(char_to_windows1252).collect(),
            CodePage::Cp437 => chars.map(char_to_cp437).collect(),
            CodePage::Utf8 => chars.collect::<String>().into_bytes(),
        }
    }
}

/// Code pages of a locale: (ANSI, OEM).
pub fn locale_code_pages(lcid: Lcid) -> Option<(CodePage, CodePage)> {
    // Only the primary language and sort bits matter.
    match lcid & 0xffff {
        LCID_EN_US | LCID_INVARIANT => Some((CodePage::Windows1252, CodePage::Cp437)),
        _ => None,
    }
}

/// Picks the code page of a narrow text format for a locale.
///
/// `defaults` are the (ANSI, OEM) code pages used when the locale is not known.
pub fn format_code_page(lcid: Lcid, format: Format, defaults: (CodePage, CodePage)) -> CodePage {
    let (ansi, oem) = locale_code_pages(lcid).unwrap_or(defaults);
    if format == Format::OEMTEXT {
        oem
    } else {
        ansi
    }
}

/// Reinterprets UTF-16LE bytes as code units, ignoring an odd trailing byte.
pub fn wide_from_bytes(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Serializes code units as UTF-16LE bytes.
pub fn wide_to_bytes(data: &[u16]) -> Vec<u8> {
    data.iter().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn char_to_windows1252(c: char) -> u8 {
    let cp = c as u32;
    if cp < 0x80 {
        return cp as u8;
    }

    match cp {
        0x20ac => 0x80,
        0x201a => 0x82,
        0x0192 => 0x83,
        0x201e => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02c6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8a,
        0x2039 => 0x8b,
        0x0152 => 0x8c,
        0x017d => 0x8e,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201c => 0x93,
        0x201d => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02dc => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9a,
        0x203a => 0x9b,
        0x0153 => 0x9c,
        0x017e => 0x9e,
        0x0178 => 0x9f,
        0xa0..=0xff => cp as u8,
        _ => b'?',
    }
}

fn windows1252_to_char(b: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20ac}', '?', '\u{201a}', '\u{0192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
        '\u{02c6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '?', '\u{017d}', '?', '?',
        '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
        '\u{02dc}', '\u{2122}', '\u{0161}', '\u{203a}', '\u{0153}', '?', '\u{017e}', '\u{0178}',
    ];

    match b {
        0x80..=0x9f => HIGH[(b - 0x80) as usize],
        _ => b as char,
    }
}

// CP437 bytes 0x80 to 0xff.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', 'É', 'æ', 'Æ',
    'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', 'á', 'í', 'ó', 'ú', 'ñ', 'Ñ',
    'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕',
    '╣', '║', '╗', '╝', '╜', '╛', '┐', '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦',
    '╠', '═', '╬', '╧', '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐',
    '▀', 'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', '≡', '±',
    '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

fn cp437_to_char(b: u8) -> char {
    match b {
        0x00..=0x7f => b as char,
        _ => CP437_HIGH[(b - 0x80) as usize],
    }
}

fn char_to_cp437(c: char) -> u8 {
    if (c as u32) < 0x80 {
        return c as u8;
    }

    CP437_HIGH
        .iter()
        .position(|&high| high == c)
        .map_or(b'?', |index| 0x80 + index as u8)
}
