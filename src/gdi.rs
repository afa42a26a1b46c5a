//! Interface to the graphics subsystem that owns bitmaps, palettes and metafiles.
//!
//! Graphics objects live in a per-process handle table and cannot cross the process boundary as
//! they are. The codec flattens them into bytes through this interface before a put and registers
//! the bytes back after a get. The renderer uses the same interface for the pixel and drawing
//! command conversions it cannot do by itself.

use std::fmt;
use std::num::NonZeroU32;

/// Handle of an object in the graphics subsystem.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct GdiHandle(NonZeroU32);

impl GdiHandle {
    #[inline]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(GdiHandle)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for GdiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GdiHandle({:#x})", self.0)
    }
}

/// The flat representation asked of (or handed to) the graphics subsystem.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum BitsKind {
    /// The fixed bitmap header of a device-dependent bitmap ([`crate::codec::BitmapHeader`]).
    ///
    /// Extract only.
    BitmapHeader,
    /// Raw pixel rows of a device-dependent bitmap.
    ///
    /// When reconstructing, the bits are preceded by the bitmap header.
    BitmapBits,
    /// Palette entries, 4 bytes each.
    ///
    /// When reconstructing, the entries are preceded by the palette header.
    Palette,
    /// Packed device-independent bitmap with a 40-byte header, extracted from a bitmap.
    ///
    /// Reconstructing from either DIB kind creates a device-dependent bitmap.
    Dib,
    /// Packed device-independent bitmap with a 124-byte header, extracted from a bitmap.
    DibV5,
    /// Enhanced metafile records.
    EnhMetafile,
    /// The frame of an enhanced metafile, four `i32` (left, top, right, bottom) in 0.01 mm.
    ///
    /// Extract only.
    EnhMetafileFrame,
    /// Legacy metafile records.
    Metafile,
    /// Legacy metafile records transcoded from an enhanced metafile.
    ///
    /// When reconstructing, the records are preceded by the metafile picture header and an
    /// enhanced metafile is created.
    WinMetafile,
}

/// The pixel and vector conversion library.
///
/// Flat representations are obtained with a query-size-then-fetch pattern: [`query_size`]
/// reports the number of bytes needed (0 if the object or representation is unavailable), then
/// [`extract_bits`] fills a buffer of exactly that size.
///
/// [`query_size`]: Graphics::query_size
/// [`extract_bits`]: Graphics::extract_bits
pub trait Graphics {
    /// Returns the size of the `kind` representation of the object, or 0 if there is none.
    fn query_size(&self, kind: BitsKind, handle: GdiHandle) -> usize;

    /// Fills `buffer` with the `kind` representation of the object.
    ///
    /// Returns `false` if the object has no such representation or `buffer` has the wrong size.
    fn extract_bits(&self, kind: BitsKind, handle: GdiHandle, buffer: &mut [u8]) -> bool;

    /// Registers a new object built from a flat representation.
    fn reconstruct(&mut self, kind: BitsKind, bits: &[u8]) -> Option<GdiHandle>;
}

/// Queries the size of a representation, then fetches it.
pub(crate) fn fetch_bits<G: Graphics + ?Sized>(
    graphics: &G,
    kind: BitsKind,
    handle: GdiHandle,
) -> Option<Vec<u8>> {
    let size = graphics.query_size(kind, handle);
    if size == 0 {
        return None;
    }

    let mut buffer = vec![0; size];
    if graphics.extract_bits(kind, handle, &mut buffer) {
        Some(buffer)
    } else {
        None
    }
}
