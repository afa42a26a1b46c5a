//! A safe Rust crate for sharing a clipboard between processes.
//!
//! The clipboard contents live in a separate store process and are tagged by [`Format`]s. This
//! crate implements the client side: the session protocol a process follows to open, fill, read
//! and release the shared store, the planning of formats that can be derived from the ones
//! present (wide text from narrow text, device-independent bitmaps from bitmaps and so on), the
//! lazy rendering of those formats, and the marshaling of payloads across the process boundary.
//!
//! The crate talks to three collaborators through traits:
//!
//! - the store, [`store::Store`], implemented over a Unix socket by [`remote::RemoteStore`];
//! - the window system, [`window::WindowLayer`], which delivers render requests and change
//!   notifications;
//! - the graphics subsystem, [`gdi::Graphics`], which owns bitmaps, palettes and metafiles.
//!
//! The code of the crate itself is 100% safe Rust. This doesn't include the dependencies.
//!
//! # Examples
//!
//! Copying text:
//! ```no_run
//! # extern crate shared_clipboard_rs;
//! # use shared_clipboard_rs::clipboard::Error;
//! # use shared_clipboard_rs::gdi::Graphics;
//! # use shared_clipboard_rs::window::{WindowId, WindowLayer};
//! # fn foo<W: WindowLayer, G: Graphics>(windows: W, graphics: G, window: WindowId) -> Result<(), Error> {
//! use shared_clipboard_rs::{remote, ClipboardData, Clipboard, Format};
//!
//! let store = remote::Options::new().connect().map_err(|err| Error::Store(err.into()))?;
//! let mut clipboard = Clipboard::new(store, windows, graphics);
//!
//! let mut session = clipboard.session(Some(window))?;
//! session.claim_ownership(Some(window))?;
//! session.put(Format::UNICODETEXT, &ClipboardData::unicode_text("Hello world!"))?;
//! session.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Pasting text in the ANSI code page, which is derived from wide text if needed:
//! ```no_run
//! # extern crate shared_clipboard_rs;
//! # use shared_clipboard_rs::clipboard::Error;
//! # use shared_clipboard_rs::gdi::Graphics;
//! # use shared_clipboard_rs::store::Store;
//! # use shared_clipboard_rs::window::WindowLayer;
//! # fn foo<S: Store, W: WindowLayer, G: Graphics>(
//! #     clipboard: &mut shared_clipboard_rs::Clipboard<S, W, G>,
//! # ) -> Result<(), Error> {
//! use shared_clipboard_rs::Format;
//!
//! let mut session = clipboard.session(None)?;
//! match session.get(Format::TEXT) {
//!     Ok(data) => println!("Pasted: {:?}", data.as_bytes()),
//!     Err(err) if err.is_no_data() => {
//!         // The clipboard is empty or doesn't contain text, nothing to worry about.
//!     }
//!     Err(err) => Err(err)?,
//! }
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/shared-clipboard-rs/0.1.0")]
#![deny(unsafe_code)]

#[cfg(test)]
mod tests;

pub mod clipboard;
pub mod codec;
pub mod codepage;
pub mod dib;
pub mod format;
pub mod gdi;
pub mod notify;
pub mod remote;
pub mod render;
pub mod store;
pub mod synthesis;
pub mod window;
pub mod wire;

pub use clipboard::Clipboard;
pub use codec::ClipboardData;
pub use format::Format;
