//! The window layer the clipboard talks to.
//!
//! Message delivery between windows belongs to the window system, not to this crate. The
//! clipboard only needs two primitives from it: a blocking send with an optional time bound (used
//! to ask the owner to render a format and to relay viewer chain changes) and a fire-and-forget
//! notification.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::format::Format;

/// A window taking part in clipboard interactions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct WindowId(NonZeroU32);

impl WindowId {
    /// Creates a window id, `None` for the null window.
    #[inline]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(WindowId)
    }

    /// Returns the raw id.
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Converts an optional window to its raw id, 0 being the null window.
    #[inline]
    pub fn raw(window: Option<WindowId>) -> u32 {
        window.map_or(0, WindowId::get)
    }
}

impl fmt::Debug for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Messages the clipboard sends to windows.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Message {
    /// The owner is asked to put the given format now.
    RenderFormat(Format),
    /// The owner is going away and should put every format it promised.
    RenderAllFormats,
    /// The owner lost the clipboard to someone else.
    DestroyClipboard,
    /// The clipboard contents changed; sent to the head of the viewer chain.
    DrawClipboard { owner: Option<WindowId> },
    /// `removed` leaves the viewer chain, its successor being `next`.
    ChangeChain {
        removed: WindowId,
        next: Option<WindowId>,
    },
    /// The clipboard contents changed; sent to every format listener.
    ClipboardUpdate,
}

/// Errors that can occur when delivering a message to a window.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum SendError {
    #[error("The window {0:?} does not exist")]
    InvalidWindow(WindowId),

    #[error("The window did not answer within {0:?}")]
    Timeout(Duration),

    #[error("The window's thread is hung")]
    Hung,
}

/// Delivery of clipboard messages to windows.
pub trait WindowLayer {
    /// Sends a message and blocks until the window has processed it.
    ///
    /// With a `timeout`, gives up with [`SendError::Timeout`] once it elapses, and fails right
    /// away with [`SendError::Hung`] if the receiving thread is known not to be processing
    /// messages. Returns whether the window handled the message.
    fn send_message(
        &mut self,
        window: WindowId,
        message: Message,
        timeout: Option<Duration>,
    ) -> Result<bool, SendError>;

    /// Queues a notification without waiting for it to be processed.
    fn post_message(&mut self, window: WindowId, message: Message) -> Result<(), SendError>;

    /// Brings the store up to date with any clipboard state the window system keeps on its own.
    ///
    /// Called before every operation that observes the set of present formats.
    fn update_clipboard(&mut self) {}
}
