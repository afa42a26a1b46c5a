//! Propagation of clipboard changes to viewers and listeners.
//!
//! Viewers form a chain: the store only knows the head, and every viewer remembers the next one
//! and passes notifications along. Listeners are an unordered set notified one by one.

use log::{trace, warn};

use crate::window::{Message, SendError, WindowId, WindowLayer};

/// A window taking part in the viewer chain.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ViewerNode {
    pub window: WindowId,
    /// The viewer that was the head when this one joined.
    pub next: Option<WindowId>,
}

impl ViewerNode {
    pub fn new(window: WindowId, next: Option<WindowId>) -> Self {
        Self { window, next }
    }

    /// Handles a draw notification by passing it to the next viewer.
    pub fn on_draw_clipboard<W: WindowLayer + ?Sized>(
        &self,
        windows: &mut W,
        owner: Option<WindowId>,
    ) -> Result<(), SendError> {
        match self.next {
            Some(next) => windows
                .send_message(next, Message::DrawClipboard { owner }, None)
                .map(|_| ()),
            None => Ok(()),
        }
    }

    /// Handles the removal of `removed` from the chain.
    ///
    /// If `removed` is the next viewer, it is replaced with `next`; otherwise the change is
    /// forwarded down the chain and the answer of the next viewer returned.
    pub fn on_change_chain<W: WindowLayer + ?Sized>(
        &mut self,
        windows: &mut W,
        removed: WindowId,
        next: Option<WindowId>,
    ) -> Result<bool, SendError> {
        if self.next == Some(removed) {
            trace!("Viewer {:?} splices out {removed:?}", self.window);
            self.next = next;
            return Ok(true);
        }

        match self.next {
            Some(forward) => relay_change_chain(windows, forward, removed, next),
            None => Ok(false),
        }
    }
}

/// Asks `viewer` to remove `removed` from the chain and returns its answer.
pub fn relay_change_chain<W: WindowLayer + ?Sized>(
    windows: &mut W,
    viewer: WindowId,
    removed: WindowId,
    next: Option<WindowId>,
) -> Result<bool, SendError> {
    trace!("Forwarding removal of {removed:?} to {viewer:?}");
    windows.send_message(viewer, Message::ChangeChain { removed, next }, None)
}

/// Tells the viewer chain head that the contents changed.
pub fn notify_viewer<W: WindowLayer + ?Sized>(
    windows: &mut W,
    viewer: WindowId,
    owner: Option<WindowId>,
) {
    trace!("Notifying viewer {viewer:?}, owner {owner:?}");
    if let Err(err) = windows.post_message(viewer, Message::DrawClipboard { owner }) {
        warn!("Couldn't notify clipboard viewer {viewer:?}: {err}");
    }
}

/// Tells every listener that the contents changed.
pub fn notify_listeners<W: WindowLayer + ?Sized>(windows: &mut W, listeners: &[WindowId]) {
    for &listener in listeners {
        trace!("Notifying listener {listener:?}");
        if let Err(err) = windows.post_message(listener, Message::ClipboardUpdate) {
            warn!("Couldn't notify clipboard listener {listener:?}: {err}");
        }
    }
}
