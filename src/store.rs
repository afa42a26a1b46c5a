//! The interface of the clipboard store.
//!
//! The store holds the authoritative clipboard contents and tracks the session, the owner, the
//! viewer chain head and the format listeners. Every call is a blocking request and reply.

use crate::format::Format;
use crate::window::WindowId;

/// Reply to a successful [`Store::open_session`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct OpenReply {
    /// The current owner, if any.
    pub owner: Option<WindowId>,
}

/// Windows to notify once a session closes or an owner goes away.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct CloseReply {
    /// Head of the viewer chain.
    pub viewer: Option<WindowId>,
    /// The owner at the time of the reply.
    pub owner: Option<WindowId>,
}

/// Outcome of a [`Store::get`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum GetStatus {
    /// The payload fit the buffer and is in [`GetReply::data`].
    Ok,
    /// The payload did not fit; [`GetReply::total`] is its size.
    Overflow,
    /// The format is not on the clipboard.
    NotFound,
}

/// Reply to a [`Store::get`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GetReply {
    pub status: GetStatus,
    /// The payload, empty unless `status` is [`GetStatus::Ok`].
    ///
    /// An empty payload with [`GetStatus::Ok`] is a placeholder the owner has not rendered yet.
    pub data: Vec<u8>,
    /// The size of the payload.
    pub total: u32,
    /// The current owner, if any.
    pub owner: Option<WindowId>,
}

/// Reply to a [`Store::info`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct StoreInfo {
    pub owner: Option<WindowId>,
    /// The window that has the clipboard open.
    pub window: Option<WindowId>,
    /// Head of the viewer chain.
    pub viewer: Option<WindowId>,
    /// Incremented on every ownership claim and every put.
    pub sequence: u32,
}

/// Reply to a [`Store::set_viewer`].
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ViewerReply {
    /// The viewer chain head was replaced.
    Set {
        old_viewer: Option<WindowId>,
        owner: Option<WindowId>,
    },
    /// The expected previous head is not the head; the change must be forwarded to `viewer`.
    Pending { viewer: WindowId },
}

/// Errors reported by the store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("The clipboard is already open")]
    AlreadyOpen,

    #[error("The clipboard is not open")]
    NotOpen,

    #[error("The caller does not own the clipboard")]
    NotOwner,

    #[error("The clipboard is open by someone else")]
    AccessDenied,

    #[error("Invalid parameter")]
    InvalidParameter,

    #[error("Not found")]
    NotFound,

    #[error("Couldn't reach the clipboard store")]
    Transport(#[source] crate::remote::Error),
}

/// Requests understood by the clipboard store.
pub trait Store {
    /// Opens the store-wide session on behalf of `requestor`.
    ///
    /// Fails with [`StoreError::AlreadyOpen`] if a session is open anywhere.
    fn open_session(&mut self, requestor: Option<WindowId>) -> Result<OpenReply, StoreError>;

    /// Closes the session opened by this client.
    fn close_session(&mut self) -> Result<CloseReply, StoreError>;

    /// Discards every entry and makes `new_owner` the owner, atomically.
    fn claim_ownership(&mut self, new_owner: Option<WindowId>) -> Result<(), StoreError>;

    /// Stores `data` under `format`, replacing any previous entry; empty `data` is a placeholder.
    fn put(&mut self, format: Format, data: &[u8]) -> Result<(), StoreError>;

    /// Retrieves up to `buffer_len` bytes of the `format` payload.
    fn get(&mut self, format: Format, buffer_len: u32) -> Result<GetReply, StoreError>;

    /// Returns the format after `previous`, or [`Format::NONE`] past the last one.
    fn enumerate_formats(&mut self, previous: Format) -> Result<Format, StoreError>;

    /// Counts the present formats, or only `filter` if given.
    fn count_formats(&mut self, filter: Option<Format>) -> Result<u32, StoreError>;

    /// Lists the present formats.
    fn list_formats(&mut self) -> Result<Vec<Format>, StoreError>;

    fn info(&mut self) -> Result<StoreInfo, StoreError>;

    /// Makes `viewer` the head of the viewer chain.
    ///
    /// With `previous`, the change only happens if `previous` is the current head.
    fn set_viewer(
        &mut self,
        viewer: Option<WindowId>,
        previous: Option<WindowId>,
    ) -> Result<ViewerReply, StoreError>;

    /// Releases ownership held by `owner`.
    fn release_owner(&mut self, owner: WindowId) -> Result<CloseReply, StoreError>;

    fn add_listener(&mut self, window: WindowId) -> Result<(), StoreError>;

    fn remove_listener(&mut self, window: WindowId) -> Result<(), StoreError>;

    fn listeners(&mut self) -> Result<Vec<WindowId>, StoreError>;

    /// Returns the format registered under `name`, registering it if needed.
    fn register_format(&mut self, name: &str) -> Result<Format, StoreError>;

    /// Returns the name a format was registered under.
    fn format_name(&mut self, format: Format) -> Result<Option<String>, StoreError>;
}
