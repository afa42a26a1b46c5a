//! Opening, filling and reading the shared clipboard.
//!
//! A [`Clipboard`] drives one connection to the store. Writers open a session, claim ownership,
//! put their formats and close; closing plans which further formats can be derived from the ones
//! put. Readers open a session and get formats; derivable formats are rendered on the spot and
//! formats the owner promised but has not put yet are requested from the owner.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::codec::{self, ClipboardData};
use crate::codepage::{CodePage, Lcid, LCID_EN_US};
use crate::format::{debug_name, Family, Format};
use crate::gdi::Graphics;
use crate::notify;
use crate::render::{self, TextSettings};
use crate::store::{CloseReply, GetStatus, Store, StoreError, StoreInfo, ViewerReply};
use crate::synthesis::{self, Derivation, SynthesisTable};
use crate::window::{Message, SendError, WindowId, WindowLayer};

/// Options for clipboard operations.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Options {
    initial_buffer_size: u32,
    overflow_retries: u32,
    render_timeout: Duration,
    destroy_timeout: Duration,
    default_locale: Lcid,
    default_code_pages: (CodePage, CodePage),
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_buffer_size: 1024,
            overflow_retries: 3,
            render_timeout: Duration::from_secs(5),
            destroy_timeout: Duration::from_secs(5),
            default_locale: LCID_EN_US,
            default_code_pages: (CodePage::Windows1252, CodePage::Cp437),
        }
    }
}

impl Options {
    /// Creates a blank new set of options ready for configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer size of the first attempt to get a payload.
    ///
    /// Larger payloads take a second attempt with the size reported by the store.
    #[inline]
    pub fn initial_buffer_size(&mut self, size: u32) -> &mut Self {
        self.initial_buffer_size = size;
        self
    }

    /// Sets how many times a get may find the payload larger than the buffer before giving up.
    ///
    /// This only happens when the payload keeps changing between attempts.
    #[inline]
    pub fn overflow_retries(&mut self, retries: u32) -> &mut Self {
        self.overflow_retries = retries;
        self
    }

    /// Sets how long to wait for the owner to render a format.
    #[inline]
    pub fn render_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.render_timeout = timeout;
        self
    }

    /// Sets how long to wait for the previous owner to handle the loss of the clipboard.
    #[inline]
    pub fn destroy_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.destroy_timeout = timeout;
        self
    }

    /// Sets the locale stored along with text that comes without one.
    #[inline]
    pub fn default_locale(&mut self, locale: Lcid) -> &mut Self {
        self.default_locale = locale;
        self
    }

    /// Sets the (ANSI, OEM) code pages for text in locales without known code pages.
    #[inline]
    pub fn default_code_pages(&mut self, ansi: CodePage, oem: CodePage) -> &mut Self {
        self.default_code_pages = (ansi, oem);
        self
    }
}

/// Errors that can occur in clipboard operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("The clipboard is already open")]
    AlreadyOpen,

    #[error("The clipboard is not open")]
    NotOpen,

    #[error("Clipboard store error")]
    Store(#[source] StoreError),

    #[error("There is no {0} data on the clipboard")]
    NoData(Format),

    #[error("The {0} data kept changing size while being retrieved")]
    Unavailable(Format),

    #[error("The clipboard owner {owner:?} did not render {format} in time")]
    RenderTimeout { format: Format, owner: WindowId },

    #[error("Couldn't marshal {0} data")]
    Codec(Format, #[source] codec::Error),

    #[error("Couldn't render {target} from {from}")]
    Render {
        target: Format,
        from: Format,
        #[source]
        error: render::Error,
    },

    #[error("Couldn't deliver a clipboard message")]
    Window(#[source] SendError),
}

impl Error {
    /// Returns `true` if the error means there is no usable data in the requested format.
    pub fn is_no_data(&self) -> bool {
        match self {
            Error::NoData(_)
            | Error::Unavailable(_)
            | Error::RenderTimeout { .. }
            | Error::Render { .. } => true,
            Error::Codec(_, err) => matches!(
                err,
                codec::Error::Malformed { .. } | codec::Error::Reconstruct(_)
            ),
            _ => false,
        }
    }
}

impl From<StoreError> for Error {
    fn from(x: StoreError) -> Self {
        match x {
            StoreError::AlreadyOpen => Error::AlreadyOpen,
            StoreError::NotOpen => Error::NotOpen,
            x => Error::Store(x),
        }
    }
}

/// Result of [`Clipboard::priority_format`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum PriorityFormat {
    /// The clipboard is empty.
    Empty,
    /// The first listed format that is on the clipboard.
    Found(Format),
    /// None of the listed formats is on the clipboard.
    NoneAvailable,
}

#[derive(Clone, Copy, Debug)]
struct Session {
    window: Option<WindowId>,
    changed: bool,
}

/// A client of the shared clipboard store.
pub struct Clipboard<S, W, G> {
    store: S,
    windows: W,
    graphics: G,
    options: Options,
    session: Option<Session>,
    synthesized: SynthesisTable,
}

impl<S: Store, W: WindowLayer, G: Graphics> Clipboard<S, W, G> {
    pub fn new(store: S, windows: W, graphics: G) -> Self {
        Self::with_options(store, windows, graphics, Options::default())
    }

    pub fn with_options(store: S, windows: W, graphics: G, options: Options) -> Self {
        Self {
            store,
            windows,
            graphics,
            options,
            session: None,
            synthesized: SynthesisTable::new(),
        }
    }

    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn windows(&mut self) -> &mut W {
        &mut self.windows
    }

    pub fn graphics(&mut self) -> &mut G {
        &mut self.graphics
    }

    /// Returns the formats currently known to be derivable.
    pub fn synthesized(&self) -> &SynthesisTable {
        &self.synthesized
    }

    /// Returns `true` if this client has the clipboard open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn name(&mut self, format: Format) -> String {
        if format.is_registered() {
            let name = self.store.format_name(format).ok().flatten();
            debug_name(format, name.as_deref())
        } else {
            debug_name(format, None)
        }
    }

    /// Opens the clipboard on behalf of `window`.
    ///
    /// Fails with [`Error::AlreadyOpen`] if the clipboard is open anywhere, this client included.
    pub fn open(&mut self, window: Option<WindowId>) -> Result<(), Error> {
        self.windows.update_clipboard();

        let reply = self.store.open_session(window)?;
        trace!("Opened the clipboard for {window:?}, owner {:?}", reply.owner);

        if reply.owner.is_none() {
            self.synthesized.clear();
        }
        self.session = Some(Session {
            window,
            changed: false,
        });
        Ok(())
    }

    /// Opens the clipboard, closing it again when the returned guard goes away.
    pub fn session(
        &mut self,
        window: Option<WindowId>,
    ) -> Result<SessionGuard<'_, S, W, G>, Error> {
        self.open(window)?;
        Ok(SessionGuard {
            clipboard: self,
            closed: false,
        })
    }

    /// Closes the clipboard.
    ///
    /// If the contents changed, the derivable formats are planned first, then the viewer chain
    /// and the listeners are notified.
    pub fn close(&mut self) -> Result<CloseReply, Error> {
        let session = self.session;
        let changed = session.is_some_and(|session| session.changed);
        if changed {
            self.synthesize();
        }

        let result = self.store.close_session();
        self.session = None;
        let reply = result?;
        trace!(
            "Closed the clipboard of {:?}, viewer {:?}, owner {:?}",
            session.and_then(|session| session.window),
            reply.viewer,
            reply.owner
        );

        if let Some(viewer) = reply.viewer {
            notify::notify_viewer(&mut self.windows, viewer, reply.owner);
        }

        if changed {
            match self.store.listeners() {
                Ok(listeners) => notify::notify_listeners(&mut self.windows, &listeners),
                Err(err) => warn!("Couldn't list clipboard listeners: {err}"),
            }
        }

        Ok(reply)
    }

    /// Records the derivable formats and advertises them.
    ///
    /// Failures are logged and otherwise ignored.
    fn synthesize(&mut self) {
        let present = match self.store.list_formats() {
            Ok(present) => present,
            Err(err) => {
                warn!("Couldn't list clipboard formats for synthesis: {err}");
                return;
            }
        };

        let plan = synthesis::plan(|format| present.contains(&format));
        debug!("Synthesis plan: {plan:?}");

        self.synthesized.clear();

        if plan.set_locale {
            let locale = self.options.default_locale.to_le_bytes();
            if let Err(err) = self.put_bytes(Format::LOCALE, &locale) {
                warn!("Couldn't add the clipboard locale: {err}");
            }
        }

        for Derivation { target, source } in plan.derivations {
            // The put clears the table entry, so record after it.
            match self.put_bytes(target, &[]) {
                Ok(()) => self.synthesized.record(target, source),
                Err(err) => warn!("Couldn't advertise synthesized {target:?}: {err}"),
            }
        }
    }

    /// Empties the clipboard and makes `owner` its owner.
    pub fn claim_ownership(&mut self, owner: Option<WindowId>) -> Result<(), Error> {
        let info = self.store.info()?;

        if let Some(previous) = info.owner {
            trace!("Sending destroy-clipboard to {previous:?}");
            let timeout = Some(self.options.destroy_timeout);
            if let Err(err) =
                self.windows
                    .send_message(previous, Message::DestroyClipboard, timeout)
            {
                warn!("The previous clipboard owner {previous:?} failed to let go: {err}");
            }
        }

        self.store.claim_ownership(owner)?;
        trace!("{owner:?} now owns the clipboard");

        self.synthesized.clear();
        if let Some(session) = &mut self.session {
            session.changed = true;
        }

        if let Some(viewer) = info.viewer {
            notify::notify_viewer(&mut self.windows, viewer, owner);
        }

        Ok(())
    }

    /// Puts `data` under `format`.
    pub fn put(&mut self, format: Format, data: &ClipboardData) -> Result<(), Error> {
        let bytes =
            codec::encode(&self.graphics, format, data).map_err(|err| Error::Codec(format, err))?;
        self.put_bytes(format, &bytes)
    }

    /// Advertises `format` without data; the owner renders it when it is requested.
    pub fn put_delayed(&mut self, format: Format) -> Result<(), Error> {
        self.put_bytes(format, &[])
    }

    fn put_bytes(&mut self, format: Format, bytes: &[u8]) -> Result<(), Error> {
        self.store.put(format, bytes)?;
        trace!("Put {} bytes of {}", bytes.len(), self.name(format));

        self.synthesized.remove(format);
        if let Some(session) = &mut self.session {
            session.changed = true;
        }
        Ok(())
    }

    /// Gets the data of `format`.
    ///
    /// Derivable formats are rendered and put first. Formats the owner has not rendered yet are
    /// requested from it once.
    pub fn get(&mut self, format: Format) -> Result<ClipboardData, Error> {
        if let Some(source) = self.synthesized.source(format) {
            return self.render_synthesized(format, source);
        }

        self.fetch(format)
    }

    /// Renders `target` from `source` and puts the result.
    pub fn render_synthesized(
        &mut self,
        target: Format,
        source: Format,
    ) -> Result<ClipboardData, Error> {
        trace!("Rendering {target:?} from {source:?}");

        let data = self.fetch(source)?;
        let text = TextSettings {
            locale: if target.family() == Some(Family::Text) {
                self.locale()
            } else {
                self.options.default_locale
            },
            default_code_pages: self.options.default_code_pages,
        };

        let rendered = render::convert(&mut self.graphics, target, source, &data, &text)
            .map_err(|error| Error::Render {
                target,
                from: source,
                error,
            })?;

        self.put(target, &rendered)?;
        Ok(rendered)
    }

    /// Reads the clipboard locale, falling back to the default one.
    fn locale(&mut self) -> Lcid {
        match self.fetch_bytes(Format::LOCALE) {
            Ok(data) if data.len() >= 4 => Lcid::from_le_bytes([data[0], data[1], data[2], data[3]]),
            _ => self.options.default_locale,
        }
    }

    fn fetch(&mut self, format: Format) -> Result<ClipboardData, Error> {
        let bytes = self.fetch_bytes(format)?;
        codec::decode(&mut self.graphics, format, bytes).map_err(|err| Error::Codec(format, err))
    }

    /// Retrieves a payload from the store, growing the buffer as needed.
    fn fetch_bytes(&mut self, format: Format) -> Result<Vec<u8>, Error> {
        let mut buffer_len = self.options.initial_buffer_size;
        let mut overflows = 0;
        let mut rendered = false;

        loop {
            let reply = self.store.get(format, buffer_len)?;

            match reply.status {
                GetStatus::Ok if !reply.data.is_empty() => {
                    trace!("Got {} bytes of {}", reply.data.len(), self.name(format));
                    return Ok(reply.data);
                }
                GetStatus::Overflow => {
                    overflows += 1;
                    if overflows >= self.options.overflow_retries {
                        warn!("Giving up on {format:?} after {overflows} size changes");
                        return Err(Error::Unavailable(format));
                    }
                    trace!("{format:?} needs {} bytes, retrying", reply.total);
                    buffer_len = reply.total;
                    continue;
                }
                GetStatus::Ok | GetStatus::NotFound => (),
            }

            match reply.owner {
                Some(owner) if !rendered => {
                    rendered = true;
                    self.request_render(owner, format)?;
                }
                _ => return Err(Error::NoData(format)),
            }
        }
    }

    /// Asks the owner to put `format` now.
    fn request_render(&mut self, owner: WindowId, format: Format) -> Result<(), Error> {
        trace!("Asking {owner:?} to render {format:?}");

        let timeout = Some(self.options.render_timeout);
        match self
            .windows
            .send_message(owner, Message::RenderFormat(format), timeout)
        {
            Ok(_) => Ok(()),
            Err(err @ (SendError::Timeout(_) | SendError::Hung)) => {
                warn!("The clipboard owner {owner:?} did not render {format:?}: {err}");
                Err(Error::RenderTimeout { format, owner })
            }
            Err(err) => {
                warn!("Couldn't ask {owner:?} to render {format:?}: {err}");
                Err(Error::NoData(format))
            }
        }
    }

    /// Returns the format after `previous`, or `None` past the last one.
    ///
    /// Start with [`Format::NONE`].
    pub fn enumerate(&mut self, previous: Format) -> Result<Option<Format>, Error> {
        let next = self.store.enumerate_formats(previous)?;
        Ok(Some(next).filter(|next| *next != Format::NONE))
    }

    /// Counts the formats on the clipboard.
    pub fn count(&mut self) -> Result<u32, Error> {
        self.windows.update_clipboard();
        Ok(self.store.count_formats(None)?)
    }

    /// Returns `true` if `format` is on the clipboard, derivable formats included.
    pub fn contains(&mut self, format: Format) -> Result<bool, Error> {
        if format == Format::NONE {
            return Ok(false);
        }

        self.windows.update_clipboard();
        Ok(self.store.count_formats(Some(format))? > 0)
    }

    /// Lists the formats on the clipboard.
    pub fn updated_formats(&mut self) -> Result<Vec<Format>, Error> {
        self.windows.update_clipboard();
        Ok(self.store.list_formats()?)
    }

    /// Returns the first of `formats` that is on the clipboard.
    pub fn priority_format(&mut self, formats: &[Format]) -> Result<PriorityFormat, Error> {
        if self.count()? == 0 {
            return Ok(PriorityFormat::Empty);
        }

        for &format in formats {
            if self.contains(format)? {
                return Ok(PriorityFormat::Found(format));
            }
        }

        Ok(PriorityFormat::NoneAvailable)
    }

    pub fn info(&mut self) -> Result<StoreInfo, Error> {
        Ok(self.store.info()?)
    }

    pub fn owner(&mut self) -> Result<Option<WindowId>, Error> {
        Ok(self.info()?.owner)
    }

    /// Returns the window that has the clipboard open.
    pub fn open_window(&mut self) -> Result<Option<WindowId>, Error> {
        Ok(self.info()?.window)
    }

    /// Returns the head of the viewer chain.
    pub fn viewer(&mut self) -> Result<Option<WindowId>, Error> {
        Ok(self.info()?.viewer)
    }

    pub fn sequence_number(&mut self) -> Result<u32, Error> {
        Ok(self.info()?.sequence)
    }

    /// Returns the format registered under `name`, registering it if needed.
    pub fn register_format(&mut self, name: &str) -> Result<Format, Error> {
        if name.is_empty() {
            return Err(Error::Store(StoreError::InvalidParameter));
        }

        let format = self.store.register_format(name)?;
        trace!("Registered {}", debug_name(format, Some(name)));
        Ok(format)
    }

    /// Returns the name `format` was registered under.
    pub fn format_name(&mut self, format: Format) -> Result<Option<String>, Error> {
        if !format.is_registered() {
            return Ok(None);
        }

        Ok(self.store.format_name(format)?)
    }

    /// Lets go of the clipboard owned by `owner`, which is going away.
    ///
    /// The owner is first asked to render every format it promised.
    pub fn release_owner(&mut self, owner: WindowId) -> Result<(), Error> {
        trace!("Asking {owner:?} to render all formats");
        if let Err(err) = self
            .windows
            .send_message(owner, Message::RenderAllFormats, None)
        {
            warn!("Couldn't ask {owner:?} to render all formats: {err}");
        }

        let reply = self.store.release_owner(owner)?;
        if let Some(viewer) = reply.viewer {
            notify::notify_viewer(&mut self.windows, viewer, reply.owner);
        }
        Ok(())
    }

    /// Makes `window` the head of the viewer chain.
    ///
    /// Returns the previous head, which `window` must pass notifications on to.
    pub fn set_viewer(&mut self, window: Option<WindowId>) -> Result<Option<WindowId>, Error> {
        match self.store.set_viewer(window, None)? {
            ViewerReply::Set { old_viewer, owner } => {
                trace!("{window:?} heads the viewer chain, followed by {old_viewer:?}");
                if let Some(window) = window {
                    notify::notify_viewer(&mut self.windows, window, owner);
                }
                Ok(old_viewer)
            }
            ViewerReply::Pending { .. } => Err(Error::Store(StoreError::InvalidParameter)),
        }
    }

    /// Removes `removed` from the viewer chain, `next` taking its place.
    ///
    /// Returns the answer of the chain.
    pub fn change_chain(
        &mut self,
        removed: WindowId,
        next: Option<WindowId>,
    ) -> Result<bool, Error> {
        match self.store.set_viewer(next, Some(removed))? {
            ViewerReply::Set { .. } => Ok(true),
            ViewerReply::Pending { viewer } => {
                notify::relay_change_chain(&mut self.windows, viewer, removed, next)
                    .map_err(Error::Window)
            }
        }
    }

    pub fn add_listener(&mut self, window: WindowId) -> Result<(), Error> {
        Ok(self.store.add_listener(window)?)
    }

    pub fn remove_listener(&mut self, window: WindowId) -> Result<(), Error> {
        Ok(self.store.remove_listener(window)?)
    }
}

/// An open clipboard session which closes on drop.
pub struct SessionGuard<'a, S: Store, W: WindowLayer, G: Graphics> {
    clipboard: &'a mut Clipboard<S, W, G>,
    closed: bool,
}

impl<S: Store, W: WindowLayer, G: Graphics> SessionGuard<'_, S, W, G> {
    /// Closes the session, reporting failures.
    pub fn close(mut self) -> Result<CloseReply, Error> {
        self.closed = true;
        self.clipboard.close()
    }
}

impl<S: Store, W: WindowLayer, G: Graphics> Deref for SessionGuard<'_, S, W, G> {
    type Target = Clipboard<S, W, G>;

    fn deref(&self) -> &Self::Target {
        &*self.clipboard
    }
}

impl<S: Store, W: WindowLayer, G: Graphics> DerefMut for SessionGuard<'_, S, W, G> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.clipboard
    }
}

impl<S: Store, W: WindowLayer, G: Graphics> Drop for SessionGuard<'_, S, W, G> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.clipboard.close() {
                warn!("Couldn't close the clipboard: {err}");
            }
        }
    }
}
