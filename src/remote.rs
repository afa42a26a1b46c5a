//! A [`Store`] reached over a Unix socket.

use std::env;
use std::ffi::OsString;
use std::io::{self, Read};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{trace, warn};
use rustix::event::{poll, PollFd, PollFlags};
use rustix::io::Errno;

use crate::format::Format;
use crate::store::{CloseReply, GetReply, OpenReply, Store, StoreError, StoreInfo, ViewerReply};
use crate::window::WindowId;
use crate::wire::{self, Reply, Request};

/// Socket name used when none is given.
pub const DEFAULT_SOCKET_NAME: &str = "shared-clipboard-0";

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "SHARED_CLIPBOARD_SOCKET";

/// Default time to wait for each reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when talking to the store process.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("XDG_RUNTIME_DIR is not set to an absolute path")]
    NoRuntimeDir,

    #[error("Couldn't open the clipboard store socket {0:?}")]
    SocketOpenError(PathBuf, #[source] io::Error),

    #[error("Clipboard store communication error")]
    Communication(#[source] io::Error),

    #[error("The clipboard store did not reply within {0:?}")]
    Timeout(Duration),

    #[error("The clipboard store closed the connection")]
    Disconnected,

    #[error("Invalid message from the clipboard store")]
    Protocol(#[source] wire::Error),

    #[error("Unexpected reply from the clipboard store: {0:?}")]
    UnexpectedReply(Reply),
}

impl From<Error> for StoreError {
    fn from(x: Error) -> Self {
        StoreError::Transport(x)
    }
}

/// Options for connecting to the store process.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Options {
    socket_name: Option<OsString>,
    reply_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            socket_name: None,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

impl Options {
    /// Creates a blank new set of options ready for configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the socket in `$XDG_RUNTIME_DIR` to connect to.
    ///
    /// Without a name, the path in `SHARED_CLIPBOARD_SOCKET` is used, then
    /// [`DEFAULT_SOCKET_NAME`].
    #[inline]
    pub fn socket_name(&mut self, name: impl Into<OsString>) -> &mut Self {
        self.socket_name = Some(name.into());
        self
    }

    /// Sets the time to wait for each reply.
    #[inline]
    pub fn reply_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.reply_timeout = timeout;
        self
    }

    /// Resolves the socket path.
    pub fn socket_path(&self) -> Result<PathBuf, Error> {
        let runtime_dir = || {
            env::var_os("XDG_RUNTIME_DIR")
                .map(PathBuf::from)
                .filter(|path| path.is_absolute())
                .ok_or(Error::NoRuntimeDir)
        };

        if let Some(name) = &self.socket_name {
            return Ok(runtime_dir()?.join(name));
        }

        match env::var_os(SOCKET_ENV).map(PathBuf::from) {
            Some(path) if path.is_absolute() => Ok(path),
            Some(path) => Ok(runtime_dir()?.join(path)),
            None => Ok(runtime_dir()?.join(DEFAULT_SOCKET_NAME)),
        }
    }

    /// Connects to the store process.
    pub fn connect(&self) -> Result<RemoteStore, Error> {
        let path = self.socket_path()?;
        self.connect_to(path)
    }

    /// Connects to the store process listening at `path`, ignoring the socket name.
    pub fn connect_to(&self, path: impl AsRef<Path>) -> Result<RemoteStore, Error> {
        let path = path.as_ref();
        trace!("Connecting to the clipboard store at {}", path.display());

        let stream = UnixStream::connect(path)
            .map_err(|err| Error::SocketOpenError(path.to_owned(), err))?;
        Ok(RemoteStore::from_stream(stream, self.reply_timeout))
    }
}

/// A connection to the store process.
///
/// After a timeout or a malformed reply the connection is dropped, and every later request fails
/// with [`Error::Disconnected`].
pub struct RemoteStore {
    /// `None` once the connection is out of step with the store.
    stream: Option<UnixStream>,
    reply_timeout: Duration,
}

/// Reads from a stream, waiting for each chunk no later than a deadline.
struct DeadlineReader<'a> {
    stream: &'a UnixStream,
    deadline: Instant,
    timeout: Duration,
}

impl Read for DeadlineReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let left = self.deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, Error::Timeout(self.timeout)));
            }

            let mut fds = [PollFd::new(self.stream, PollFlags::IN)];
            let millis = i32::try_from(left.as_millis()).unwrap_or(i32::MAX).max(1);
            match poll(&mut fds, millis) {
                Ok(0) => continue,
                Ok(_) => break,
                Err(Errno::INTR) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        let mut stream = self.stream;
        stream.read(buf)
    }
}

impl RemoteStore {
    /// Wraps an already connected stream.
    pub fn from_stream(stream: UnixStream, reply_timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            reply_timeout,
        }
    }

    /// Sends a request and waits for its reply.
    ///
    /// Error replies are returned as [`StoreError`]s.
    pub fn call(&mut self, request: &Request) -> Result<Reply, StoreError> {
        let result = self.exchange(request);
        if let Err(err) = &result {
            if let Some(stream) = self.stream.take() {
                warn!("Dropping the clipboard store connection: {err}");
                let _ = stream.shutdown(Shutdown::Both);
            }
        }

        match result? {
            Reply::Error(status) => Err(status.into_error()),
            reply => Ok(reply),
        }
    }

    /// Sends one request and reads one reply frame.
    fn exchange(&mut self, request: &Request) -> Result<Reply, Error> {
        let stream = self.stream.as_mut().ok_or(Error::Disconnected)?;

        let mut body = Vec::new();
        request.encode(&mut body);
        wire::write_frame(&mut *stream, &body).map_err(Error::Communication)?;

        let mut reader = DeadlineReader {
            stream: &*stream,
            deadline: Instant::now() + self.reply_timeout,
            timeout: self.reply_timeout,
        };
        let body = match wire::read_frame(&mut reader) {
            Ok(Some(body)) => body,
            Ok(None) => return Err(Error::Disconnected),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                return Err(Error::Timeout(self.reply_timeout))
            }
            Err(err) => return Err(Error::Communication(err)),
        };

        Reply::decode(&body).map_err(Error::Protocol)
    }
}

fn unexpected(reply: Reply) -> StoreError {
    Error::UnexpectedReply(reply).into()
}

impl Store for RemoteStore {
    fn open_session(&mut self, requestor: Option<WindowId>) -> Result<OpenReply, StoreError> {
        match self.call(&Request::OpenSession { requestor })? {
            Reply::Opened { owner } => Ok(OpenReply { owner }),
            reply => Err(unexpected(reply)),
        }
    }

    fn close_session(&mut self) -> Result<CloseReply, StoreError> {
        match self.call(&Request::CloseSession)? {
            Reply::Closed(reply) => Ok(reply),
            reply => Err(unexpected(reply)),
        }
    }

    fn claim_ownership(&mut self, owner: Option<WindowId>) -> Result<(), StoreError> {
        match self.call(&Request::ClaimOwnership { owner })? {
            Reply::Done => Ok(()),
            reply => Err(unexpected(reply)),
        }
    }

    fn put(&mut self, format: Format, data: &[u8]) -> Result<(), StoreError> {
        let request = Request::Put {
            format,
            data: data.to_vec(),
        };
        match self.call(&request)? {
            Reply::Done => Ok(()),
            reply => Err(unexpected(reply)),
        }
    }

    fn get(&mut self, format: Format, buffer_len: u32) -> Result<GetReply, StoreError> {
        match self.call(&Request::Get { format, buffer_len })? {
            Reply::Data(reply) => Ok(reply),
            reply => Err(unexpected(reply)),
        }
    }

    fn enumerate_formats(&mut self, previous: Format) -> Result<Format, StoreError> {
        match self.call(&Request::EnumerateFormats { previous })? {
            Reply::Format(format) => Ok(format),
            reply => Err(unexpected(reply)),
        }
    }

    fn count_formats(&mut self, filter: Option<Format>) -> Result<u32, StoreError> {
        match self.call(&Request::CountFormats { filter })? {
            Reply::Count(count) => Ok(count),
            reply => Err(unexpected(reply)),
        }
    }

    fn list_formats(&mut self) -> Result<Vec<Format>, StoreError> {
        match self.call(&Request::ListFormats)? {
            Reply::Formats(formats) => Ok(formats),
            reply => Err(unexpected(reply)),
        }
    }

    fn info(&mut self) -> Result<StoreInfo, StoreError> {
        match self.call(&Request::Info)? {
            Reply::Info(info) => Ok(info),
            reply => Err(unexpected(reply)),
        }
    }

    fn set_viewer(
        &mut self,
        viewer: Option<WindowId>,
        previous: Option<WindowId>,
    ) -> Result<ViewerReply, StoreError> {
        match self.call(&Request::SetViewer { viewer, previous })? {
            Reply::Viewer(reply) => Ok(reply),
            reply => Err(unexpected(reply)),
        }
    }

    fn release_owner(&mut self, owner: WindowId) -> Result<CloseReply, StoreError> {
        match self.call(&Request::ReleaseOwner { owner })? {
            Reply::Closed(reply) => Ok(reply),
            reply => Err(unexpected(reply)),
        }
    }

    fn add_listener(&mut self, window: WindowId) -> Result<(), StoreError> {
        match self.call(&Request::AddListener { window })? {
            Reply::Done => Ok(()),
            reply => Err(unexpected(reply)),
        }
    }

    fn remove_listener(&mut self, window: WindowId) -> Result<(), StoreError> {
        match self.call(&Request::RemoveListener { window })? {
            Reply::Done => Ok(()),
            reply => Err(unexpected(reply)),
        }
    }

    fn listeners(&mut self) -> Result<Vec<WindowId>, StoreError> {
        match self.call(&Request::Listeners)? {
            Reply::Windows(windows) => Ok(windows),
            reply => Err(unexpected(reply)),
        }
    }

    fn register_format(&mut self, name: &str) -> Result<Format, StoreError> {
        let request = Request::RegisterFormat {
            name: name.to_owned(),
        };
        match self.call(&request)? {
            Reply::Format(format) => Ok(format),
            reply => Err(unexpected(reply)),
        }
    }

    fn format_name(&mut self, format: Format) -> Result<Option<String>, StoreError> {
        match self.call(&Request::FormatName { format })? {
            Reply::Name(name) => Ok(name),
            reply => Err(unexpected(reply)),
        }
    }
}
