//! Framing of the store requests and replies.
//!
//! Every message travels as a frame: a `u32` body length followed by the body. The body starts
//! with a `u8` opcode followed by the fields, little-endian. Windows and formats are `u32`, 0
//! standing for none; byte strings and lists carry a `u32` length prefix.

use std::io::{self, Read, Write};

use bytes::{Buf, BufMut};

use crate::format::Format;
use crate::store::{CloseReply, GetReply, GetStatus, StoreError, StoreInfo, ViewerReply};
use crate::window::WindowId;

/// A request to the store.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Request {
    OpenSession { requestor: Option<WindowId> },
    CloseSession,
    ClaimOwnership { owner: Option<WindowId> },
    Put { format: Format, data: Vec<u8> },
    Get { format: Format, buffer_len: u32 },
    EnumerateFormats { previous: Format },
    CountFormats { filter: Option<Format> },
    ListFormats,
    Info,
    SetViewer {
        viewer: Option<WindowId>,
        previous: Option<WindowId>,
    },
    ReleaseOwner { owner: WindowId },
    AddListener { window: WindowId },
    RemoveListener { window: WindowId },
    Listeners,
    RegisterFormat { name: String },
    FormatName { format: Format },
}

/// A reply from the store.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Reply {
    Done,
    Opened { owner: Option<WindowId> },
    Closed(CloseReply),
    Data(GetReply),
    Format(Format),
    Count(u32),
    Formats(Vec<Format>),
    Info(StoreInfo),
    Viewer(ViewerReply),
    Windows(Vec<WindowId>),
    Name(Option<String>),
    Error(Status),
}

/// Failure codes carried by [`Reply::Error`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum Status {
    AlreadyOpen = 1,
    NotOpen = 2,
    NotOwner = 3,
    AccessDenied = 4,
    InvalidParameter = 5,
    NotFound = 6,
}

impl Status {
    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Status::AlreadyOpen,
            2 => Status::NotOpen,
            3 => Status::NotOwner,
            4 => Status::AccessDenied,
            5 => Status::InvalidParameter,
            6 => Status::NotFound,
            _ => return None,
        })
    }

    /// Returns the code of a store error, `None` for transport errors.
    pub fn from_error(error: &StoreError) -> Option<Self> {
        Some(match error {
            StoreError::AlreadyOpen => Status::AlreadyOpen,
            StoreError::NotOpen => Status::NotOpen,
            StoreError::NotOwner => Status::NotOwner,
            StoreError::AccessDenied => Status::AccessDenied,
            StoreError::InvalidParameter => Status::InvalidParameter,
            StoreError::NotFound => Status::NotFound,
            StoreError::Transport(_) => return None,
        })
    }

    pub fn into_error(self) -> StoreError {
        match self {
            Status::AlreadyOpen => StoreError::AlreadyOpen,
            Status::NotOpen => StoreError::NotOpen,
            Status::NotOwner => StoreError::NotOwner,
            Status::AccessDenied => StoreError::AccessDenied,
            Status::InvalidParameter => StoreError::InvalidParameter,
            Status::NotFound => StoreError::NotFound,
        }
    }
}

/// Errors that can occur when decoding a message body.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("The message body ended early")]
    Truncated,

    #[error("The message body has {0} unexpected trailing bytes")]
    TrailingBytes(usize),

    #[error("Unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("Unknown {what} code {code}")]
    UnknownCode { what: &'static str, code: u8 },

    #[error("A string field is not valid UTF-8")]
    InvalidUtf8,
}

/// Largest frame body accepted in either direction.
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

mod op {
    pub const OPEN_SESSION: u8 = 0x01;
    pub const CLOSE_SESSION: u8 = 0x02;
    pub const CLAIM_OWNERSHIP: u8 = 0x03;
    pub const PUT: u8 = 0x04;
    pub const GET: u8 = 0x05;
    pub const ENUMERATE_FORMATS: u8 = 0x06;
    pub const COUNT_FORMATS: u8 = 0x07;
    pub const LIST_FORMATS: u8 = 0x08;
    pub const INFO: u8 = 0x09;
    pub const SET_VIEWER: u8 = 0x0a;
    pub const RELEASE_OWNER: u8 = 0x0b;
    pub const ADD_LISTENER: u8 = 0x0c;
    pub const REMOVE_LISTENER: u8 = 0x0d;
    pub const LISTENERS: u8 = 0x0e;
    pub const REGISTER_FORMAT: u8 = 0x0f;
    pub const FORMAT_NAME: u8 = 0x10;

    pub const DONE: u8 = 0x80;
    pub const OPENED: u8 = 0x81;
    pub const CLOSED: u8 = 0x82;
    pub const DATA: u8 = 0x83;
    pub const FORMAT: u8 = 0x84;
    pub const COUNT: u8 = 0x85;
    pub const FORMATS: u8 = 0x86;
    pub const INFO_REPLY: u8 = 0x87;
    pub const VIEWER: u8 = 0x88;
    pub const WINDOWS: u8 = 0x89;
    pub const NAME: u8 = 0x8a;
    pub const ERROR: u8 = 0xff;
}

fn put_window(buf: &mut impl BufMut, window: Option<WindowId>) {
    buf.put_u32_le(WindowId::raw(window));
}

fn put_bytes(buf: &mut impl BufMut, data: &[u8]) {
    buf.put_u32_le(data.len() as u32);
    buf.put_slice(data);
}

/// Bounds-checked reader over a message body.
struct Fields<'a>(&'a [u8]);

impl<'a> Fields<'a> {
    fn u8(&mut self) -> Result<u8, Error> {
        if self.0.remaining() < 1 {
            return Err(Error::Truncated);
        }
        Ok(self.0.get_u8())
    }

    fn u32(&mut self) -> Result<u32, Error> {
        if self.0.remaining() < 4 {
            return Err(Error::Truncated);
        }
        Ok(self.0.get_u32_le())
    }

    fn window(&mut self) -> Result<Option<WindowId>, Error> {
        self.u32().map(WindowId::new)
    }

    fn required_window(&mut self) -> Result<WindowId, Error> {
        self.window()?.ok_or(Error::Truncated)
    }

    fn format(&mut self) -> Result<Format, Error> {
        self.u32().map(Format)
    }

    fn bytes(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u32()? as usize;
        if self.0.len() < len {
            return Err(Error::Truncated);
        }
        let (data, rest) = self.0.split_at(len);
        self.0 = rest;
        Ok(data)
    }

    fn string(&mut self) -> Result<String, Error> {
        let data = self.bytes()?;
        String::from_utf8(data.to_vec()).map_err(|_| Error::InvalidUtf8)
    }

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, Error>,
    ) -> Result<Vec<T>, Error> {
        let count = self.u32()? as usize;
        // Every item is at least 4 bytes.
        if self.0.len() / 4 < count {
            return Err(Error::Truncated);
        }
        (0..count).map(|_| item(self)).collect()
    }

    fn finish<T>(self, value: T) -> Result<T, Error> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(Error::TrailingBytes(self.0.len()))
        }
    }
}

impl Request {
    /// Serializes the body of the request.
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Request::OpenSession { requestor } => {
                buf.put_u8(op::OPEN_SESSION);
                put_window(buf, *requestor);
            }
            Request::CloseSession => buf.put_u8(op::CLOSE_SESSION),
            Request::ClaimOwnership { owner } => {
                buf.put_u8(op::CLAIM_OWNERSHIP);
                put_window(buf, *owner);
            }
            Request::Put { format, data } => {
                buf.put_u8(op::PUT);
                buf.put_u32_le(format.id());
                put_bytes(buf, data);
            }
            Request::Get { format, buffer_len } => {
                buf.put_u8(op::GET);
                buf.put_u32_le(format.id());
                buf.put_u32_le(*buffer_len);
            }
            Request::EnumerateFormats { previous } => {
                buf.put_u8(op::ENUMERATE_FORMATS);
                buf.put_u32_le(previous.id());
            }
            Request::CountFormats { filter } => {
                buf.put_u8(op::COUNT_FORMATS);
                buf.put_u32_le(filter.unwrap_or(Format::NONE).id());
            }
            Request::ListFormats => buf.put_u8(op::LIST_FORMATS),
            Request::Info => buf.put_u8(op::INFO),
            Request::SetViewer { viewer, previous } => {
                buf.put_u8(op::SET_VIEWER);
                put_window(buf, *viewer);
                put_window(buf, *previous);
            }
            Request::ReleaseOwner { owner } => {
                buf.put_u8(op::RELEASE_OWNER);
                put_window(buf, Some(*owner));
            }
            Request::AddListener { window } => {
                buf.put_u8(op::ADD_LISTENER);
                put_window(buf, Some(*window));
            }
            Request::RemoveListener { window } => {
                buf.put_u8(op::REMOVE_LISTENER);
                put_window(buf, Some(*window));
            }
            Request::Listeners => buf.put_u8(op::LISTENERS),
            Request::RegisterFormat { name } => {
                buf.put_u8(op::REGISTER_FORMAT);
                put_bytes(buf, name.as_bytes());
            }
            Request::FormatName { format } => {
                buf.put_u8(op::FORMAT_NAME);
                buf.put_u32_le(format.id());
            }
        }
    }

    pub fn decode(body: &[u8]) -> Result<Self, Error> {
        let mut fields = Fields(body);

        let request = match fields.u8()? {
            op::OPEN_SESSION => Request::OpenSession {
                requestor: fields.window()?,
            },
            op::CLOSE_SESSION => Request::CloseSession,
            op::CLAIM_OWNERSHIP => Request::ClaimOwnership {
                owner: fields.window()?,
            },
            op::PUT => Request::Put {
                format: fields.format()?,
                data: fields.bytes()?.to_vec(),
            },
            op::GET => Request::Get {
                format: fields.format()?,
                buffer_len: fields.u32()?,
            },
            op::ENUMERATE_FORMATS => Request::EnumerateFormats {
                previous: fields.format()?,
            },
            op::COUNT_FORMATS => Request::CountFormats {
                filter: Some(fields.format()?).filter(|format| *format != Format::NONE),
            },
            op::LIST_FORMATS => Request::ListFormats,
            op::INFO => Request::Info,
            op::SET_VIEWER => Request::SetViewer {
                viewer: fields.window()?,
                previous: fields.window()?,
            },
            op::RELEASE_OWNER => Request::ReleaseOwner {
                owner: fields.required_window()?,
            },
            op::ADD_LISTENER => Request::AddListener {
                window: fields.required_window()?,
            },
            op::REMOVE_LISTENER => Request::RemoveListener {
                window: fields.required_window()?,
            },
            op::LISTENERS => Request::Listeners,
            op::REGISTER_FORMAT => Request::RegisterFormat {
                name: fields.string()?,
            },
            op::FORMAT_NAME => Request::FormatName {
                format: fields.format()?,
            },
            opcode => return Err(Error::UnknownOpcode(opcode)),
        };

        fields.finish(request)
    }
}

impl Reply {
    /// Serializes the body of the reply.
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Reply::Done => buf.put_u8(op::DONE),
            Reply::Opened { owner } => {
                buf.put_u8(op::OPENED);
                put_window(buf, *owner);
            }
            Reply::Closed(reply) => {
                buf.put_u8(op::CLOSED);
                put_window(buf, reply.viewer);
                put_window(buf, reply.owner);
            }
            Reply::Data(reply) => {
                buf.put_u8(op::DATA);
                buf.put_u8(match reply.status {
                    GetStatus::Ok => 0,
                    GetStatus::Overflow => 1,
                    GetStatus::NotFound => 2,
                });
                buf.put_u32_le(reply.total);
                put_window(buf, reply.owner);
                put_bytes(buf, &reply.data);
            }
            Reply::Format(format) => {
                buf.put_u8(op::FORMAT);
                buf.put_u32_le(format.id());
            }
            Reply::Count(count) => {
                buf.put_u8(op::COUNT);
                buf.put_u32_le(*count);
            }
            Reply::Formats(formats) => {
                buf.put_u8(op::FORMATS);
                buf.put_u32_le(formats.len() as u32);
                for format in formats {
                    buf.put_u32_le(format.id());
                }
            }
            Reply::Info(info) => {
                buf.put_u8(op::INFO_REPLY);
                put_window(buf, info.owner);
                put_window(buf, info.window);
                put_window(buf, info.viewer);
                buf.put_u32_le(info.sequence);
            }
            Reply::Viewer(ViewerReply::Set { old_viewer, owner }) => {
                buf.put_u8(op::VIEWER);
                buf.put_u8(0);
                put_window(buf, *old_viewer);
                put_window(buf, *owner);
            }
            Reply::Viewer(ViewerReply::Pending { viewer }) => {
                buf.put_u8(op::VIEWER);
                buf.put_u8(1);
                put_window(buf, Some(*viewer));
            }
            Reply::Windows(windows) => {
                buf.put_u8(op::WINDOWS);
                buf.put_u32_le(windows.len() as u32);
                for window in windows {
                    buf.put_u32_le(window.get());
                }
            }
            Reply::Name(name) => {
                buf.put_u8(op::NAME);
                match name {
                    Some(name) => {
                        buf.put_u8(1);
                        put_bytes(buf, name.as_bytes());
                    }
                    None => buf.put_u8(0),
                }
            }
            Reply::Error(status) => {
                buf.put_u8(op::ERROR);
                buf.put_u8(*status as u8);
            }
        }
    }

    pub fn decode(body: &[u8]) -> Result<Self, Error> {
        let mut fields = Fields(body);

        let reply = match fields.u8()? {
            op::DONE => Reply::Done,
            op::OPENED => Reply::Opened {
                owner: fields.window()?,
            },
            op::CLOSED => Reply::Closed(CloseReply {
                viewer: fields.window()?,
                owner: fields.window()?,
            }),
            op::DATA => {
                let status = match fields.u8()? {
                    0 => GetStatus::Ok,
                    1 => GetStatus::Overflow,
                    2 => GetStatus::NotFound,
                    code => return Err(Error::UnknownCode { what: "get status", code }),
                };
                Reply::Data(GetReply {
                    status,
                    total: fields.u32()?,
                    owner: fields.window()?,
                    data: fields.bytes()?.to_vec(),
                })
            }
            op::FORMAT => Reply::Format(fields.format()?),
            op::COUNT => Reply::Count(fields.u32()?),
            op::FORMATS => Reply::Formats(fields.list(Fields::format)?),
            op::INFO_REPLY => Reply::Info(StoreInfo {
                owner: fields.window()?,
                window: fields.window()?,
                viewer: fields.window()?,
                sequence: fields.u32()?,
            }),
            op::VIEWER => match fields.u8()? {
                0 => Reply::Viewer(ViewerReply::Set {
                    old_viewer: fields.window()?,
                    owner: fields.window()?,
                }),
                1 => Reply::Viewer(ViewerReply::Pending {
                    viewer: fields.required_window()?,
                }),
                code => return Err(Error::UnknownCode { what: "viewer reply", code }),
            },
            op::WINDOWS => Reply::Windows(
                fields
                    .list(Fields::window)?
                    .into_iter()
                    .flatten()
                    .collect(),
            ),
            op::NAME => match fields.u8()? {
                0 => Reply::Name(None),
                _ => Reply::Name(Some(fields.string()?)),
            },
            op::ERROR => {
                let code = fields.u8()?;
                Reply::Error(
                    Status::from_code(code).ok_or(Error::UnknownCode { what: "status", code })?,
                )
            }
            opcode => return Err(Error::UnknownOpcode(opcode)),
        };

        fields.finish(reply)
    }
}

/// Writes one frame carrying `body`.
pub fn write_frame(writer: &mut impl Write, body: &[u8]) -> io::Result<()> {
    if body.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame too large"));
    }
    let len = body.len() as u32;

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.put_u32_le(len);
    frame.put_slice(body);
    writer.write_all(&frame)?;
    writer.flush()
}

/// Reads one frame and returns its body.
///
/// Returns `None` if the stream ends cleanly before the frame starts.
pub fn read_frame(reader: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut len = [0; 4];
    let mut filled = 0;
    while filled < len.len() {
        match reader.read(&mut len[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }

    let len = u32::from_le_bytes(len) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes is over the limit"),
        ));
    }

    let mut body = vec![0; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}
