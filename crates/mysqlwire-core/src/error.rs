//! Error types for MySQL wire codec operations.

use std::fmt;

/// The primary error type for all codec operations.
#[derive(Debug)]
pub enum Error {
    /// A read would consume more bytes than remain in the packet
    BufferUnderflow(BufferUnderflow),
    /// Malformed or unexpected wire data
    Protocol(ProtocolError),
    /// A well-formed ERR packet sent by the server
    Server(ServerError),
    /// Configuration errors
    Config(ConfigError),
}

/// Details of a short read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUnderflow {
    /// Bytes the read required
    pub needed: usize,
    /// Bytes left in the packet when the read was attempted
    pub remaining: usize,
    /// Absolute buffer offset of the attempted read
    pub offset: usize,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub message: String,
    pub raw_data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Packet header missing or inconsistent
    InvalidHeader,
    /// Undefined length-encoded integer sentinel (0xFF)
    InvalidLengthEncoding,
    /// NULL (0xFB) where a value is required
    UnexpectedNull,
    /// Marker byte does not match the expected packet
    UnexpectedMarker,
    /// Server or peer lacks a required feature
    Unsupported,
    /// A value cannot be represented in the requested wire form
    Encoding,
}

/// Structured error reported by the server in an ERR packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// MySQL error code (e.g. 1045)
    pub code: u16,
    /// Five character SQL state, when the server sent one
    pub sql_state: Option<String>,
    /// Human-readable message
    pub message: String,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProtocolError {
    /// Create a protocol error without attached wire data.
    pub fn new(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raw_data: None,
        }
    }

    /// Attach the offending bytes.
    pub fn with_raw_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.raw_data = Some(data.into());
        self
    }
}

impl ServerError {
    /// ER_DUP_ENTRY
    pub fn is_duplicate_key(&self) -> bool {
        self.code == 1062
    }

    /// ER_ROW_IS_REFERENCED_2 / ER_NO_REFERENCED_ROW_2
    pub fn is_foreign_key_violation(&self) -> bool {
        self.code == 1451 || self.code == 1452
    }

    /// ER_ACCESS_DENIED_ERROR
    pub fn is_access_denied(&self) -> bool {
        self.code == 1045
    }
}

impl Error {
    /// Shorthand for an underflow error.
    pub fn underflow(needed: usize, remaining: usize, offset: usize) -> Self {
        Error::BufferUnderflow(BufferUnderflow {
            needed,
            remaining,
            offset,
        })
    }

    /// Shorthand for a protocol error.
    pub fn protocol(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError::new(kind, message))
    }

    /// Does this error leave the stream in an unknown state?
    ///
    /// Underflow and protocol errors mean the byte stream is desynchronized
    /// and the connection must be dropped. Server errors do not.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, Error::BufferUnderflow(_) | Error::Protocol(_))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server(_))
    }

    /// Server error code, if this is a server error.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Server(e) => Some(e.code),
            _ => None,
        }
    }

    /// Get SQLSTATE if available (e.g., "23000" for a duplicate key)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(e) => e.sql_state.as_deref(),
            _ => None,
        }
    }

    /// Kind of protocol error, if this is one.
    pub fn protocol_kind(&self) -> Option<ProtocolErrorKind> {
        match self {
            Error::Protocol(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BufferUnderflow(e) => write!(f, "Buffer underflow: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Server(e) => write!(f, "Server error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for BufferUnderflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "needed {} bytes at offset {}, only {} remaining",
            self.needed, self.offset, self.remaining
        )
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(state) = &self.sql_state {
            write!(f, "[{}] ({}) {}", self.code, state, self.message)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ServerError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<BufferUnderflow> for Error {
    fn from(err: BufferUnderflow) -> Self {
        Error::BufferUnderflow(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        Error::Server(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
