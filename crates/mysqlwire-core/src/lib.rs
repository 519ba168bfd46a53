//! Core types for the mysqlwire codec.
//!
//! Every decode and encode operation in `mysqlwire` reports failures through
//! [`Error`], which separates three situations:
//!
//! - [`Error::BufferUnderflow`]: a read ran past the end of the packet
//! - [`Error::Protocol`]: the bytes do not follow the wire format
//! - [`Error::Server`]: the server answered with a well-formed ERR packet
//!
//! The first two leave the byte stream desynchronized. The third is an
//! ordinary failure the caller may recover from.

pub mod error;

pub use error::{
    BufferUnderflow, ConfigError, Error, ProtocolError, ProtocolErrorKind, Result, ServerError,
};
