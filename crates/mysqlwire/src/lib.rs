//! MySQL client/server wire protocol codec.
//!
//! This crate decodes and encodes MySQL packets without performing any I/O.
//! It provides:
//!
//! - Packet framing with sequence numbers and 16MB continuation
//! - A bounds-checked [`PacketReader`] over borrowed buffers
//! - Length-encoded integers and strings
//! - Classification of OK, ERR, EOF and LOCAL INFILE packets
//! - Server greeting parsing and HandshakeResponse41 encoding
//! - Auth scrambles for mysql_native_password and caching_sha2_password
//!
//! # MySQL Protocol Overview
//!
//! MySQL uses a packet-based protocol with:
//! - 3-byte payload length + 1-byte sequence number header
//! - Payloads of 16MB - 1 or more are split across packets
//! - Capability flags negotiated at connect time that change the layout
//!   of later packets
//!
//! # Example
//!
//! ```rust,ignore
//! use mysqlwire::{MySqlConfig, PacketReader, ServerHandshake, build_handshake_response};
//! use mysqlwire::protocol::writer::build_packet_from_payload;
//!
//! let mut reader = PacketReader::create(&greeting_bytes, 0)?;
//! let server = ServerHandshake::parse(&mut reader)?;
//!
//! let config = MySqlConfig::new().user("root").password("secret").database("mydb");
//! let payload = build_handshake_response(&config, &server)?;
//! let packet = build_packet_from_payload(&payload, reader.sequence_id().wrapping_add(1));
//! ```

pub mod auth;
pub mod codec;
pub mod config;
pub mod protocol;

pub use config::MySqlConfig;
pub use protocol::{
    EofPacket, ErrPacket, HandshakeResponse, OkPacket, Packet, PacketReader, PacketType,
    PacketWriter, ServerHandshake, build_handshake_response,
};

pub use mysqlwire_core::{
    BufferUnderflow, ConfigError, Error, ProtocolError, ProtocolErrorKind, Result, ServerError,
};
