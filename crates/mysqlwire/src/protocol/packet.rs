//! Server response classification and OK / ERR / EOF parsing.

use mysqlwire_core::{Error, ProtocolErrorKind, Result, ServerError};

use crate::protocol::capabilities::{
    CLIENT_DEPRECATE_EOF, CLIENT_PROTOCOL_41, CLIENT_SESSION_TRACK, CLIENT_TRANSACTIONS, has,
};
use crate::protocol::server_status::{
    SERVER_MORE_RESULTS_EXISTS, SERVER_SESSION_STATE_CHANGED, SERVER_STATUS_IN_TRANS,
};
use crate::protocol::{MAX_PACKET_SIZE, PacketReader, marker};

/// Server response packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// OK packet (0x00, or 0xFE with CLIENT_DEPRECATE_EOF)
    Ok,
    /// Error packet (0xFF)
    Error,
    /// EOF packet (0xFE on a payload shorter than 9 bytes)
    Eof,
    /// Local infile request (0xFB)
    LocalInfile,
    /// Data packet (result set row, column definition, etc.)
    Data,
}

impl PacketType {
    /// Detect packet type from the first byte of payload.
    ///
    /// 0xFE is overloaded: a short packet is EOF, unless EOF packets were
    /// deprecated, in which case any non-continued 0xFE packet is an OK
    /// terminator. Row packets that start with 0xFE carry an 8-byte length
    /// and are always at least 9 bytes.
    pub fn from_first_byte(byte: u8, payload_len: usize, capabilities: u32) -> Self {
        match byte {
            marker::OK => PacketType::Ok,
            marker::ERR => PacketType::Error,
            marker::EOF
                if has(capabilities, CLIENT_DEPRECATE_EOF) && payload_len < MAX_PACKET_SIZE =>
            {
                PacketType::Ok
            }
            marker::EOF if payload_len < 9 => PacketType::Eof,
            marker::LOCAL_INFILE => PacketType::LocalInfile,
            _ => PacketType::Data,
        }
    }
}

/// Parsed OK packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    /// Number of affected rows
    pub affected_rows: u64,
    /// Last insert ID
    pub last_insert_id: u64,
    /// Server status flags
    pub status_flags: u16,
    /// Number of warnings
    pub warnings: u16,
    /// Info string (if any)
    pub info: String,
    /// Raw session state change block (CLIENT_SESSION_TRACK only)
    pub session_state_changes: Option<Vec<u8>>,
}

impl OkPacket {
    /// The session has an open transaction (SERVER_STATUS_IN_TRANS).
    pub fn in_transaction(&self) -> bool {
        self.status_flags & SERVER_STATUS_IN_TRANS != 0
    }

    /// Another result set follows this one.
    pub fn more_results_exist(&self) -> bool {
        self.status_flags & SERVER_MORE_RESULTS_EXISTS != 0
    }
}

/// Parsed Error packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    /// Error code
    pub error_code: u16,
    /// SQL state (5 characters, empty before protocol 4.1)
    pub sql_state: String,
    /// Error message
    pub error_message: String,
}

impl From<ErrPacket> for ServerError {
    fn from(err: ErrPacket) -> Self {
        ServerError {
            code: err.error_code,
            sql_state: (!err.sql_state.is_empty()).then_some(err.sql_state),
            message: err.error_message,
        }
    }
}

/// Parsed EOF packet (deprecated in newer MySQL versions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EofPacket {
    /// Number of warnings
    pub warnings: u16,
    /// Server status flags
    pub status_flags: u16,
}

impl EofPacket {
    /// Another result set follows this one.
    pub fn more_results_exist(&self) -> bool {
        self.status_flags & SERVER_MORE_RESULTS_EXISTS != 0
    }
}

/// A classified server packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Ok(OkPacket),
    Error(ErrPacket),
    Eof(EofPacket),
    /// LOCAL INFILE request carrying the file name
    LocalInfile(String),
    /// Ordinary payload; the reader was not advanced
    Data,
}

impl PacketReader<'_> {
    /// Type of the packet at the current position, without consuming anything.
    pub fn packet_type(&self, capabilities: u32) -> PacketType {
        match self.peek() {
            Some(first) => PacketType::from_first_byte(first, self.remaining(), capabilities),
            None => PacketType::Data,
        }
    }

    /// Classify the packet and parse it if it is a status packet.
    pub fn classify(&mut self, capabilities: u32) -> Result<Packet> {
        let packet_type = self.packet_type(capabilities);
        tracing::trace!(?packet_type, sequence_id = self.sequence_id(), "Classified packet");

        match packet_type {
            PacketType::Ok => self.parse_ok_packet(capabilities).map(Packet::Ok),
            PacketType::Error => self.parse_err_packet(capabilities).map(Packet::Error),
            PacketType::Eof => self.parse_eof_packet(capabilities).map(Packet::Eof),
            PacketType::LocalInfile => {
                self.expect_marker(&[marker::LOCAL_INFILE], "LOCAL INFILE")?;
                Ok(Packet::LocalInfile(self.read_rest_string()))
            }
            PacketType::Data => Ok(Packet::Data),
        }
    }

    fn expect_marker(&mut self, accepted: &[u8], packet: &str) -> Result<u8> {
        let at = self.position();
        let byte = self.read_u8()?;
        if accepted.contains(&byte) {
            Ok(byte)
        } else {
            Err(Error::protocol(
                ProtocolErrorKind::UnexpectedMarker,
                format!("Expected {packet} marker, found 0x{byte:02X} at payload offset {at}"),
            ))
        }
    }

    fn read_required_lenenc(&mut self, field: &str) -> Result<u64> {
        self.read_lenenc_int()?.ok_or_else(|| {
            Error::protocol(
                ProtocolErrorKind::UnexpectedNull,
                format!("NULL {field} in OK packet"),
            )
        })
    }

    /// Parse an OK packet from the current position.
    ///
    /// OK packet format:
    /// - 0x00 or 0xFE marker
    /// - affected_rows: lenenc int
    /// - last_insert_id: lenenc int
    /// - status_flags: 2 bytes (protocol 4.1 or CLIENT_TRANSACTIONS)
    /// - warnings: 2 bytes (protocol 4.1)
    /// - info: lenenc string with CLIENT_SESSION_TRACK, else rest of packet
    /// - session state: lenenc bytes, if SERVER_SESSION_STATE_CHANGED
    pub fn parse_ok_packet(&mut self, capabilities: u32) -> Result<OkPacket> {
        self.expect_marker(&[marker::OK, marker::EOF], "OK")?;

        let affected_rows = self.read_required_lenenc("affected_rows")?;
        let last_insert_id = self.read_required_lenenc("last_insert_id")?;

        let (status_flags, warnings) = if has(capabilities, CLIENT_PROTOCOL_41) {
            (self.read_u16_le()?, self.read_u16_le()?)
        } else if has(capabilities, CLIENT_TRANSACTIONS) {
            (self.read_u16_le()?, 0)
        } else {
            (0, 0)
        };

        let mut session_state_changes = None;
        let info = if has(capabilities, CLIENT_SESSION_TRACK) {
            let info = if self.is_empty() {
                String::new()
            } else {
                self.read_lenenc_string()?
            };
            if status_flags & SERVER_SESSION_STATE_CHANGED != 0 {
                session_state_changes = Some(self.read_lenenc_bytes_owned()?);
            }
            info
        } else {
            self.read_rest_string()
        };

        Ok(OkPacket {
            affected_rows,
            last_insert_id,
            status_flags,
            warnings,
            info,
            session_state_changes,
        })
    }

    /// Parse an Error packet from the current position.
    ///
    /// ERR packet format:
    /// - 0xFF marker
    /// - error_code: 2 bytes
    /// - '#' marker + sql_state (5 bytes), protocol 4.1 only
    /// - error_message: rest of packet
    pub fn parse_err_packet(&mut self, capabilities: u32) -> Result<ErrPacket> {
        self.expect_marker(&[marker::ERR], "ERR")?;

        let error_code = self.read_u16_le()?;

        let sql_state =
            if has(capabilities, CLIENT_PROTOCOL_41) && self.peek() == Some(marker::SQL_STATE) {
                self.skip(1)?;
                self.read_string(5)?
            } else {
                String::new()
            };

        let error_message = self.read_rest_string();

        Ok(ErrPacket {
            error_code,
            sql_state,
            error_message,
        })
    }

    /// Parse an EOF packet from the current position.
    ///
    /// EOF packet format:
    /// - 0xFE marker
    /// - warnings: 2 bytes (protocol 4.1)
    /// - status_flags: 2 bytes (protocol 4.1)
    pub fn parse_eof_packet(&mut self, capabilities: u32) -> Result<EofPacket> {
        self.expect_marker(&[marker::EOF], "EOF")?;

        if !has(capabilities, CLIENT_PROTOCOL_41) {
            return Ok(EofPacket::default());
        }

        let warnings = self.read_u16_le()?;
        let status_flags = self.read_u16_le()?;

        Ok(EofPacket {
            warnings,
            status_flags,
        })
    }
}
