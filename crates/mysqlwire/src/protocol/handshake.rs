//! Connection-phase packets: the server greeting and the client's
//! HandshakeResponse41.
//!
//! ```text
//! 4              capability flags, CLIENT_PROTOCOL_41 always set
//! 4              max-packet size
//! 1              character set
//! string[23]     reserved (all [0])
//! string[NUL]    username
//!
//! if capabilities & CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA {
//!     lenenc-int     length of auth-response
//!     string[n]      auth-response
//! } else if capabilities & CLIENT_SECURE_CONNECTION {
//!     1              length of auth-response
//!     string[n]      auth-response
//! } else {
//!     string[NUL]    auth-response
//! }
//!
//! if capabilities & CLIENT_CONNECT_WITH_DB {
//!     string[NUL]    database
//! }
//!
//! if capabilities & CLIENT_PLUGIN_AUTH {
//!     string[NUL]    auth plugin name
//! }
//!
//! if capabilities & CLIENT_CONNECT_ATTRS {
//!     lenenc-int     length of all key-values
//!     lenenc-str     key
//!     lenenc-str     value
//!     ...
//! }
//! ```

use mysqlwire_core::{Error, ProtocolErrorKind, Result};

use crate::auth;
use crate::config::MySqlConfig;
use crate::protocol::capabilities::{
    CLIENT_CONNECT_ATTRS, CLIENT_CONNECT_WITH_DB, CLIENT_PLUGIN_AUTH,
    CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA, CLIENT_PROTOCOL_41, CLIENT_SECURE_CONNECTION, has,
};
use crate::protocol::{PacketReader, PacketWriter};

/// Only protocol version 10 is spoken by servers since MySQL 3.21.
pub const PROTOCOL_VERSION: u8 = 10;

/// Bytes of reserved zero padding after the character set.
const RESERVED_LEN: usize = 23;

/// Server greeting (HandshakeV10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandshake {
    /// Protocol version
    pub protocol_version: u8,
    /// Server version string
    pub server_version: String,
    /// Connection ID
    pub connection_id: u32,
    /// Authentication data (scramble), both parts joined
    pub auth_data: Vec<u8>,
    /// Server capability flags
    pub capabilities: u32,
    /// Default charset
    pub charset: u8,
    /// Server status flags
    pub status_flags: u16,
    /// Authentication plugin name
    pub auth_plugin: String,
}

impl ServerHandshake {
    /// Parse the server greeting.
    ///
    /// A server that refuses the connection outright (too many connections,
    /// host blocked) sends an ERR packet instead, which surfaces as
    /// [`Error::Server`].
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self> {
        reader.raise_if_error(0)?;

        let protocol_version = reader.read_u8()?;
        if protocol_version != PROTOCOL_VERSION {
            return Err(Error::protocol(
                ProtocolErrorKind::Unsupported,
                format!("Unsupported protocol version: {protocol_version}"),
            ));
        }

        let server_version = reader.read_null_string()?;
        let connection_id = reader.read_u32_le()?;
        let mut auth_data = reader.read_bytes_owned(8)?;
        reader.skip(1)?;
        let caps_lower = reader.read_u16_le()?;

        // Pre-4.1 servers may stop here.
        if reader.is_empty() {
            return Ok(Self {
                protocol_version,
                server_version,
                connection_id,
                auth_data,
                capabilities: u32::from(caps_lower),
                charset: 0,
                status_flags: 0,
                auth_plugin: auth::plugins::MYSQL_NATIVE_PASSWORD.to_string(),
            });
        }

        let charset = reader.read_u8()?;
        let status_flags = reader.read_u16_le()?;
        let caps_upper = reader.read_u16_le()?;
        let capabilities = u32::from(caps_lower) | (u32::from(caps_upper) << 16);

        let auth_data_len = usize::from(reader.read_u8()?);
        reader.skip(10)?;

        if has(capabilities, CLIENT_SECURE_CONNECTION) {
            let len2 = auth_data_len.saturating_sub(8).max(13);
            let part2 = reader.read_bytes(len2)?;
            let part2 = part2.strip_suffix(&[0]).unwrap_or(part2);
            auth_data.extend_from_slice(part2);
        }

        let auth_plugin = if has(capabilities, CLIENT_PLUGIN_AUTH) {
            // Some servers omit the terminator on the last field.
            let rest = reader.read_rest();
            let name = rest.split(|&b| b == 0).next().unwrap_or_default();
            String::from_utf8_lossy(name).into_owned()
        } else {
            auth::plugins::MYSQL_NATIVE_PASSWORD.to_string()
        };

        tracing::debug!(
            server_version = %server_version,
            connection_id,
            capabilities = format_args!("{capabilities:#010x}"),
            auth_plugin = %auth_plugin,
            "Parsed server handshake"
        );

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            auth_data,
            capabilities,
            charset,
            status_flags,
            auth_plugin,
        })
    }
}

/// Client HandshakeResponse41 payload.
///
/// `capabilities` must already be the negotiated set; it alone decides
/// which optional sections are written.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeResponse<'a> {
    /// Negotiated capability flags
    pub capabilities: u32,
    /// Largest packet the client will send
    pub max_packet_size: u32,
    /// Connection character set
    pub charset: u8,
    /// Login user
    pub username: &'a str,
    /// Plugin-specific auth data, without any length prefix or terminator
    pub auth_response: &'a [u8],
    /// Initial database (CLIENT_CONNECT_WITH_DB)
    pub database: Option<&'a str>,
    /// Plugin that produced `auth_response` (CLIENT_PLUGIN_AUTH)
    pub auth_plugin: &'a str,
    /// Key/value pairs in send order (CLIENT_CONNECT_ATTRS)
    pub attributes: &'a [(String, String)],
}

impl HandshakeResponse<'_> {
    /// Append the payload to `writer`.
    ///
    /// A gated section whose capability bit is set but whose data is absent
    /// is written in its empty form; a section whose bit is clear writes
    /// nothing even when data is present.
    pub fn encode(&self, writer: &mut PacketWriter) -> Result<()> {
        let caps = self.capabilities;

        writer.write_u32_le(caps);
        writer.write_u32_le(self.max_packet_size);
        writer.write_u8(self.charset);
        writer.write_zeros(RESERVED_LEN);
        writer.write_null_string(self.username);

        if has(caps, CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
            writer.write_lenenc_bytes(self.auth_response);
        } else if has(caps, CLIENT_SECURE_CONNECTION) {
            let len = u8::try_from(self.auth_response.len()).map_err(|_| {
                Error::protocol(
                    ProtocolErrorKind::Encoding,
                    format!(
                        "Auth response of {} bytes does not fit a 1-byte length",
                        self.auth_response.len()
                    ),
                )
            })?;
            writer.write_u8(len);
            writer.write_bytes(self.auth_response);
        } else {
            if self.auth_response.contains(&0) {
                return Err(Error::protocol(
                    ProtocolErrorKind::Encoding,
                    "Auth response contains a NUL byte and cannot be NUL-terminated",
                ));
            }
            writer.write_null_bytes(self.auth_response);
        }

        if has(caps, CLIENT_CONNECT_WITH_DB) {
            writer.write_null_string(self.database.unwrap_or_default());
        }

        if has(caps, CLIENT_PLUGIN_AUTH) {
            writer.write_null_string(self.auth_plugin);
        }

        if has(caps, CLIENT_CONNECT_ATTRS) {
            let mut attrs = PacketWriter::new();
            for (key, value) in self.attributes {
                attrs.write_lenenc_string(key);
                attrs.write_lenenc_string(value);
            }
            writer.write_lenenc_bytes(attrs.as_bytes());
        }

        Ok(())
    }

    /// Encode into a fresh payload buffer.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let mut writer = PacketWriter::new();
        self.encode(&mut writer)?;
        Ok(writer.into_bytes())
    }
}

/// Build the handshake response payload for `config` answering `server`.
///
/// Requests `config.capability_flags()` and keeps only what the server
/// also offers.
pub fn build_handshake_response(config: &MySqlConfig, server: &ServerHandshake) -> Result<Vec<u8>> {
    if !has(server.capabilities, CLIENT_PROTOCOL_41) {
        return Err(Error::protocol(
            ProtocolErrorKind::Unsupported,
            "Server does not support protocol 4.1",
        ));
    }

    let requested = config.capability_flags();
    let negotiated = requested & server.capabilities;
    let dropped = requested & !server.capabilities;
    if dropped != 0 {
        tracing::warn!(
            dropped = format_args!("{dropped:#010x}"),
            "Server did not offer requested capabilities"
        );
    }

    let requested_plugin = config.auth_plugin.as_deref().unwrap_or(&server.auth_plugin);
    let password = config.password.as_deref().unwrap_or_default();
    let (plugin, auth_response) =
        auth::auth_response(requested_plugin, password, &server.auth_data);

    // Length-prefixed forms carry the clear password's terminator inside the data.
    let auth_response = if plugin == auth::plugins::MYSQL_CLEAR_PASSWORD
        && has(
            negotiated,
            CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA | CLIENT_SECURE_CONNECTION,
        ) {
        auth::clear_password_terminated(password)
    } else {
        auth_response
    };

    let response = HandshakeResponse {
        capabilities: negotiated,
        max_packet_size: config.max_packet_size,
        charset: config.charset,
        username: &config.user,
        auth_response: &auth_response,
        database: config.database.as_deref(),
        auth_plugin: plugin,
        attributes: &config.attributes,
    };

    tracing::debug!(
        user = %config.user,
        capabilities = format_args!("{negotiated:#010x}"),
        auth_plugin = plugin,
        "Encoding handshake response"
    );

    response.to_payload()
}
