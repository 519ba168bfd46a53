//! MySQL connection configuration.
//!
//! Holds the options the handshake response is built from: credentials,
//! initial database, character set, capability preferences and connection
//! attributes. Configurations can be built in code or loaded from JSON.

use serde::{Deserialize, Serialize};

use mysqlwire_core::{ConfigError, Error, Result};

use crate::protocol::capabilities::{
    CLIENT_CONNECT_ATTRS, CLIENT_CONNECT_WITH_DB, CLIENT_DEPRECATE_EOF, CLIENT_LOCAL_FILES,
    DEFAULT_CLIENT_FLAGS,
};

/// MySQL connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Database name to connect to (optional at connect time)
    pub database: Option<String>,
    /// Character set (default: utf8mb4_bin)
    pub charset: u8,
    /// Max allowed packet size (default: 1GB)
    pub max_packet_size: u32,
    /// Auth plugin to announce instead of the server's default
    pub auth_plugin: Option<String>,
    /// Connection attributes, sent in insertion order
    pub attributes: Vec<(String, String)>,
    /// Local infile handling (disabled by default for security)
    pub local_infile: bool,
    /// Accept OK packets in place of EOF packets
    pub deprecate_eof: bool,
    /// Capability bits to request on top of the defaults
    pub extra_capabilities: u32,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: None,
            database: None,
            charset: crate::protocol::charset::DEFAULT_CHARSET,
            max_packet_size: 0x4000_0000, // 1GB
            auth_plugin: None,
            attributes: Vec::new(),
            local_infile: false,
            deprecate_eof: false,
            extra_capabilities: 0,
        }
    }
}

impl MySqlConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON document.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("Invalid MySQL configuration: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the character set.
    pub fn charset(mut self, charset: u8) -> Self {
        self.charset = charset;
        self
    }

    /// Set the max allowed packet size.
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Announce a specific auth plugin.
    pub fn auth_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.auth_plugin = Some(plugin.into());
        self
    }

    /// Set a connection attribute, replacing an existing value for `key`.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
        self
    }

    /// Enable or disable local infile handling.
    ///
    /// # Security Warning
    /// Enabling local infile can be a security risk. Only enable if you
    /// trust the server and understand the implications.
    pub fn local_infile(mut self, enabled: bool) -> Self {
        self.local_infile = enabled;
        self
    }

    /// Ask the server to end result sets with OK instead of EOF packets.
    pub fn deprecate_eof(mut self, enabled: bool) -> Self {
        self.deprecate_eof = enabled;
        self
    }

    /// Request additional capability bits.
    pub fn extra_capabilities(mut self, flags: u32) -> Self {
        self.extra_capabilities |= flags;
        self
    }

    /// Build capability flags based on configuration.
    pub fn capability_flags(&self) -> u32 {
        let mut flags = DEFAULT_CLIENT_FLAGS | self.extra_capabilities;

        if self.database.is_some() {
            flags |= CLIENT_CONNECT_WITH_DB;
        }

        if self.local_infile {
            flags |= CLIENT_LOCAL_FILES;
        }

        if self.deprecate_eof {
            flags |= CLIENT_DEPRECATE_EOF;
        }

        if !self.attributes.is_empty() {
            flags |= CLIENT_CONNECT_ATTRS;
        }

        flags
    }
}
