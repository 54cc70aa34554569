//! Connection configuration types.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// How credentials are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMechanism {
    /// The LOGIN command.
    #[default]
    Login,
    /// `AUTHENTICATE PLAIN` (RFC 4616).
    Plain,
}

/// IMAP connection configuration.
#[derive(Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Authentication mechanism.
    pub auth: AuthMechanism,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
    /// Address messages by UID rather than sequence number.
    pub use_uids: bool,
    /// Cache decoded results.
    pub use_cache: bool,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ConfigBuilder::new(host)
            .credentials(username, password)
            .build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Reads the `{server, port, username, password, tls}` mapping.
    ///
    /// `tls: true` selects implicit TLS and `tls: false` plaintext; a
    /// `starttls: true` key selects STARTTLS. Timeouts are in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the mapping is malformed or
    /// misses a required key.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("invalid configuration: {e}")))?;
        Ok(raw.into())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth", &self.auth)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("use_uids", &self.use_uids)
            .field("use_cache", &self.use_cache)
            .finish()
    }
}

/// Wire shape of a JSON configuration.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(alias = "host")]
    server: String,
    port: Option<u16>,
    username: String,
    password: String,
    tls: Option<bool>,
    #[serde(default)]
    starttls: bool,
    #[serde(default)]
    auth_plain: bool,
    connect_timeout: Option<u64>,
    io_timeout: Option<u64>,
    use_uids: Option<bool>,
    use_cache: Option<bool>,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let security = match (raw.starttls, raw.tls) {
            (true, _) => Security::StartTls,
            (false, Some(false)) => Security::None,
            (false, _) => Security::Implicit,
        };

        let mut builder = ConfigBuilder::new(raw.server)
            .security(security)
            .credentials(raw.username, raw.password);
        if let Some(port) = raw.port {
            builder = builder.port(port);
        }
        if raw.auth_plain {
            builder = builder.auth(AuthMechanism::Plain);
        }
        if let Some(secs) = raw.connect_timeout {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = raw.io_timeout {
            builder = builder.io_timeout(Duration::from_secs(secs));
        }
        if let Some(use_uids) = raw.use_uids {
            builder = builder.use_uids(use_uids);
        }
        if let Some(use_cache) = raw.use_cache {
            builder = builder.use_cache(use_cache);
        }
        builder.build()
    }
}

/// Builder for connection configuration.
#[derive(Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    username: String,
    password: String,
    auth: AuthMechanism,
    connect_timeout: Duration,
    io_timeout: Duration,
    use_uids: bool,
    use_cache: bool,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            username: String::new(),
            password: String::new(),
            auth: AuthMechanism::Login,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            use_uids: true,
            use_cache: true,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the login name and password.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the authentication mechanism.
    #[must_use]
    pub const fn auth(mut self, auth: AuthMechanism) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Chooses UIDs (default) or sequence numbers for message ids.
    #[must_use]
    pub const fn use_uids(mut self, use_uids: bool) -> Self {
        self.use_uids = use_uids;
        self
    }

    /// Enables or disables the response cache.
    #[must_use]
    pub const fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            username: self.username,
            password: self.password,
            auth: self.auth,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            use_uids: self.use_uids,
            use_cache: self.use_cache,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com", "jason", "secret");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert!(config.use_uids);
        assert!(config.use_cache);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("imap.example.com")
            .port(10993)
            .auth(AuthMechanism::Plain)
            .connect_timeout(Duration::from_secs(10))
            .use_uids(false)
            .build();

        assert_eq!(config.port, 10993);
        assert_eq!(config.auth, AuthMechanism::Plain);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(!config.use_uids);
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .build();

        assert_eq!(config.port, 143);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::new("imap.example.com", "jason", "hunter2");
        let debug = format!("{config:?}");
        assert!(debug.contains("jason"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(
            r#"{"server": "localhost", "port": 1143, "username": "u", "password": "p", "tls": false}"#,
        )
        .unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1143);
        assert_eq!(config.security, Security::None);

        let config =
            Config::from_json(r#"{"host": "mail", "username": "u", "password": "p"}"#).unwrap();
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.port, 993);

        let config = Config::from_json(
            r#"{"server": "mail", "username": "u", "password": "p", "starttls": true, "io_timeout": 5}"#,
        )
        .unwrap();
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_json_missing_key() {
        assert!(Config::from_json(r#"{"server": "mail"}"#).is_err());
    }
}
