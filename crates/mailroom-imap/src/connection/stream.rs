//! The TCP or TLS transport under a live connection.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::config::{Config, Security};
use crate::{Error, Result};

/// Plain TCP, or TCP wrapped in rustls.
pub enum ImapStream {
    /// Unencrypted; only used before STARTTLS or with [`Security::None`].
    Plain(TcpStream),
    /// Encrypted.
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Performs the TLS handshake over a plain stream.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => handshake(host, tcp).await,
            Self::Tls(_) => Err(Error::InvalidState("stream is already encrypted".to_string())),
        }
    }

    /// Returns true once TLS is up.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_read(cx, buf),
            Self::Tls(tls) => Pin::new(tls).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_write(cx, buf),
            Self::Tls(tls) => Pin::new(tls).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_flush(cx),
            Self::Tls(tls) => Pin::new(tls).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_shutdown(cx),
            Self::Tls(tls) => Pin::new(tls).poll_shutdown(cx),
        }
    }
}

/// rustls client configuration trusting the Mozilla root set.
pub fn create_tls_connector() -> TlsConnector {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Opens the transport for `config`, bounded by its connect timeout.
///
/// With [`Security::StartTls`] the stream comes back plain and the engine
/// upgrades it later.
pub async fn connect(config: &Config) -> Result<ImapStream> {
    let attempt = async {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        tcp.set_nodelay(true)?;
        debug!(host = %config.host, port = config.port, "TCP connected");

        match config.security {
            Security::Implicit => handshake(&config.host, tcp).await,
            Security::StartTls | Security::None => Ok(ImapStream::Plain(tcp)),
        }
    };

    tokio::time::timeout(config.connect_timeout, attempt)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
}

async fn handshake(host: &str, tcp: TcpStream) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = create_tls_connector().connect(server_name, tcp).await?;
    debug!(host, "TLS established");
    Ok(ImapStream::Tls(Box::new(tls)))
}
