//! Connector to a RESP server.
//!
//! For more information, see the [`Connector`](Connector) trait.

use std::marker::Unpin;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_core::future::BoxFuture;
use tokio::io::{self, AsyncRead, AsyncWrite};
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::{InvalidDnsNameError, ServerName};
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};

/// Connector to a RESP server.
///
/// Servers accept connections in various ways including TCP, TLS over TCP,
/// and Unix domain sockets. A `Connector` holds enough information to reach
/// one server and can produce any number of fresh streams to it, which the
/// [`Client`](crate::Client) consumes on connect and on every reconnect.
///
/// Exactly one connector is active per client; there is no runtime registry
/// of transports. To add a transport, implement this trait and hand the
/// connector to [`Builder::build`](crate::client::Builder::build).
pub trait Connector: Send + Sync {
    /// Connection stream this connector produces.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Connect to the server and return the stream to it.
    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>>;

    /// Human-readable target description, used in connect error messages.
    fn describe(&self) -> String;
}

/// TCP socket connector.
#[derive(Debug)]
pub struct TcpConnector {
    addr: SocketAddr,
}

/// Unix domain socket connector.
#[cfg(unix)]
#[derive(Debug)]
pub struct UnixConnector {
    path: PathBuf,
}

/// TLS-over-TCP connector.
pub struct TlsConnector {
    tcp: TcpConnector,
    server_name: ServerName<'static>,
    config: Arc<ClientConfig>,
}

/// DNS lookup error
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// IO error during DNS lookup
    #[error("IO error during DNS lookup")]
    Io(#[from] std::io::Error),
    /// DNS record is not found
    #[error("DNS record not found")]
    NotFound,
}

impl TcpConnector {
    /// Constructs a `TcpConnector` using IP address and port.
    pub fn new(addr: SocketAddr) -> Self {
        TcpConnector { addr }
    }

    /// Constructs a `TcpConnector` from a string representation of a socket
    /// address like `example.com:6379`, `localhost:6379`, or `192.168.0.7:18080`.
    pub async fn lookup(addr: &str) -> Result<Self, LookupError> {
        let addr = lookup_host(addr)
            .await?
            .next()
            .ok_or(LookupError::NotFound)?;
        Ok(TcpConnector::new(addr))
    }

    async fn open(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(self.open())
    }

    fn describe(&self) -> String {
        self.addr.to_string()
    }
}

#[cfg(unix)]
impl UnixConnector {
    /// Constructs a `UnixConnector`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        UnixConnector {
            path: path.as_ref().to_owned(),
        }
    }
}

#[cfg(unix)]
impl Connector for UnixConnector {
    type Stream = UnixStream;

    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(UnixStream::connect(&self.path))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl TlsConnector {
    /// Constructs a `TlsConnector` that verifies the server certificate
    /// against the bundled webpki roots.
    pub fn new(addr: SocketAddr, server_name: &str) -> Result<Self, InvalidDnsNameError> {
        Self::with_config(addr, server_name, Arc::new(default_tls_config()))
    }

    /// Constructs a `TlsConnector` from a string address, resolving it first.
    pub async fn lookup(addr: &str, server_name: &str) -> Result<Self, LookupError> {
        let tcp = TcpConnector::lookup(addr).await?;
        Self::with_config(tcp.addr, server_name, Arc::new(default_tls_config()))
            .map_err(|_| LookupError::NotFound)
    }

    /// Constructs a `TlsConnector` with a caller-provided rustls config,
    /// e.g. one carrying a private root store or client certificates.
    pub fn with_config(
        addr: SocketAddr,
        server_name: &str,
        config: Arc<ClientConfig>,
    ) -> Result<Self, InvalidDnsNameError> {
        Ok(TlsConnector {
            tcp: TcpConnector::new(addr),
            server_name: ServerName::try_from(server_name)?.to_owned(),
            config,
        })
    }

    /// Disables certificate verification.
    ///
    /// Any certificate from any peer will be accepted. Intended for test
    /// rigs with self-signed certificates only.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.config = Arc::new(
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerification))
                .with_no_client_auth(),
        );
        self
    }

    async fn open(&self) -> io::Result<TlsStream<TcpStream>> {
        let stream = self.tcp.open().await?;
        let tls = tokio_rustls::TlsConnector::from(Arc::clone(&self.config));
        tls.connect(self.server_name.clone(), stream).await
    }
}

impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(self.open())
    }

    fn describe(&self) -> String {
        format!("{} (tls)", self.tcp.addr)
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("tcp", &self.tcp)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

fn default_tls_config() -> ClientConfig {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

#[derive(Debug)]
struct NoVerification;

impl rustls::client::danger::ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
