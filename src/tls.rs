use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::connection::{GatewayStream, StreamConnector};

/// The production [`StreamConnector`]: mutually authenticated TLS over TCP, one fresh
///  stream per `connect` call.
pub struct TlsStreamConnector {
    gateway_host: String,
    server_name: ServerName<'static>,
    connect_timeout: Duration,
    tls_config: Arc<rustls::ClientConfig>,
}

impl TlsStreamConnector {
    /// Loads the client credentials and prepares the TLS configuration. Fails on
    ///  unreadable or malformed PEM files - nothing is dialed yet.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<TlsStreamConnector> {
        config.validate()?;

        let _ = rustls::crypto::ring::default_provider().install_default();

        let certs = load_certs(&config.cert_file)?;
        let key = load_private_key(&config.key_file)?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .context("client certificate / key pair rejected")?;

        let server_name = ServerName::try_from(host_of(&config.gateway_host).to_owned())
            .context("gateway host is not a valid TLS server name")?;

        Ok(TlsStreamConnector {
            gateway_host: config.gateway_host.clone(),
            server_name,
            connect_timeout: config.connect_timeout,
            tls_config: Arc::new(tls_config),
        })
    }
}

#[async_trait]
impl StreamConnector for TlsStreamConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn GatewayStream>> {
        debug!("dialing {}", self.gateway_host);
        let tcp = time::timeout(self.connect_timeout, TcpStream::connect(&self.gateway_host))
            .await
            .context("timed out connecting to the gateway")??;

        let connector = TlsConnector::from(self.tls_config.clone());
        let stream = time::timeout(self.connect_timeout, connector.connect(self.server_name.clone(), tcp))
            .await
            .context("timed out in the TLS handshake")??;

        info!("established TLS stream to {}", self.gateway_host);
        Ok(Box::new(TlsGatewayStream { stream }))
    }
}

/// The host part of a `host:port` endpoint.
fn host_of(gateway_host: &str) -> &str {
    gateway_host
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(gateway_host)
}

fn load_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("reading certificate file {:?}", path))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing certificate file {:?}", path))?;
    if certs.is_empty() {
        bail!("no certificates in {:?}", path);
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("reading key file {:?}", path))?;
    let mut reader = BufReader::new(file);

    match rustls_pemfile::private_key(&mut reader)? {
        Some(key) => Ok(key),
        None => bail!("no private key in {:?}", path),
    }
}

struct TlsGatewayStream {
    stream: TlsStream<TcpStream>,
}

#[async_trait]
impl GatewayStream for TlsGatewayStream {
    async fn write_frame(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        self.stream.write_all(buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> anyhow::Result<()> {
        AsyncReadExt::read_exact(&mut self.stream, buf).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        AsyncWriteExt::shutdown(&mut self.stream).await?;
        Ok(())
    }
}
