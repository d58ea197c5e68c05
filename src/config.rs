use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;

/// Settings for one gateway endpoint. Credentials are the client certificate/key pair the
///  gateway issued for the sending application.
pub struct GatewayConfig {
    /// `host:port` of the gateway endpoint.
    pub gateway_host: String,

    /// PEM file with the client certificate (chain) presented during the TLS handshake.
    pub cert_file: PathBuf,
    /// PEM file with the private key matching `cert_file`.
    pub key_file: PathBuf,

    /// How long to wait for a failure frame after a batch is fully written.
    ///
    /// The gateway never acknowledges success - it stays silent unless it rejects a
    ///  notification, and an elapsed deadline is treated as "batch accepted". Raising this
    ///  value makes that verdict more trustworthy on slow links at the cost of added
    ///  latency per batch; lowering it does the opposite. There is no value that removes
    ///  the ambiguity, the protocol simply does not carry a positive acknowledgement.
    pub failure_read_timeout: Duration,

    /// Deadline for the TCP connect and for the TLS handshake, each.
    pub connect_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(
        gateway_host: impl Into<String>,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
    ) -> GatewayConfig {
        GatewayConfig {
            gateway_host: gateway_host.into(),
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            failure_read_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.gateway_host.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    bail!("gateway host is empty");
                }
                if port.parse::<u16>().is_err() {
                    bail!("gateway port {:?} is not a valid port number", port);
                }
            }
            None => bail!("gateway host must be of the form host:port, was {:?}", self.gateway_host),
        }

        if self.failure_read_timeout.is_zero() {
            bail!("failure read timeout must be nonzero");
        }
        if self.connect_timeout.is_zero() {
            bail!("connect timeout must be nonzero");
        }

        Ok(())
    }
}
