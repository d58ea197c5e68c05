use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use bytes::BytesMut;
#[cfg(test)] use mockall::automock;
use tokio::time;
use tracing::{debug, trace, warn};

use crate::failure::FailureFrame;
use crate::notification::Notification;

/// Abstraction over the secured duplex stream, introduced to facilitate mocking the I/O
///  part away for testing. `write_frame` has write-all semantics: a partial write is an
///  error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GatewayStream: Send + 'static {
    async fn write_frame(&mut self, buf: &[u8]) -> anyhow::Result<()>;

    async fn read_exact(&mut self, buf: &mut [u8]) -> anyhow::Result<()>;

    async fn shutdown(&mut self) -> anyhow::Result<()>;
}

/// Produces a fresh secured stream to the gateway - one call per (re)connect.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    async fn connect(&self) -> anyhow::Result<Box<dyn GatewayStream>>;
}

/// Owns at most one live stream to the gateway and provides the primitive operations the
///  send loop needs: connect/reconnect, a single-notification write, and the single
///  deadline-bounded failure read that judges a batch.
///
/// The underlying stream handle is mutated only by [`Connection::connect`] and
///  [`Connection::close`]; exactly one send loop drives one `Connection`, so no internal
///  locking is involved.
pub struct Connection {
    connector: Arc<dyn StreamConnector>,
    stream: Option<Box<dyn GatewayStream>>,
}

impl Connection {
    pub fn new(connector: Arc<dyn StreamConnector>) -> Connection {
        Connection {
            connector,
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens a fresh stream, replacing (and shutting down) any previous one. On failure the
    ///  connection is left disconnected.
    pub async fn connect(&mut self) -> anyhow::Result<()> {
        self.close().await;

        let stream = self.connector.connect().await?;
        self.stream = Some(stream);
        debug!("connected to gateway");
        Ok(())
    }

    /// Serializes the notification and writes the frame to the live stream. Errors if
    ///  disconnected or on any transport write failure.
    pub async fn send_one(&mut self, notification: &Notification) -> anyhow::Result<()> {
        let stream = match &mut self.stream {
            Some(stream) => stream,
            None => bail!("not connected to the gateway"),
        };

        let mut buf = BytesMut::with_capacity(notification.serialized_len());
        notification.ser(&mut buf)?;

        trace!("writing notification {} ({} bytes)", notification.identifier, buf.len());
        stream.write_frame(&buf).await
    }

    /// Waits up to `timeout` for a rejection frame.
    ///
    /// The gateway stays silent as long as everything it received was acceptable, so an
    ///  elapsed deadline is *not* an error - it is the protocol's signal that the batch was
    ///  accepted, and the sentinel frame is returned. A network slow enough to delay a
    ///  failure frame past the deadline is indistinguishable from acceptance; the timeout
    ///  duration is the caller's handle on that trade-off.
    ///
    /// Any other read failure (closed connection, I/O error) is returned as an error: the
    ///  caller cannot tell "nothing was wrong" from "connection gone" and must treat the
    ///  batch verdict as indeterminate.
    pub async fn read_failure(&mut self, timeout: Duration) -> anyhow::Result<FailureFrame> {
        let stream = match &mut self.stream {
            Some(stream) => stream,
            None => bail!("not connected to the gateway"),
        };

        let mut buf = [0u8; FailureFrame::SERIALIZED_LEN];
        match time::timeout(timeout, stream.read_exact(&mut buf)).await {
            Err(_elapsed) => {
                trace!("no failure frame within {:?}", timeout);
                Ok(FailureFrame::none())
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(())) => {
                let failure = FailureFrame::deser(&mut buf.as_ref())?;
                warn!("gateway rejected notification {} with status {}", failure.identifier, failure.status);
                Ok(failure)
            }
        }
    }

    /// Shuts the stream down and drops it. Idempotent; shutdown errors are logged, not
    ///  surfaced - the stream is being discarded either way.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("error shutting down stream: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::DeviceToken;
    use crate::test_util::{ReadBehavior, ScriptedConnector, ScriptedStream};
    use tokio::runtime::Builder;

    fn test_notification() -> Notification {
        Notification::new(0x01020304, DeviceToken::from_hex("ae91fa").unwrap(), b"hi".to_vec()).unwrap()
    }

    fn connection_with(stream: Box<dyn GatewayStream>) -> Connection {
        let mut connection = Connection::new(Arc::new(ScriptedConnector::empty()));
        connection.stream = Some(stream);
        connection
    }

    #[test]
    fn test_send_one_writes_encoded_frame() {
        let mut expected = vec![1u8, 1, 2, 3, 4, 0, 0, 0, 0, 0, 32, 0xAE, 0x91, 0xFA];
        expected.extend_from_slice(&[0u8; 29]);
        expected.extend_from_slice(&[0, 2]);
        expected.extend_from_slice(b"hi");

        let mut stream = MockGatewayStream::new();
        stream
            .expect_write_frame()
            .once()
            .withf(move |buf| buf == expected.as_slice())
            .returning(|_| Ok(()));

        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = connection_with(Box::new(stream));
            connection.send_one(&test_notification()).await.unwrap();
        });
    }

    #[test]
    fn test_send_one_propagates_write_error() {
        let mut stream = MockGatewayStream::new();
        stream
            .expect_write_frame()
            .once()
            .returning(|_| bail!("broken pipe"));

        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = connection_with(Box::new(stream));
            assert!(connection.send_one(&test_notification()).await.is_err());
        });
    }

    #[test]
    fn test_send_one_errors_when_disconnected() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = Connection::new(Arc::new(ScriptedConnector::empty()));
            assert!(!connection.is_connected());
            assert!(connection.send_one(&test_notification()).await.is_err());
        });
    }

    #[test]
    fn test_read_failure_decodes_frame() {
        let mut stream = MockGatewayStream::new();
        stream
            .expect_read_exact()
            .once()
            .returning(|buf| {
                buf.copy_from_slice(&[8, 4, 0, 0, 0, 2]);
                Ok(())
            });

        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = connection_with(Box::new(stream));
            let failure = connection.read_failure(Duration::from_secs(2)).await.unwrap();
            assert_eq!(failure, FailureFrame { command: 8, status: 4, identifier: 2 });
        });
    }

    #[test]
    fn test_read_failure_timeout_is_sentinel() {
        let rt = Builder::new_current_thread().enable_all().start_paused(true).build().unwrap();
        rt.block_on(async move {
            let mut connection = connection_with(Box::new(ScriptedStream::new(ReadBehavior::Silent)));
            let failure = connection.read_failure(Duration::from_secs(2)).await.unwrap();
            assert!(failure.is_none());
        });
    }

    #[test]
    fn test_read_failure_propagates_read_error() {
        let mut stream = MockGatewayStream::new();
        stream
            .expect_read_exact()
            .once()
            .returning(|_| bail!("connection reset"));

        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = connection_with(Box::new(stream));
            assert!(connection.read_failure(Duration::from_secs(2)).await.is_err());
        });
    }

    #[test]
    fn test_read_failure_errors_when_disconnected() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = Connection::new(Arc::new(ScriptedConnector::empty()));
            assert!(connection.read_failure(Duration::from_secs(2)).await.is_err());
        });
    }

    #[test]
    fn test_connect_failure_leaves_disconnected() {
        let mut connector = MockStreamConnector::new();
        connector
            .expect_connect()
            .once()
            .returning(|| bail!("handshake refused"));

        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = Connection::new(Arc::new(connector));
            assert!(connection.connect().await.is_err());
            assert!(!connection.is_connected());
        });
    }

    #[test]
    fn test_reconnect_replaces_stream() {
        let first = ScriptedStream::new(ReadBehavior::Silent);
        let second = ScriptedStream::new(ReadBehavior::Silent);
        let written_first = first.written();
        let written_second = second.written();

        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = Connection::new(Arc::new(ScriptedConnector::new(vec![first, second])));

            connection.connect().await.unwrap();
            connection.send_one(&test_notification()).await.unwrap();

            connection.connect().await.unwrap();
            connection.send_one(&test_notification()).await.unwrap();

            assert_eq!(written_first.lock().unwrap().len(), 1);
            assert_eq!(written_second.lock().unwrap().len(), 1);
        });
    }

    #[test]
    fn test_close_is_idempotent() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let mut connection = Connection::new(Arc::new(ScriptedConnector::new(vec![
                ScriptedStream::new(ReadBehavior::Silent),
            ])));

            connection.connect().await.unwrap();
            assert!(connection.is_connected());

            connection.close().await;
            assert!(!connection.is_connected());

            connection.close().await;
            assert!(!connection.is_connected());
        });
    }
}
