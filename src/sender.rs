use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, span, warn, Instrument, Level};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::connection::Connection;
use crate::failure::FailureFrame;
use crate::send_queue::SendQueue;
use crate::tls::TlsStreamConnector;

/// Result of writing one batch and reading the gateway's verdict once.
pub struct BatchOutcome {
    /// The rejection the gateway reported for this batch, if any.
    pub rejection: Option<FailureFrame>,
    /// Notifications that still need transmission.
    pub unsent: SendQueue,
    /// The transport error that aborted the batch, if any.
    pub error: Option<anyhow::Error>,
}

/// Result of a full delivery run.
pub struct DeliveryOutcome {
    /// Every rejection encountered along the way. Recorded for observability - rejected
    ///  notifications are dropped, never retransmitted.
    pub rejections: Vec<FailureFrame>,
    /// Notifications that were never accepted; empty on full delivery.
    pub unsent: SendQueue,
    /// The transport error that stopped the run, if any.
    pub error: Option<anyhow::Error>,
}

impl DeliveryOutcome {
    pub fn is_complete(&self) -> bool {
        self.unsent.is_empty() && self.error.is_none()
    }
}

/// Drives one [`Connection`] and one queue. Strictly sequential: a batch is fully written
///  before the single verdict read that judges it, so there is never a failure frame in
///  flight for a notification that has not been written yet.
pub struct GatewaySender {
    connection: Connection,
}

impl GatewaySender {
    pub fn new(connection: Connection) -> GatewaySender {
        GatewaySender { connection }
    }

    /// Writes the whole batch in order, then reads the gateway's verdict once.
    ///
    /// A write failure aborts immediately: the failing notification and everything after it
    ///  are reported unsent, and no verdict read is attempted on the broken stream. After a
    ///  fully written batch, a verdict *read error* is reported with an empty unsent set -
    ///  absent a definitive rejection the batch is assumed accepted, which can under-report
    ///  the resend set after an ambiguous connection loss. A deadline that elapses without
    ///  a frame means the batch was accepted.
    pub async fn send_batch(&mut self, queue: SendQueue, timeout: Duration) -> BatchOutcome {
        let mut write_error = None;
        for (index, notification) in queue.iter().enumerate() {
            if let Err(e) = self.connection.send_one(notification).await {
                warn!("write of notification {} failed: {}", notification.identifier, e);
                write_error = Some((index, e));
                break;
            }
        }
        if let Some((index, error)) = write_error {
            return BatchOutcome {
                rejection: None,
                unsent: queue.split_from(index),
                error: Some(error),
            };
        }

        debug!("batch of {} notifications ({} bytes) written, awaiting verdict", queue.len(), queue.total_wire_len());

        let failure = match self.connection.read_failure(timeout).await {
            Ok(failure) => failure,
            Err(e) => {
                return BatchOutcome {
                    rejection: None,
                    unsent: SendQueue::new(),
                    error: Some(e),
                };
            }
        };

        if failure.is_none() {
            debug!("batch accepted");
            return BatchOutcome {
                rejection: None,
                unsent: SendQueue::new(),
                error: None,
            };
        }

        let unsent = queue.reset_after(failure.identifier);
        BatchOutcome {
            rejection: Some(failure),
            unsent,
            error: None,
        }
    }

    /// Drives [`GatewaySender::send_batch`] until the queue is drained or a transport error
    ///  stops the run, reconnecting after every rejection (the gateway closes the stream
    ///  when it rejects). An explicit loop: the queue strictly shrinks with every real
    ///  rejection, but the number of rounds is otherwise unbounded.
    ///
    /// Transport errors - connect, write, or an indeterminate verdict read - always stop
    ///  the run and are surfaced to the caller; only protocol-level rejections are handled
    ///  here by resending the affected suffix.
    pub async fn send_all(&mut self, queue: SendQueue, timeout: Duration) -> DeliveryOutcome {
        let correlation_id = Uuid::new_v4();
        let span = span!(Level::DEBUG, "delivery", ?correlation_id);
        self.do_send_all(queue, timeout).instrument(span).await
    }

    async fn do_send_all(&mut self, mut queue: SendQueue, timeout: Duration) -> DeliveryOutcome {
        info!("delivering {} notifications ({} bytes)", queue.len(), queue.total_wire_len());

        let mut rejections = Vec::new();
        loop {
            let outcome = self.send_batch(queue, timeout).await;

            if let Some(error) = outcome.error {
                return DeliveryOutcome {
                    rejections,
                    unsent: outcome.unsent,
                    error: Some(error),
                };
            }
            if let Some(rejection) = outcome.rejection {
                rejections.push(rejection);
            }
            queue = outcome.unsent;

            if queue.is_empty() {
                info!("queue drained, {} rejections along the way", rejections.len());
                return DeliveryOutcome {
                    rejections,
                    unsent: queue,
                    error: None,
                };
            }

            debug!("{} notifications left after rejection, reconnecting", queue.len());
            if let Err(e) = self.connection.connect().await {
                warn!("reconnect failed: {}", e);
                return DeliveryOutcome {
                    rejections,
                    unsent: queue,
                    error: Some(e),
                };
            }
        }
    }

    pub async fn close(&mut self) {
        self.connection.close().await;
    }
}

/// Connects to the configured gateway and delivers the whole queue, reconnecting and
///  resending as dictated by rejection frames. The connection is closed before returning.
pub async fn deliver_all(config: &GatewayConfig, queue: SendQueue) -> DeliveryOutcome {
    let connector = match TlsStreamConnector::from_config(config) {
        Ok(connector) => connector,
        Err(e) => {
            return DeliveryOutcome {
                rejections: Vec::new(),
                unsent: queue,
                error: Some(e),
            };
        }
    };

    let mut connection = Connection::new(Arc::new(connector));
    if let Err(e) = connection.connect().await {
        return DeliveryOutcome {
            rejections: Vec::new(),
            unsent: queue,
            error: Some(e),
        };
    }

    let mut sender = GatewaySender::new(connection);
    let outcome = sender.send_all(queue, config.failure_read_timeout).await;
    sender.close().await;
    outcome
}
