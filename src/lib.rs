//! Client for a push notification gateway that speaks a proprietary length-prefixed binary
//!  protocol over a persistent, mutually authenticated TLS stream.
//!
//! ## Protocol
//!
//! The conversation is deliberately asymmetric: the client streams notification frames, and
//!  the gateway stays silent for as long as it accepts them. Only when it rejects a
//!  notification does it speak - a single six-byte failure frame naming the rejected
//!  notification's identifier - and then it closes the connection. Everything accepted
//!  *before* the rejected identifier is delivered; everything written after it was discarded
//!  by the gateway and must be retransmitted on a fresh connection.
//!
//! That shapes the client's core loop:
//! * notifications are queued with ascending identifiers
//! * the whole queue is written as one batch, then the client waits up to a configurable
//!   deadline for a failure frame
//! * an elapsed deadline means the batch was accepted - there is no positive acknowledgement
//!   in this protocol
//! * a failure frame means everything after the rejected identifier is resent over a new
//!   connection; the rejected notification itself is dropped and reported to the caller
//! * transport errors are surfaced to the caller and never retried internally - only
//!   protocol-level rejections trigger resends
//!
//! NB: Treating silence as success is load-bearing here and has a known blind spot: a
//!  network slow enough to delay a failure frame past the deadline is indistinguishable
//!  from acceptance. The deadline is configurable via
//!  [`config::GatewayConfig`] so callers can pick their trade-off; it is not
//!  "fixed" in this implementation because the gateway offers nothing better to key on.
//!
//! ## Frames
//!
//! Outbound notification frame - all numbers in network byte order (BE):
//! ```ascii
//! 0:  request type (u8) - 1 for "send notification"
//! 1:  identifier (u32) - caller-assigned correlation number, ascending within a queue
//! 5:  expiry (u32) - passed through to the gateway uninterpreted
//! 9:  token length (u16) - always 32
//! 11: device token (32 bytes)
//! 43: payload length (u16)
//! 45: payload (payload-length bytes, typically a JSON document)
//! ```
//!
//! Inbound failure frame (always exactly 6 bytes, sent asynchronously, followed by the
//!  gateway closing the connection):
//! ```ascii
//! 0: command (u8) - 8 for an error response
//! 1: status (u8) - the gateway's reason code
//! 2: identifier (u32) - the rejected notification, or 0 meaning "no failure"
//! ```
//!
//! ## Scope
//!
//! One [`connection::Connection`] and one [`send_queue::SendQueue`] at a time. There is no
//!  multiplexing across gateway hosts, no load balancing and no persistence of the queue
//!  across restarts - callers wanting concurrent delivery to several endpoints instantiate
//!  independent sender/connection pairs, and all operations on one pair are strictly
//!  sequential: a batch is fully written before the single verdict read that judges it.

pub mod config;
pub mod connection;
pub mod failure;
pub mod notification;
pub mod payload;
pub mod send_queue;
pub mod sender;
pub mod tls;

#[cfg(test)]
mod test_util;
