use std::cmp::min;
use std::fmt::{Debug, Formatter};

use anyhow::bail;
use bytes::{BufMut, BytesMut};

/// A device identity as it appears on the wire: exactly 32 raw bytes, normally obtained by
///  decoding the hex string handed out when the device registered with the gateway.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DeviceToken([u8; 32]);

impl Debug for DeviceToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceToken({})", hex::encode(self.0))
    }
}

impl DeviceToken {
    pub const LEN: usize = 32;

    /// Decodes a hex string into the fixed 32-byte wire representation. Shorter input is
    ///  zero-padded on the right; input decoding to more than 32 bytes keeps the first 32.
    ///  Invalid hex (odd length, non-hex characters) is an error.
    pub fn from_hex(token: &str) -> anyhow::Result<DeviceToken> {
        let decoded = hex::decode(token)?;

        let mut bytes = [0u8; Self::LEN];
        let len = min(decoded.len(), Self::LEN);
        bytes[..len].copy_from_slice(&decoded[..len]);
        Ok(DeviceToken(bytes))
    }

    pub fn from_raw(bytes: [u8; 32]) -> DeviceToken {
        DeviceToken(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A single "send notification" request. Constructed once, immutable afterwards; the codec
///  and the send loop only ever read it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Correlation number assigned by the caller. Within one queue, identifiers must be
    ///  non-decreasing in insertion order - the resend algorithm relies on that to translate
    ///  a rejected identifier into the suffix needing retransmission.
    pub identifier: u32,
    /// Passed through to the gateway uninterpreted.
    pub expiry: u32,
    pub token: DeviceToken,
    /// Opaque payload, typically a JSON document. Bounded by the u16 length field on the
    ///  wire.
    pub payload: Vec<u8>,
}

impl Notification {
    /// Protocol command for a "send notification" request.
    pub const REQUEST_TYPE: u8 = 1;
    /// Fixed part of the frame: command(1) + identifier(4) + expiry(4) + token length(2) +
    ///  token(32) + payload length(2).
    pub const HEADER_LEN: usize = 45;
    /// Upper bound forced by the u16 payload-length field.
    pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

    pub fn new(identifier: u32, token: DeviceToken, payload: Vec<u8>) -> anyhow::Result<Notification> {
        if payload.len() > Self::MAX_PAYLOAD_LEN {
            bail!("payload of {} bytes exceeds the wire format's limit of {}", payload.len(), Self::MAX_PAYLOAD_LEN);
        }

        Ok(Notification {
            identifier,
            expiry: 0,
            token,
            payload,
        })
    }

    /// Convenience constructor for the common case: a plain alert text, device token still
    ///  in hex.
    pub fn alert(identifier: u32, token: &str, text: &str) -> anyhow::Result<Notification> {
        Notification::new(identifier, DeviceToken::from_hex(token)?, crate::payload::alert_body(text))
    }

    pub fn serialized_len(&self) -> usize {
        Self::HEADER_LEN + self.payload.len()
    }

    pub fn ser(&self, buf: &mut BytesMut) -> anyhow::Result<()> {
        // fields are public, so the construction-time bound is re-checked here
        if self.payload.len() > Self::MAX_PAYLOAD_LEN {
            bail!("payload of {} bytes exceeds the wire format's limit of {}", self.payload.len(), Self::MAX_PAYLOAD_LEN);
        }

        buf.put_u8(Self::REQUEST_TYPE);
        buf.put_u32(self.identifier);
        buf.put_u32(self.expiry);
        buf.put_u16(DeviceToken::LEN as u16);
        buf.put_slice(self.token.as_bytes());
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        Ok(())
    }
}
