use bytes::{Buf, BufMut, BytesMut};

/// The six-byte frame the gateway sends when it rejects a notification. Its arrival implies
///  the gateway is about to close the connection: everything written after the rejected
///  identifier was discarded and needs to be retransmitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FailureFrame {
    /// Command byte; the gateway uses [`FailureFrame::COMMAND_ERROR_RESPONSE`].
    pub command: u8,
    /// The gateway's reason code for the rejection.
    pub status: u8,
    /// Identifier of the rejected notification. 0 is the "no failure" sentinel - real
    ///  notifications are never assigned identifier 0.
    pub identifier: u32,
}

impl FailureFrame {
    pub const COMMAND_ERROR_RESPONSE: u8 = 8;
    pub const SERIALIZED_LEN: usize = 6;

    /// The sentinel value for "no rejection occurred" - what a verdict read reports when the
    ///  deadline elapses without the gateway speaking.
    pub fn none() -> FailureFrame {
        FailureFrame {
            command: 0,
            status: 0,
            identifier: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.identifier == 0
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u8(self.command);
        buf.put_u8(self.status);
        buf.put_u32(self.identifier);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<FailureFrame> {
        let command = buf.try_get_u8()?;
        let status = buf.try_get_u8()?;
        let identifier = buf.try_get_u32()?;
        Ok(FailureFrame {
            command,
            status,
            identifier,
        })
    }
}
