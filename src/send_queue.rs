use crate::notification::Notification;

/// The ordered retry queue: notifications in insertion order, identifiers non-decreasing.
///
/// The ordering is a caller obligation (checked in debug builds): when the gateway rejects
///  an identifier, everything up to and including it is known to be handled, and the suffix
///  with strictly greater identifiers is exactly what needs retransmission. Out-of-order
///  identifiers would silently break that translation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendQueue {
    notifications: Vec<Notification>,
}

impl SendQueue {
    pub fn new() -> SendQueue {
        SendQueue {
            notifications: Vec::new(),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        debug_assert!(
            self.notifications
                .last()
                .map(|prev| prev.identifier <= notification.identifier)
                .unwrap_or(true),
            "identifiers must be pushed in non-decreasing order",
        );
        self.notifications.push(notification);
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notification> {
        self.notifications.iter()
    }

    /// Discards every notification up to and including `identifier`, keeping the suffix
    ///  that still needs transmission. Empty result if no identifier is strictly greater.
    ///
    /// NB: identifier 0 is the caller-side "no rejection" sentinel and gets no special
    ///  treatment here - callers check for it *before* resetting.
    pub fn reset_after(mut self, identifier: u32) -> SendQueue {
        match self.notifications.iter().position(|n| n.identifier > identifier) {
            Some(first_unconfirmed) => {
                self.notifications.drain(..first_unconfirmed);
                self
            }
            None => SendQueue::new(),
        }
    }

    /// The suffix starting at a positional index - the resend set when a write aborts
    ///  mid-batch and the failing notification itself counts as unsent.
    pub(crate) fn split_from(mut self, index: usize) -> SendQueue {
        if index >= self.notifications.len() {
            return SendQueue::new();
        }
        self.notifications.drain(..index);
        self
    }

    /// Total number of bytes this queue occupies on the wire.
    pub fn total_wire_len(&self) -> usize {
        self.notifications.iter().map(|n| n.serialized_len()).sum()
    }
}

impl From<Vec<Notification>> for SendQueue {
    fn from(notifications: Vec<Notification>) -> SendQueue {
        debug_assert!(
            notifications.windows(2).all(|w| w[0].identifier <= w[1].identifier),
            "identifiers must be non-decreasing",
        );
        SendQueue { notifications }
    }
}
