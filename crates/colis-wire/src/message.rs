//! Inbound stream messages
//!
//! The stream carries two kinds of message with no explicit discriminator:
//! the payload type alone tells them apart.

use bytes::Bytes;

/// One message as received from the stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// Encoded image frame (opaque, typically JPEG)
    Binary(Bytes),
    /// Structured telemetry, expected to be JSON
    Text(String),
}

impl InboundMessage {
    pub fn binary(data: impl Into<Bytes>) -> Self {
        InboundMessage::Binary(data.into())
    }

    pub fn text(data: impl Into<String>) -> Self {
        InboundMessage::Text(data.into())
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, InboundMessage::Binary(_))
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            InboundMessage::Binary(b) => b.len(),
            InboundMessage::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kinds() {
        let frame = InboundMessage::binary(vec![0xFF, 0xD8, 0xFF]);
        assert!(frame.is_binary());
        assert_eq!(frame.len(), 3);

        let text = InboundMessage::text("{}");
        assert!(!text.is_binary());
        assert!(!text.is_empty());
    }
}
