//! Real-time connections opened while a page renders.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::channel::mpsc;

/// Identifier of a real-time connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create from an existing ID string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Sending half of a real-time channel.
///
/// Dropping the handle closes the channel; the transport sees the
/// receiving stream end.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    opened_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<String>,
}

impl Connection {
    /// Open a channel, returning the handle and the stream the transport drains.
    pub fn open(id: impl Into<ConnectionId>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded();
        let connection = Self {
            id: id.into(),
            opened_at: Utc::now(),
            sender,
        };
        (connection, receiver)
    }

    /// Connection identifier.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// When the connection was opened.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Queue a message. Returns false if the transport went away.
    pub fn send(&self, message: impl Into<String>) -> bool {
        self.sender.unbounded_send(message.into()).is_ok()
    }

    /// Whether the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_send_reaches_receiver() {
        let (conn, mut rx) = Connection::open("c1");

        assert!(conn.send("hello"));
        assert_eq!(rx.next().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_drop_closes_stream() {
        let (conn, mut rx) = Connection::open("c1");
        drop(conn);

        assert_eq!(rx.next().await, None);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (conn, rx) = Connection::open("c1");
        drop(rx);

        assert!(conn.is_closed());
        assert!(!conn.send("lost"));
    }
}
