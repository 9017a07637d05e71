#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Listener bind, TCP accept or WebSocket handshake failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// An inbound frame exceeded the configured limit and was discarded.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
}

impl TransportError {
    /// Whether the connection can keep receiving after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::FrameTooLarge { .. })
    }
}
