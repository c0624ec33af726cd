/// Errors that can occur in the transport layer.
///
/// Framing errors are kept separate from plain I/O failures because they
/// mean something different to the session layer: a framing error is fatal
/// to the session (the stream can no longer be trusted to contain message
/// boundaries), while a clean end-of-stream is reported as `Ok(None)` from
/// [`Connection::recv`](crate::Connection::recv), not as an error at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connecting to the remote peer failed after the attempt budget
    /// was exhausted.
    #[error("connect failed after {attempts} attempts: {source}")]
    ConnectFailed {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The byte stream violated the framing contract: a truncated length
    /// prefix, a payload cut short, or a length prefix beyond the
    /// configured maximum.
    #[error("framing error: {0}")]
    Framing(String),
}
