use std::io;

/// Errors that can occur while negotiating or servicing a single proxy connection.
///
/// These never cross a connection boundary: each accepted socket gets its own
/// handler task, and a `ProxyError` there just ends that task after logging.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("connection reset by peer")]
    PeerReset(#[source] io::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("authentication failed")]
    AuthFailed,

    #[error("could not connect to {host}:{port}")]
    RemoteConnect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns a raw I/O error from a client socket into the error variant that best
/// describes it, so logs distinguish "client hung up" from real faults.
pub fn classify_io_error(err: io::Error) -> ProxyError {
    match err.kind() {
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => {
            ProxyError::PeerReset(err)
        }
        _ => ProxyError::Io(err),
    }
}
