use std::io;

use thiserror::Error;

/// Protocol-level failures of the admin-socket session.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The prompt-mode handshake did not complete.
    #[error("error while initializing interactive mode")]
    Init,
    /// End of stream before the prompt sentinel was seen.
    #[error("error while waiting for prompt")]
    UnexpectedEof,
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}
