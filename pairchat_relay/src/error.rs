use std::io;

use thiserror::Error;

/// Failures starting or running the relay server.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("relay I/O error: {0}")]
    Io(#[from] io::Error),
}
