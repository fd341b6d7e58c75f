use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("file '{0}' is not listed in the manifest")]
    FileNotFound(String),

    #[error("manifest is corrupt: {0}")]
    CorruptManifest(String),

    #[error("transport failure talking to {peer}: {source}")]
    TransportFailure {
        peer: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mirror {peer} sent an unrecognized response")]
    UnexpectedResponse { peer: String },

    #[error("insufficient mirrors: {0}")]
    InsufficientMirrors(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<uppir_manifest::ManifestError> for ClientError {
    fn from(err: uppir_manifest::ManifestError) -> Self {
        ClientError::CorruptManifest(err.to_string())
    }
}

impl From<uppir_requestor::RequestorError> for ClientError {
    fn from(err: uppir_requestor::RequestorError) -> Self {
        match err {
            uppir_requestor::RequestorError::InsufficientMirrors(msg) => ClientError::InsufficientMirrors(msg),
            uppir_requestor::RequestorError::BadArgument(msg) => ClientError::BadArgument(msg),
            uppir_requestor::RequestorError::CorruptData { block_num } => {
                ClientError::InternalError(format!("block {block_num} failed hash verification"))
            }
            uppir_requestor::RequestorError::InternalError(msg) => ClientError::InternalError(msg),
        }
    }
}
