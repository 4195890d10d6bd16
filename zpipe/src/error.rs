use thiserror::Error;

/// Errors reported by the codec layer.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("corrupt stream: {0}")]
    Corrupt(String),
}

/// Errors reported by the stream adapters and sinks.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StreamError::InvalidState("write on Closed stream".to_string());
        assert_eq!(err.to_string(), "invalid state: write on Closed stream");

        let err = StreamError::from(CodecError::Corrupt("bad gzip magic".to_string()));
        assert_eq!(err.to_string(), "codec failure: corrupt stream: bad gzip magic");
    }
}
