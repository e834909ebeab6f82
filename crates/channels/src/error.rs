use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unrecognized command: {0}")]
    UnknownCommand(String),
}
