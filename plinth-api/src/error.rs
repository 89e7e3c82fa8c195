use crate::CommentId;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Failed reading from the remote store: {0}")]
    RemoteRead(String),

    #[error("Failed writing to the remote store: {0}")]
    RemoteWrite(String),

    #[error("No element matches locator {0:?}")]
    LocatorNotFound(String),

    #[error("Comment {0} is a reply and cannot be replied to")]
    InvalidParent(CommentId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn remote_read(err: anyhow::Error) -> Error {
        Error::RemoteRead(format!("{err:#}"))
    }

    pub fn remote_write(err: anyhow::Error) -> Error {
        Error::RemoteWrite(format!("{err:#}"))
    }
}
