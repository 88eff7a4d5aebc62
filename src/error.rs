use thiserror::Error;

use crate::{auth::AuthError, objects::ObjectError, search::SearchError, store::StoreError};

/// Failure of one user action. Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("{0} is already a contact")]
    AlreadyContact(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Objects(#[from] ObjectError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl ChatError {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
