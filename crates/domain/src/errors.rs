use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("{}", messages.join("\n"))]
    Validation { messages: Vec<String> },

    #[error("Invalid state transition: {entity} {id} is already {status}")]
    Conflict {
        entity: String,
        id: String,
        status: String,
    },

    #[error("Persistence error: {message}")]
    Persistence { message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            messages: vec![message.into()],
        }
    }

    /// Turns collected rule violations into an error, or `Ok` when there are none.
    pub fn check(messages: Vec<String>) -> Result<(), Self> {
        if messages.is_empty() {
            Ok(())
        } else {
            Err(Self::Validation { messages })
        }
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            message: err.to_string(),
        }
    }
}
