use thiserror::Error;

/// Error taxonomy shared by every component of the client.
///
/// Repository operations surface these unchanged; the feed adapter converts
/// them into its exposed state instead of raising further.
#[derive(Debug, Error)]
pub enum Error {
    // Ошибки валидации входных данных
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found")]
    NotFound,

    // Коллизия slug
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    // Транспортные ошибки
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Auth error: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::BackendUnavailable(err.to_string())
    }
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
