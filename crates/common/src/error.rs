use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No disclosure preferences stored for user: {0}")]
    PreferencesNotFound(String),

    #[error("Verified result carries no user identifier")]
    MissingUserIdentifier,

    #[error("Malformed verification result: {0}")]
    MalformedVerdict(String),

    #[error("Verifier error: {0}")]
    Verifier(String),

    #[error("Preference store error: {0}")]
    Store(String),

    #[error("Preference store is read-only")]
    ReadOnlyStore,

    #[error("Unknown disclosure field: {0}")]
    UnknownDisclosureField(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True for faults caused by how the service is set up rather than by
    /// the user's proof.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Error::PreferencesNotFound(_) | Error::MissingUserIdentifier
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
