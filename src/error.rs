use thiserror::Error;

/// Application error taxonomy. Each named category carries its own process
/// exit code so wrapper scripts can distinguish failure modes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("ArgumentsError: {0}")]
    Arguments(String),

    #[error("MissingSSOConfigError: {0}")]
    MissingSsoConfig(String),

    #[error("NoCachedCredentialsError: {0}")]
    NoCachedCredentials(String),

    #[error("UnexpectedGetRoleCredentialsOutputError: {0}")]
    UnexpectedGetRoleCredentialsOutput(String),

    #[error("BadAWSCLIVersionError: {0}")]
    BadAwsCliVersion(String),

    /// The cached session token claimed to be valid but the SSO service
    /// rejected it, even after a fresh login.
    #[error("MisbehavingExpiryDateError: {0}")]
    MisbehavingExpiryDate(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Other(_) => 1,
            Self::Arguments(_) => 2,
            Self::MissingSsoConfig(_) => 3,
            Self::NoCachedCredentials(_) => 4,
            Self::UnexpectedGetRoleCredentialsOutput(_) => 5,
            Self::BadAwsCliVersion(_) => 6,
            Self::MisbehavingExpiryDate(_) => 7,
        }
    }
}
