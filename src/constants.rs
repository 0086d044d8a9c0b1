use std::{env, path::PathBuf};

use dirs;

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS configuration file name
pub const AWS_CONFIG_FILE_NAME: &str = "config";

/// AWS shared credentials file name
pub const AWS_CREDENTIALS_FILE_NAME: &str = "credentials";

/// File the credential-process output mode caches issued credentials in,
/// directly under the user's home directory
pub const CREDENTIALS_CACHE_FILE_NAME: &str = ".aws-sso-auth-credentials.json";

/// Suffix of session token files the AWS CLI drops into its SSO cache
pub const SSO_CACHE_FILE_SUFFIX: &str = ".json";

/// Oldest AWS CLI major version with the `aws sso` command family
pub const MIN_AWS_CLI_MAJOR_VERSION: u32 = 2;

/// Schema version tag written into the credentials cache file
pub const CREDENTIALS_CACHE_VERSION: u64 = 1;

/// Warn the operator when the session token expires this close to "now"
pub const EXPIRY_WARNING_WINDOW_MINUTES: i64 = 15;

/// Exact stderr line the AWS CLI emits when a session token that still
/// claims validity is rejected by the SSO service.
pub const UNAUTHORIZED_EXCHANGE_MESSAGE: &str = "An error occurred (UnauthorizedException) when calling the GetRoleCredentials operation: Session token not found or invalid";

/// Get the AWS config file path
/// Respects AWS_CONFIG_FILE environment variable if set
pub fn get_aws_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME).join(AWS_CONFIG_FILE_NAME))
}

/// Get the AWS shared credentials file path
/// Respects AWS_SHARED_CREDENTIALS_FILE environment variable if set
pub fn get_aws_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|home| {
        home.join(AWS_CONFIG_DIR_NAME)
            .join(AWS_CREDENTIALS_FILE_NAME)
    })
}

/// Directory the AWS CLI writes session tokens into after `aws sso login`
pub fn get_sso_cache_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME).join("sso").join("cache"))
}

/// Fixed per-user path of the credential-process credentials cache
pub fn get_credentials_cache_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CREDENTIALS_CACHE_FILE_NAME))
}
