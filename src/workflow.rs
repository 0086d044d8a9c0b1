use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::aws_cli::{CredentialsExchange, ExchangeError, InteractiveLogin, VersionProbe};
use crate::cache::{self, SessionToken};
use crate::constants::{self, EXPIRY_WARNING_WINDOW_MINUTES, MIN_AWS_CLI_MAJOR_VERSION};
use crate::credentials;
use crate::error::AppError;
use crate::sso_config::{self, SsoProfileConfig};

/// Well-known file locations the workflow reads and writes.
#[derive(Debug, Clone)]
pub struct Paths {
    pub sso_cache_dir: PathBuf,
    pub config_file: PathBuf,
    pub credentials_file: PathBuf,
    pub credentials_cache_file: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self> {
        Ok(Self {
            sso_cache_dir: constants::get_sso_cache_dir()
                .context("Failed to determine SSO cache directory")?,
            config_file: constants::get_aws_config_path()
                .context("Failed to determine AWS config path")?,
            credentials_file: constants::get_aws_credentials_path()
                .context("Failed to determine AWS credentials path")?,
            credentials_cache_file: constants::get_credentials_cache_path()
                .context("Failed to determine credentials cache path")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOptions {
    /// Discard cached state and force a fresh interactive login.
    pub force: bool,
    /// Use the newest session token even if its recorded expiry has passed.
    pub skip_expiry_check: bool,
}

/// Where refreshed credentials end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Overwrite the shared credentials file with a single profile section.
    SharedCredentialsFile,
    /// Emit a credential_process document on stdout, backed by the local
    /// credentials cache.
    CredentialProcess,
}

/// Run the credential refresh workflow end to end.
///
/// The external login command runs at most once per invocation: either up
/// front (missing/expired token, or `--force`) or as the single permitted
/// retry when an exchange is rejected despite an unexpired cache record.
pub async fn run<C>(
    cli: &C,
    paths: &Paths,
    profile: &str,
    opts: RefreshOptions,
    target: OutputTarget,
) -> Result<(), AppError>
where
    C: InteractiveLogin + CredentialsExchange + VersionProbe,
{
    if target == OutputTarget::CredentialProcess {
        if opts.force {
            // A forced run must not resurrect previously issued credentials.
            let _ = fs::remove_file(&paths.credentials_cache_file).await;
        } else if let Some(cached) =
            credentials::read_credentials_cache(&paths.credentials_cache_file).await
        {
            debug!("Reusing still-valid credentials cache");
            println!("{}", credentials::render_credential_process_json(&cached));
            return Ok(());
        }
    }

    check_cli_version(cli).await?;

    let mut logged_in = false;
    let mut token = cache::find_latest_token(&paths.sso_cache_dir).await;

    let needs_login = opts.force
        || match &token {
            None => true,
            Some(t) => !opts.skip_expiry_check && t.is_expired(Utc::now()),
        };
    if needs_login {
        cli.trigger_login(profile).await?;
        logged_in = true;
        token = cache::find_latest_token(&paths.sso_cache_dir).await;
    }

    let Some(mut token) = token else {
        return Err(AppError::NoCachedCredentials(
            "Unable to retrieve credentials from SSO cache".to_string(),
        ));
    };

    let config = sso_config::find_sso_config(&paths.config_file, profile)?;

    let stdout = match cli.get_role_credentials(profile, &token, &config).await {
        Ok(stdout) => stdout,
        Err(ExchangeError::Unauthorized) if !logged_in => {
            // The token claimed validity but the service rejected it. One
            // fresh login, one retried exchange, then give up.
            warn!("Session token was rejected despite an unexpired cache record, re-running login");
            cli.trigger_login(profile).await?;
            token = cache::find_latest_token(&paths.sso_cache_dir)
                .await
                .ok_or_else(|| {
                    AppError::NoCachedCredentials(
                        "Unable to retrieve credentials from SSO cache after login".to_string(),
                    )
                })?;

            match cli.get_role_credentials(profile, &token, &config).await {
                Ok(stdout) => stdout,
                Err(ExchangeError::Unauthorized) => return Err(misbehaving_expiry(&token)),
                Err(ExchangeError::Failed(err)) => return Err(AppError::Other(err)),
            }
        }
        Err(ExchangeError::Unauthorized) => return Err(misbehaving_expiry(&token)),
        Err(ExchangeError::Failed(err)) => return Err(AppError::Other(err)),
    };

    let creds = credentials::parse_role_credentials_output(&stdout)?;

    match target {
        OutputTarget::CredentialProcess => {
            credentials::write_credentials_cache(&paths.credentials_cache_file, &creds).await?;
            println!("{}", credentials::render_credential_process_json(&creds));
        }
        OutputTarget::SharedCredentialsFile => {
            credentials::write_credentials_file(&paths.credentials_file, profile, &creds).await?;
        }
    }

    if let Some(message) = closing_expiry_warning(&token, &config, Utc::now()) {
        warn!("{message}");
    }

    info!("Credential refresh complete for profile: {profile}");
    Ok(())
}

async fn check_cli_version<C: VersionProbe>(cli: &C) -> Result<(), AppError> {
    match cli.major_version().await {
        Some(major) if major >= MIN_AWS_CLI_MAJOR_VERSION => {
            debug!("AWS CLI major version: {major}");
            Ok(())
        }
        Some(major) => Err(AppError::BadAwsCliVersion(format!(
            "AWS CLI v{MIN_AWS_CLI_MAJOR_VERSION} or newer is required, found major version {major}"
        ))),
        None => Err(AppError::BadAwsCliVersion(
            "Unable to determine AWS CLI version; is the AWS CLI installed?".to_string(),
        )),
    }
}

fn misbehaving_expiry(token: &SessionToken) -> AppError {
    AppError::MisbehavingExpiryDate(format!(
        "Exchange was rejected even though the cached token claims expiry at {}",
        token.expires_at.to_rfc3339()
    ))
}

/// Advise the operator when the session token is about to lapse, so the
/// next run does not stall on an interactive login at an awkward moment.
/// Returns the warning to emit, or `None` while the token has more than
/// the warning window left.
fn closing_expiry_warning(
    token: &SessionToken,
    config: &SsoProfileConfig,
    now: DateTime<Utc>,
) -> Option<String> {
    let window = Duration::minutes(EXPIRY_WARNING_WINDOW_MINUTES);
    if token.expires_at - now > window {
        return None;
    }

    Some(match &config.start_url {
        Some(start_url) => format!(
            "SSO session token expires at {}; run `aws sso login` against {start_url} to avoid an interruption",
            token.expires_at.to_rfc3339()
        ),
        None => format!(
            "SSO session token expires at {}; run `aws sso login` to avoid an interruption",
            token.expires_at.to_rfc3339()
        ),
    })
}
