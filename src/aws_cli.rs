use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, info};

use crate::cache::SessionToken;
use crate::constants::UNAUTHORIZED_EXCHANGE_MESSAGE;
use crate::sso_config::SsoProfileConfig;

/// Failure modes of the credential exchange command.
#[derive(Debug)]
pub enum ExchangeError {
    /// The SSO service rejected the session token even though its cache
    /// record claimed it was still valid.
    Unauthorized,
    Failed(anyhow::Error),
}

/// Interactive collaborator contract: the subprocess owns the terminal and
/// its output is never captured.
#[allow(async_fn_in_trait)]
pub trait InteractiveLogin {
    /// Run the external login flow, blocking until the operator completes
    /// or abandons it. A non-zero exit is fatal.
    async fn trigger_login(&self, profile: &str) -> Result<()>;
}

/// Captured collaborator contract: stdout is returned for parsing and
/// stderr is inspected on failure.
#[allow(async_fn_in_trait)]
pub trait CredentialsExchange {
    /// Exchange a session token for role credentials, returning the raw
    /// stdout of the exchange command. Runs under the selected profile so
    /// an ambient AWS_PROFILE cannot change the command's behavior.
    async fn get_role_credentials(
        &self,
        profile: &str,
        token: &SessionToken,
        config: &SsoProfileConfig,
    ) -> Result<String, ExchangeError>;
}

#[allow(async_fn_in_trait)]
pub trait VersionProbe {
    /// Major version reported by the external CLI, or `None` when the probe
    /// fails or reports something unparseable.
    async fn major_version(&self) -> Option<u32>;
}

/// The real AWS CLI.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
        }
    }
}

impl VersionProbe for AwsCli {
    async fn major_version(&self) -> Option<u32> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_major_version(&String::from_utf8_lossy(&output.stdout))
    }
}

/// `aws --version` reports `aws-cli/<version> Python/<...> ...` on stdout.
/// v1 builds print to stderr instead, which this probe deliberately treats
/// as unparseable.
fn parse_major_version(stdout: &str) -> Option<u32> {
    stdout
        .trim()
        .strip_prefix("aws-cli/")?
        .split('.')
        .next()?
        .parse()
        .ok()
}

impl InteractiveLogin for AwsCli {
    async fn trigger_login(&self, profile: &str) -> Result<()> {
        info!("Running `aws sso login` for profile: {profile}");

        // Stdio stays inherited so the CLI can drive its browser prompt.
        let status = Command::new(&self.program)
            .args(["sso", "login"])
            .env("AWS_PROFILE", profile)
            .status()
            .await
            .context("Failed to run `aws sso login`")?;

        if !status.success() {
            bail!("`aws sso login` exited with {status}");
        }
        Ok(())
    }
}

impl CredentialsExchange for AwsCli {
    async fn get_role_credentials(
        &self,
        profile: &str,
        token: &SessionToken,
        config: &SsoProfileConfig,
    ) -> Result<String, ExchangeError> {
        debug!(
            "Exchanging session token for role {} in account {}",
            config.role_name, config.account_id
        );

        let output = Command::new(&self.program)
            .env("AWS_PROFILE", profile)
            .args([
                "sso",
                "get-role-credentials",
                "--role-name",
                &config.role_name,
                "--account-id",
                &config.account_id,
                "--access-token",
                &token.access_token,
                "--region",
                &token.region,
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                ExchangeError::Failed(
                    anyhow::Error::new(err).context("Failed to run `aws sso get-role-credentials`"),
                )
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.trim() == UNAUTHORIZED_EXCHANGE_MESSAGE {
            return Err(ExchangeError::Unauthorized);
        }

        Err(ExchangeError::Failed(anyhow::anyhow!(
            "`aws sso get-role-credentials` exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}
