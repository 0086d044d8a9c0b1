use clap::Args;
use tracing::info;

use crate::aws_cli::AwsCli;
use crate::error::AppError;
use crate::workflow::{self, OutputTarget, Paths, RefreshOptions};

/// Emit credentials as a credential_process document on stdout, for direct
/// consumption by the AWS SDK's credential-provider mechanism. Nothing else
/// may be printed to stdout in this mode.
#[derive(Debug, Clone, Args)]
pub struct CredentialsProcessCommand {}

impl CredentialsProcessCommand {
    pub async fn execute(self, profile: &str, opts: RefreshOptions) -> Result<(), AppError> {
        info!("Resolving credential_process output for profile: {profile}");

        let paths = Paths::resolve()?;
        workflow::run(
            &AwsCli::default(),
            &paths,
            profile,
            opts,
            OutputTarget::CredentialProcess,
        )
        .await
    }
}
