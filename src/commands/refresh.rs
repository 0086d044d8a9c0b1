use tracing::info;

use crate::aws_cli::AwsCli;
use crate::error::AppError;
use crate::workflow::{self, OutputTarget, Paths, RefreshOptions};

/// Default command: refresh role credentials and write them into the shared
/// credentials file.
#[derive(Debug, Clone, Default)]
pub struct RefreshCommand;

impl RefreshCommand {
    pub async fn execute(self, profile: &str, opts: RefreshOptions) -> Result<(), AppError> {
        info!("Refreshing shared credentials file for profile: {profile}");

        let paths = Paths::resolve()?;
        workflow::run(
            &AwsCli::default(),
            &paths,
            profile,
            opts,
            OutputTarget::SharedCredentialsFile,
        )
        .await?;

        println!("AWS credentials saved to {profile} profile.");
        Ok(())
    }
}
