use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{CredentialsProcessCommand, RefreshCommand, VersionCommand};
use crate::error::AppError;
use crate::workflow::RefreshOptions;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "aws-sso-auth",
    version,
    about = "Refresh AWS credentials from an AWS SSO session",
    long_about = None,
    arg_required_else_help = false
)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        default_value = "default",
        help = "AWS profile name"
    )]
    pub profile: String,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[arg(
        long,
        global = true,
        help = "Discard cached credentials and force a fresh interactive login"
    )]
    pub force: bool,

    #[arg(
        long,
        global = true,
        help = "Use the newest cached session token even if its recorded expiry has passed"
    )]
    pub skip_expiry_check: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(
        name = "credentials-process",
        about = "Emit credentials as a credential_process JSON document instead of writing the shared credentials file"
    )]
    CredentialsProcess(CredentialsProcessCommand),
    #[command(about = "Print the aws-sso-auth version")]
    Version(VersionCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<(), AppError> {
        let profile = self.profile;
        let opts = RefreshOptions {
            force: self.force,
            skip_expiry_check: self.skip_expiry_check,
        };

        match self.command {
            None => RefreshCommand::default().execute(&profile, opts).await,
            Some(Commands::CredentialsProcess(cmd)) => cmd.execute(&profile, opts).await,
            Some(Commands::Version(cmd)) => {
                cmd.execute();
                Ok(())
            }
        }
    }
}
