pub mod credentials_process;
pub mod refresh;
pub mod version;

pub use credentials_process::CredentialsProcessCommand;
pub use refresh::RefreshCommand;
pub use version::VersionCommand;
