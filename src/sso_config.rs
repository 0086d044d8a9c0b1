use std::path::Path;

use ini::Ini;
use tracing::debug;

use crate::error::AppError;

/// SSO settings for one profile section of the AWS config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoProfileConfig {
    pub role_name: String,
    pub account_id: String,
    pub start_url: Option<String>,
}

/// Resolve the config section for a profile the way the AWS CLI does: the
/// default profile lives in `[default]`, everything else in
/// `[profile <name>]`.
pub fn section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

/// Read the SSO role and account for a profile from the AWS config file.
///
/// A missing file, missing section, or missing required key is a
/// `MissingSSOConfigError` naming the failed check and the file involved.
pub fn find_sso_config(path: &Path, profile: &str) -> Result<SsoProfileConfig, AppError> {
    let ini = Ini::load_from_file(path).map_err(|err| {
        AppError::MissingSsoConfig(format!("Unable to read {}: {err}", path.display()))
    })?;

    let section_name = section_name(profile);
    let section = ini.section(Some(section_name.as_str())).ok_or_else(|| {
        AppError::MissingSsoConfig(format!(
            "No [{section_name}] section in {}",
            path.display()
        ))
    })?;

    let role_name = section.get("sso_role_name").ok_or_else(|| {
        AppError::MissingSsoConfig(format!(
            "Missing sso_role_name from [{section_name}] section in {}",
            path.display()
        ))
    })?;

    let account_id = section.get("sso_account_id").ok_or_else(|| {
        AppError::MissingSsoConfig(format!(
            "Missing sso_account_id from [{section_name}] section in {}",
            path.display()
        ))
    })?;

    debug!("Resolved SSO config from [{section_name}]: role {role_name}, account {account_id}");

    Ok(SsoProfileConfig {
        role_name: role_name.to_string(),
        account_id: account_id.to_string(),
        start_url: section.get("sso_start_url").map(str::to_string),
    })
}
