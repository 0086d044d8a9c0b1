use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::constants::CREDENTIALS_CACHE_VERSION;
use crate::error::AppError;

/// Role-scoped temporary credentials issued by the SSO service.
///
/// The expiration is optional: the legacy shared-credentials-file flow never
/// consumed it, and some CLI builds omit it from their output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

/// On-disk shadow of previously issued role credentials, in the document
/// format AWS `credential_process` consumers expect.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CachedRoleCredentials {
    version: u64,
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

/// Parse the stdout of `aws sso get-role-credentials`.
///
/// The command emits a JSON document with a `roleCredentials` object holding
/// string key material and an epoch-milliseconds `expiration`. Any deviation
/// in shape is an `UnexpectedGetRoleCredentialsOutputError`.
pub fn parse_role_credentials_output(stdout: &str) -> Result<RoleCredentials, AppError> {
    let unexpected =
        |msg: String| AppError::UnexpectedGetRoleCredentialsOutput(msg);

    let parsed: Value = serde_json::from_str(stdout)
        .map_err(|_| unexpected("Unable to parse output from command".to_string()))?;

    let role_credentials = parsed
        .as_object()
        .and_then(|obj| obj.get("roleCredentials"))
        .ok_or_else(|| {
            unexpected("Missing key \"roleCredentials\" in output from command".to_string())
        })?;

    let fields = role_credentials.as_object().ok_or_else(|| {
        unexpected("Unexpected value at \"roleCredentials\" key".to_string())
    })?;

    let string_field = |key: &str| -> Result<String, AppError> {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                unexpected(format!(
                    "Missing key \"{key}\" from \"roleCredentials\" in output"
                ))
            })
    };

    let access_key_id = string_field("accessKeyId")?;
    let secret_access_key = string_field("secretAccessKey")?;
    let session_token = string_field("sessionToken")?;

    let expiration = match fields.get("expiration") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let millis = value.as_i64().ok_or_else(|| {
                unexpected(
                    "Bad type for \"expiration\" from \"roleCredentials\" in output".to_string(),
                )
            })?;
            let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                unexpected(
                    "Out of range \"expiration\" from \"roleCredentials\" in output".to_string(),
                )
            })?;
            Some(timestamp)
        }
    };

    Ok(RoleCredentials {
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
    })
}

/// Read the local credentials cache, treating every structural problem as
/// "no valid cache". A record whose expiration has passed is also no cache.
pub async fn read_credentials_cache(path: &Path) -> Option<RoleCredentials> {
    let content = fs::read_to_string(path).await.ok()?;
    let cached: CachedRoleCredentials = serde_json::from_str(&content).ok()?;
    let expiration = DateTime::parse_from_rfc3339(&cached.expiration)
        .ok()?
        .with_timezone(&Utc);

    if expiration <= Utc::now() {
        debug!("Ignoring expired credentials cache at {}", path.display());
        return None;
    }

    Some(RoleCredentials {
        access_key_id: cached.access_key_id,
        secret_access_key: cached.secret_access_key,
        session_token: cached.session_token,
        expiration: Some(expiration),
    })
}

/// Persist role credentials for reuse by later credential-process runs.
///
/// Credentials without an expiration are not cached, as a later run could
/// never tell whether they were still usable.
pub async fn write_credentials_cache(path: &Path, creds: &RoleCredentials) -> Result<()> {
    let Some(expiration) = creds.expiration else {
        debug!("Exchange result carried no expiration, skipping credentials cache write");
        return Ok(());
    };

    let record = CachedRoleCredentials {
        version: CREDENTIALS_CACHE_VERSION,
        access_key_id: creds.access_key_id.clone(),
        secret_access_key: creds.secret_access_key.clone(),
        session_token: creds.session_token.clone(),
        expiration: expiration.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    let json = serde_json::to_string(&record).context("Failed to serialize credentials cache")?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write credentials cache to {}", path.display()))?;
    restrict_permissions(path).await?;

    debug!("Credentials cache written to {}", path.display());
    Ok(())
}

/// Render the credential_process document printed on stdout.
pub fn render_credential_process_json(creds: &RoleCredentials) -> String {
    let mut doc = serde_json::json!({
        "Version": CREDENTIALS_CACHE_VERSION,
        "AccessKeyId": creds.access_key_id,
        "SecretAccessKey": creds.secret_access_key,
        "SessionToken": creds.session_token,
    });
    if let Some(expiration) = creds.expiration {
        doc["Expiration"] =
            Value::String(expiration.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    doc.to_string()
}

/// Overwrite the shared credentials file with a single profile section.
///
/// This helper owns the whole file and only ever maintains one section;
/// `aws_security_token` duplicates the session token for tools that still
/// read the legacy key.
pub async fn write_credentials_file(
    path: &Path,
    profile: &str,
    creds: &RoleCredentials,
) -> Result<()> {
    let content = format!(
        "[{profile}]\n\
         aws_access_key_id = {}\n\
         aws_secret_access_key = {}\n\
         aws_session_token = {}\n\
         aws_security_token = {}\n",
        creds.access_key_id, creds.secret_access_key, creds.session_token, creds.session_token,
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write credentials file to {}", path.display()))?;
    restrict_permissions(path).await?;

    info!("Credentials saved to profile: {profile}");
    Ok(())
}

async fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path).await?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions).await?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample_credentials(expiration: Option<DateTime<Utc>>) -> RoleCredentials {
        RoleCredentials {
            access_key_id: "myaccesskeyid".to_string(),
            secret_access_key: "mysecretaccesskey".to_string(),
            session_token: "mysessiontoken".to_string(),
            expiration,
        }
    }

    #[test]
    fn test_parse_role_credentials_output() {
        let stdout = r#"{
            "roleCredentials": {
                "accessKeyId": "myaccesskeyid",
                "secretAccessKey": "mysecretaccesskey",
                "sessionToken": "mysessiontoken",
                "expiration": 4102444800000
            }
        }"#;

        let creds = parse_role_credentials_output(stdout).unwrap();
        assert_eq!(creds.access_key_id, "myaccesskeyid");
        assert_eq!(creds.secret_access_key, "mysecretaccesskey");
        assert_eq!(creds.session_token, "mysessiontoken");
        assert_eq!(
            creds.expiration,
            DateTime::from_timestamp_millis(4_102_444_800_000)
        );
    }

    #[test]
    fn test_parse_role_credentials_output_without_expiration() {
        let stdout = r#"{"roleCredentials": {"accessKeyId": "a", "secretAccessKey": "s", "sessionToken": "t"}}"#;

        let creds = parse_role_credentials_output(stdout).unwrap();
        assert_eq!(creds.expiration, None);
    }

    #[test]
    fn test_parse_role_credentials_output_rejects_bad_shapes() {
        let cases = [
            ("not json", "Unable to parse"),
            ("[]", "Missing key \"roleCredentials\""),
            ("{}", "Missing key \"roleCredentials\""),
            (r#"{"roleCredentials": "nope"}"#, "Unexpected value"),
            (
                r#"{"roleCredentials": {"secretAccessKey": "s", "sessionToken": "t"}}"#,
                "accessKeyId",
            ),
            (
                r#"{"roleCredentials": {"accessKeyId": 1, "secretAccessKey": "s", "sessionToken": "t"}}"#,
                "accessKeyId",
            ),
            (
                r#"{"roleCredentials": {"accessKeyId": "a", "secretAccessKey": "s", "sessionToken": "t", "expiration": "soon"}}"#,
                "expiration",
            ),
        ];

        for (stdout, fragment) in cases {
            let err = parse_role_credentials_output(stdout).unwrap_err();
            match err {
                AppError::UnexpectedGetRoleCredentialsOutput(msg) => {
                    assert!(msg.contains(fragment), "{msg:?} should mention {fragment:?}");
                }
                other => panic!("Expected UnexpectedGetRoleCredentialsOutput, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_credentials_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials-cache.json");
        let expiration = Utc::now() + Duration::hours(2);
        let creds = sample_credentials(Some(expiration));

        write_credentials_cache(&path, &creds).await.unwrap();
        let read_back = read_credentials_cache(&path).await.unwrap();

        assert_eq!(read_back.access_key_id, creds.access_key_id);
        assert_eq!(read_back.secret_access_key, creds.secret_access_key);
        assert_eq!(read_back.session_token, creds.session_token);
        // Serialized at millisecond precision
        assert_eq!(
            read_back.expiration.unwrap().timestamp_millis(),
            expiration.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_credentials_cache_contains_schema_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials-cache.json");
        let creds = sample_credentials(Some(Utc::now() + Duration::hours(1)));

        write_credentials_cache(&path, &creds).await.unwrap();

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Version"], Value::from(CREDENTIALS_CACHE_VERSION));
        assert_eq!(raw["AccessKeyId"], Value::from("myaccesskeyid"));
    }

    #[tokio::test]
    async fn test_expired_cache_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials-cache.json");
        let creds = sample_credentials(Some(Utc::now() - Duration::minutes(1)));

        write_credentials_cache(&path, &creds).await.unwrap();
        assert_eq!(read_credentials_cache(&path).await, None);
    }

    #[tokio::test]
    async fn test_malformed_cache_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials-cache.json");

        assert_eq!(read_credentials_cache(&path).await, None);

        std::fs::write(&path, "{{{{").unwrap();
        assert_eq!(read_credentials_cache(&path).await, None);

        std::fs::write(&path, r#"{"Version": 1, "AccessKeyId": "a"}"#).unwrap();
        assert_eq!(read_credentials_cache(&path).await, None);
    }

    #[tokio::test]
    async fn test_credentials_without_expiration_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials-cache.json");

        write_credentials_cache(&path, &sample_credentials(None))
            .await
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_render_credential_process_json() {
        let expiration = DateTime::from_timestamp_millis(4_102_444_800_000).unwrap();
        let rendered = render_credential_process_json(&sample_credentials(Some(expiration)));
        let doc: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(doc["Version"], Value::from(1));
        assert_eq!(doc["AccessKeyId"], Value::from("myaccesskeyid"));
        assert_eq!(doc["SecretAccessKey"], Value::from("mysecretaccesskey"));
        assert_eq!(doc["SessionToken"], Value::from("mysessiontoken"));
        assert_eq!(doc["Expiration"], Value::from("2100-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_render_credential_process_json_omits_absent_expiration() {
        let rendered = render_credential_process_json(&sample_credentials(None));
        let doc: Value = serde_json::from_str(&rendered).unwrap();
        assert!(doc.get("Expiration").is_none());
    }

    #[tokio::test]
    async fn test_write_credentials_file_exact_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials");
        let creds = sample_credentials(None);

        write_credentials_file(&path, "default", &creds).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "[default]\n\
             aws_access_key_id = myaccesskeyid\n\
             aws_secret_access_key = mysecretaccesskey\n\
             aws_session_token = mysessiontoken\n\
             aws_security_token = mysessiontoken\n"
        );
    }

    #[tokio::test]
    async fn test_write_credentials_file_clobbers_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(&path, "[other]\naws_access_key_id = stale\n").unwrap();

        write_credentials_file(&path, "staging", &sample_credentials(None))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[staging]\n"));
        assert!(!content.contains("stale"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let creds_path = dir.path().join("credentials");
        let cache_path = dir.path().join("credentials-cache.json");

        write_credentials_file(&creds_path, "default", &sample_credentials(None))
            .await
            .unwrap();
        write_credentials_cache(
            &cache_path,
            &sample_credentials(Some(Utc::now() + Duration::hours(1))),
        )
        .await
        .unwrap();

        for path in [creds_path, cache_path] {
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{} should be owner-only", path.display());
        }
    }
}
