//! Auth-config file loading.
//!
//! The auth file is shared with the webhook tooling and carries more than the
//! reconciler needs; only the access token is consumed here.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Credentials for the platform API, stored as JSON with camelCase keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    pub access_token: String,
    pub signing_secret: String,
}

/// Load credentials from `path`.
pub fn load(path: &Path) -> Result<AuthConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read auth config {}", path.display()))?;
    let auth: AuthConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse auth config {}", path.display()))?;
    if auth.access_token.is_empty() {
        bail!("auth config {} has no accessToken", path.display());
    }
    Ok(auth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_reads_camel_case_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("auth.json");
        fs::write(
            &path,
            r#"{"accessToken": "xoxb-test", "signingSecret": "shhh"}"#,
        )
        .expect("write");
        let auth = load(&path).expect("load");
        assert_eq!(auth.access_token, "xoxb-test");
        assert_eq!(auth.signing_secret, "shhh");
    }

    #[test]
    fn load_rejects_missing_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("auth.json");
        fs::write(&path, r#"{"signingSecret": "shhh"}"#).expect("write");
        let err = load(&path).expect_err("no token");
        assert!(err.to_string().contains("no accessToken"), "{err}");
    }
}
