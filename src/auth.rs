// Credential provider: owns the on-disk token cache and the refresh call.
// The rest of the program only ever sees a ready-to-use access token.

use anyhow::{bail, Context, Result};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::AppConfig;

/// Access tokens within this margin of expiry are treated as stale so a
/// long upload does not start on a token about to lapse.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Cached OAuth token as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of `access_token`. Absent means unknown, i.e. stale.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    /// Some servers rotate the refresh token on use.
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct CredentialProvider {
    client: Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

impl CredentialProvider {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(CredentialProvider {
            client,
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_path: config.token_path(),
        })
    }

    /// Produce a valid access token: cached if still fresh, otherwise
    /// refreshed and re-persisted. Any failure here ends the session; the
    /// token cache must be provisioned out of band.
    pub fn access_token(&self) -> Result<String> {
        let cached = match self.load_cached() {
            Ok(token) => token,
            Err(err) => bail!(
                "No usable token cache at {} ({}). Provision one with a refresh token to use this tool.",
                self.token_path.display(),
                err
            ),
        };
        if is_valid(&cached) {
            debug!("cached access token still valid");
            return Ok(cached.access_token);
        }
        let refreshed = self.refresh(&cached)?;
        self.persist(&refreshed)?;
        Ok(refreshed.access_token)
    }

    /// Read the token cache from disk.
    pub fn load_cached(&self) -> Result<StoredToken> {
        let data = std::fs::read_to_string(&self.token_path)
            .with_context(|| format!("Failed to read token file {}", self.token_path.display()))?;
        let token: StoredToken = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse token file {}", self.token_path.display()))?;
        Ok(token)
    }

    /// Exchange the refresh token for a fresh access token. The client
    /// authenticates with HTTP Basic credentials.
    pub fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        info!("refreshing access token");
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        let res = self
            .client
            .post(&self.token_endpoint)
            .header(AUTHORIZATION, format!("Basic {}", encoded))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", token.refresh_token.as_str()),
            ])
            .send()
            .context("Failed to send token refresh request")?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            bail!("Token refresh failed: {} - {}", status, txt);
        }
        let body: RefreshResponse = res.json().context("Parsing token refresh response")?;
        Ok(StoredToken {
            access_token: body.access_token,
            refresh_token: body
                .refresh_token
                .unwrap_or_else(|| token.refresh_token.clone()),
            expiry: Some(Utc::now() + Duration::seconds(body.expires_in)),
        })
    }

    /// Write the token cache back to disk.
    pub fn persist(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(token).context("Serializing token")?;
        std::fs::write(&self.token_path, data)
            .with_context(|| format!("Failed to write token file {}", self.token_path.display()))?;
        Ok(())
    }
}

/// Whether the access token can still be used, keeping a safety margin
/// before the recorded expiry.
pub fn is_valid(token: &StoredToken) -> bool {
    match token.expiry {
        Some(expiry) => expiry - Utc::now() > Duration::seconds(EXPIRY_MARGIN_SECS),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::collections::BTreeMap;

    fn test_config(token_endpoint: String, token_path: PathBuf) -> AppConfig {
        AppConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            token_path: Some(token_path),
            directories: BTreeMap::from([("ACS".to_string(), "folder-acs".to_string())]),
            api_base: "http://unused".to_string(),
            upload_base: "http://unused".to_string(),
            token_endpoint,
            uploader_tag: None,
        }
    }

    fn stale_token() -> StoredToken {
        StoredToken {
            access_token: "old-at".to_string(),
            refresh_token: "rt-1".to_string(),
            expiry: Some(Utc::now() - Duration::minutes(5)),
        }
    }

    #[test]
    fn validity_honors_the_expiry_margin() {
        let mut token = stale_token();
        assert!(!is_valid(&token));

        token.expiry = Some(Utc::now() + Duration::seconds(30));
        assert!(!is_valid(&token), "inside the margin counts as stale");

        token.expiry = Some(Utc::now() + Duration::minutes(10));
        assert!(is_valid(&token));

        token.expiry = None;
        assert!(!is_valid(&token));
    }

    #[test]
    fn refresh_posts_basic_credentials_and_grant() {
        let mut server = mockito::Server::new();
        let expected_basic = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("client-1:secret-1")
        );
        let mock = server
            .mock("POST", "/token")
            .match_header("authorization", expected_basic.as_str())
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                mockito::Matcher::UrlEncoded("refresh_token".into(), "rt-1".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new-at","expires_in":3600}"#)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(format!("{}/token", server.url()), dir.path().join("token.json"));
        let provider = CredentialProvider::new(&config).unwrap();

        let refreshed = provider.refresh(&stale_token()).unwrap();
        mock.assert();
        assert_eq!(refreshed.access_token, "new-at");
        // no rotation in the response keeps the old refresh token
        assert_eq!(refreshed.refresh_token, "rt-1");
        assert!(is_valid(&refreshed));
    }

    #[test]
    fn refresh_failure_carries_status_and_body() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(format!("{}/token", server.url()), dir.path().join("token.json"));
        let provider = CredentialProvider::new(&config).unwrap();

        let err = provider.refresh(&stale_token()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Token refresh failed"));
        assert!(msg.contains("invalid_grant"));
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config("http://unused".to_string(), dir.path().join("nested/token.json"));
        let provider = CredentialProvider::new(&config).unwrap();

        let token = stale_token();
        provider.persist(&token).unwrap();
        let loaded = provider.load_cached().unwrap();
        assert_eq!(loaded.access_token, token.access_token);
        assert_eq!(loaded.refresh_token, token.refresh_token);
    }

    #[test]
    fn access_token_refreshes_and_persists_a_stale_cache() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/token")
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new-at","expires_in":3600,"refresh_token":"rt-2"}"#)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(format!("{}/token", server.url()), dir.path().join("token.json"));
        let provider = CredentialProvider::new(&config).unwrap();
        provider.persist(&stale_token()).unwrap();

        assert_eq!(provider.access_token().unwrap(), "new-at");
        // rotation in the response replaces the stored refresh token
        let stored = provider.load_cached().unwrap();
        assert_eq!(stored.refresh_token, "rt-2");
        assert!(is_valid(&stored));
    }

    #[test]
    fn missing_cache_is_a_fatal_actionable_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config("http://unused".to_string(), dir.path().join("token.json"));
        let provider = CredentialProvider::new(&config).unwrap();
        let msg = provider.access_token().unwrap_err().to_string();
        assert!(msg.contains("Provision"));
        assert!(msg.contains("token.json"));
    }
}
