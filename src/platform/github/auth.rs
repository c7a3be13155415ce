use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use octocrab::Octocrab;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
struct JwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Generate a JWT for GitHub App authentication.
pub fn generate_app_jwt(app_id: u64, private_key_path: &Path) -> Result<String> {
    let key_pem = std::fs::read(private_key_path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read private key at {}: {e}",
            private_key_path.display()
        ))
    })?;

    let encoding_key = EncodingKey::from_rsa_pem(&key_pem)
        .map_err(|e| AppError::Config(format!("Invalid RSA private key: {e}")))?;

    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        iat: now - 60,      // clock drift allowance
        exp: now + 10 * 60, // GitHub caps App JWTs at 10 minutes
        iss: app_id.to_string(),
    };

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| AppError::Config(format!("Failed to generate JWT: {e}")))
}

/// Build an octocrab client authenticated with a bearer token.
pub fn build_client(base_url: Option<&str>, token: String) -> Result<Octocrab> {
    let mut builder = Octocrab::builder().personal_token(token);
    if let Some(url) = base_url {
        builder = builder
            .base_uri(url)
            .map_err(|e| AppError::Config(format!("Invalid GitHub API base URL {url}: {e}")))?;
    }

    builder
        .build()
        .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))
}

/// GitHub App credentials for a single installation, with the installation
/// token cached until shortly before it expires.
pub struct AppCredentials {
    app_id: u64,
    private_key_path: PathBuf,
    installation_id: u64,
    cached: RwLock<Option<(String, DateTime<Utc>)>>,
}

impl AppCredentials {
    pub fn new(app_id: u64, private_key_path: PathBuf, installation_id: u64) -> Result<Self> {
        if !private_key_path.exists() {
            return Err(AppError::Config(format!(
                "GitHub App private key not found at: {}",
                private_key_path.display()
            )));
        }

        Ok(Self {
            app_id,
            private_key_path,
            installation_id,
            cached: RwLock::new(None),
        })
    }

    /// Return a valid installation token, minting a new one when the cached
    /// token expires within five minutes.
    pub async fn installation_token(&self, base_url: Option<&str>) -> Result<String> {
        {
            let cached = self.cached.read().await;
            if let Some((token, expiry)) = cached.as_ref() {
                if token_is_fresh(*expiry, Utc::now()) {
                    return Ok(token.clone());
                }
            }
        }

        let jwt = generate_app_jwt(self.app_id, &self.private_key_path)?;
        let client = build_client(base_url, jwt)?;

        let url = format!("/app/installations/{}/access_tokens", self.installation_id);
        let response: serde_json::Value = client
            .post(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to create installation token: {e}")))?;

        let token = response["token"]
            .as_str()
            .ok_or_else(|| AppError::GitHubApi("No token in response".to_string()))?
            .to_string();

        let expires_at = response["expires_at"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        tracing::debug!(
            installation_id = self.installation_id,
            expires_at = %expires_at,
            "Minted GitHub installation token"
        );

        *self.cached.write().await = Some((token.clone(), expires_at));
        Ok(token)
    }
}

fn token_is_fresh(expiry: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expiry > now + Duration::minutes(5)
}
