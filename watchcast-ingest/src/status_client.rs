use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    token: String,
    expiry: i64,
}

#[derive(Debug, Deserialize)]
struct UnverifiedClaims {
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    token: String,
}

#[derive(Debug, Deserialize)]
struct MediaCurrent {
    ingest: bool,
}

/// Owns a bearer credential for one channel, lazily (re)acquiring it from the
/// login endpoint and caching it on disk with restrictive permissions so
/// concurrent per-channel processes don't collide.
pub struct IngestStatusClient {
    http: reqwest::Client,
    api_base: String,
    username: String,
    password: String,
    channel_id: i64,
    credential_path: PathBuf,
    fail_open: bool,
    cached: Mutex<Option<StoredCredential>>,
}

impl IngestStatusClient {
    pub fn new(
        api_base: String,
        username: String,
        password: String,
        channel_id: i64,
        storage_dir: &std::path::Path,
        fail_open: bool,
    ) -> Result<Self> {
        std::fs::create_dir_all(storage_dir)?;
        std::fs::set_permissions(storage_dir, std::fs::Permissions::from_mode(0o700))?;

        let credential_path = storage_dir.join(format!("token_channel_{channel_id}.json"));

        Ok(Self {
            http: reqwest::Client::new(),
            api_base,
            username,
            password,
            channel_id,
            credential_path,
            fail_open,
            cached: Mutex::new(None),
        })
    }

    /// Returns whether the wider system is currently ingesting something. On
    /// any error (credential acquisition or the status call itself), returns
    /// `!fail_open`'s complement per configuration: `fail_open = true` (the
    /// default) treats an error as "not busy"; `false` treats it as "busy".
    pub async fn is_ingesting(&self) -> bool {
        match self.is_ingesting_inner().await {
            Ok(busy) => busy,
            Err(err) => {
                tracing::warn!(channel_id = self.channel_id, error = %err, "ingest status check failed");
                !self.fail_open
            }
        }
    }

    async fn is_ingesting_inner(&self) -> Result<bool> {
        let token = self.get_valid_token().await?;
        let url = format!(
            "{}/api/control/{}/media/current",
            self.api_base, self.channel_id
        );
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        let media: MediaCurrent = response.json().await?;
        Ok(media.ingest)
    }

    async fn get_valid_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = self.load_from_disk();
        }

        let now = now_secs();
        if let Some(credential) = cached.as_ref() {
            if credential.expiry > now + EXPIRY_MARGIN_SECS {
                return Ok(credential.token.clone());
            }
        }

        let fresh = self.request_new_token().await?;
        self.save_to_disk(&fresh)?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn request_new_token(&self) -> Result<StoredCredential> {
        let url = format!("{}/auth/login/", self.api_base);
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?
            .error_for_status()?;
        let login: LoginResponse = response.json().await?;
        let expiry = decode_expiry(&login.user.token)?;
        Ok(StoredCredential {
            token: login.user.token,
            expiry,
        })
    }

    fn load_from_disk(&self) -> Option<StoredCredential> {
        let contents = std::fs::read_to_string(&self.credential_path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    fn save_to_disk(&self, credential: &StoredCredential) -> Result<()> {
        let contents = serde_json::to_string(credential)?;
        std::fs::write(&self.credential_path, contents)?;
        std::fs::set_permissions(&self.credential_path, std::fs::Permissions::from_mode(0o600))?;
        Ok(())
    }
}

/// Decodes the `exp` claim from a JWT without verifying its signature — this
/// service consumes the token, it does not issue it.
fn decode_expiry(token: &str) -> Result<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    let claims = decode::<UnverifiedClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| Error::Credential(e.to_string()))?;
    Ok(claims.claims.exp)
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
