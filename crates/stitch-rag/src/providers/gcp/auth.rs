//! Service-account OAuth for Google Cloud REST APIs
//!
//! A self-signed RS256 JWT is exchanged at the key's `token_uri` for an
//! access token, which is reused until shortly before it expires.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_LIFETIME_SECS: i64 = 3600;
/// Reuse window for a fetched token
const TOKEN_TTL: Duration = Duration::from_secs(55 * 60);

/// Fields of a service-account JSON key used for signing
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid service account key: {}", e)))
    }

    /// Signed JWT assertion for the token exchange, issued at `now` (unix seconds)
    pub fn signed_assertion(&self, now: i64) -> Result<String> {
        let signing_input = jwt_signing_input(&self.client_email, &self.token_uri, now);

        let pem = pem::parse(self.private_key.replace("\\n", "\n"))
            .map_err(|e| Error::Config(format!("Service account private key is not PEM: {}", e)))?;
        let key_pair = ring::signature::RsaKeyPair::from_pkcs8(pem.contents())
            .map_err(|e| Error::Config(format!("Unusable service account private key: {}", e)))?;

        let mut signature = vec![0u8; key_pair.public().modulus_len()];
        key_pair
            .sign(
                &ring::signature::RSA_PKCS1_SHA256,
                &ring::rand::SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| Error::internal("Failed to sign service account JWT"))?;

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }
}

/// `base64url(header).base64url(claims)` for an RS256 JWT
fn jwt_signing_input(issuer: &str, audience: &str, now: i64) -> String {
    let header = serde_json::json!({ "alg": "RS256", "typ": "JWT" });
    let claims = serde_json::json!({
        "iss": issuer,
        "scope": SCOPE,
        "aud": audience,
        "iat": now,
        "exp": now + JWT_LIFETIME_SECS,
    });
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

struct CachedToken {
    access_token: String,
    fetched_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Access-token source shared by every Google client
pub struct GcpAuth {
    key: ServiceAccountKey,
    project_id: String,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GcpAuth {
    /// Load a service-account key file
    pub fn from_service_account(key_path: impl AsRef<Path>, project_id: String) -> Result<Self> {
        let key_path = key_path.as_ref();
        let json = std::fs::read_to_string(key_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read service account key {}: {}",
                key_path.display(),
                e
            ))
        })?;
        Ok(Self::from_key(ServiceAccountKey::from_json(&json)?, project_id))
    }

    pub fn from_key(key: ServiceAccountKey, project_id: String) -> Self {
        Self {
            key,
            project_id,
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Current access token, exchanging a new JWT when the cached one is stale.
    ///
    /// The lock is held across the exchange so concurrent callers share one request.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.fetched_at.elapsed() < TOKEN_TTL {
                return Ok(token.access_token.clone());
            }
        }

        let access_token = self.exchange().await?;
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            fetched_at: Instant::now(),
        });
        Ok(access_token)
    }

    async fn exchange(&self) -> Result<String> {
        tracing::debug!("Refreshing GCP access token for {}", self.key.client_email);
        let assertion = self.key.signed_assertion(chrono::Utc::now().timestamp())?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::from_transport("gcp-auth", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status("gcp-auth", status, &body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("gcp-auth", format!("Invalid token response: {}", e)))?;
        Ok(token.access_token)
    }
}
