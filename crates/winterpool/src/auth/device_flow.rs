//! OAuth2 Device Authorization Grant (RFC 8628).
//!
//! The pipeline often runs on headless hosts, so authorization happens
//! out of band: the tool prints a short code, the operator enters it on
//! another device, and the tool polls the token endpoint until the
//! grant comes through.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::{AuthError, Result};

/// Device authorization endpoint.
pub const DEVICE_AUTH_URL: &str = "https://oauth2.googleapis.com/device/code";

/// Token endpoint.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes the pipeline requests. Changing these invalidates any stored
/// token; delete token.json and authorize again.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/drive.appfolder",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// RFC 8628 grant type for the device code exchange.
const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Connect / overall timeouts for every request this module makes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Floor for the polling window, in case the server hands back a zero
/// or skewed expires_in.
const MIN_POLL_WINDOW_SECS: u64 = 5;

/// Step added to the poll interval on slow_down, per RFC 8628 §3.5.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Ceiling for the poll interval after repeated slow_down responses.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Error bodies quoted in messages are clipped to this many bytes.
const ERROR_BODY_LIMIT: usize = 200;

fn clip_body(body: &str) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        format!("{}... (truncated)", &body[..ERROR_BODY_LIMIT])
    } else {
        body.to_string()
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AuthError::HttpClient(e.to_string()))
}

/// What the authorization endpoint hands back for a new device grant.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    /// Opaque code this client presents while polling.
    pub device_code: String,

    /// Short code the operator types in on another device.
    pub user_code: String,

    /// Page where the operator enters the user code. Google spells
    /// this `verification_url`; RFC 8628 spells it `verification_uri`.
    #[serde(alias = "verification_url")]
    pub verification_uri: String,

    /// Seconds until both codes stop working.
    pub expires_in: u64,

    /// Seconds to wait between polls.
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Access token lifetime in seconds, when the server reports one.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// Only handed out on the first grant; refreshes keep the old one.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Error body from the token endpoint while polling.
#[derive(Debug, Clone, Deserialize)]
struct TokenErrorResponse {
    error: String,

    #[serde(default)]
    error_description: Option<String>,
}

/// Device flow client bound to the store's authorization server.
pub struct DeviceFlowAuth {
    client: Client,
    device_auth_url: String,
    token_url: String,
}

impl DeviceFlowAuth {
    pub fn new() -> Result<Self> {
        Self::with_urls(DEVICE_AUTH_URL.to_string(), TOKEN_URL.to_string())
    }

    /// Override the endpoints. Used by tests that stand in for the
    /// authorization server.
    pub fn with_urls(device_auth_url: String, token_url: String) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            device_auth_url,
            token_url,
        })
    }

    /// Step 1: request a device and user code pair.
    pub async fn request_device_code(&self, client_id: &str) -> Result<DeviceCodeResponse> {
        let scope = SCOPES.join(" ");
        info!("Starting device authorization against {}", self.device_auth_url);

        let response = self
            .client
            .post(&self.device_auth_url)
            .form(&[("client_id", client_id), ("scope", &scope)])
            .send()
            .await
            .map_err(|e| AuthError::DeviceCode(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::DeviceCode(format!(
                "request failed ({}): {}",
                status,
                clip_body(&body)
            )));
        }

        let device_code: DeviceCodeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::DeviceCode(format!("unparseable response: {}", e)))?;

        info!(
            "Device code issued; code {} expires in {}s",
            device_code.user_code, device_code.expires_in
        );

        Ok(device_code)
    }

    /// Step 2: poll the token endpoint until the user approves, the code
    /// expires, or the server reports a hard error.
    pub async fn poll_for_token(
        &self,
        device_code: &DeviceCodeResponse,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<TokenResponse> {
        let window = device_code.expires_in.max(MIN_POLL_WINDOW_SECS);
        let deadline = Instant::now() + Duration::from_secs(window);
        let mut wait = Duration::from_secs(device_code.interval.max(1));

        info!("Waiting up to {}s for the operator to approve", window);

        loop {
            if Instant::now() >= deadline {
                return Err(AuthError::Expired);
            }

            tokio::time::sleep(wait).await;

            let response = self
                .client
                .post(&self.token_url)
                .form(&[
                    ("client_id", client_id),
                    ("client_secret", client_secret.expose_secret()),
                    ("device_code", &device_code.device_code),
                    ("grant_type", DEVICE_GRANT_TYPE),
                ])
                .send()
                .await
                .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

            if response.status().is_success() {
                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| AuthError::TokenExchange(format!("unparseable response: {}", e)))?;
                info!("Device grant approved");
                return Ok(token);
            }

            let error: TokenErrorResponse = response
                .json()
                .await
                .map_err(|e| AuthError::TokenExchange(format!("unparseable error: {}", e)))?;

            match error.error.as_str() {
                "authorization_pending" => {
                    debug!("Grant not approved yet, polling again in {:?}", wait);
                }
                "slow_down" => {
                    wait = (wait + SLOW_DOWN_STEP).min(MAX_POLL_INTERVAL);
                    warn!("Token endpoint asked to slow down; next poll in {:?}", wait);
                }
                "expired_token" => return Err(AuthError::Expired),
                "access_denied" => return Err(AuthError::Denied),
                _ => {
                    return Err(AuthError::TokenExchange(format!(
                        "{} - {}",
                        error.error,
                        error.error_description.unwrap_or_default()
                    )));
                }
            }
        }
    }

    /// Exchange a refresh token for a fresh access token.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &SecretString,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<TokenResponse> {
        debug!("Refreshing the access token");

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret.expose_secret()),
                ("refresh_token", refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh(format!(
                "exchange failed ({}): {}",
                status,
                clip_body(&body)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Refresh(format!("unparseable response: {}", e)))
    }
}
