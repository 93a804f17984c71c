//! Credentials for the remote object store.
//!
//! Authorization state lives in two files: the application's client
//! secrets (downloaded from the API console, never written by us) and
//! the grant in token.json under the store directory. [`TokenManager`]
//! ties them together and hands out fresh access tokens.

pub mod device_flow;
pub mod error;
pub mod token_store;

use std::fs;
use std::path::Path;

use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::Mutex;

pub use device_flow::{DeviceCodeResponse, DeviceFlowAuth, SCOPES};
pub use error::AuthError;
pub use token_store::{StoredToken, TokenStore};

use error::Result;

/// Assumed access token lifetime when the server does not send one.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(default)]
    installed: Option<ClientApplication>,
    #[serde(default)]
    web: Option<ClientApplication>,
}

#[derive(Debug, Deserialize)]
struct ClientApplication {
    client_id: String,
    client_secret: String,
}

/// OAuth2 application identity, parsed from a client secrets file.
pub struct ClientSecrets {
    pub client_id: String,
    client_secret: SecretString,
}

impl ClientSecrets {
    /// Parses the console-exported secrets file. Both `installed` and
    /// `web` application entries are accepted.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| AuthError::ReadSecrets {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ClientSecretsFile = serde_json::from_str(&raw)?;
        let app = file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidSecrets(
                "expected an 'installed' or 'web' application entry".to_string(),
            )
        })?;

        if app.client_id.is_empty() {
            return Err(AuthError::InvalidSecrets("client_id is empty".to_string()));
        }

        Ok(Self {
            client_id: app.client_id,
            client_secret: SecretString::from(app.client_secret),
        })
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }
}

/// Hands out access tokens, refreshing and persisting behind the scenes.
pub struct TokenManager {
    secrets: ClientSecrets,
    store: TokenStore,
    flow: DeviceFlowAuth,
    current: Mutex<Option<StoredToken>>,
}

impl TokenManager {
    pub fn new(secrets: ClientSecrets, store: TokenStore) -> Result<Self> {
        Ok(Self {
            secrets,
            store,
            flow: DeviceFlowAuth::new()?,
            current: Mutex::new(None),
        })
    }

    /// Manager with an explicit flow client, for tests that stand in for
    /// the authorization server.
    pub fn with_flow(secrets: ClientSecrets, store: TokenStore, flow: DeviceFlowAuth) -> Self {
        Self {
            secrets,
            store,
            flow,
            current: Mutex::new(None),
        }
    }

    /// A currently valid access token.
    ///
    /// Loads the stored grant on first use and refreshes it when it is
    /// within the expiry window. Fails with [`AuthError::NotAuthorized`]
    /// when there is no grant to work from.
    pub async fn access_token(&self) -> Result<SecretString> {
        let mut current = self.current.lock().await;

        if current.is_none() {
            *current = self.store.load()?;
        }

        let token = current.as_mut().ok_or(AuthError::NotAuthorized)?;

        if token.is_expired(Utc::now()) {
            let refresh = token
                .refresh_token
                .clone()
                .ok_or(AuthError::NotAuthorized)?;

            let response = self
                .flow
                .refresh_access_token(
                    &SecretString::from(refresh),
                    &self.secrets.client_id,
                    self.secrets.client_secret(),
                )
                .await?;

            let refreshed = stored_from_response(response, token.refresh_token.take());
            self.store.save(&refreshed)?;
            *token = refreshed;
        }

        Ok(SecretString::from(token.access_token.clone()))
    }

    /// Step 1 of the interactive grant: obtain the code pair the operator
    /// has to approve. The caller displays `user_code` and
    /// `verification_uri`.
    pub async fn begin_authorization(&self) -> Result<DeviceCodeResponse> {
        self.flow.request_device_code(&self.secrets.client_id).await
    }

    /// Step 2: wait for approval, then persist the grant.
    pub async fn finish_authorization(&self, device_code: &DeviceCodeResponse) -> Result<()> {
        let response = self
            .flow
            .poll_for_token(device_code, &self.secrets.client_id, self.secrets.client_secret())
            .await?;

        let token = stored_from_response(response, None);
        self.store.save(&token)?;
        *self.current.lock().await = Some(token);

        Ok(())
    }
}

/// Maps a token endpoint response to its persisted form. A response
/// without a refresh token keeps the previous one, since refresh grants
/// are only issued once.
fn stored_from_response(
    response: device_flow::TokenResponse,
    previous_refresh: Option<String>,
) -> StoredToken {
    let lifetime = response.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

    StoredToken {
        access_token: response.access_token,
        refresh_token: response.refresh_token.or(previous_refresh),
        expiry: Utc::now() + chrono::Duration::seconds(lifetime as i64),
    }
}
