//! Authenticated HTTP client for the Account Service.
//!
//! Every request carries the current bearer token. A 401 triggers one
//! single-flight refresh followed by one retry; a second 401 is terminal
//! and clears the stored credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use compass_core::{Error, Result, SessionAuth};

use crate::auth::{Credentials, RefreshedToken, TokenStore};
use crate::config::ClientConfig;
use crate::status::{error_message, to_error, StatusClass};

const LOGIN_PATH: &str = "/api/auth/login/";
const REFRESH_PATH: &str = "/api/auth/token/refresh/";
const LOGOUT_PATH: &str = "/api/auth/logout/";

/// Client for the Account Service and the Embedding & Retrieval Service.
///
/// Cheap to clone; clones share the connection pool and credentials.
#[derive(Debug, Clone)]
pub struct CompassClient {
    http: Client,
    config: ClientConfig,
    tokens: Arc<TokenStore>,
}

impl CompassClient {
    /// Create a client with no credentials.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_tokens(config, Arc::new(TokenStore::new()))
    }

    /// Create a client sharing an existing token store.
    pub fn with_tokens(config: ClientConfig, tokens: Arc<TokenStore>) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            timeout_seconds = config.timeout_seconds,
            "Initializing compass client"
        );

        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Exchange username and password for a token pair and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials> {
        let response = self
            .http
            .post(self.config.url(LOGIN_PATH))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let response = Self::check(response).await?;
        let credentials: Credentials = response.json().await?;
        self.tokens.set(credentials.clone()).await;

        info!(username, "Logged in");
        Ok(credentials)
    }

    pub async fn set_credentials(&self, credentials: Credentials) {
        self.tokens.set(credentials).await;
    }

    // =========================================================================
    // REQUEST EXECUTION
    // =========================================================================

    /// Send a request built by `build`, refreshing the token once on 401.
    ///
    /// `build` is called once per attempt so that non-cloneable bodies
    /// (multipart forms) can be rebuilt for the retry.
    pub(crate) async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = self.tokens.access_token().await;
        let response = self.dispatch(&build, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check(response).await;
        }

        if !self.refresh_after(token.as_deref()).await? {
            self.tokens.clear().await;
            warn!("Token refresh rejected; credentials cleared");
            return Err(Error::Auth(
                "session expired, please log in again".to_string(),
            ));
        }

        let token = self.tokens.access_token().await;
        let response = self.dispatch(&build, token.as_deref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            self.tokens.clear().await;
            warn!("Request rejected after token refresh; credentials cleared");
            return Err(Error::Auth(error_message(401, &body)));
        }
        Self::check(response).await
    }

    async fn dispatch<F>(&self, build: &F, token: Option<&str>) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut request = build(&self.http);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Refresh the access token unless another caller already did.
    ///
    /// Returns `Ok(false)` when no refresh is possible (no refresh token,
    /// or the server rejected it).
    async fn refresh_after(&self, stale: Option<&str>) -> Result<bool> {
        let _gate = self.tokens.lock_refresh().await;

        let current = self.tokens.access_token().await;
        if current.is_some() && current.as_deref() != stale {
            debug!("Access token already refreshed by a concurrent request");
            return Ok(true);
        }

        let Some(refresh) = self.tokens.refresh_token().await else {
            return Ok(false);
        };

        debug!("Refreshing access token");
        let response = self
            .http
            .post(self.config.url(REFRESH_PATH))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            let refreshed: RefreshedToken = response.json().await?;
            self.tokens.apply_refresh(refreshed).await;
            info!("Access token refreshed");
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        match StatusClass::from_status(status) {
            StatusClass::ServerError => Err(to_error(status, &body)),
            _ => {
                debug!(status, "Refresh token rejected");
                Ok(false)
            }
        }
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(to_error(status, &body))
    }

    // =========================================================================
    // JSON HELPERS
    // =========================================================================

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.url(path);
        let response = self.send(|http| http.get(&url)).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.url(path);
        let response = self.send(|http| http.post(&url).json(body)).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn patch_json<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.config.url(path);
        self.send(|http| http.patch(&url).json(body)).await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let url = self.config.url(path);
        self.send(|http| http.delete(&url)).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionAuth for CompassClient {
    async fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated().await
    }

    /// Blacklist the refresh token server-side (best effort) and drop the
    /// local credentials.
    async fn logout(&self) {
        if let Some(refresh) = self.tokens.refresh_token().await {
            let url = self.config.url(LOGOUT_PATH);
            let body = json!({ "refresh": refresh });
            if let Err(e) = self.send(|http| http.post(&url).json(&body)).await {
                debug!(error = %e, "Server-side logout failed");
            }
        }
        self.tokens.clear().await;
        info!("Logged out");
    }
}
