//! Access-token minting from a long-lived refresh token
//!
//! The one-time consent flow that produced the refresh token is an external
//! setup step; at runtime only the refresh grant is exercised.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use google_apis_common::GetToken;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl, basic::BasicClient,
};
use tokio::sync::Mutex;

use crate::config::GoogleCredentials;

/// Refresh slightly before the reported expiry so in-flight requests never
/// race an expiring token.
const EXPIRY_LEEWAY_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct MintedToken {
    access_token: String,
    expiry: i64,
}

/// `GetToken` implementation backed by a configured OAuth2 refresh token.
/// The minted access token is cached in memory per process, not persisted.
#[derive(Clone)]
pub struct RefreshAuthenticator {
    client: BasicClient,
    refresh_token: String,
    current: Arc<Mutex<Option<MintedToken>>>,
}

impl RefreshAuthenticator {
    pub fn new(credentials: GoogleCredentials) -> Self {
        let auth_url = AuthUrl::new("https://accounts.google.com/o/oauth2/auth".to_string())
            .expect("Invalid auth URL");
        let token_url = TokenUrl::new("https://oauth2.googleapis.com/token".to_string())
            .expect("Invalid token URL");

        let client = BasicClient::new(
            ClientId::new(credentials.client_id),
            Some(ClientSecret::new(credentials.client_secret)),
            auth_url,
            Some(token_url),
        );

        Self {
            client,
            refresh_token: credentials.refresh_token,
            current: Arc::new(Mutex::new(None)),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if token.expiry > Utc::now().timestamp() + EXPIRY_LEEWAY_SECS {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(self.refresh_token.clone()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .context("Failed to exchange refresh token")?;

        let access_token = response.access_token().secret().clone();
        let expires_in = response
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600);

        tracing::debug!("Minted fresh calendar access token");
        *current = Some(MintedToken {
            access_token: access_token.clone(),
            expiry: Utc::now().timestamp() + expires_in,
        });

        Ok(access_token)
    }
}

impl GetToken for RefreshAuthenticator {
    fn get_token<'a>(
        &'a self,
        _scopes: &'a [&str],
    ) -> Pin<
        Box<
            dyn Future<
                    Output = std::result::Result<
                        Option<String>,
                        Box<dyn std::error::Error + Send + Sync>,
                    >,
                > + Send
                + 'a,
        >,
    > {
        Box::pin(async move {
            match self.access_token().await {
                Ok(token) => Ok(Some(token)),
                Err(e) => Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                )) as Box<dyn std::error::Error + Send + Sync>),
            }
        })
    }
}
