use reqwest::Method;
use tracing::{debug, warn};

use crate::config::{Config, ConfigStore};
use crate::protocol::{error_message, login_body, refresh_body, TokenResponse, LOGIN_PATH, TOKEN_PATH};
use crate::transport::Transport;
use crate::{Error, Result};

/// Where the client stands with the vendor's auth endpoints.
///
/// Refresh is reactive: `Authenticated` only moves to `TokenExpired` when a
/// device call is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    TokenExpired,
    Refreshing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub(crate) struct TokenManager {
    email: Option<String>,
    password: Option<String>,
    access_token: String,
    refresh_token: String,
    state: AuthState,
    store: Option<Box<dyn ConfigStore>>,
}

impl TokenManager {
    pub fn new(config: Config, store: Option<Box<dyn ConfigStore>>) -> Self {
        let access_token = config.access_token.unwrap_or_default();
        let refresh_token = config.refresh_token.unwrap_or_default();
        let state = if access_token.is_empty() {
            AuthState::Unauthenticated
        } else {
            AuthState::Authenticated
        };
        Self {
            email: config.email,
            password: config.password,
            access_token,
            refresh_token,
            state,
            store,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn mark_expired(&mut self) {
        self.state = AuthState::TokenExpired;
    }

    pub fn set_credentials(&mut self, email: String, password: String) {
        self.email = Some(email);
        self.password = Some(password);
    }

    /// Exchange email and password for a fresh token pair.
    pub async fn login(&mut self, transport: &Transport) -> Result<TokenPair> {
        let (email, password) = match (&self.email, &self.password) {
            (Some(e), Some(p)) => (e.clone(), p.clone()),
            _ => {
                self.state = AuthState::Unauthenticated;
                return Err(Error::MissingCredentials);
            }
        };

        self.state = AuthState::Authenticating;
        let body = login_body(&email, &password);
        let resp = match transport
            .request(Method::POST, LOGIN_PATH, None, Some(&body))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("could not request tokens, possible connectivity outage: {e}");
                self.state = AuthState::Unauthenticated;
                return Err(e);
            }
        };

        if !resp.is_success() {
            warn!(status = resp.status, "login rejected by Daikin Skyport");
            self.state = AuthState::Unauthenticated;
            return Err(Error::AuthFailed {
                status: resp.status,
                message: error_message(&resp.body),
            });
        }

        let tokens: TokenResponse = match resp.json() {
            Ok(t) => t,
            Err(e) => {
                self.state = AuthState::Unauthenticated;
                return Err(e);
            }
        };
        let Some(refresh_token) = tokens.refresh_token else {
            self.state = AuthState::Unauthenticated;
            return Err(Error::AuthFailed {
                status: resp.status,
                message: "login did not return a refresh token".to_string(),
            });
        };

        if let Err(e) = self.persist(&tokens.access_token, &refresh_token) {
            warn!("could not save tokens: {e}");
            self.state = AuthState::Unauthenticated;
            return Err(e);
        }
        self.access_token = tokens.access_token;
        self.refresh_token = refresh_token;
        self.state = AuthState::Authenticated;
        debug!("logged in to Daikin Skyport");

        Ok(TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        })
    }

    /// Mint a new access token. Falls back to one full login if the refresh
    /// is rejected; never loops.
    pub async fn refresh(&mut self, transport: &Transport) -> Result<()> {
        let Some(email) = self.email.clone() else {
            self.state = AuthState::Unauthenticated;
            return Err(Error::MissingCredentials);
        };

        if self.refresh_token.is_empty() {
            debug!("no refresh token, logging in");
            return self.login(transport).await.map(|_| ());
        }

        self.state = AuthState::Refreshing;
        let body = refresh_body(&email, &self.refresh_token);
        let resp = match transport
            .request(Method::POST, TOKEN_PATH, None, Some(&body))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.state = AuthState::TokenExpired;
                return Err(e);
            }
        };

        if resp.is_success() {
            let tokens: TokenResponse = match resp.json() {
                Ok(t) => t,
                Err(e) => {
                    self.state = AuthState::TokenExpired;
                    return Err(e);
                }
            };
            let refresh_token = tokens
                .refresh_token
                .unwrap_or_else(|| self.refresh_token.clone());
            if let Err(e) = self.persist(&tokens.access_token, &refresh_token) {
                warn!("could not save refreshed token: {e}");
                self.state = AuthState::TokenExpired;
                return Err(e);
            }
            self.access_token = tokens.access_token;
            self.refresh_token = refresh_token;
            self.state = AuthState::Authenticated;
            debug!("access token refreshed");
            return Ok(());
        }

        warn!(
            status = resp.status,
            message = %error_message(&resp.body),
            "could not refresh tokens, trying a full login"
        );
        self.login(transport).await.map(|_| ())
    }

    /// Save a token pair before it replaces the in-memory one.
    fn persist(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let (Some(store), Some(email)) = (&self.store, &self.email) else {
            return Ok(());
        };
        store.save(&Config::tokens(email, access_token, refresh_token))
    }
}
