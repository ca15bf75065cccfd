// src/auth/lifecycle.rs
//! The PKCE handshake state machine and the token lifecycle around it.
//!
//! A handshake moves `Init -> AwaitingCallback -> CodeReceived -> Exchanged`,
//! or drops into `Failed` from any step before `Exchanged`. The session
//! secrets live only as long as the handshake needs them: they are gone
//! once the code has been sent to the token endpoint or the handshake fails.

use super::callback::{CallbackListener, CallbackOutcome};
use super::pkce::AuthSession;
use super::token_endpoint;
use crate::api::HttpTransport;
use crate::config::OAuthConfig;
use crate::error::{AppError, HandshakeFailure};
use crate::store::{CredentialSet, CredentialStore};
use crate::types::RefreshToken;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    AwaitingCallback,
    CodeReceived,
    Exchanged,
    Failed(HandshakeFailure),
}

impl HandshakeState {
    pub fn name(&self) -> &'static str {
        match self {
            HandshakeState::Init => "init",
            HandshakeState::AwaitingCallback => "awaiting callback",
            HandshakeState::CodeReceived => "code received",
            HandshakeState::Exchanged => "exchanged",
            HandshakeState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Exchanged | HandshakeState::Failed(_))
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Failed(failure) => write!(f, "failed: {}", failure),
            other => f.write_str(other.name()),
        }
    }
}

/// One authorization attempt.
pub struct PkceHandshake {
    state: HandshakeState,
    session: Option<AuthSession>,
    listener: Option<CallbackListener>,
    authorize_url: String,
    code: Option<String>,
}

impl Default for PkceHandshake {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceHandshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Init,
            session: None,
            listener: None,
            authorize_url: String::new(),
            code: None,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Where the user has to go to grant access. Empty before [`Self::begin`].
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// The redirect URI actually being listened on.
    pub fn redirect_uri(&self) -> Option<&str> {
        self.listener.as_ref().map(CallbackListener::redirect_uri)
    }

    /// Whether the verifier and nonce are still held.
    pub fn holds_session(&self) -> bool {
        self.session.is_some()
    }

    fn require(&self, expected: HandshakeState, operation: &'static str) -> Result<(), AppError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HandshakeFailure::InvalidTransition {
                operation,
                state: self.state.name(),
            }
            .into())
        }
    }

    fn fail(&mut self, failure: HandshakeFailure) -> AppError {
        self.session = None;
        self.listener = None;
        self.code = None;
        self.state = HandshakeState::Failed(failure.clone());
        AppError::Handshake(failure)
    }

    /// Generates the session, binds the callback listener and builds the
    /// authorization URL.
    pub async fn begin(&mut self, config: &OAuthConfig) -> Result<(), AppError> {
        self.require(HandshakeState::Init, "begin")?;

        let mut session = AuthSession::generate(config.redirect_uri.as_str());
        let listener =
            CallbackListener::bind(config.redirect_uri.as_url(), session.state_nonce.clone())
                .await?;
        session.redirect_uri = listener.redirect_uri().to_string();

        self.authorize_url = token_endpoint::authorize_url(config, &session)?;
        self.session = Some(session);
        self.listener = Some(listener);
        self.state = HandshakeState::AwaitingCallback;
        Ok(())
    }

    /// Waits for the browser redirect, at most `timeout`.
    pub async fn await_callback(&mut self, timeout: Duration) -> Result<(), AppError> {
        self.await_callback_or_cancel(timeout, std::future::pending())
            .await
    }

    /// Like [`Self::await_callback`], also giving up when `cancel` resolves.
    pub async fn await_callback_or_cancel<C>(
        &mut self,
        timeout: Duration,
        cancel: C,
    ) -> Result<(), AppError>
    where
        C: Future<Output = ()>,
    {
        self.require(HandshakeState::AwaitingCallback, "await the callback")?;
        let Some(mut listener) = self.listener.take() else {
            return Err(self.fail(HandshakeFailure::ListenerClosed));
        };

        match listener.wait(timeout, cancel).await {
            CallbackOutcome::Code(code) => {
                log::info!("Authorization code received");
                self.code = Some(code);
                self.state = HandshakeState::CodeReceived;
                Ok(())
            }
            CallbackOutcome::Failed(failure) => {
                log::warn!("Authorization handshake failed: {}", failure);
                Err(self.fail(failure))
            }
        }
    }

    /// Hands out the code and session for the exchange, consuming both.
    fn take_exchange_inputs(&mut self) -> Result<(AuthSession, String), AppError> {
        self.require(HandshakeState::CodeReceived, "exchange")?;
        match (self.session.take(), self.code.take()) {
            (Some(session), Some(code)) => Ok((session, code)),
            _ => Err(self.fail(HandshakeFailure::MissingCode)),
        }
    }
}

/// Obtains, refreshes and persists credentials.
pub struct TokenLifecycle {
    config: OAuthConfig,
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore,
}

impl TokenLifecycle {
    pub fn new(
        config: OAuthConfig,
        transport: Arc<dyn HttpTransport>,
        store: CredentialStore,
    ) -> Self {
        Self {
            config,
            transport,
            store,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Starts a handshake; it is awaiting its callback on success.
    pub async fn begin_authorization(&self) -> Result<PkceHandshake, AppError> {
        let mut handshake = PkceHandshake::new();
        handshake.begin(&self.config).await?;
        Ok(handshake)
    }

    /// Trades the received code for credentials.
    ///
    /// Only legal once the handshake holds a code; any other state is
    /// refused without contacting the token endpoint.
    pub async fn exchange(&self, handshake: &mut PkceHandshake) -> Result<CredentialSet, AppError> {
        let (session, code) = handshake.take_exchange_inputs()?;
        let request = token_endpoint::code_grant_request(&self.config, &session, &code);
        drop(session);

        match token_endpoint::request_tokens(self.transport.as_ref(), &request).await {
            Ok(credentials) => {
                handshake.state = HandshakeState::Exchanged;
                log::info!(
                    "Exchanged code for tokens (access {})",
                    credentials.access_token.masked()
                );
                Ok(credentials)
            }
            Err(e) => {
                handshake.fail(HandshakeFailure::ExchangeFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Exchanges `refresh_token` for a new access token.
    ///
    /// When the endpoint does not rotate the refresh token the given one is
    /// carried over into the result.
    pub async fn refresh(&self, refresh_token: &RefreshToken) -> Result<CredentialSet, AppError> {
        let request = token_endpoint::refresh_grant_request(&self.config, refresh_token);
        let credentials = token_endpoint::request_tokens(self.transport.as_ref(), &request).await?;
        if credentials.refresh_token.is_none() {
            log::debug!("Token endpoint kept the existing refresh token");
        }
        Ok(credentials.retaining_refresh_token(Some(refresh_token)))
    }

    /// Runs the full browser flow and stores the resulting credentials.
    ///
    /// `present` receives the authorization URL to show to the user.
    pub async fn authorize<C, F>(
        &self,
        timeout: Duration,
        cancel: C,
        present: F,
    ) -> Result<CredentialSet, AppError>
    where
        C: Future<Output = ()>,
        F: FnOnce(&str),
    {
        let mut handshake = self.begin_authorization().await?;
        present(handshake.authorize_url());
        handshake.await_callback_or_cancel(timeout, cancel).await?;
        let credentials = self.exchange(&mut handshake).await?;
        self.store.save(&credentials)?;
        Ok(credentials)
    }

    /// Refreshes the stored credentials and writes the merged set back.
    pub async fn refresh_stored(&self) -> Result<CredentialSet, AppError> {
        let current = self.store.load()?;
        let Some(refresh_token) = current.refresh_token.as_ref() else {
            return Err(AppError::MissingConfiguration(format!(
                "{} holds no refresh_token; run `xlikes auth` with the offline.access scope",
                self.store.path().display()
            )));
        };
        let refreshed = self.refresh(refresh_token).await?;
        self.store.save(&refreshed)?;
        Ok(refreshed)
    }
}
