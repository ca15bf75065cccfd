//! One-shot localhost listener for the OAuth redirect.
//!
//! The listener task serves requests until one of them settles the
//! handshake, then reports through a oneshot channel. Requests for other
//! paths get a 404 and the listener keeps waiting (browsers ask for
//! `/favicon.ico`). A second oneshot tells the task to stop; the waiter
//! always sends it and joins the task before returning.

use crate::error::{AppError, HandshakeFailure};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

const SUCCESS_BODY: &str = "You can close this tab and return to the terminal.";
const REJECTED_BODY: &str = "Invalid state or missing code";
const NOT_FOUND_BODY: &str = "Not Found";
const MAX_REQUEST_BYTES: usize = 8192;
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CALLBACK_PORT: u16 = 8080;

/// How the handshake was settled by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Failed(HandshakeFailure),
}

/// Decision for a single inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    /// Not the callback path; answer 404 and keep listening.
    NotFound,
    /// Callback path with a bad request; answer 400 and fail the handshake.
    Rejected(HandshakeFailure),
    /// Callback with matching state and a code; answer 200.
    Accepted(String),
}

impl Route {
    fn status_line(&self) -> &'static str {
        match self {
            Route::NotFound => "HTTP/1.1 404 Not Found",
            Route::Rejected(_) => "HTTP/1.1 400 Bad Request",
            Route::Accepted(_) => "HTTP/1.1 200 OK",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            Route::NotFound => NOT_FOUND_BODY,
            Route::Rejected(_) => REJECTED_BODY,
            Route::Accepted(_) => SUCCESS_BODY,
        }
    }

    fn into_outcome(self) -> Option<CallbackOutcome> {
        match self {
            Route::NotFound => None,
            Route::Rejected(failure) => Some(CallbackOutcome::Failed(failure)),
            Route::Accepted(code) => Some(CallbackOutcome::Code(code)),
        }
    }
}

/// Classifies a request target such as `/callback?code=..&state=..`.
pub(crate) fn route_callback(target: &str, callback_path: &str, expected_state: &str) -> Route {
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{}", target)) else {
        return Route::NotFound;
    };
    if url.path() != callback_path {
        return Route::NotFound;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    let state_matches = state
        .as_deref()
        .is_some_and(|s| bool::from(s.as_bytes().ct_eq(expected_state.as_bytes())));
    if !state_matches {
        return Route::Rejected(HandshakeFailure::StateMismatch);
    }
    if let Some(error) = error {
        return Route::Rejected(HandshakeFailure::ProviderDenied {
            error,
            description: error_description,
        });
    }
    match code.filter(|c| !c.trim().is_empty()) {
        Some(code) => Route::Accepted(code),
        None => Route::Rejected(HandshakeFailure::MissingCode),
    }
}

/// A bound listener for the redirect URI.
pub struct CallbackListener {
    local_addr: SocketAddr,
    redirect_uri: String,
    outcome: Option<oneshot::Receiver<CallbackOutcome>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Binds to the host and port of `redirect_uri` and starts serving.
    ///
    /// Port 0 binds an ephemeral port; [`Self::redirect_uri`] then reports
    /// the URI with the real port filled in.
    pub async fn bind(redirect_uri: &Url, expected_state: String) -> Result<Self, AppError> {
        let host = redirect_uri.host_str().unwrap_or("localhost").to_string();
        let port = listen_port(redirect_uri);
        let callback_path = redirect_uri.path().to_string();

        let listener = TcpListener::bind((host.as_str(), port)).await.map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("oauth callback bind on {}:{} failed: {}", host, port, e),
            ))
        })?;
        let local_addr = listener.local_addr()?;

        let mut effective = redirect_uri.clone();
        if port == 0 && effective.set_port(Some(local_addr.port())).is_err() {
            return Err(AppError::MissingConfiguration(format!(
                "redirect URI {} cannot carry a port",
                redirect_uri
            )));
        }

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(
            listener,
            callback_path,
            expected_state,
            outcome_tx,
            shutdown_rx,
        ));

        log::debug!("OAuth callback listener on {}", local_addr);
        Ok(Self {
            local_addr,
            redirect_uri: effective.to_string(),
            outcome: Some(outcome_rx),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The redirect URI to advertise to the authorization server.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the handshake to settle, the timeout, or `cancel`.
    ///
    /// The listener is stopped before this returns, whatever the outcome.
    pub async fn wait<C>(&mut self, timeout: Duration, cancel: C) -> CallbackOutcome
    where
        C: Future<Output = ()>,
    {
        let outcome = match self.outcome.take() {
            Some(received) => tokio::select! {
                result = received => result
                    .unwrap_or(CallbackOutcome::Failed(HandshakeFailure::ListenerClosed)),
                _ = tokio::time::sleep(timeout) => CallbackOutcome::Failed(
                    HandshakeFailure::TimedOut { seconds: timeout.as_secs() }
                ),
                _ = cancel => CallbackOutcome::Failed(HandshakeFailure::Cancelled),
            },
            None => CallbackOutcome::Failed(HandshakeFailure::ListenerClosed),
        };
        self.shutdown().await;
        outcome
    }

    /// Stops the listener task and waits for it to exit.
    pub async fn shutdown(&mut self) {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    log::warn!("OAuth callback listener ended abnormally: {}", e);
                }
            }
        }
    }

    /// Whether the serving task has been joined.
    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Resolves when `signal` reports an interrupt. A signal source that
/// failed to install never resolves, so the wait runs to its timeout.
pub async fn cancel_on<E: std::fmt::Display>(signal: impl Future<Output = Result<(), E>>) {
    if let Err(e) = signal.await {
        log::warn!("Interrupt handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Port the browser will contact for `redirect_uri`. `Url` drops an
/// explicit default port such as `:80`, so the scheme default applies.
fn listen_port(redirect_uri: &Url) -> u16 {
    redirect_uri
        .port_or_known_default()
        .unwrap_or(DEFAULT_CALLBACK_PORT)
}

async fn serve(
    listener: TcpListener,
    callback_path: String,
    expected_state: String,
    outcome_tx: oneshot::Sender<CallbackOutcome>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        let socket = tokio::select! {
            _ = &mut shutdown_rx => return,
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    log::debug!("OAuth callback connection from {}", peer);
                    socket
                }
                Err(e) => {
                    log::warn!("OAuth callback accept failed: {}", e);
                    continue;
                }
            },
        };

        let route = tokio::select! {
            _ = &mut shutdown_rx => return,
            route = handle_connection(socket, &callback_path, &expected_state) => route,
        };

        if let Some(outcome) = route.and_then(Route::into_outcome) {
            let _ = outcome_tx.send(outcome);
            return;
        }
    }
}

/// Reads one request, answers it, and returns how it was routed.
async fn handle_connection(
    mut socket: TcpStream,
    callback_path: &str,
    expected_state: &str,
) -> Option<Route> {
    let request = match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_head(&mut socket))
        .await
    {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            log::warn!("OAuth callback read failed: {}", e);
            return None;
        }
        Err(_) => {
            log::warn!("OAuth callback client sent no request in time");
            return None;
        }
    };

    let mut parts = request.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    if method != "GET" || target.is_empty() {
        let _ = respond(&mut socket, "HTTP/1.1 405 Method Not Allowed", "Method Not Allowed").await;
        return None;
    }

    let route = route_callback(target, callback_path, expected_state);
    if let Route::Rejected(failure) = &route {
        log::warn!("OAuth callback rejected: {}", failure);
    }
    if let Err(e) = respond(&mut socket, route.status_line(), route.body()).await {
        log::debug!("OAuth callback response not delivered: {}", e);
    }
    Some(route)
}

async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let read = socket.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn respond(socket: &mut TcpStream, status_line: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "{}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}
