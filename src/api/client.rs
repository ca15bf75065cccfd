// src/api/client.rs
//! Thin HTTP transport for the X API and its OAuth token endpoint.
//!
//! Requests are plain values so the rate limiter can resend the exact same
//! request and tests can compare what was sent. The reqwest implementation
//! does no status handling of its own; classification lives in
//! `rate_limit` and `auth::token_endpoint`.

use crate::constants::HTTP_TIMEOUT;
use crate::error::AppError;
use crate::types::{AccessToken, ClientId, ClientSecret};
use reqwest::Client;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    /// POST with an `application/x-www-form-urlencoded` body.
    PostForm,
}

/// HTTP Basic credentials for a confidential client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
}

/// A fully described outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Query parameters in insertion order.
    pub query: Vec<(String, String)>,
    /// Form fields, only sent for [`Method::PostForm`].
    pub form: Vec<(String, String)>,
    pub bearer: Option<AccessToken>,
    pub basic: Option<BasicAuth>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            form: Vec::new(),
            bearer: None,
            basic: None,
        }
    }

    pub fn post_form(url: impl Into<String>) -> Self {
        Self {
            method: Method::PostForm,
            ..Self::get(url)
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn with_bearer(mut self, token: AccessToken) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn with_basic(mut self, basic: Option<BasicAuth>) -> Self {
        self.basic = basic;
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field, if present.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status, headers and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    /// Header names are lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub url: String,
}

impl HttpReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The ability to perform one HTTP exchange.
///
/// Implementations report transport failures (connect, timeout, body read)
/// as errors and return every HTTP status, including errors, as a reply.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpReply, AppError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("xlikes/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpReply, AppError> {
        let mut builder = match request.method {
            Method::Get => {
                log::debug!("GET {}", request.url);
                self.client.get(&request.url)
            }
            Method::PostForm => {
                log::debug!("POST {}", request.url);
                self.client.post(&request.url).form(&request.form)
            }
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(basic) = &request.basic {
            builder = builder.basic_auth(
                basic.client_id.as_str(),
                Some(basic.client_secret.expose()),
            );
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        log::debug!("{} {} -> {}", method_name(request.method), url, status);

        Ok(HttpReply {
            status,
            headers,
            body,
            url,
        })
    }
}

fn method_name(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::PostForm => "POST",
    }
}
