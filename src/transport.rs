use std::future::Future;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::ClientError;

/// One request addressed to the appliance, relative to its base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct RestRequest {
    /// HTTP verb.
    pub method: Method,
    /// Path (and optional query string), for example `/rest/logical-enclosures?start=0`.
    pub uri: String,
    /// JSON body; `None` sends no body at all.
    pub body: Option<Value>,
    /// Extra headers on top of the connection defaults.
    pub headers: Vec<(String, String)>,
}

impl RestRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns the value of the first header matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A successful response from the appliance.
#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    pub status: StatusCode,
    /// `Location` header, set by the appliance on `202 Accepted` task responses.
    pub location: Option<String>,
    /// Parsed JSON body, [`Value::Null`] when the body was empty.
    pub body: Value,
}

impl RestResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            location: None,
            body,
        }
    }

    pub fn accepted(location: impl Into<String>, body: Value) -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            location: Some(location.into()),
            body,
        }
    }
}

/// Sends [`RestRequest`]s to an appliance.
///
/// [`crate::Connection`] is the HTTP implementation; resource clients are generic
/// over this trait so they can be driven by any transport.
pub trait Transport {
    fn send(
        &self,
        request: RestRequest,
    ) -> impl Future<Output = Result<RestResponse, ClientError>> + Send;
}
