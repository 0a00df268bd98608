use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde_json::Value;

use crate::transport::{RestRequest, RestResponse, Transport};
use crate::ClientError;

/// API version sent in `X-API-Version` unless overridden.
pub const DEFAULT_API_VERSION: u32 = 300;

const LOGIN_SESSIONS_URI: &str = "/rest/login-sessions";
const VERSION_URI: &str = "/rest/version";

/// User credentials for [`Connection::login`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub user_name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_login_domain: Option<String>,
}

impl Credentials {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            auth_login_domain: None,
        }
    }

    #[must_use]
    pub fn with_auth_login_domain(mut self, domain: impl Into<String>) -> Self {
        self.auth_login_domain = Some(domain.into());
        self
    }
}

/// Async HTTP connection to a OneView appliance.
///
/// Every request carries `X-API-Version` and, once a session exists, the
/// `Auth` session header. Resource clients talk to the appliance through the
/// [`Transport`] implementation of this type.
#[derive(Clone, Debug)]
pub struct Connection {
    base_url: Url,
    session_id: Option<String>,
    api_version: u32,
    http: reqwest::Client,
}

impl Connection {
    /// Creates a connection to the given appliance host.
    ///
    /// Accepts either a bare host (`10.0.0.1`, which is reached over HTTPS) or
    /// an absolute URL. The URL is normalized to include a trailing slash, so
    /// relative endpoint paths join correctly.
    pub fn new(host: impl AsRef<str>) -> Result<Self, ClientError> {
        let host = host.as_ref();
        let candidate = if host.contains("://") {
            host.to_owned()
        } else {
            format!("https://{host}")
        };
        let parsed =
            Url::parse(&candidate).map_err(|_| ClientError::InvalidBaseUrl(host.to_owned()))?;

        Ok(Self {
            base_url: ensure_trailing_slash(parsed),
            session_id: None,
            api_version: DEFAULT_API_VERSION,
            http: reqwest::Client::new(),
        })
    }

    /// Returns a new connection that reuses an existing session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Returns a new connection sending `version` in `X-API-Version`.
    #[must_use]
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Rebuilds the HTTP client, optionally accepting self-signed appliance certificates.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Result<Self, ClientError> {
        self.http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept)
            .build()?;
        Ok(self)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Opens a session and stores its id for subsequent requests.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), ClientError> {
        let body = serde_json::to_value(credentials)?;
        let response = self
            .send(RestRequest::new(reqwest::Method::POST, LOGIN_SESSIONS_URI).with_body(body))
            .await?;

        let session_id = response
            .body
            .get("sessionID")
            .and_then(Value::as_str)
            .ok_or(ClientError::MissingSessionId)?;
        tracing::debug!(user = %credentials.user_name, "logged in to appliance");
        self.session_id = Some(session_id.to_owned());
        Ok(())
    }

    /// Closes the current session. A connection without a session is left untouched.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        if self.session_id.is_none() {
            return Ok(());
        }
        self.send(RestRequest::new(reqwest::Method::DELETE, LOGIN_SESSIONS_URI))
            .await?;
        self.session_id = None;
        Ok(())
    }

    /// Returns the appliance's `currentVersion` / `minimumVersion` document.
    pub async fn get_version(&self) -> Result<Value, ClientError> {
        let response = self
            .send(RestRequest::new(reqwest::Method::GET, VERSION_URI))
            .await?;
        Ok(response.body)
    }

    async fn execute(&self, request: RestRequest) -> Result<RestResponse, ClientError> {
        let url = self.build_url(&request.uri)?;
        tracing::debug!(method = %request.method, %url, "sending request");

        let mut builder = self
            .http
            .request(request.method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-API-Version", self.api_version.to_string());

        if let Some(session_id) = &self.session_id {
            builder = builder.header("Auth", session_id.as_str());
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        // `json` keeps a caller-supplied Content-Type such as json-patch.
        if let Some(json_body) = request.body {
            builder = builder.json(&json_body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let payload = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, payload));
        }

        let body = if payload.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&payload)?
        };

        Ok(RestResponse {
            status,
            location: location.map(|uri| self.relative_uri(&uri)),
            body,
        })
    }

    /// Resolves `path` against the appliance; absolute URLs must stay on the same origin.
    fn build_url(&self, path: &str) -> Result<Url, ClientError> {
        if let Ok(absolute) = Url::parse(path) {
            if absolute.origin() != self.base_url.origin() {
                tracing::warn!(%path, "refusing to send request to another host");
                return Err(ClientError::InvalidPath(path.to_owned()));
            }
            return Ok(absolute);
        }
        let relative = path.trim_start_matches('/');
        self.base_url
            .join(relative)
            .map_err(|_| ClientError::InvalidPath(path.to_owned()))
    }

    /// Strips this appliance's origin from an absolute `Location` so it can be sent again.
    fn relative_uri(&self, location: &str) -> String {
        match Url::parse(location) {
            Ok(url) if url.origin() == self.base_url.origin() => match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_owned(),
            },
            _ => location.to_owned(),
        }
    }
}

impl Transport for Connection {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, ClientError> {
        self.execute(request).await
    }
}

fn status_error(status: StatusCode, payload: String) -> ClientError {
    let parsed: Option<Value> = serde_json::from_str(&payload).ok();
    let details = parsed.as_ref().and_then(|body| {
        let error_code = body.get("errorCode")?.as_str()?;
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some((error_code.to_owned(), message.to_owned()))
    });

    match details {
        Some((error_code, message)) => {
            tracing::debug!(%status, %error_code, "appliance returned an error");
            ClientError::Api {
                status,
                error_code,
                message,
            }
        }
        None => ClientError::HttpStatus {
            status,
            body: payload,
        },
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_owned();
        path.push('/');
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{Connection, Credentials, DEFAULT_API_VERSION, status_error};
    use crate::ClientError;

    #[test]
    fn bare_host_is_reached_over_https() {
        let connection = Connection::new("127.0.0.1").expect("valid host");
        assert_eq!(connection.base_url().as_str(), "https://127.0.0.1/");
        assert_eq!(connection.api_version(), DEFAULT_API_VERSION);
        assert!(connection.session_id().is_none());
    }

    #[test]
    fn joins_paths_with_query_strings() {
        let connection = Connection::new("https://oneview.example.com").expect("valid url");
        let resolved = connection
            .build_url("/rest/logical-enclosures?start=0&count=-1")
            .expect("valid path");
        assert_eq!(
            resolved.as_str(),
            "https://oneview.example.com/rest/logical-enclosures?start=0&count=-1"
        );
    }

    #[test]
    fn absolute_urls_must_target_the_appliance() {
        let connection = Connection::new("https://10.0.0.1").expect("valid host");
        let same = connection
            .build_url("https://10.0.0.1/rest/tasks/5")
            .expect("same origin");
        assert_eq!(same.as_str(), "https://10.0.0.1/rest/tasks/5");

        let error = connection
            .build_url("https://other.example.com/rest/tasks/5")
            .expect_err("foreign origin");
        assert!(matches!(error, ClientError::InvalidPath(_)));
    }

    #[test]
    fn rejects_unparseable_host() {
        let error = Connection::new("http://[::1").expect_err("invalid host");
        assert!(matches!(error, ClientError::InvalidBaseUrl(_)));
    }

    #[test]
    fn location_on_same_appliance_becomes_relative() {
        let connection = Connection::new("https://10.0.0.1").expect("valid host");
        assert_eq!(
            connection.relative_uri("https://10.0.0.1/rest/tasks/42"),
            "/rest/tasks/42"
        );
        assert_eq!(
            connection.relative_uri("https://other.example.com/rest/tasks/42"),
            "https://other.example.com/rest/tasks/42"
        );
    }

    #[test]
    fn appliance_error_document_is_decoded() {
        let payload =
            r#"{"errorCode":"RESOURCE_NOT_FOUND","message":"The resource was not found."}"#;
        match status_error(StatusCode::NOT_FOUND, payload.to_owned()) {
            ClientError::Api {
                status,
                error_code,
                message,
            } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(error_code, "RESOURCE_NOT_FOUND");
                assert_eq!(message, "The resource was not found.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn credentials_serialize_in_appliance_field_names() {
        let credentials = Credentials::new("administrator", "secret").with_auth_login_domain("LOCAL");
        let body = serde_json::to_value(&credentials).expect("serializable");
        assert_eq!(body["userName"], "administrator");
        assert_eq!(body["password"], "secret");
        assert_eq!(body["authLoginDomain"], "LOCAL");

        let body = serde_json::to_value(Credentials::new("a", "b")).expect("serializable");
        assert!(body.get("authLoginDomain").is_none());
    }
}
