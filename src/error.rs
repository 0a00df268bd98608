use thiserror::Error;

/// Errors returned by OneView client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Appliance host is not a valid absolute URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Endpoint path could not be joined to the base URL.
    #[error("invalid endpoint path '{0}'")]
    InvalidPath(String),

    /// An empty id or URI was passed where a resource reference is required.
    #[error("resource id or URI must not be empty")]
    InvalidResourceId,

    /// The URI points at a different resource collection than this client manages.
    #[error("unrecognized URI '{uri}' for resources under '{base_uri}'")]
    UnrecognizedUri { uri: String, base_uri: String },

    /// A whole-resource update was requested for a document without a `uri` field.
    #[error("resource has no 'uri' field and no explicit URI was given")]
    MissingUri,

    /// Login response did not carry a session id.
    #[error("login response did not contain a sessionID")]
    MissingSessionId,

    /// HTTP transport-layer request failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body could not be parsed as JSON.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success HTTP status carrying the appliance's error document.
    #[error("server returned status {status} ({error_code}): {message}")]
    Api {
        status: reqwest::StatusCode,
        error_code: String,
        message: String,
    },

    /// Non-success HTTP status with response payload.
    #[error("server returned status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// An asynchronous task finished in an error state.
    #[error("task ended in state '{state}': {message}")]
    Task {
        state: String,
        message: String,
        error_code: Option<String>,
    },

    /// An asynchronous task did not finish within the caller's timeout.
    #[error("timed out waiting for task '{task_uri}'")]
    TaskTimeout { task_uri: String },

    /// A task document was missing the `uri` needed to poll it.
    #[error("task document has no 'uri' field")]
    MalformedTask,
}
