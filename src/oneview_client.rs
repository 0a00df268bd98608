use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::connection::{Connection, Credentials};
use crate::logical_enclosures::LogicalEnclosures;
use crate::tasks::DEFAULT_POLL_INTERVAL;
use crate::transport::{RestRequest, Transport};
use crate::ClientError;

/// Entry point to a OneView appliance.
///
/// Holds the authenticated [`Connection`] and hands out per-resource clients
/// that share it.
#[derive(Clone, Debug)]
pub struct OneViewClient {
    connection: Connection,
    task_poll_interval: Duration,
}

impl OneViewClient {
    /// Creates a client for the given appliance host.
    pub fn new(host: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self::from_connection(Connection::new(host)?))
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            task_poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Returns a new client reusing an existing session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.connection = self.connection.with_session_id(session_id);
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.connection = self.connection.with_api_version(version);
        self
    }

    /// Sets how often resource clients poll tasks started by mutating calls.
    #[must_use]
    pub fn with_task_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.task_poll_interval = poll_interval;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), ClientError> {
        self.connection.login(credentials).await
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        self.connection.logout().await
    }

    pub async fn get_version(&self) -> Result<Value, ClientError> {
        self.connection.get_version().await
    }

    /// Logical enclosure client sharing this client's session.
    pub fn logical_enclosures(&self) -> LogicalEnclosures<Connection> {
        LogicalEnclosures::new(self.connection.clone()).with_task_poll_interval(self.task_poll_interval)
    }

    /// Sends a raw request and returns the parsed body.
    ///
    /// This bypasses resource clients but keeps session and version headers.
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let mut request = RestRequest::new(method, uri);
        request.body = body;
        Ok(self.connection.send(request).await?.body)
    }
}
