//! Generic client for one REST resource collection.
//!
//! [`ResourceClient`] knows the collection's base URI and turns typed calls
//! into requests: it resolves ids to URIs, pages through collections, fills
//! in defaults and waits on any task a mutating call returns.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use url::form_urlencoded::byte_serialize;

use crate::tasks::{self, DEFAULT_POLL_INTERVAL, TaskMonitor, Timeout};
use crate::transport::{RestRequest, RestResponse, Transport};
use crate::ClientError;

const REST_PREFIX: &str = "/rest/";

/// Paging, filtering and sorting for [`ResourceClient::get_all`].
///
/// The default asks for every member from the start, unfiltered and unsorted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub start: u32,
    /// Maximum number of members; `None` fetches all of them.
    pub count: Option<u32>,
    pub filter: String,
    pub sort: String,
}

impl ListQuery {
    #[must_use]
    pub fn start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    fn to_uri(&self, base_uri: &str) -> String {
        let count = self
            .count
            .map_or_else(|| "-1".to_owned(), |count| count.to_string());
        let mut uri = format!("{base_uri}?start={}&count={count}", self.start);
        if !self.filter.is_empty() {
            uri.push_str("&filter=");
            uri.extend(byte_serialize(self.filter.as_bytes()));
        }
        if !self.sort.is_empty() {
            uri.push_str("&sort=");
            uri.extend(byte_serialize(self.sort.as_bytes()));
        }
        uri
    }
}

/// Request helpers shared by every resource type.
#[derive(Clone, Debug)]
pub struct ResourceClient<T> {
    transport: T,
    base_uri: String,
    poll_interval: Duration,
}

impl<T: Transport> ResourceClient<T> {
    /// Creates a client for the collection rooted at `base_uri`, e.g. `/rest/logical-enclosures`.
    pub fn new(transport: T, base_uri: impl Into<String>) -> Self {
        Self {
            transport,
            base_uri: base_uri.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Returns a client that polls running tasks at `poll_interval`.
    #[must_use]
    pub fn with_task_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Resolves a bare id or a full URI to this collection's resource URI.
    pub fn build_uri(&self, id_or_uri: &str) -> Result<String, ClientError> {
        if id_or_uri.is_empty() {
            return Err(ClientError::InvalidResourceId);
        }
        if let Some(rest) = id_or_uri.strip_prefix(self.base_uri.as_str()) {
            if rest.is_empty() || rest.starts_with(['/', '?']) {
                return Ok(id_or_uri.to_owned());
            }
        }
        if id_or_uri.starts_with(REST_PREFIX) {
            return Err(ClientError::UnrecognizedUri {
                uri: id_or_uri.to_owned(),
                base_uri: self.base_uri.clone(),
            });
        }
        Ok(format!("{}/{id_or_uri}", self.base_uri))
    }

    /// Resolves `id_or_uri` and appends a sub-resource path such as `script`.
    pub fn build_subresource_uri(&self, id_or_uri: &str, suffix: &str) -> Result<String, ClientError> {
        Ok(format!("{}/{suffix}", self.build_uri(id_or_uri)?))
    }

    /// Lists collection members, following `nextPageUri` across pages.
    pub async fn get_all(&self, query: &ListQuery) -> Result<Vec<Value>, ClientError> {
        let mut members = Vec::new();
        let mut uri = query.to_uri(&self.base_uri);
        let mut visited = HashSet::new();

        loop {
            visited.insert(uri.clone());
            let page = self.transport.send(RestRequest::new(Method::GET, &uri)).await?.body;
            if let Some(page_members) = page.get("members").and_then(Value::as_array) {
                members.extend(page_members.iter().cloned());
            }

            if query
                .count
                .is_some_and(|count| members.len() >= count as usize)
            {
                break;
            }

            match page.get("nextPageUri").and_then(Value::as_str) {
                Some(next) if !next.is_empty() && !visited.contains(next) => uri = next.to_owned(),
                _ => break,
            }
        }

        if let Some(count) = query.count {
            members.truncate(count as usize);
        }
        Ok(members)
    }

    pub async fn get(&self, id_or_uri: &str) -> Result<Value, ClientError> {
        let uri = self.build_uri(id_or_uri)?;
        Ok(self.transport.send(RestRequest::new(Method::GET, uri)).await?.body)
    }

    /// Returns members whose `field` equals `value`.
    ///
    /// The appliance filters server-side; for top-level fields the result is
    /// narrowed again with a case-insensitive comparison.
    pub async fn get_by(&self, field: &str, value: &str) -> Result<Vec<Value>, ClientError> {
        let filter = format!("\"{field}='{value}'\"");
        let members = self.get_all(&ListQuery::default().filter(filter)).await?;

        if field.contains('.') {
            return Ok(members);
        }
        let wanted = value.to_lowercase();
        Ok(members
            .into_iter()
            .filter(|member| field_text(member, field).is_some_and(|text| text.to_lowercase() == wanted))
            .collect())
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Value>, ClientError> {
        Ok(self.get_by("name", name).await?.into_iter().next())
    }

    /// Creates a resource by `POST`ing it to `uri` (the collection by default).
    pub async fn create(
        &self,
        resource: Value,
        uri: Option<&str>,
        timeout: Timeout,
    ) -> Result<Value, ClientError> {
        let uri = uri.unwrap_or(&self.base_uri);
        let request = RestRequest::new(Method::POST, uri).with_body(resource);
        self.execute(request, timeout).await
    }

    /// Replaces a resource with `PUT`.
    ///
    /// Without an explicit `uri` the document's own `uri` field is the target.
    pub async fn update(
        &self,
        resource: Value,
        uri: Option<&str>,
        force: bool,
        timeout: Timeout,
    ) -> Result<Value, ClientError> {
        let target = match uri {
            Some(uri) => uri.to_owned(),
            None => resource
                .get("uri")
                .and_then(Value::as_str)
                .ok_or(ClientError::MissingUri)?
                .to_owned(),
        };
        let request = RestRequest::new(Method::PUT, with_force(target, force)).with_body(resource);
        self.execute(request, timeout).await
    }

    /// Sends a bodiless `PUT`, used by action endpoints such as `updateFromGroup`.
    pub async fn update_with_zero_body(&self, uri: &str, timeout: Timeout) -> Result<Value, ClientError> {
        self.execute(RestRequest::new(Method::PUT, uri), timeout).await
    }

    pub async fn delete(&self, id_or_uri: &str, force: bool, timeout: Timeout) -> Result<(), ClientError> {
        let uri = with_force(self.build_uri(id_or_uri)?, force);
        self.execute(RestRequest::new(Method::DELETE, uri), timeout)
            .await
            .map(|_| ())
    }

    /// Applies a single JSON-patch operation.
    pub async fn patch(
        &self,
        id_or_uri: &str,
        operation: &str,
        path: &str,
        value: Value,
        timeout: Timeout,
        custom_headers: &[(&str, &str)],
    ) -> Result<Value, ClientError> {
        let uri = self.build_uri(id_or_uri)?;
        let body = json!([{ "op": operation, "path": path, "value": value }]);
        let request = RestRequest::new(Method::PATCH, uri)
            .with_header("Content-Type", "application/json-patch+json")
            .with_headers(custom_headers.iter().copied())
            .with_body(body);
        self.execute(request, timeout).await
    }

    async fn execute(&self, request: RestRequest, timeout: Timeout) -> Result<Value, ClientError> {
        let method = request.method.clone();
        let response = self.transport.send(request).await?;

        match self.pending_task(response).await? {
            Pending::Task(task) => {
                TaskMonitor::new(&self.transport)
                    .with_poll_interval(self.poll_interval)
                    .wait_for_resource(&task, &method, timeout)
                    .await
            }
            Pending::Done(body) => Ok(body),
        }
    }

    /// Finds the task behind a response, fetching it from `Location` on `202 Accepted`.
    async fn pending_task(&self, response: RestResponse) -> Result<Pending, ClientError> {
        if tasks::is_task(&response.body) {
            return Ok(Pending::Task(response.body));
        }
        if response.status == StatusCode::ACCEPTED {
            if let Some(location) = response.location {
                let task = self
                    .transport
                    .send(RestRequest::new(Method::GET, location))
                    .await?
                    .body;
                if tasks::is_task(&task) {
                    return Ok(Pending::Task(task));
                }
            }
        }
        Ok(Pending::Done(response.body))
    }
}

enum Pending {
    Task(Value),
    Done(Value),
}

fn with_force(uri: String, force: bool) -> String {
    if force {
        let separator = if uri.contains('?') { '&' } else { '?' };
        format!("{uri}{separator}force=true")
    } else {
        uri
    }
}

fn field_text(member: &Value, field: &str) -> Option<String> {
    match member.get(field)? {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
