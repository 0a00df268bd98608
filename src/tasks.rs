//! Waiting on asynchronous appliance tasks.
//!
//! Mutating calls are frequently answered with a task document instead of the
//! resource itself. [`TaskMonitor`] polls such a task until it reaches a
//! terminal state and then resolves the resource the task produced.

use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::transport::{RestRequest, Transport};
use crate::ClientError;

/// Interval between two polls of a running task.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a mutating call waits for the task it started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until the task finishes, however long it takes.
    #[default]
    Unlimited,
    /// Give up with [`ClientError::TaskTimeout`] after the given duration.
    Limited(Duration),
}

impl Timeout {
    pub fn from_secs(secs: u64) -> Self {
        Self::Limited(Duration::from_secs(secs))
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::Limited(duration)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Unlimited, Self::Limited)
    }
}

/// Coarse classification of a task's `taskState`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Finished,
    Failed,
}

impl TaskState {
    pub fn of(task: &Value) -> Self {
        match task.get("taskState").and_then(Value::as_str) {
            Some("New" | "Starting" | "Pending" | "Running" | "Suspended" | "Stopping") => {
                Self::Running
            }
            Some("Error" | "Terminated" | "Killed") => Self::Failed,
            _ => Self::Finished,
        }
    }
}

/// Returns true when `value` is an appliance task document.
pub fn is_task(value: &Value) -> bool {
    value.get("category").and_then(Value::as_str) == Some("tasks")
}

/// Polls tasks through a [`Transport`] until they finish.
#[derive(Debug)]
pub struct TaskMonitor<'a, T> {
    transport: &'a T,
    poll_interval: Duration,
}

impl<'a, T: Transport> TaskMonitor<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Waits for `task` to finish and returns its final document.
    ///
    /// Tasks ending in `Error`, `Terminated` or `Killed` become [`ClientError::Task`].
    pub async fn wait_for_task(&self, task: &Value, timeout: Timeout) -> Result<Value, ClientError> {
        let task_uri = task
            .get("uri")
            .and_then(Value::as_str)
            .ok_or(ClientError::MalformedTask)?
            .to_owned();

        let finished = with_timeout(timeout, &task_uri, self.poll(task.clone(), &task_uri)).await?;

        if TaskState::of(&finished) == TaskState::Failed {
            return Err(task_error(&finished));
        }
        Ok(finished)
    }

    /// Waits for `task` and returns the resource it produced.
    ///
    /// Falls back to the finished task when it has no associated resource or
    /// when the originating request was a `DELETE`.
    pub async fn wait_for_resource(
        &self,
        task: &Value,
        method: &Method,
        timeout: Timeout,
    ) -> Result<Value, ClientError> {
        let finished = self.wait_for_task(task, timeout).await?;
        if *method == Method::DELETE {
            return Ok(finished);
        }

        let resource_uri = finished
            .pointer("/associatedResource/resourceUri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty());

        match resource_uri {
            Some(uri) => {
                let response = self
                    .transport
                    .send(RestRequest::new(Method::GET, uri))
                    .await?;
                Ok(response.body)
            }
            None => Ok(finished),
        }
    }

    async fn poll(&self, mut task: Value, task_uri: &str) -> Result<Value, ClientError> {
        while TaskState::of(&task) == TaskState::Running {
            tokio::time::sleep(self.poll_interval).await;
            task = self
                .transport
                .send(RestRequest::new(Method::GET, task_uri))
                .await?
                .body;
            if !is_task(&task) {
                return Err(ClientError::MalformedTask);
            }
            let state = task
                .get("taskState")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            tracing::debug!(task = task_uri, state, "polled task");
        }
        Ok(task)
    }
}

async fn with_timeout<F>(timeout: Timeout, task_uri: &str, poll: F) -> Result<Value, ClientError>
where
    F: Future<Output = Result<Value, ClientError>>,
{
    match timeout {
        Timeout::Unlimited => poll.await,
        Timeout::Limited(limit) => tokio::time::timeout(limit, poll).await.map_err(|_| {
            tracing::warn!(task = task_uri, ?limit, "gave up waiting for task");
            ClientError::TaskTimeout {
                task_uri: task_uri.to_owned(),
            }
        })?,
    }
}

fn task_error(task: &Value) -> ClientError {
    let state = task
        .get("taskState")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let first_error = task.pointer("/taskErrors/0");
    let message = first_error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown Error")
        .to_owned();
    let error_code = first_error
        .and_then(|error| error.get("errorCode"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    tracing::warn!(%state, %message, "task failed");
    ClientError::Task {
        state,
        message,
        error_code,
    }
}
