use std::collections::VecDeque;
use std::future::{Future, ready};
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::transport::{RestRequest, RestResponse, Transport};
use crate::ClientError;

/// In-memory transport that records requests and replays canned responses.
///
/// Queued responses are served first; once the queue is empty the fallback
/// (an empty JSON object unless overridden) answers every request.
#[derive(Clone, Debug)]
pub(crate) struct RecordingTransport {
    requests: Arc<Mutex<Vec<RestRequest>>>,
    responses: Arc<Mutex<VecDeque<RestResponse>>>,
    fallback: RestResponse,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            requests: Arc::default(),
            responses: Arc::default(),
            fallback: RestResponse::ok(json!({})),
        }
    }

    pub(crate) fn respond_with(self, response: RestResponse) -> Self {
        self.responses
            .lock()
            .expect("response queue lock")
            .push_back(response);
        self
    }

    pub(crate) fn respond_forever(mut self, response: RestResponse) -> Self {
        self.fallback = response;
        self
    }

    pub(crate) fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().expect("request log lock").clone()
    }

    /// Returns the only request sent, failing the test if there were zero or several.
    pub(crate) fn single_request(&self) -> RestRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request: {requests:#?}");
        requests.into_iter().next().expect("one request")
    }
}

impl Transport for RecordingTransport {
    fn send(
        &self,
        request: RestRequest,
    ) -> impl Future<Output = Result<RestResponse, ClientError>> + Send {
        self.requests
            .lock()
            .expect("request log lock")
            .push(request);
        let response = self
            .responses
            .lock()
            .expect("response queue lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        ready(Ok(response))
    }
}
