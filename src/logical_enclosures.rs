//! Logical enclosures: a group of physical enclosures configured from one
//! enclosure group.

use std::time::Duration;

use serde_json::Value;

use crate::resource::{ListQuery, ResourceClient};
use crate::tasks::Timeout;
use crate::transport::Transport;
use crate::ClientError;

pub const LOGICAL_ENCLOSURES_URI: &str = "/rest/logical-enclosures";

/// Client for `/rest/logical-enclosures`.
#[derive(Clone, Debug)]
pub struct LogicalEnclosures<T> {
    client: ResourceClient<T>,
}

impl<T: Transport> LogicalEnclosures<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ResourceClient::new(transport, LOGICAL_ENCLOSURES_URI),
        }
    }

    #[must_use]
    pub fn with_task_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.client = self.client.with_task_poll_interval(poll_interval);
        self
    }

    /// The generic client these calls are forwarded to.
    pub fn resource_client(&self) -> &ResourceClient<T> {
        &self.client
    }

    /// Lists logical enclosures; `ListQuery::default()` returns all of them.
    pub async fn get_all(&self, query: &ListQuery) -> Result<Vec<Value>, ClientError> {
        self.client.get_all(query).await
    }

    pub async fn get(&self, id_or_uri: &str) -> Result<Value, ClientError> {
        self.client.get(id_or_uri).await
    }

    pub async fn get_by(&self, field: &str, value: &str) -> Result<Vec<Value>, ClientError> {
        self.client.get_by(field, value).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Value>, ClientError> {
        self.client.get_by_name(name).await
    }

    /// Creates a logical enclosure from `enclosureUris`, `enclosureGroupUri`,
    /// `forceInstallFirmware` and `name`.
    pub async fn create(&self, resource: Value, timeout: Timeout) -> Result<Value, ClientError> {
        self.client.create(resource, None, timeout).await
    }

    /// Updates a logical enclosure; the document must carry its `uri`.
    pub async fn update(&self, resource: Value, timeout: Timeout) -> Result<Value, ClientError> {
        self.client.update(resource, None, false, timeout).await
    }

    /// Applies one patch operation. The request always carries `If-Match: *`.
    pub async fn patch(
        &self,
        id_or_uri: &str,
        operation: &str,
        path: &str,
        value: Value,
        timeout: Timeout,
    ) -> Result<Value, ClientError> {
        self.client
            .patch(id_or_uri, operation, path, value, timeout, &[("If-Match", "*")])
            .await
    }

    pub async fn delete(&self, id_or_uri: &str, force: bool, timeout: Timeout) -> Result<(), ClientError> {
        self.client.delete(id_or_uri, force, timeout).await
    }

    /// Reapplies the appliance configuration to every enclosure in the logical enclosure.
    pub async fn update_configuration(&self, id_or_uri: &str, timeout: Timeout) -> Result<Value, ClientError> {
        let uri = self.client.build_subresource_uri(id_or_uri, "configuration")?;
        self.client.update_with_zero_body(&uri, timeout).await
    }

    /// Returns the configuration script of the logical enclosure.
    pub async fn get_script(&self, id_or_uri: &str) -> Result<Value, ClientError> {
        let uri = self.client.build_subresource_uri(id_or_uri, "script")?;
        self.client.get(&uri).await
    }

    pub async fn update_script(
        &self,
        id_or_uri: &str,
        information: Value,
        timeout: Timeout,
    ) -> Result<Value, ClientError> {
        let uri = self.client.build_subresource_uri(id_or_uri, "script")?;
        self.client.update(information, Some(&uri), false, timeout).await
    }

    /// Generates a support dump; `information` holds `errorCode`, `encrypt`
    /// and `excludeApplianceDump`.
    pub async fn generate_support_dump(
        &self,
        information: Value,
        id_or_uri: &str,
        timeout: Timeout,
    ) -> Result<Value, ClientError> {
        let uri = self.client.build_subresource_uri(id_or_uri, "support-dumps")?;
        self.client.create(information, Some(&uri), timeout).await
    }

    /// Brings the logical enclosure back in line with its enclosure group.
    pub async fn update_from_group(&self, id_or_uri: &str, timeout: Timeout) -> Result<Value, ClientError> {
        let uri = self.client.build_subresource_uri(id_or_uri, "updateFromGroup")?;
        self.client.update_with_zero_body(&uri, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Method;
    use serde_json::{Value, json};

    use super::LogicalEnclosures;
    use crate::resource::ListQuery;
    use crate::tasks::Timeout;
    use crate::test_support::RecordingTransport;
    use crate::transport::{RestRequest, RestResponse};
    use crate::ClientError;

    const ID: &str = "ad28cf21-8b15-4f92-bdcf-51cb2042db32";
    const URI: &str = "/rest/logical-enclosures/ad28cf21-8b15-4f92-bdcf-51cb2042db32";

    fn setup() -> (RecordingTransport, LogicalEnclosures<RecordingTransport>) {
        let transport = RecordingTransport::new();
        let enclosures = LogicalEnclosures::new(transport.clone());
        (transport, enclosures)
    }

    fn assert_request(request: &RestRequest, method: Method, uri: &str, body: Option<Value>) {
        assert_eq!(request.method, method);
        assert_eq!(request.uri, uri);
        assert_eq!(request.body, body);
    }

    fn running_task() -> Value {
        json!({"category": "tasks", "uri": "/rest/tasks/7", "taskState": "Running"})
    }

    #[tokio::test]
    async fn create_posts_resource_to_collection() {
        let (transport, enclosures) = setup();
        let resource = json!({
            "enclosureUris": [
                "/rest/enclosures/0000000000A66101",
                "/rest/enclosures/0000000000A66102",
                "/rest/enclosures/0000000000A66103",
            ],
            "enclosureGroupUri": "/rest/enclosure-groups/e41118e4-2233-4b6b-9318-c9982dbf01fa",
            "forceInstallFirmware": false,
            "name": "testLogicalEnclosure",
        });

        enclosures
            .create(resource.clone(), Timeout::default())
            .await
            .expect("create");

        assert_request(
            &transport.single_request(),
            Method::POST,
            "/rest/logical-enclosures",
            Some(resource),
        );
    }

    #[tokio::test]
    async fn delete_without_force() {
        let (transport, enclosures) = setup();
        enclosures.delete(ID, false, Timeout::default()).await.expect("delete");

        assert_request(&transport.single_request(), Method::DELETE, URI, None);
    }

    #[tokio::test]
    async fn delete_with_force() {
        let (transport, enclosures) = setup();
        enclosures.delete(ID, true, Timeout::default()).await.expect("delete");

        let expected = format!("{URI}?force=true");
        assert_request(&transport.single_request(), Method::DELETE, &expected, None);
    }

    #[tokio::test]
    async fn get_all_passes_paging_filter_and_sort() {
        let (transport, enclosures) = setup();
        let query = ListQuery::default()
            .start(2)
            .count(500)
            .filter("name=TestName")
            .sort("name:ascending");

        enclosures.get_all(&query).await.expect("list");

        assert_request(
            &transport.single_request(),
            Method::GET,
            "/rest/logical-enclosures?start=2&count=500&filter=name%3DTestName&sort=name%3Aascending",
            None,
        );
    }

    #[tokio::test]
    async fn get_all_with_default_values() {
        let (transport, enclosures) = setup();
        enclosures.get_all(&ListQuery::default()).await.expect("list");

        assert_request(
            &transport.single_request(),
            Method::GET,
            "/rest/logical-enclosures?start=0&count=-1",
            None,
        );
    }

    #[tokio::test]
    async fn get_by_filters_on_field() {
        let transport = RecordingTransport::new().respond_with(RestResponse::ok(json!({
            "members": [{"name": "OneViewSDK-Test-Logical-Enclosure", "uri": URI}],
        })));
        let enclosures = LogicalEnclosures::new(transport.clone());

        let found = enclosures
            .get_by("name", "OneViewSDK-Test-Logical-Enclosure")
            .await
            .expect("get_by");

        assert_eq!(found.len(), 1);
        assert!(transport.single_request().uri.contains(
            "filter=%22name%3D%27OneViewSDK-Test-Logical-Enclosure%27%22"
        ));
    }

    #[tokio::test]
    async fn get_by_name_returns_first_match() {
        let transport = RecordingTransport::new().respond_with(RestResponse::ok(json!({
            "members": [{"name": "OneViewSDK-Test-Logical-Enclosure", "uri": URI}],
        })));
        let enclosures = LogicalEnclosures::new(transport.clone());

        let found = enclosures
            .get_by_name("OneViewSDK-Test-Logical-Enclosure")
            .await
            .expect("get_by_name")
            .expect("present");

        assert_eq!(found["uri"], URI);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn get_with_id() {
        let (transport, enclosures) = setup();
        enclosures.get("3518be0e-17c1-4189-8f81-83f3724f6155").await.expect("get");

        assert_request(
            &transport.single_request(),
            Method::GET,
            "/rest/logical-enclosures/3518be0e-17c1-4189-8f81-83f3724f6155",
            None,
        );
    }

    #[tokio::test]
    async fn get_with_uri_is_used_verbatim() {
        let (transport, enclosures) = setup();
        enclosures.get(URI).await.expect("get");

        assert_request(&transport.single_request(), Method::GET, URI, None);
    }

    #[tokio::test]
    async fn get_with_uri_of_other_collection_is_rejected() {
        let (transport, enclosures) = setup();
        let error = enclosures
            .get("/rest/enclosures/3518be0e-17c1-4189-8f81-83f3724f6155")
            .await
            .expect_err("foreign uri");

        assert!(matches!(error, ClientError::UnrecognizedUri { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn update_with_defaults_puts_to_resource_uri() {
        let (transport, enclosures) = setup();
        let resource = json!({"name": "one_enclosure_le", "uri": URI});

        enclosures
            .update(resource.clone(), Timeout::default())
            .await
            .expect("update");

        assert_request(&transport.single_request(), Method::PUT, URI, Some(resource));
    }

    #[tokio::test(start_paused = true)]
    async fn update_honours_caller_timeout() {
        let transport = RecordingTransport::new().respond_forever(RestResponse::ok(running_task()));
        let enclosures = LogicalEnclosures::new(transport.clone())
            .with_task_poll_interval(Duration::from_secs(30));
        let resource = json!({"name": "one_enclosure_le", "uri": URI});

        let error = enclosures
            .update(resource, Timeout::from_secs(70))
            .await
            .expect_err("task keeps running");

        assert!(matches!(error, ClientError::TaskTimeout { .. }));
        // PUT, then polls at 30s and 60s before the 70s limit.
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn patch_always_sends_if_match_wildcard() {
        let (transport, enclosures) = setup();

        enclosures
            .patch("123a53cz", "replace", "/name", json!("new_name"), Timeout::from_secs(1))
            .await
            .expect("patch");

        let request = transport.single_request();
        assert_request(
            &request,
            Method::PATCH,
            "/rest/logical-enclosures/123a53cz",
            Some(json!([{"op": "replace", "path": "/name", "value": "new_name"}])),
        );
        assert_eq!(request.header("If-Match"), Some("*"));
    }

    #[tokio::test]
    async fn update_configuration_by_uri_and_id() {
        for reference in [URI, ID] {
            let (transport, enclosures) = setup();
            enclosures
                .update_configuration(reference, Timeout::default())
                .await
                .expect("update configuration");

            let expected = format!("{URI}/configuration");
            assert_request(&transport.single_request(), Method::PUT, &expected, None);
        }
    }

    #[tokio::test]
    async fn get_script_by_uri_and_id() {
        for reference in [URI, ID] {
            let (transport, enclosures) = setup();
            enclosures.get_script(reference).await.expect("get script");

            let expected = format!("{URI}/script");
            assert_request(&transport.single_request(), Method::GET, &expected, None);
        }
    }

    #[tokio::test]
    async fn update_script_by_uri_and_id() {
        for reference in [URI, ID] {
            let (transport, enclosures) = setup();
            let information = json!({"#TEST COMMAND": ""});

            enclosures
                .update_script(reference, information.clone(), Timeout::default())
                .await
                .expect("update script");

            let expected = format!("{URI}/script");
            assert_request(
                &transport.single_request(),
                Method::PUT,
                &expected,
                Some(information),
            );
        }
    }

    #[tokio::test]
    async fn generate_support_dump_posts_to_support_dumps() {
        let (transport, enclosures) = setup();
        let information = json!({
            "errorCode": "MyDump16",
            "encrypt": true,
            "excludeApplianceDump": false,
        });

        enclosures
            .generate_support_dump(information.clone(), URI, Timeout::default())
            .await
            .expect("support dump");

        let expected = format!("{URI}/support-dumps");
        assert_request(
            &transport.single_request(),
            Method::POST,
            &expected,
            Some(information),
        );
    }

    #[tokio::test]
    async fn update_from_group_by_uri_and_id() {
        for reference in [URI, ID] {
            let (transport, enclosures) = setup();
            enclosures
                .update_from_group(reference, Timeout::default())
                .await
                .expect("update from group");

            let expected = format!("{URI}/updateFromGroup");
            assert_request(&transport.single_request(), Method::PUT, &expected, None);
        }
    }

    #[tokio::test]
    async fn update_from_group_returns_resource_from_completed_task() {
        let transport = RecordingTransport::new()
            .respond_with(RestResponse::ok(json!({
                "category": "tasks",
                "uri": "/rest/tasks/7",
                "taskState": "Completed",
                "associatedResource": {"resourceUri": URI},
            })))
            .respond_with(RestResponse::ok(json!({"uri": URI, "state": "Consistent"})));
        let enclosures = LogicalEnclosures::new(transport.clone());

        let resource = enclosures
            .update_from_group(ID, Timeout::default())
            .await
            .expect("update from group");

        assert_eq!(resource["state"], "Consistent");
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_request(&requests[1], Method::GET, URI, None);
    }
}
