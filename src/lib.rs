//! Rust client library for the HPE OneView REST API.
//!
//! Public API layers:
//! - [`Connection`]: async HTTP transport with session and API version headers.
//! - [`ResourceClient`]: generic request helpers for one resource collection.
//! - [`LogicalEnclosures`]: the logical enclosure resource client.
//! - [`OneViewClient`]: facade handing out resource clients over one session.
//! - [`ClientError`]: unified error type used by all clients.
//!
//! Mutating calls that the appliance answers with a task wait for it according
//! to the caller's [`Timeout`].

mod connection;
mod error;
mod logical_enclosures;
mod oneview_client;
mod resource;
mod tasks;
mod transport;

#[cfg(test)]
mod test_support;

/// Async HTTP connection to an appliance.
pub use connection::{Connection, Credentials, DEFAULT_API_VERSION};
/// Error type returned by all client operations.
pub use error::ClientError;
pub use logical_enclosures::{LOGICAL_ENCLOSURES_URI, LogicalEnclosures};
pub use oneview_client::OneViewClient;
pub use resource::{ListQuery, ResourceClient};
pub use tasks::{DEFAULT_POLL_INTERVAL, TaskMonitor, TaskState, Timeout, is_task};
pub use transport::{RestRequest, RestResponse, Transport};
