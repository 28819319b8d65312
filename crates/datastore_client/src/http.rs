//! HTTP connection implementation.
//!
//! The actual HTTP client is abstracted via a trait so any HTTP library
//! (reqwest, hyper, ureq, ...) can carry the CBOR-encoded commit requests.

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use datastore_protocol::{CommitRequest, CommitResponse, Mutation, WireMessage};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based connection.
///
/// Uses CBOR encoding for request/response bodies. A failed post does not
/// close the connection, so the caller may retry the commit.
pub struct HttpConnection<C: HttpClient> {
    config: ConnectionConfig,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpConnection<C> {
    /// Creates a new HTTP connection.
    pub fn new(config: ConnectionConfig, client: C) -> Self {
        Self {
            config,
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Checks if the connection is usable.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Closes the connection. Later commits fail with `NotConnected`.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }
}

impl<C: HttpClient> Connection for HttpConnection<C> {
    fn commit(
        &self,
        dataset_id: &str,
        mutation: &Mutation,
        transaction: Option<&[u8]>,
    ) -> ClientResult<CommitResponse> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let request = CommitRequest::for_transaction(mutation.clone(), transaction);
        let body = request.encode()?;

        let url = self.config.commit_url(dataset_id);
        debug!(%url, bytes = body.len(), "posting commit request");

        let response_body = self
            .client
            .post(&url, body, self.config.timeout)
            .map_err(|e| {
                self.set_error(&e);
                ClientError::transport_retryable(e)
            })?;
        self.clear_error();

        trace!(bytes = response_body.len(), "received commit response");
        CommitResponse::decode(&response_body)
            .map_err(|e| ClientError::Protocol(format!("failed to decode commit response: {e}")))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a POST request and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        (**self).handle_post(path, body)
    }
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead. The server sees the
/// path starting at `/datasets/`.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>, _timeout: Duration) -> Result<Vec<u8>, String> {
        let path = url.find("/datasets/").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastore_protocol::{CommitMode, KeyMessage};
    use parking_lot::Mutex;

    struct TestClient {
        response: RwLock<Option<Vec<u8>>>,
        healthy: AtomicBool,
        requests: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                healthy: AtomicBool::new(true),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn set_response(&self, resp: Vec<u8>) {
            *self.response.write() = Some(resp);
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    impl HttpClient for TestClient {
        fn post(&self, url: &str, body: Vec<u8>, _timeout: Duration) -> Result<Vec<u8>, String> {
            self.requests.lock().push((url.to_string(), body));
            self.response
                .read()
                .clone()
                .ok_or_else(|| "no response set".into())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn connection(client: TestClient) -> HttpConnection<TestClient> {
        HttpConnection::new(
            ConnectionConfig::new().with_base_url("https://datastore.example.com"),
            client,
        )
    }

    #[test]
    fn connection_state() {
        let conn = connection(TestClient::new());
        assert!(conn.is_connected());
        conn.close();
        assert!(!conn.is_connected());

        let result = conn.commit("DATASET", &Mutation::new(), None);
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }

    #[test]
    fn unhealthy_client() {
        let client = TestClient::new();
        client.set_healthy(false);
        assert!(!connection(client).is_connected());
    }

    #[test]
    fn commit_posts_cbor_request() {
        let client = TestClient::new();
        client.set_response(
            CommitResponse::new(1, vec![KeyMessage::with_id("Kind", 99)])
                .encode()
                .unwrap(),
        );
        let conn = connection(client);

        let mut mutation = Mutation::new();
        mutation.delete.push(KeyMessage::with_id("Kind", 5));
        let response = conn.commit("DATASET", &mutation, Some(&b"txn"[..])).unwrap();
        assert_eq!(response.index_updates(), 1);
        assert_eq!(response.insert_auto_id_keys()[0].terminal_id(), Some(99));

        let requests = conn.client.requests.lock();
        let (url, body) = &requests[0];
        assert_eq!(
            url,
            "https://datastore.example.com/datastore/v1beta2/datasets/DATASET/commit"
        );
        let request = CommitRequest::decode(body).unwrap();
        assert_eq!(request.mode, CommitMode::Transactional);
        assert_eq!(request.mutation, mutation);
    }

    #[test]
    fn post_failure_is_retryable_and_recorded() {
        let conn = connection(TestClient::new());

        let err = conn.commit("DATASET", &Mutation::new(), None).unwrap_err();
        assert!(err.is_transport());
        assert!(err.is_retryable());
        assert_eq!(conn.last_error().as_deref(), Some("no response set"));
        assert!(conn.is_connected());
    }

    #[test]
    fn garbage_response_is_protocol_error() {
        let client = TestClient::new();
        client.set_response(vec![0xff, 0xff]);
        let conn = connection(client);

        let result = conn.commit("DATASET", &Mutation::new(), None);
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    #[test]
    fn loopback_strips_host_and_prefix() {
        struct EchoServer;
        impl LoopbackServer for EchoServer {
            fn handle_post(&self, path: &str, _body: &[u8]) -> Result<Vec<u8>, String> {
                Ok(path.as_bytes().to_vec())
            }
        }

        let client = LoopbackClient::new(EchoServer);
        let body = client
            .post(
                "https://host/datastore/v1beta2/datasets/DATASET/commit",
                Vec::new(),
                Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(body, b"/datasets/DATASET/commit");
    }
}
