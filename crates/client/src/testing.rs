//! Scripted transport and instrumented store shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use shellcache_core::{CacheDb, CacheStorage, CachedResponse, Error};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use crate::fetch::{Transport, TransportError};
use crate::request::{InterceptedRequest, ShellResponse};

/// Transport answering from a fixed route table, with call counting.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, (StatusCode, String, Bytes)>>,
    unreachable: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn serve(&self, url: &str, content_type: &str, body: &'static [u8]) {
        self.serve_status(url, StatusCode::OK, content_type, body);
    }

    pub(crate) fn serve_status(&self, url: &str, status: StatusCode, content_type: &str, body: &'static [u8]) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, content_type.to_string(), Bytes::from_static(body)));
    }

    /// Make a single URL fail at the connection level.
    pub(crate) fn fail(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ShellResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.to_string();

        if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(&url) {
            return Err(TransportError::Network(format!("failed to connect to {url}")));
        }

        let route = self.routes.lock().unwrap().get(&url).cloned();
        let (status, content_type, body) =
            route.unwrap_or((StatusCode::NOT_FOUND, "text/plain".to_string(), Bytes::from_static(b"not found")));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(&content_type).unwrap());
        Ok(ShellResponse { url: request.url.clone(), status, headers, body })
    }
}

/// Serve one HTTP/1.1 response with `body` on a loopback port.
///
/// Returns the origin URL; the listener answers a single connection.
pub(crate) async fn serve_once(content_type: &'static str, body: Vec<u8>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// [`CacheDb`] wrapper that counts lookups and can refuse deletions.
pub(crate) struct CountingStore {
    inner: CacheDb,
    lookups: AtomicUsize,
    undeletable: Mutex<HashSet<String>>,
}

impl CountingStore {
    pub(crate) fn new(inner: CacheDb) -> Self {
        Self { inner, lookups: AtomicUsize::new(0), undeletable: Mutex::new(HashSet::new()) }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn refuse_delete(&self, name: &str) {
        self.undeletable.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl CacheStorage for CountingStore {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn populate(&self, name: &str, entries: Vec<CachedResponse>) -> Result<usize, Error> {
        self.inner.populate(name, entries).await
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>, Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(name, key).await
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.inner.names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.undeletable.lock().unwrap().contains(name) {
            return Err(Error::Lifecycle(format!("{name} is locked")));
        }
        self.inner.delete(name).await
    }

    async fn is_populated(&self, name: &str) -> Result<bool, Error> {
        self.inner.is_populated(name).await
    }
}
