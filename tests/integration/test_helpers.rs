// tests/integration/test_helpers.rs

//! Test helpers: an in-process line-protocol server with scriptable replies.

#![allow(dead_code)]

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use xeondb_client::{Client, ClientConfig};

/// How the mock server answers one request line.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send this line (a newline is appended).
    Line(String),
    /// Wait, then send this line.
    Delayed(Duration, String),
    /// Read the request but never answer it.
    Silent,
    /// Drop the connection without answering.
    Hangup,
}

type Handler = dyn Fn(&str) -> Reply + Send + Sync;

/// A TCP server on an ephemeral localhost port. Every accepted connection
/// answers request lines, in order, through the handler.
pub struct MockServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    accepted: Arc<AtomicUsize>,
    disconnected: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Starts a server that answers every request with `handler`.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        Self::start_with_greeting(None, handler).await
    }

    /// Starts a server that first sends `greeting` (an unsolicited line) on
    /// every new connection.
    pub async fn start_with_greeting<F>(greeting: Option<String>, handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let handler: Arc<Handler> = Arc::new(handler);
        let received = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let disconnected = Arc::new(AtomicUsize::new(0));

        let task = {
            let received = received.clone();
            let accepted = accepted.clone();
            let disconnected = disconnected.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let handler = handler.clone();
                    let received = received.clone();
                    let disconnected = disconnected.clone();
                    let greeting = greeting.clone();
                    tokio::spawn(async move {
                        let (read_half, mut write_half) = socket.into_split();
                        if let Some(greeting) = greeting {
                            let _ = write_half.write_all(format!("{greeting}\n").as_bytes()).await;
                        }
                        let mut lines = BufReader::new(read_half).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            received.lock().await.push(line.clone());
                            match (*handler)(&line) {
                                Reply::Line(reply) => {
                                    let framed = format!("{reply}\n");
                                    if write_half.write_all(framed.as_bytes()).await.is_err() {
                                        break;
                                    }
                                }
                                Reply::Delayed(delay, reply) => {
                                    tokio::time::sleep(delay).await;
                                    let framed = format!("{reply}\n");
                                    if write_half.write_all(framed.as_bytes()).await.is_err() {
                                        break;
                                    }
                                }
                                Reply::Silent => {}
                                Reply::Hangup => break,
                            }
                        }
                        disconnected.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            addr,
            received,
            accepted,
            disconnected,
            task,
        }
    }

    /// A config pointing at this server.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.addr.port())
    }

    /// A disconnected client pointing at this server.
    pub fn client(&self) -> Client {
        Client::new(self.config())
    }

    /// A connected client pointing at this server.
    pub async fn connected_client(&self) -> Client {
        let client = self.client();
        assert!(client.connect().await, "client failed to connect to mock server");
        client
    }

    /// Every request line received so far, across all connections.
    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Polls until `n` connections have ended on the server side.
    pub async fn wait_for_disconnects(&self, n: usize) {
        wait_until(|| self.disconnected() >= n).await;
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Answers every request with `{"ok":true,"echo":<request>}`.
pub fn echo(command: &str) -> Reply {
    Reply::Line(json!({ "ok": true, "echo": command }).to_string())
}

/// A successful reply with no data.
pub fn ok_line() -> String {
    json!({ "ok": true }).to_string()
}

/// An unsuccessful reply carrying `message`.
pub fn error_line(message: &str) -> String {
    json!({ "ok": false, "error": message }).to_string()
}

/// A port on localhost with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    listener.local_addr().expect("Failed to read local addr").port()
}

/// Polls `condition` every few milliseconds, panicking after five seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}
