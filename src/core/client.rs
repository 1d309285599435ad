// src/core/client.rs

//! The pipelining client: one TCP connection shared by any number of
//! concurrent callers.
//!
//! A call to [`Client::query_raw`] takes the write lock, appends a slot to the
//! pending registry, writes its command line, and releases the lock. It then
//! waits on its slot. A single reader task owned by the client reads reply
//! lines and hands each one to the oldest slot. Because the append and the
//! write happen as one unit under the write lock, the order of slots in the
//! registry is always the order of requests on the wire.
//!
//! A connection that fails (read error, write error, end of stream) or is
//! closed never comes back. Construct a new `Client` to reconnect.

use crate::config::ClientConfig;
use crate::core::ClientError;
use crate::core::protocol::{LineCodec, Response, is_identifier, quote};
use crate::core::registry::{PendingRegistry, SlotId};
use crate::core::table::render_response;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

type LineWriter = FramedWrite<OwnedWriteHalf, LineCodec>;
type LineReader = FramedRead<OwnedReadHalf, LineCodec>;

/// State shared between the client and its reader task.
#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    pending: PendingRegistry,
}

/// A client for one server connection.
///
/// All methods take `&self`; share a client between tasks with an `Arc`.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    shared: Arc<Shared>,
    /// The write lock. Held across "append slot + write line" so the two
    /// happen atomically with respect to other submitters.
    writer: AsyncMutex<Option<LineWriter>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Serializes whole connect attempts, dial through login, so no caller
    /// sees a connection whose login is still in progress.
    connecting: AsyncMutex<()>,
    keyspace: Mutex<Option<String>>,
    closed: OnceCell<()>,
}

impl Client {
    /// Creates a disconnected client. A blank host or zero port falls back to
    /// the defaults.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: config.normalized(),
            shared: Arc::new(Shared::default()),
            writer: AsyncMutex::new(None),
            reader: Mutex::new(None),
            connecting: AsyncMutex::new(()),
            keyspace: Mutex::new(None),
            closed: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// True while the socket is open and usable.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// The keyspace last selected with [`select_keyspace`](Self::select_keyspace).
    /// This is a local record only; it is not re-checked against the server.
    pub fn keyspace(&self) -> Option<String> {
        self.keyspace.lock().clone()
    }

    /// Number of requests written and still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.shared.pending.len()
    }

    /// Connects and, if credentials are configured, authenticates.
    ///
    /// Returns false if the dial fails or times out, or if authentication is
    /// rejected (the connection is closed in that case). Use
    /// [`try_connect`](Self::try_connect) to see why.
    pub async fn connect(&self) -> bool {
        match self.try_connect().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Connection to {} failed: {}", self.config.addr(), e);
                false
            }
        }
    }

    /// Like [`connect`](Self::connect), but reports the reason for a failure.
    ///
    /// A rejected login yields [`ClientError::AuthFailed`] carrying the
    /// server's error message. Concurrent callers wait for the attempt in
    /// progress and report its outcome.
    pub async fn try_connect(&self) -> Result<(), ClientError> {
        let addr = self.config.addr();
        let _connecting = self.connecting.lock().await;
        {
            let mut writer = self.writer.lock().await;
            if self.closed.initialized() || self.shared.pending.is_sealed() {
                return Err(ClientError::ConnectionClosed);
            }
            if writer.is_some() {
                // Already dialed. Either still live, or dead for good.
                return if self.is_connected() {
                    Ok(())
                } else {
                    Err(ClientError::ConnectionClosed)
                };
            }

            debug!("Dialing {addr} (timeout {:?})...", self.config.connect_timeout);
            let stream =
                match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
                    .await
                {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => return Err(ClientError::Dial(Arc::new(e))),
                    Err(_) => return Err(ClientError::Timeout),
                };
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not set TCP_NODELAY on {addr}: {e}");
            }

            let (read_half, write_half) = stream.into_split();
            *writer = Some(FramedWrite::new(write_half, LineCodec::new()));
            self.shared.connected.store(true, Ordering::Release);

            let lines = FramedRead::new(read_half, LineCodec::new());
            let handle = tokio::spawn(reader_loop(lines, Arc::clone(&self.shared)));
            *self.reader.lock() = Some(handle);
        }

        if self.config.has_credentials() {
            let username = self.config.username.clone().unwrap_or_default();
            let password = self.config.password.clone().unwrap_or_default();
            let failure = match self.auth(&username, &password).await {
                Ok(res) if res.ok() => None,
                Ok(res) => Some(ClientError::AuthFailed(
                    res.error()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or("authentication rejected")
                        .to_string(),
                )),
                Err(e) => Some(e),
            };
            if let Some(err) = failure {
                warn!("Authentication as '{username}' on {addr} failed: {err}");
                self.close().await;
                return Err(err);
            }
            debug!("Authenticated as '{username}'.");
        }

        // A close that ran while we dialed or logged in wins.
        if self.shared.pending.is_sealed() || !self.is_connected() {
            return Err(ClientError::ConnectionClosed);
        }
        info!("Connected to {addr}.");
        Ok(())
    }

    /// Sends `AUTH "<username>" "<password>";` and returns the decoded reply.
    ///
    /// The caller decides what an unsuccessful reply means;
    /// [`try_connect`](Self::try_connect) closes the connection.
    pub async fn auth(&self, username: &str, password: &str) -> Result<Response, ClientError> {
        let command = format!("AUTH {} {};", quote(username), quote(password));
        self.query(&command).await
    }

    /// Sends one command line and waits for its reply line.
    ///
    /// The command is trimmed before sending. There is no timeout: this waits
    /// until the reply arrives or the connection ends, in which case the error
    /// that ended it is returned.
    pub async fn query_raw(&self, command: &str) -> Result<String, ClientError> {
        let rx = {
            let mut writer = self.writer.lock().await;
            if !self.is_connected() {
                return Err(ClientError::NotConnected);
            }
            let Some(sink) = writer.as_mut() else {
                return Err(ClientError::NotConnected);
            };

            let command = command.trim();
            if command.is_empty() {
                return Err(ClientError::EmptyCommand);
            }

            let (id, rx) = self.shared.pending.push()?;
            let mut in_flight = InFlightWrite::new(&self.shared, id);
            if let Err(e) = sink.send(command).await {
                warn!("Write to {} failed: {}", self.config.addr(), e);
                return Err(e);
            }
            in_flight.written();
            rx
        };

        match rx.await {
            Ok(outcome) => outcome,
            // The sender was dropped without an outcome: the registry went away.
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    /// Sends a command and decodes its reply. A reply that is not valid JSON
    /// comes back as an unsuccessful [`Response`], not as an error.
    pub async fn query(&self, command: &str) -> Result<Response, ClientError> {
        let line = self.query_raw(command).await?;
        Ok(Response::decode(&line))
    }

    /// Like [`query`](Self::query), and prints the reply to stdout as a table.
    pub async fn query_table(&self, command: &str) -> Result<Response, ClientError> {
        let res = self.query(command).await?;
        {
            let mut out = std::io::stdout().lock();
            if let Err(e) = render_response(&res, &mut out) {
                warn!("Failed to print result table: {e}");
            }
        }
        Ok(res)
    }

    /// Like [`query_table`](Self::query_table), writing the table to `out`.
    pub async fn query_table_to<W: Write>(
        &self,
        command: &str,
        out: &mut W,
    ) -> Result<Response, ClientError> {
        let res = self.query(command).await?;
        render_response(&res, out).map_err(|e| ClientError::Output(Arc::new(e)))?;
        Ok(res)
    }

    /// Runs [`query_table`](Self::query_table) and returns the reply's `ok` flag.
    pub async fn exec_table(&self, command: &str) -> Result<bool, ClientError> {
        Ok(self.query_table(command).await?.ok())
    }

    /// Selects the keyspace later commands run against with `USE <keyspace>;`.
    ///
    /// `keyspace` must be a bare identifier. On success the name is recorded
    /// locally and returned by [`keyspace`](Self::keyspace).
    #[doc(alias = "select_namespace")]
    pub async fn select_keyspace(&self, keyspace: &str) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        if !is_identifier(keyspace) {
            return Err(ClientError::InvalidArgument(format!(
                "invalid keyspace '{keyspace}'"
            )));
        }

        let res = self.query(&format!("USE {keyspace};")).await?;
        if !res.ok() {
            let message = match res.error() {
                Some(e) if !e.trim().is_empty() => e.to_string(),
                _ => "Failed to select keyspace".to_string(),
            };
            return Err(ClientError::OperationFailed(message));
        }

        *self.keyspace.lock() = Some(keyspace.to_string());
        info!("Using keyspace '{keyspace}'.");
        Ok(())
    }

    /// Closes the connection. Every request still waiting for a reply fails
    /// with [`ClientError::ConnectionClosed`].
    ///
    /// Safe to call any number of times, from any number of tasks; the
    /// teardown runs once and every caller returns after it has finished.
    pub async fn close(&self) {
        self.closed.get_or_init(|| self.teardown()).await;
    }

    async fn teardown(&self) {
        // Waiters are released before touching the socket, so none of them
        // outlives the logical close.
        self.shared.connected.store(false, Ordering::Release);
        let failed = self.shared.pending.fail_all(ClientError::ConnectionClosed);

        let writer = self.writer.lock().await.take();
        // A connect that was dialing while we waited for the lock may have
        // flipped the flag back.
        self.shared.connected.store(false, Ordering::Release);
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
        if let Some(mut writer) = writer
            && let Err(e) = writer.get_mut().shutdown().await
        {
            debug!("Socket shutdown for {} failed: {}", self.config.addr(), e);
        }

        info!(
            "Connection to {} closed ({} pending request(s) failed).",
            self.config.addr(),
            failed
        );
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}

/// Tracks a slot whose command line is being written.
///
/// If the write fails, or the submitting future is dropped before the line is
/// fully written, the slot is withdrawn from the registry and the connection
/// is marked dead: a partly written line would pair every later reply with the
/// wrong request.
struct InFlightWrite<'a> {
    shared: &'a Shared,
    id: SlotId,
    written: bool,
}

impl<'a> InFlightWrite<'a> {
    fn new(shared: &'a Shared, id: SlotId) -> Self {
        Self {
            shared,
            id,
            written: false,
        }
    }

    fn written(&mut self) {
        self.written = true;
    }
}

impl Drop for InFlightWrite<'_> {
    fn drop(&mut self) {
        if self.written {
            return;
        }
        self.shared.connected.store(false, Ordering::Release);
        if !self.shared.pending.remove(self.id) {
            debug!("Slot {:?} was already gone when its write failed.", self.id);
        }
    }
}

/// Reads reply lines until the stream ends or fails, handing each line to the
/// oldest waiting slot. On exit, marks the connection dead and fails every
/// slot still waiting.
async fn reader_loop(mut lines: LineReader, shared: Arc<Shared>) {
    debug!("Reply reader started.");
    let err = loop {
        match lines.next().await {
            Some(Ok(line)) => {
                if !shared.pending.complete_front(line) {
                    debug!("Discarding reply line with no waiting request.");
                }
            }
            Some(Err(e)) => {
                warn!("Read from server failed: {e}");
                break e;
            }
            None => {
                debug!("Server closed the connection.");
                break ClientError::ConnectionClosed;
            }
        }
    };

    shared.connected.store(false, Ordering::Release);
    let failed = shared.pending.fail_all(err);
    debug!("Reply reader stopped; {failed} pending request(s) failed.");
}
