//! STOMP 1.2 publisher.
//!
//! The TCP connection is opened on first publish and reused afterwards.
//! Any error drops it so the next publish reconnects; the failed message
//! itself is never resent.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::PublishError;
use crate::frame::{Frame, read_frame, write_frame};
use crate::publisher::{Headers, Publisher};

const CONTENT_TYPE: &str = "application/json";

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(config: &BrokerConfig) -> Result<Self, PublishError> {
        let address = config.address();
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|source| PublishError::Connect {
                address: address.clone(),
                source,
            })?;
        let (read, write) = stream.into_split();
        let mut conn = Self {
            reader: BufReader::new(read),
            writer: write,
        };

        let host = config.virtual_host.as_deref().unwrap_or(&config.host);
        let mut connect = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0");
        if let (Some(login), Some(passcode)) = (&config.login, &config.passcode) {
            connect = connect.header("login", login).header("passcode", passcode);
        }
        write_frame(&mut conn.writer, &connect).await?;

        let reply = read_frame(&mut conn.reader)
            .await?
            .ok_or(PublishError::Closed)?;
        match reply.command.as_str() {
            "CONNECTED" => {
                info!(
                    address = %address,
                    version = reply.get("version").unwrap_or("1.2"),
                    "Connected to broker"
                );
                Ok(conn)
            }
            "ERROR" => Err(PublishError::rejected(error_message(&reply))),
            other => Err(PublishError::protocol(format!(
                "expected CONNECTED, got {other}"
            ))),
        }
    }

    async fn send(&mut self, frame: &Frame, receipt: Option<&str>) -> Result<(), PublishError> {
        write_frame(&mut self.writer, frame).await?;
        let Some(receipt) = receipt else {
            return Ok(());
        };

        loop {
            let reply = read_frame(&mut self.reader)
                .await?
                .ok_or(PublishError::Closed)?;
            match reply.command.as_str() {
                "RECEIPT" if reply.get("receipt-id") == Some(receipt) => return Ok(()),
                "RECEIPT" => {
                    debug!(receipt_id = ?reply.get("receipt-id"), "Ignoring stale receipt");
                }
                "ERROR" => return Err(PublishError::rejected(error_message(&reply))),
                other => {
                    debug!(command = other, "Ignoring unexpected frame while awaiting receipt");
                }
            }
        }
    }
}

fn error_message(frame: &Frame) -> String {
    match (frame.get("message"), frame.body.is_empty()) {
        (Some(message), true) => message.to_string(),
        (Some(message), false) => format!("{message}: {}", frame.body_text().trim()),
        (None, false) => frame.body_text().trim().to_string(),
        (None, true) => "broker returned ERROR".to_string(),
    }
}

/// Build the SEND frame for one message. Caller headers are applied after
/// the protocol headers and cannot override them.
pub fn send_frame(
    queue: &str,
    headers: &Headers,
    body: &str,
    persistent: bool,
    receipt: Option<&str>,
) -> Frame {
    let mut frame = Frame::new("SEND")
        .header("destination", queue)
        .header("content-type", CONTENT_TYPE)
        .header("content-length", body.len().to_string());
    if persistent {
        frame = frame.header("persistent", "true");
    }
    if let Some(receipt) = receipt {
        frame = frame.header("receipt", receipt);
    }
    for (name, value) in headers {
        if frame.get(name).is_none() {
            frame = frame.header(name.as_str(), value.as_str());
        }
    }
    frame.body(body)
}

pub struct StompPublisher {
    config: BrokerConfig,
    connection: Mutex<Option<Connection>>,
    receipt_seq: AtomicU64,
}

impl StompPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
            receipt_seq: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Whether a broker connection is currently held open.
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Send DISCONNECT and drop the connection, if any.
    pub async fn close(&self) {
        let Some(mut conn) = self.connection.lock().await.take() else {
            return;
        };
        if let Err(e) = write_frame(&mut conn.writer, &Frame::new("DISCONNECT")).await {
            debug!(error = %e, "DISCONNECT failed");
        }
    }
}

impl std::fmt::Debug for StompPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StompPublisher")
            .field("address", &self.config.address())
            .field("receipts", &self.config.receipts)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Publisher for StompPublisher {
    fn name(&self) -> &str {
        "stomp"
    }

    async fn publish(
        &self,
        queue: &str,
        headers: &Headers,
        body: &str,
    ) -> Result<(), PublishError> {
        let receipt = self.config.receipts.then(|| {
            format!(
                "derivq-{}",
                self.receipt_seq.fetch_add(1, Ordering::Relaxed)
            )
        });
        let frame = send_frame(
            queue,
            headers,
            body,
            self.config.persistent,
            receipt.as_deref(),
        );

        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(Connection::open(&self.config).await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(PublishError::Closed);
        };

        match conn.send(&frame, receipt.as_deref()).await {
            Ok(()) => {
                debug!(queue = %queue, bytes = body.len(), "Message published");
                Ok(())
            }
            Err(e) => {
                warn!(queue = %queue, error = %e, "Publish failed, dropping broker connection");
                *guard = None;
                Err(e)
            }
        }
    }
}
