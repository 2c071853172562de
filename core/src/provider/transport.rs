//! Stdio transport for the tool-provider process
//!
//! Owns the child process for the lifetime of the session. The process is
//! spawned once, shared by every turn, and never explicitly terminated; it is
//! cleaned up when the host process exits.

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::provider::wire::{RpcFrame, RpcOutcome};
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Protocol version spoken during the handshake
const PROTOCOL_VERSION: &str = "2024-11-05";

/// A connected transport over a spawned tool-provider process
pub struct StdioTransport {
    io: Mutex<TransportIo>,
    next_id: AtomicU64,
    request_timeout: Duration,
    // Held so the child is not reaped while the session lives.
    _child: Child,
}

struct TransportIo {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl StdioTransport {
    /// Spawn the provider process and complete the protocol handshake.
    ///
    /// Returns once the provider has answered `initialize`, so the process is
    /// accepting requests when this resolves. Fails with
    /// [`ProviderError::Unavailable`] when the executable cannot be resolved
    /// or spawned.
    pub async fn spawn(config: &ProviderConfig) -> Result<Self> {
        let command = which::which(&config.command).map_err(|e| ProviderError::Unavailable {
            message: format!("provider executable '{}' not found: {}", config.command, e),
        })?;

        tracing::info!(
            "spawning tool provider: {} {}",
            command.display(),
            config.args.join(" ")
        );

        let mut cmd = Command::new(&command);
        cmd.args(&config.args);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| ProviderError::Unavailable {
            message: format!("failed to spawn provider '{}': {}", config.command, e),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| ProviderError::Unavailable {
            message: "provider stdin is not piped".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ProviderError::Unavailable {
            message: "provider stdout is not piped".to_string(),
        })?;

        // Forward the provider's stderr to the diagnostic log.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!("provider stderr: {}", line);
                }
            });
        }

        let transport = Self {
            io: Mutex::new(TransportIo {
                stdin,
                lines: BufReader::new(stdout).lines(),
            }),
            next_id: AtomicU64::new(0),
            request_timeout: config.request_timeout(),
            _child: child,
        };

        transport.handshake().await?;

        Ok(transport)
    }

    /// Send `initialize` and the `notifications/initialized` notification.
    async fn handshake(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": "toolbridge",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        match self.request("initialize", Some(params)).await? {
            RpcOutcome::Success(_) => {}
            RpcOutcome::Failure(error) => {
                return Err(ProviderError::Protocol {
                    message: format!("initialize rejected: {} (code {})", error.message, error.code),
                }
                .into());
            }
        }

        self.notify("notifications/initialized", None).await?;

        tracing::debug!("provider handshake complete");
        Ok(())
    }

    /// Send one framed request and await the response correlated by id.
    ///
    /// Server-initiated messages arriving in between are skipped. The whole
    /// exchange is bounded by the configured timeout; expiry is
    /// [`ProviderError::Timeout`], distinct from parse and correlation
    /// failures which are [`ProviderError::Protocol`].
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<RpcOutcome> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            frame["params"] = params;
        }

        tracing::debug!(id, method, "provider request");

        let mut io = self.io.lock().await;
        timeout(self.request_timeout, roundtrip(&mut io, id, frame))
            .await
            .map_err(|_| ProviderError::Timeout {
                method: method.to_string(),
            })?
    }

    /// Send one framed notification; no response is expected.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let mut frame = json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        if let Some(params) = params {
            frame["params"] = params;
        }

        let mut io = self.io.lock().await;
        write_frame(&mut io.stdin, &frame).await
    }
}

async fn write_frame(stdin: &mut ChildStdin, frame: &Value) -> Result<()> {
    let line = serde_json::to_string(frame)?;
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

async fn roundtrip(io: &mut TransportIo, id: u64, frame: Value) -> Result<RpcOutcome> {
    write_frame(&mut io.stdin, &frame).await?;

    loop {
        let line = io.lines.next_line().await?.ok_or_else(|| {
            ProviderError::Protocol {
                message: "provider closed its output stream".to_string(),
            }
        })?;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response: RpcFrame =
            serde_json::from_str(line).map_err(|e| ProviderError::Protocol {
                message: format!("unparsable provider response: {}", e),
            })?;

        if response.is_notification() {
            tracing::debug!(method = ?response.method, "skipping provider notification");
            continue;
        }

        match response.id {
            Some(got) if got == id => {
                if let Some(error) = response.error {
                    return Ok(RpcOutcome::Failure(error));
                }
                return Ok(RpcOutcome::Success(response.result.unwrap_or(Value::Null)));
            }
            other => {
                return Err(ProviderError::Protocol {
                    message: format!("uncorrelated provider response: expected id {}, got {:?}", id, other),
                }
                .into());
            }
        }
    }
}
