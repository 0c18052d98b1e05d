// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Validation through an asynchronous message channel to a rendering page.
//!
//! Each request posts `validate {nonce, diagram}` and parks on a one-shot receiver keyed by
//! the nonce. The page's `parse-result` replies are routed back through [`PageRouter`];
//! replies whose nonce nobody waits for are logged and dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{decode_page_message, encode_host_message, HostMessage, PageMessage};
use super::{ProtocolError, Validator, ValidatorError, DEFAULT_VALIDATION_TIMEOUT};
use crate::model::{Diagram, Nonce, ValidationResult};

const OUTBOUND_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParseReply {
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct PendingState {
    waiting: HashMap<String, oneshot::Sender<ParseReply>>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
struct PendingParses {
    inner: Arc<Mutex<PendingState>>,
}

impl PendingParses {
    fn lock(&self) -> MutexGuard<'_, PendingState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, nonce: &Nonce) -> oneshot::Receiver<ParseReply> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if !state.closed {
            state.waiting.insert(nonce.to_string(), tx);
        }
        rx
    }

    fn forget(&self, nonce: &Nonce) {
        self.lock().waiting.remove(nonce.as_str());
    }

    fn resolve(&self, nonce: &str, reply: ParseReply) -> bool {
        let waiter = self.lock().waiting.remove(nonce);
        match waiter {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.waiting.clear();
    }

    fn len(&self) -> usize {
        self.lock().waiting.len()
    }
}

/// Validator that talks to a page over any async transport.
#[derive(Debug, Clone)]
pub struct ChannelValidator {
    outbound: mpsc::Sender<HostMessage>,
    pending: PendingParses,
    timeout: Duration,
}

impl ChannelValidator {
    pub fn new(outbound: mpsc::Sender<HostMessage>) -> Self {
        Self {
            outbound,
            pending: PendingParses::default(),
            timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The inbound half: feed every page message through it.
    pub fn router(&self) -> PageRouter {
        PageRouter {
            pending: self.pending.clone(),
        }
    }

    /// Number of validations still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Asks the page to display `diagram`. No reply is expected.
    pub async fn render(&self, diagram: &Diagram) -> Result<(), ValidatorError> {
        self.outbound
            .send(HostMessage::Render {
                diagram: diagram.content().to_owned(),
            })
            .await
            .map_err(|_| ValidatorError::Disconnected)
    }
}

#[async_trait]
impl Validator for ChannelValidator {
    async fn validate(
        &self,
        diagram: &Diagram,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        if cancel.is_cancelled() {
            return Err(ValidatorError::Cancelled);
        }

        let nonce = Nonce::generate();
        let reply = self.pending.register(&nonce);
        debug!(nonce = %nonce, "posting diagram for validation");

        let request = HostMessage::Validate {
            nonce: nonce.to_string(),
            diagram: diagram.content().to_owned(),
        };
        if self.outbound.send(request).await.is_err() {
            self.pending.forget(&nonce);
            return Err(ValidatorError::Disconnected);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                self.pending.forget(&nonce);
                return Err(ValidatorError::Cancelled);
            }
            outcome = tokio::time::timeout(self.timeout, reply) => outcome,
        };

        match outcome {
            Err(_) => {
                self.pending.forget(&nonce);
                warn!(nonce = %nonce, timeout = ?self.timeout, "validation page did not answer");
                Err(ValidatorError::Timeout(self.timeout))
            }
            Ok(Err(_)) => Err(ValidatorError::Disconnected),
            Ok(Ok(reply)) if reply.success => Ok(ValidationResult::Success),
            Ok(Ok(reply)) => Ok(ValidationResult::failure(
                reply.error.unwrap_or_else(|| "unknown parse error".to_owned()),
            )),
        }
    }
}

/// Routes page messages: parse results go to their waiting request, the rest is returned
/// to the caller.
#[derive(Debug, Clone)]
pub struct PageRouter {
    pending: PendingParses,
}

impl PageRouter {
    pub fn dispatch(&self, message: PageMessage) -> Option<PageMessage> {
        match message {
            PageMessage::ParseResult {
                success,
                error,
                nonce,
            } => {
                match nonce {
                    Some(nonce) => {
                        if !self.pending.resolve(&nonce, ParseReply { success, error }) {
                            warn!(nonce = %nonce, "dropping parse result nobody is waiting for");
                        }
                    }
                    None => warn!("dropping parse result without nonce"),
                }
                None
            }
            other => Some(other),
        }
    }

    pub fn dispatch_raw(&self, raw: &str) -> Result<Option<PageMessage>, ProtocolError> {
        Ok(self.dispatch(decode_page_message(raw)?))
    }

    /// Fails every waiting request and any later one; the page is gone.
    pub fn close(&self) {
        self.pending.close();
    }
}

/// A [`ChannelValidator`] wired to a JSON-lines peer, usually a worker process.
#[derive(Debug)]
pub struct WorkerValidator {
    channel: ChannelValidator,
    tasks: Vec<JoinHandle<()>>,
    _child: Option<Child>,
}

impl WorkerValidator {
    /// Spawns `command` and speaks JSON lines over its stdin/stdout.
    pub fn spawn(command: &[String], timeout: Duration) -> Result<Self, ValidatorError> {
        let (program, args) = command.split_first().ok_or_else(|| {
            ValidatorError::RendererUnavailable {
                program: String::new(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "worker command is empty",
                ),
            }
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ValidatorError::RendererUnavailable {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ValidatorError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(ValidatorError::Disconnected)?;
        info!(program = %program, "validation worker started");

        let mut worker = connect_json_lines(stdout, stdin, timeout);
        worker._child = Some(child);
        Ok(worker)
    }

    pub fn channel(&self) -> &ChannelValidator {
        &self.channel
    }
}

impl Drop for WorkerValidator {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl Validator for WorkerValidator {
    async fn validate(
        &self,
        diagram: &Diagram,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        self.channel.validate(diagram, cancel).await
    }
}

/// Connects a channel validator to a peer speaking one JSON message per line.
pub fn connect_json_lines<R, W>(reader: R, writer: W, timeout: Duration) -> WorkerValidator
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<HostMessage>(OUTBOUND_CAPACITY);
    let channel = ChannelValidator::new(tx).with_timeout(timeout);
    let router = channel.router();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = rx.recv().await {
            let line = match encode_host_message(&message) {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "skipping unencodable host message");
                    continue;
                }
            };
            let written = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            }
            .await;
            if let Err(err) = written {
                warn!(error = %err, "validation worker stopped accepting messages");
                break;
            }
        }
    });

    let reader_task = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match router.dispatch_raw(&line) {
                    Ok(None) => {}
                    Ok(Some(PageMessage::Alert { text })) => warn!(alert = %text, "validation page alert"),
                    Ok(Some(other)) => debug!(message = ?other, "ignoring page message"),
                    Err(err) => warn!(error = %err, "ignoring malformed page message"),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "validation worker output failed");
                    break;
                }
            }
        }
        router.close();
    });

    WorkerValidator {
        channel,
        tasks: vec![writer_task, reader_task],
        _child: None,
    }
}
