//! Test doubles for the queue and the daemon, plus log capture

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relay_agent::daemon::{DaemonEndpoint, DaemonError, DaemonRpc, RpcResult};
use relay_queue::{Delivery, QueueError, QueueEvent, QueueResult, ReplyRoute, WorkQueue};
use serde_json::Value;
use tracing::Level;

// ============================================================================
// Queue
// ============================================================================

/// Terminal actions and lifecycle calls recorded by `FakeQueue`
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCall {
    Connect,
    CreateQueue { name: String, durable: bool },
    RegisterConsumer { name: String, prefetch: u16 },
    Reply { message_id: String, payload: Value },
    Ack { message_id: String },
    Nack { message_id: String },
}

/// Which queue operations should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFailures {
    pub connect: bool,
    pub register: bool,
    pub reply: bool,
    pub ack: bool,
}

/// In-memory queue session
///
/// Scripted events are handed out in order; once they run out `next_event`
/// waits forever.
#[derive(Default)]
pub struct FakeQueue {
    calls: Arc<Mutex<Vec<QueueCall>>>,
    events: VecDeque<QueueEvent>,
    failures: QueueFailures,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: QueueFailures) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = QueueEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Shared handle on the recorded calls, usable after the queue moved into a worker
    pub fn recorder(&self) -> Arc<Mutex<Vec<QueueCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Replies, acks and nacks only
    pub fn terminal_calls(&self) -> Vec<QueueCall> {
        terminal_calls(&self.calls)
    }

    fn record(&self, call: QueueCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn terminal_calls(calls: &Mutex<Vec<QueueCall>>) -> Vec<QueueCall> {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|call| {
            matches!(
                call,
                QueueCall::Reply { .. } | QueueCall::Ack { .. } | QueueCall::Nack { .. }
            )
        })
        .cloned()
        .collect()
}

#[async_trait]
impl WorkQueue for FakeQueue {
    async fn connect(&mut self) -> QueueResult<()> {
        self.record(QueueCall::Connect);
        if self.failures.connect {
            return Err(QueueError::NotConnected);
        }
        Ok(())
    }

    async fn create_queue(&mut self, name: &str, durable: bool) -> QueueResult<()> {
        self.record(QueueCall::CreateQueue {
            name: name.to_string(),
            durable,
        });
        Ok(())
    }

    async fn register_consumer(&mut self, name: &str, prefetch: u16) -> QueueResult<()> {
        self.record(QueueCall::RegisterConsumer {
            name: name.to_string(),
            prefetch,
        });
        if self.failures.register {
            return Err(QueueError::MissingQueueUrl(name.to_string()));
        }
        Ok(())
    }

    async fn next_event(&mut self) -> QueueEvent {
        match self.events.pop_front() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn reply(&self, delivery: &Delivery, payload: &Value) -> QueueResult<()> {
        if self.failures.reply {
            return Err(QueueError::InvalidMessage("reply queue is gone".to_string()));
        }
        self.record(QueueCall::Reply {
            message_id: delivery.message_id.clone(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        if self.failures.ack {
            return Err(QueueError::NotConsuming);
        }
        self.record(QueueCall::Ack {
            message_id: delivery.message_id.clone(),
        });
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.record(QueueCall::Nack {
            message_id: delivery.message_id.clone(),
        });
        Ok(())
    }
}

/// A delivery carrying `payload` with a reply route
pub fn delivery(message_id: &str, payload: Value) -> Delivery {
    Delivery {
        queue: "request.network".to_string(),
        message_id: message_id.to_string(),
        receipt_handle: format!("receipt-{message_id}"),
        reply_route: Some(ReplyRoute {
            reply_to: "replies".to_string(),
            correlation_id: format!("corr-{message_id}"),
        }),
        payload,
    }
}

// ============================================================================
// Daemon
// ============================================================================

/// Daemon calls recorded by `ScriptedDaemon`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCall {
    SendRawTransaction(String),
    SubmitBlock(String),
    BlockTemplate(String, u64),
    RandomOutputs(Vec<u64>, u64),
}

type Script = Box<dyn Fn() -> Result<RpcResult, DaemonError> + Send + Sync>;

/// Daemon double answering every call with the same script
pub struct ScriptedDaemon {
    endpoint: DaemonEndpoint,
    script: Script,
    calls: Mutex<Vec<DaemonCall>>,
}

impl ScriptedDaemon {
    /// Answers every call with `response`
    pub fn responding(response: Value) -> Arc<Self> {
        Arc::new(Self::with_script(Box::new(move || {
            RpcResult::from_value(response.clone())
        })))
    }

    /// Fails every call with the error built by `error`
    pub fn failing(error: fn() -> DaemonError) -> Arc<Self> {
        Arc::new(Self::with_script(Box::new(move || Err(error()))))
    }

    fn with_script(script: Script) -> Self {
        Self {
            endpoint: DaemonEndpoint::new("127.0.0.1", 11898),
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<DaemonCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: DaemonCall) -> Result<RpcResult, DaemonError> {
        self.calls.lock().unwrap().push(call);
        (self.script)()
    }
}

#[async_trait]
impl DaemonRpc for ScriptedDaemon {
    async fn send_raw_transaction(&self, raw_transaction: &str) -> Result<RpcResult, DaemonError> {
        self.answer(DaemonCall::SendRawTransaction(raw_transaction.to_string()))
    }

    async fn submit_block(&self, block_blob: &str) -> Result<RpcResult, DaemonError> {
        self.answer(DaemonCall::SubmitBlock(block_blob.to_string()))
    }

    async fn block_template(
        &self,
        wallet_address: &str,
        reserve_size: u64,
    ) -> Result<RpcResult, DaemonError> {
        self.answer(DaemonCall::BlockTemplate(
            wallet_address.to_string(),
            reserve_size,
        ))
    }

    async fn random_outputs(&self, amounts: &[u64], mixin: u64) -> Result<RpcResult, DaemonError> {
        self.answer(DaemonCall::RandomOutputs(amounts.to_vec(), mixin))
    }

    fn endpoint(&self) -> &DaemonEndpoint {
        &self.endpoint
    }
}

// ============================================================================
// Logs
// ============================================================================

/// Collects formatted log output of the current thread
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Routes this thread's INFO-and-above events into the capture
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    /// Lines logged at `level`, e.g. `"INFO"` or `"WARN"`
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.trim_start().starts_with(level))
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
