use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::domains::message::{self, MessageEnvelope};
use crate::error::Result;
use crate::interfaces::handler::MessageHandler;
use crate::interfaces::transport::{EventStream, Transport, TransportEvent};
use crate::services::ring::RingMember;

pub struct HandlerNode {
    id: String,
    message_type: String,
    receive_channel: String,
    send_channel: String,
    handler: Arc<dyn MessageHandler>,
}

impl std::fmt::Debug for HandlerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerNode")
            .field("id", &self.id)
            .field("message_type", &self.message_type)
            .field("receive_channel", &self.receive_channel)
            .field("send_channel", &self.send_channel)
            .field("handler", &self.handler.name())
            .finish()
    }
}

impl RingMember for HandlerNode {
    fn member_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Handled,
    Responded { subscribers: usize },
    Rejected(String),
    Failed(String),
}

#[derive(Clone)]
pub struct HandlerContext {
    node_id: String,
    send_channel: String,
    transport: Arc<dyn Transport>,
}

impl HandlerContext {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn send_channel(&self) -> &str {
        &self.send_channel
    }

    pub async fn send_message(
        &self,
        message_type: &str,
        mimetype: &str,
        body: Value,
    ) -> Result<usize> {
        let envelope = MessageEnvelope::new(message_type, mimetype, self.node_id.as_str(), body);
        self.send_envelope(&envelope).await
    }

    pub async fn send_envelope(&self, envelope: &MessageEnvelope) -> Result<usize> {
        self.transport
            .publish(&self.send_channel, &message::encode(envelope))
            .await
    }
}

impl HandlerNode {
    pub fn new(
        id: impl Into<String>,
        message_type: impl Into<String>,
        receive_channel: impl Into<String>,
        send_channel: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            message_type: message_type.into(),
            receive_channel: receive_channel.into(),
            send_channel: send_channel.into(),
            handler,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn receive_channel(&self) -> &str {
        &self.receive_channel
    }

    pub fn send_channel(&self) -> &str {
        &self.send_channel
    }

    pub fn handler(&self) -> &Arc<dyn MessageHandler> {
        &self.handler
    }

    pub fn context(&self, transport: Arc<dyn Transport>) -> HandlerContext {
        HandlerContext {
            node_id: self.id.clone(),
            send_channel: self.send_channel.clone(),
            transport,
        }
    }

    /// Subscribe to the receive channel and spawn the supervised process
    /// loop. The subscription is live when this returns, so nothing forwarded
    /// afterwards is missed.
    pub async fn start(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        options: NodeOptions,
    ) -> Result<JoinHandle<()>> {
        let events = transport.subscribe(&self.receive_channel).await?;
        info!(
            node_id = %self.id,
            handler = self.handler.name(),
            channel = %self.receive_channel,
            "handler node started"
        );
        let node = self.clone();
        Ok(tokio::spawn(async move {
            node.supervise(transport, options, events).await;
        }))
    }

    async fn supervise(&self, transport: Arc<dyn Transport>, options: NodeOptions, events: EventStream) {
        let ctx = self.context(transport.clone());
        let mut tracker = RestartTracker::new(options.restart.clone());
        let mut events = Some(events);
        loop {
            if let Some(stream) = events.take() {
                self.run_loop(&ctx, stream, options.poll_timeout).await;
                warn!(node_id = %self.id, "receive subscription ended");
            }

            let Some(backoff) = tracker.record_restart() else {
                error!(
                    node_id = %self.id,
                    message_type = %self.message_type,
                    restarts = tracker.restart_count(),
                    "restart budget exhausted; node abandoned, pool capacity degraded"
                );
                return;
            };
            tokio::time::sleep(backoff).await;

            match transport.subscribe(&self.receive_channel).await {
                Ok(stream) => {
                    info!(node_id = %self.id, "handler node restarted");
                    events = Some(stream);
                }
                Err(err) => warn!(node_id = %self.id, error = %err, "resubscribe failed"),
            }
        }
    }

    pub async fn run_loop(&self, ctx: &HandlerContext, mut events: EventStream, poll_timeout: Duration) {
        loop {
            let event = match tokio::time::timeout(poll_timeout, events.next()).await {
                Err(_) => {
                    trace!(node_id = %self.id, "idle");
                    continue;
                }
                Ok(None) => return,
                Ok(Some(event)) => event,
            };

            let payload = match event {
                TransportEvent::SubscribeAck { channel } => {
                    debug!(node_id = %self.id, %channel, "subscription acknowledged");
                    continue;
                }
                TransportEvent::Message { payload, .. } => payload,
            };

            match self.process(ctx, &payload).await {
                ProcessOutcome::Handled => {}
                ProcessOutcome::Responded { subscribers } => {
                    debug!(node_id = %self.id, subscribers, "response published");
                }
                ProcessOutcome::Rejected(reason) => {
                    warn!(node_id = %self.id, %reason, "dropping undecodable message");
                }
                ProcessOutcome::Failed(reason) => {
                    error!(node_id = %self.id, %reason, "handler failed; message lost");
                }
            }
        }
    }

    pub async fn process(&self, ctx: &HandlerContext, payload: &[u8]) -> ProcessOutcome {
        let envelope = match message::decode(payload) {
            Ok(envelope) => envelope,
            Err(err) => return ProcessOutcome::Rejected(err.to_string()),
        };

        let call = AssertUnwindSafe(self.handler.handle_message(&envelope, ctx));
        let response = match call.catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return ProcessOutcome::Failed(err.to_string()),
            Err(panic) => return ProcessOutcome::Failed(panic_message(panic.as_ref())),
        };

        match response {
            None => ProcessOutcome::Handled,
            Some(reply) => match ctx.send_envelope(&reply).await {
                Ok(subscribers) => ProcessOutcome::Responded { subscribers },
                Err(err) => ProcessOutcome::Failed(format!("response not published: {err}")),
            },
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {text}")
    } else if let Some(text) = panic.downcast_ref::<String>() {
        format!("handler panicked: {text}")
    } else {
        "handler panicked".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub poll_timeout: Duration,
    pub restart: RestartPolicy,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(5),
            restart: RestartPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub window: Duration,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            window: Duration::from_secs(60),
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RestartPolicy {
    pub fn new(max_restarts: u32, window: Duration, backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_restarts,
            window,
            backoff,
            max_backoff,
        }
    }

    pub fn never() -> Self {
        Self {
            max_restarts: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct RestartTracker {
    policy: RestartPolicy,
    restart_times: VecDeque<Instant>,
    consecutive_restarts: u32,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            restart_times: VecDeque::new(),
            consecutive_restarts: 0,
        }
    }

    pub fn record_restart(&mut self) -> Option<Duration> {
        let now = Instant::now();
        while let Some(front) = self.restart_times.front() {
            if now.duration_since(*front) > self.policy.window {
                self.restart_times.pop_front();
            } else {
                break;
            }
        }

        if self.restart_times.is_empty() {
            self.reset();
        }

        if self.restart_times.len() >= self.policy.max_restarts as usize {
            return None;
        }

        self.restart_times.push_back(now);
        self.consecutive_restarts += 1;
        Some(self.backoff())
    }

    fn backoff(&self) -> Duration {
        let multiplier = 2u32.saturating_pow(self.consecutive_restarts.saturating_sub(1));
        self.policy
            .backoff
            .saturating_mul(multiplier)
            .min(self.policy.max_backoff)
    }

    pub fn restart_count(&self) -> usize {
        self.restart_times.len()
    }

    pub fn reset(&mut self) {
        self.restart_times.clear();
        self.consecutive_restarts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_enforces_budget() {
        let policy = RestartPolicy::new(
            3,
            Duration::from_secs(10),
            Duration::from_millis(10),
            Duration::from_millis(100),
        );
        let mut tracker = RestartTracker::new(policy);
        assert!(tracker.record_restart().is_some());
        assert!(tracker.record_restart().is_some());
        assert!(tracker.record_restart().is_some());
        assert!(tracker.record_restart().is_none());
        assert_eq!(tracker.restart_count(), 3);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RestartPolicy::new(
            10,
            Duration::from_secs(60),
            Duration::from_millis(100),
            Duration::from_millis(350),
        );
        let mut tracker = RestartTracker::new(policy);
        assert_eq!(tracker.record_restart(), Some(Duration::from_millis(100)));
        assert_eq!(tracker.record_restart(), Some(Duration::from_millis(200)));
        assert_eq!(tracker.record_restart(), Some(Duration::from_millis(350)));
    }

    #[test]
    fn backoff_resets_after_quiet_window() {
        let policy = RestartPolicy::new(
            10,
            Duration::from_millis(50),
            Duration::from_millis(100),
            Duration::from_secs(5),
        );
        let mut tracker = RestartTracker::new(policy);
        assert_eq!(tracker.record_restart(), Some(Duration::from_millis(100)));
        assert_eq!(tracker.record_restart(), Some(Duration::from_millis(200)));
        assert_eq!(tracker.record_restart(), Some(Duration::from_millis(400)));

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(tracker.record_restart(), Some(Duration::from_millis(100)));
        assert_eq!(tracker.restart_count(), 1);
    }

    #[test]
    fn never_policy_refuses_first_restart() {
        let mut tracker = RestartTracker::new(RestartPolicy::never());
        assert!(tracker.record_restart().is_none());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked: boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked: bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }
}
