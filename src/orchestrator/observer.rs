//! Multiplexed event observer: trace capture plus a live activity stream.
//!
//! The composite-observer half fans out to every registered observer
//! through default no-op async methods, so implementations only override
//! what they care about. Alongside it, a bounded DropOldest queue backs a
//! live-activity stream for dashboard consumers, built on `tokio::sync`
//! primitives already used elsewhere in this crate.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::Notify;

use super::types::{AgentChoice, AgentResponse, SessionTurn};

/// Pipeline lifecycle events fanned out to every registered observer, and
/// also published onto the [`LiveActivityChannel`].
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    RequestStarted { user_request: String, history: Vec<SessionTurn> },
    RoutingCompleted { choice: AgentChoice, system_prompt: Option<String> },
    AgentExecutionCompleted { response: AgentResponse },
    ResponseAggregated { final_text: String },
}

/// Subscriber to pipeline lifecycle events. All methods default to no-ops
/// so implementations only override what they care about.
#[async_trait]
pub trait OrchestratorObserver: Send + Sync {
    async fn on_request_started(&self, _user_request: &str, _history: &[SessionTurn]) {}
    async fn on_routing_completed(&self, _choice: &AgentChoice, _system_prompt: Option<&str>) {}
    async fn on_agent_execution_completed(&self, _response: &AgentResponse) {}
    async fn on_response_aggregated(&self, _final_text: &str) {}
}

/// A bounded, multi-producer queue with **DropOldest** overflow: pushing
/// past capacity silently discards the oldest queued event first. Writers
/// never block — this is the "slow dashboards must not backpressure the
/// request path" requirement from §4.8.
pub struct LiveActivityChannel {
    capacity: usize,
    queue: Mutex<VecDeque<OrchestratorEvent>>,
    notify: Notify,
}

impl LiveActivityChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    /// Non-blocking publish. Drops the oldest queued event if at capacity.
    pub fn publish(&self, event: OrchestratorEvent) {
        let mut queue = self.queue.lock().expect("live activity queue poisoned");
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_waiters();
    }

    /// Drain everything currently queued. Independent readers each get
    /// their own call to `drain` — there is no per-reader cursor, so two
    /// concurrent readers would split the backlog rather than each seeing
    /// every event; callers needing fan-out semantics should wrap this in
    /// their own broadcast.
    pub fn drain(&self) -> Vec<OrchestratorEvent> {
        let mut queue = self.queue.lock().expect("live activity queue poisoned");
        queue.drain(..).collect()
    }

    /// Wait until at least one event is queued, then drain it.
    pub async fn next_batch(&self) -> Vec<OrchestratorEvent> {
        loop {
            let batch = self.drain();
            if !batch.is_empty() {
                return batch;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("live activity queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fans out to every registered [`OrchestratorObserver`] in order, swallowing
/// individual observer panics' logical equivalent (an observer returning
/// normally but logging its own error) so one misbehaving observer can
/// never fail the pipeline. Also publishes every event onto a bounded
/// [`LiveActivityChannel`] for streaming consumers.
pub struct ObserverBus {
    observers: Vec<Arc<dyn OrchestratorObserver>>,
    live_channel: Arc<LiveActivityChannel>,
}

impl ObserverBus {
    pub fn new(live_channel_capacity: usize) -> Self {
        Self {
            observers: Vec::new(),
            live_channel: Arc::new(LiveActivityChannel::new(live_channel_capacity)),
        }
    }

    pub fn register(&mut self, observer: Arc<dyn OrchestratorObserver>) {
        self.observers.push(observer);
    }

    pub fn live_channel(&self) -> Arc<LiveActivityChannel> {
        Arc::clone(&self.live_channel)
    }

    pub async fn request_started(&self, user_request: &str, history: &[SessionTurn]) {
        for observer in &self.observers {
            observer.on_request_started(user_request, history).await;
        }
        self.live_channel.publish(OrchestratorEvent::RequestStarted {
            user_request: user_request.to_string(),
            history: history.to_vec(),
        });
    }

    pub async fn routing_completed(&self, choice: &AgentChoice, system_prompt: Option<&str>) {
        for observer in &self.observers {
            observer.on_routing_completed(choice, system_prompt).await;
        }
        self.live_channel.publish(OrchestratorEvent::RoutingCompleted {
            choice: choice.clone(),
            system_prompt: system_prompt.map(|s| s.to_string()),
        });
    }

    pub async fn agent_execution_completed(&self, response: &AgentResponse) {
        for observer in &self.observers {
            observer.on_agent_execution_completed(response).await;
        }
        self.live_channel.publish(OrchestratorEvent::AgentExecutionCompleted {
            response: response.clone(),
        });
    }

    pub async fn response_aggregated(&self, final_text: &str) {
        for observer in &self.observers {
            observer.on_response_aggregated(final_text).await;
        }
        self.live_channel.publish(OrchestratorEvent::ResponseAggregated {
            final_text: final_text.to_string(),
        });
    }
}

impl Default for ObserverBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_oldest_discards_front_when_over_capacity() {
        let channel = LiveActivityChannel::new(2);
        channel.publish(OrchestratorEvent::RequestStarted { user_request: "a".into(), history: vec![] });
        channel.publish(OrchestratorEvent::RequestStarted { user_request: "b".into(), history: vec![] });
        channel.publish(OrchestratorEvent::RequestStarted { user_request: "c".into(), history: vec![] });

        let batch = channel.drain();
        assert_eq!(batch.len(), 2);
        match (&batch[0], &batch[1]) {
            (OrchestratorEvent::RequestStarted { user_request: first, .. }, OrchestratorEvent::RequestStarted { user_request: second, .. }) => {
                assert_eq!(first, "b");
                assert_eq!(second, "c");
            }
            _ => panic!("unexpected event shape"),
        }
    }

    #[tokio::test]
    async fn bus_fans_out_and_publishes_to_live_channel() {
        struct Counter(std::sync::atomic::AtomicUsize);
        #[async_trait]
        impl OrchestratorObserver for Counter {
            async fn on_request_started(&self, _user_request: &str, _history: &[SessionTurn]) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let mut bus = ObserverBus::new(10);
        let counter = Arc::new(Counter(std::sync::atomic::AtomicUsize::new(0)));
        bus.register(counter.clone());

        bus.request_started("hello", &[]).await;
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(bus.live_channel().len(), 1);
    }
}
