//! Event dispatch with at-most-once replies per message.
//!
//! Chat platforms redeliver events (retries after a slow ack, reconnects,
//! duplicate subscriptions). The dispatcher filters to mentions, claims each
//! message id in a [`HandledMessageRegistry`] before doing any work, and posts
//! exactly one reply for every claimed id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use helpbot_config::{DispatcherConfig, FailureMode};
use helpbot_core::error::ChannelError;
use helpbot_core::{Answerer, Channel, InboundEvent};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Message ids that have already been claimed. Entries are never evicted.
#[derive(Debug, Default)]
pub struct HandledMessageRegistry {
    handled: Mutex<HashSet<String>>,
}

impl HandledMessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `message_id` as handled.
    ///
    /// Returns `true` for the first caller only.
    pub fn claim(&self, message_id: &str) -> bool {
        let mut handled = self
            .handled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handled.insert(message_id.to_string())
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.handled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(message_id)
    }

    pub fn len(&self) -> usize {
        self.handled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the user sees when answering fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log only
    Silent,
    /// Post this text to the conversation
    Reply(String),
}

impl FailurePolicy {
    pub fn from_config(config: &DispatcherConfig) -> Self {
        match config.on_failure {
            FailureMode::Silent => Self::Silent,
            FailureMode::Reply => Self::Reply(config.failure_message.clone()),
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::from_config(&DispatcherConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAMention,
    AlreadyHandled,
}

/// Result of handling one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    Answered,
    /// Answering failed; `replied` tells whether a failure notice was posted.
    Failed { replied: bool },
}

/// Counters for a finished dispatch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: usize,
    pub ignored: usize,
    pub answered: usize,
    pub failed: usize,
}

impl DispatchStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Ignored(_) => self.ignored += 1,
            DispatchOutcome::Answered => self.answered += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct DedupDispatcher {
    answerer: Arc<dyn Answerer>,
    channel: Arc<dyn Channel>,
    registry: Arc<HandledMessageRegistry>,
    policy: FailurePolicy,
    max_in_flight: usize,
}

impl DedupDispatcher {
    pub fn new(
        answerer: Arc<dyn Answerer>,
        channel: Arc<dyn Channel>,
        registry: Arc<HandledMessageRegistry>,
    ) -> Self {
        Self {
            answerer,
            channel,
            registry,
            policy: FailurePolicy::default(),
            max_in_flight: 8,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<HandledMessageRegistry> {
        &self.registry
    }

    /// Decide whether an event needs an answer, claiming it if so.
    ///
    /// Returns `None` when the caller now owns the event.
    pub fn claim(&self, event: &InboundEvent) -> Option<IgnoreReason> {
        if !event.is_mention() {
            return Some(IgnoreReason::NotAMention);
        }
        if !self.registry.claim(&event.message_id) {
            return Some(IgnoreReason::AlreadyHandled);
        }
        None
    }

    /// Classify, answer and reply to a single event.
    pub async fn handle(&self, event: InboundEvent) -> DispatchOutcome {
        if let Some(reason) = self.claim(&event) {
            debug!(message_id = %event.message_id, ?reason, "Ignoring event");
            return DispatchOutcome::Ignored(reason);
        }
        self.process(event).await
    }

    /// Answer an already-claimed event and post the result.
    async fn process(&self, event: InboundEvent) -> DispatchOutcome {
        info!(message_id = %event.message_id, channel = %event.channel_id, "Answering mention");

        match self.answerer.answer(&event.text).await {
            Ok(answer) => match self.channel.post(&event.channel_id, &answer).await {
                Ok(()) => DispatchOutcome::Answered,
                Err(e) => {
                    error!(message_id = %event.message_id, error = %e, "Failed to post answer");
                    DispatchOutcome::Failed { replied: false }
                }
            },
            Err(e) => {
                error!(
                    message_id = %event.message_id,
                    kind = e.kind(),
                    error = %e,
                    "Failed to answer mention"
                );
                let replied = match &self.policy {
                    FailurePolicy::Silent => false,
                    FailurePolicy::Reply(text) => {
                        match self.channel.post(&event.channel_id, text).await {
                            Ok(()) => true,
                            Err(e) => {
                                warn!(message_id = %event.message_id, error = %e, "Failed to post failure notice");
                                false
                            }
                        }
                    }
                };
                DispatchOutcome::Failed { replied }
            }
        }
    }

    /// Consume events until the channel closes, answering claimed mentions
    /// concurrently (at most `max_in_flight` at a time). Claimed events beyond
    /// that limit wait their turn without holding up the receiver.
    ///
    /// Transport errors are logged and skipped, except authentication
    /// failures, which end the run.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<Result<InboundEvent, ChannelError>>,
    ) -> Result<DispatchStats, ChannelError> {
        let limit = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<DispatchOutcome> = JoinSet::new();
        let mut stats = DispatchStats::default();

        loop {
            tokio::select! {
                Some(done) = tasks.join_next(), if !tasks.is_empty() => {
                    record_task(&mut stats, done);
                }
                received = events.recv() => {
                    let event = match received {
                        None => break,
                        Some(Ok(event)) => event,
                        Some(Err(ChannelError::AuthenticationFailed(reason))) => {
                            drain(&mut tasks, &mut stats).await;
                            return Err(ChannelError::AuthenticationFailed(reason));
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Channel reported an error");
                            continue;
                        }
                    };
                    stats.received += 1;

                    if let Some(reason) = self.claim(&event) {
                        debug!(message_id = %event.message_id, ?reason, "Ignoring event");
                        stats.record(DispatchOutcome::Ignored(reason));
                        continue;
                    }

                    // The permit is taken inside the task so the receiver keeps
                    // draining (and the transport keeps acking) while at capacity.
                    let limit = limit.clone();
                    let dispatcher = self.clone();
                    tasks.spawn(async move {
                        let Ok(_permit) = limit.acquire_owned().await else {
                            return DispatchOutcome::Failed { replied: false };
                        };
                        dispatcher.process(event).await
                    });
                }
            }
        }

        drain(&mut tasks, &mut stats).await;
        info!(
            received = stats.received,
            answered = stats.answered,
            failed = stats.failed,
            ignored = stats.ignored,
            "Dispatcher stopped"
        );
        Ok(stats)
    }
}

async fn drain(tasks: &mut JoinSet<DispatchOutcome>, stats: &mut DispatchStats) {
    while let Some(done) = tasks.join_next().await {
        record_task(stats, done);
    }
}

fn record_task(
    stats: &mut DispatchStats,
    done: Result<DispatchOutcome, tokio::task::JoinError>,
) {
    match done {
        Ok(outcome) => stats.record(outcome),
        Err(e) => {
            error!(error = %e, "Dispatch task panicked");
            stats.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FixedAnswerer, RecordingChannel};
    use helpbot_core::EventKind;
    use std::time::Duration;

    fn dispatcher(
        answerer: Arc<FixedAnswerer>,
        channel: Arc<RecordingChannel>,
    ) -> DedupDispatcher {
        DedupDispatcher::new(answerer, channel, Arc::new(HandledMessageRegistry::new()))
    }

    #[test]
    fn claim_is_first_come_only() {
        let registry = HandledMessageRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.claim("m1"));
        assert!(!registry.claim("m1"));
        assert!(registry.claim("m2"));
        assert!(registry.contains("m1"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let registry = Arc::new(HandledMessageRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.claim("m1"))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn failure_policy_from_config() {
        let mut config = DispatcherConfig::default();
        assert!(matches!(FailurePolicy::from_config(&config), FailurePolicy::Reply(_)));
        config.on_failure = FailureMode::Silent;
        assert_eq!(FailurePolicy::from_config(&config), FailurePolicy::Silent);
    }

    #[tokio::test]
    async fn mention_is_answered_in_its_channel() {
        let answerer = Arc::new(FixedAnswerer::ok("Use a cursor paginator."));
        let channel = Arc::new(RecordingChannel::new());
        let d = dispatcher(answerer.clone(), channel.clone());

        let outcome = d
            .handle(InboundEvent::mention("m1", "C42", "how do I paginate?"))
            .await;
        assert_eq!(outcome, DispatchOutcome::Answered);
        assert_eq!(answerer.questions(), vec!["how do I paginate?"]);
        assert_eq!(
            channel.posts(),
            vec![("C42".to_string(), "Use a cursor paginator.".to_string())]
        );
    }

    #[tokio::test]
    async fn other_events_never_reach_the_answerer() {
        let answerer = Arc::new(FixedAnswerer::ok("unused"));
        let channel = Arc::new(RecordingChannel::new());
        let d = dispatcher(answerer.clone(), channel.clone());

        let event = InboundEvent {
            kind: EventKind::Other("message".into()),
            ..InboundEvent::mention("m1", "C1", "chatter")
        };
        assert_eq!(
            d.handle(event).await,
            DispatchOutcome::Ignored(IgnoreReason::NotAMention)
        );
        assert_eq!(answerer.call_count(), 0);
        assert!(channel.posts().is_empty());
        // ignored events are not claimed
        assert!(!d.registry().contains("m1"));
    }

    #[tokio::test]
    async fn redelivery_is_ignored() {
        let answerer = Arc::new(FixedAnswerer::ok("answer"));
        let channel = Arc::new(RecordingChannel::new());
        let d = dispatcher(answerer.clone(), channel.clone());

        let event = InboundEvent::mention("m1", "C1", "q");
        assert_eq!(d.handle(event.clone()).await, DispatchOutcome::Answered);
        assert_eq!(
            d.handle(event).await,
            DispatchOutcome::Ignored(IgnoreReason::AlreadyHandled)
        );
        assert_eq!(answerer.call_count(), 1);
        assert_eq!(channel.posts().len(), 1);
    }

    #[tokio::test]
    async fn simultaneous_deliveries_answer_once() {
        let answerer = Arc::new(FixedAnswerer::ok("answer").with_delay(Duration::from_millis(50)));
        let channel = Arc::new(RecordingChannel::new());
        let d = dispatcher(answerer.clone(), channel.clone());

        let event = InboundEvent::mention("m1", "C1", "q");
        let (a, b) = tokio::join!(d.handle(event.clone()), d.handle(event));

        let answered = [a, b]
            .iter()
            .filter(|o| **o == DispatchOutcome::Answered)
            .count();
        assert_eq!(answered, 1);
        assert_eq!(answerer.call_count(), 1);
        assert_eq!(channel.posts().len(), 1);
    }

    #[tokio::test]
    async fn failure_replies_with_configured_notice() {
        let answerer = Arc::new(FixedAnswerer::failing());
        let channel = Arc::new(RecordingChannel::new());
        let d = dispatcher(answerer.clone(), channel.clone())
            .with_failure_policy(FailurePolicy::Reply("Something went wrong.".into()));

        let event = InboundEvent::mention("m1", "C9", "q");
        assert_eq!(
            d.handle(event.clone()).await,
            DispatchOutcome::Failed { replied: true }
        );
        assert_eq!(
            channel.posts(),
            vec![("C9".to_string(), "Something went wrong.".to_string())]
        );

        // failed messages stay handled and are not retried
        assert_eq!(
            d.handle(event).await,
            DispatchOutcome::Ignored(IgnoreReason::AlreadyHandled)
        );
        assert_eq!(answerer.call_count(), 1);
    }

    #[tokio::test]
    async fn silent_failure_posts_nothing() {
        let answerer = Arc::new(FixedAnswerer::failing());
        let channel = Arc::new(RecordingChannel::new());
        let d = dispatcher(answerer, channel.clone()).with_failure_policy(FailurePolicy::Silent);

        assert_eq!(
            d.handle(InboundEvent::mention("m1", "C1", "q")).await,
            DispatchOutcome::Failed { replied: false }
        );
        assert!(channel.posts().is_empty());
    }

    #[tokio::test]
    async fn post_failure_is_reported() {
        let answerer = Arc::new(FixedAnswerer::ok("answer"));
        let channel = Arc::new(RecordingChannel::rejecting());
        let d = dispatcher(answerer, channel);

        assert_eq!(
            d.handle(InboundEvent::mention("m1", "C1", "q")).await,
            DispatchOutcome::Failed { replied: false }
        );
    }

    #[tokio::test]
    async fn run_processes_stream_until_closed() {
        let answerer = Arc::new(FixedAnswerer::ok("answer").with_delay(Duration::from_millis(10)));
        let channel = Arc::new(RecordingChannel::new());
        let d = Arc::new(dispatcher(answerer.clone(), channel.clone()).with_max_in_flight(2));

        let (tx, rx) = mpsc::channel(16);
        for event in [
            InboundEvent::mention("m1", "C1", "first"),
            InboundEvent::mention("m1", "C1", "first"),
            InboundEvent {
                kind: EventKind::Other("reaction_added".into()),
                ..InboundEvent::mention("r1", "C1", "")
            },
            InboundEvent::mention("m2", "C2", "second"),
            InboundEvent::mention("m3", "C3", "third"),
        ] {
            tx.send(Ok(event)).await.unwrap();
        }
        tx.send(Err(ChannelError::ConnectionLost("blip".into())))
            .await
            .unwrap();
        drop(tx);

        let stats = d.run(rx).await.unwrap();
        assert_eq!(
            stats,
            DispatchStats {
                received: 5,
                ignored: 2,
                answered: 3,
                failed: 0,
            }
        );
        assert_eq!(answerer.call_count(), 3);

        let mut channels: Vec<String> = channel.posts().into_iter().map(|(c, _)| c).collect();
        channels.sort();
        assert_eq!(channels, vec!["C1", "C2", "C3"]);
    }

    #[tokio::test]
    async fn run_keeps_receiving_while_answers_are_blocked() {
        let answerer = Arc::new(FixedAnswerer::ok("late").with_delay(Duration::from_secs(3600)));
        let channel = Arc::new(RecordingChannel::new());
        let d = Arc::new(dispatcher(answerer.clone(), channel.clone()).with_max_in_flight(1));

        let (tx, rx) = mpsc::channel(2);
        let run = tokio::spawn(d.run(rx));

        for i in 0..50 {
            let event = InboundEvent::mention(format!("m{i}"), "C1", "q");
            tokio::time::timeout(Duration::from_secs(5), tx.send(Ok(event)))
                .await
                .unwrap_or_else(|_| panic!("sender stalled at event {i}"))
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(answerer.call_count(), 1);
        assert!(channel.posts().is_empty());
        run.abort();
    }

    #[tokio::test]
    async fn run_stops_on_authentication_failure() {
        let answerer = Arc::new(FixedAnswerer::ok("answer"));
        let channel = Arc::new(RecordingChannel::new());
        let d = Arc::new(dispatcher(answerer, channel));

        let (tx, rx) = mpsc::channel(4);
        tx.send(Err(ChannelError::AuthenticationFailed("invalid_auth".into())))
            .await
            .unwrap();

        let err = d.run(rx).await.unwrap_err();
        assert!(matches!(err, ChannelError::AuthenticationFailed(_)));
    }
}
