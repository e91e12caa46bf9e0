//! Attempt orchestration for one streamed answer.
//!
//! A session walks `Idle -> Sending -> Streaming` and ends in exactly one of
//! `Completed` or `Failed`, possibly looping through `Retrying -> Sending`
//! on the way. Whatever happens, the caller sees zero or more cumulative
//! prose snapshots followed by exactly one terminal [`FinalResult`]; failure
//! is reported through that same result, never as an `Err` or a panic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::client::StreamTransport;
use crate::api::error::TransportError;
use crate::api::models::{ChatParams, FinalResult};
use crate::api::retry::{Attempt, RetryConfig, RetryPolicy};
use crate::streaming::decoder::StreamDecoder;
use crate::streaming::frame::StreamOutcome;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

const CANCELLED_MESSAGE: &str = "The request was cancelled.";
const UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";

/// Observable lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Streaming,
    Retrying,
    Completed,
    Failed,
}

/// Event-stream view of a session: zero or more progress snapshots, then
/// exactly one final event.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Progress(String),
    Final(FinalResult),
}

enum AttemptError {
    Transport(TransportError),
    Cancelled,
}

/// One streamed question/answer exchange, retried as a whole on transient
/// failure. Sessions share no mutable state with each other; each owns its
/// decoder, running text, and attempt counter.
pub struct StreamSession {
    id: u64,
    transport: Arc<dyn StreamTransport>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    state: SessionState,
    attempt_count: u32,
}

impl StreamSession {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self::with_policy(transport, RetryPolicy::new(RetryConfig::streaming()))
    }

    pub fn with_policy(transport: Arc<dyn StreamTransport>, policy: RetryPolicy) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            transport,
            policy,
            cancel: CancellationToken::new(),
            state: SessionState::Idle,
            attempt_count: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Attempts started so far; never exceeds the policy ceiling.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Handle for aborting the session from elsewhere. Cancelling drops the
    /// in-flight body stream and any pending backoff sleep; the terminal
    /// result still arrives, flagged as errored.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Callback form of the contract: `on_progress` fires zero or more
    /// times with cumulative prose snapshots, `on_complete` fires exactly
    /// once, terminally, on every path.
    pub async fn open<P, C>(mut self, params: &ChatParams, on_progress: P, on_complete: C)
    where
        P: FnMut(&str),
        C: FnOnce(FinalResult),
    {
        let result = self.run(params, on_progress).await;
        on_complete(result);
    }

    /// Drive the session to its single terminal result.
    pub async fn run<P>(&mut self, params: &ChatParams, mut on_progress: P) -> FinalResult
    where
        P: FnMut(&str),
    {
        let mut attempt = Attempt::first();
        loop {
            self.attempt_count = attempt.index();
            match self.run_attempt(params, &mut on_progress).await {
                Ok(outcome) => {
                    self.state = SessionState::Completed;
                    debug!(
                        session = self.id,
                        attempts = attempt.index(),
                        sources = outcome.sources.len(),
                        "stream completed"
                    );
                    return FinalResult {
                        answer: outcome.prose,
                        sources: outcome.sources,
                        errored: false,
                    };
                }
                Err(AttemptError::Cancelled) => {
                    self.state = SessionState::Failed;
                    debug!(session = self.id, "stream cancelled");
                    return FinalResult {
                        answer: CANCELLED_MESSAGE.to_string(),
                        sources: Vec::new(),
                        errored: true,
                    };
                }
                Err(AttemptError::Transport(error)) => {
                    let decision = self.policy.decide(attempt, &error);
                    if decision.retry {
                        // Everything accumulated by the failed attempt died
                        // with its decoder; the next attempt starts clean.
                        self.state = SessionState::Retrying;
                        warn!(
                            session = self.id,
                            attempt = attempt.index(),
                            delay_ms = decision.delay.as_millis() as u64,
                            error = %error,
                            "stream attempt failed, backing off before retry"
                        );
                        tokio::select! {
                            _ = self.cancel.cancelled() => {
                                self.state = SessionState::Failed;
                                return FinalResult {
                                    answer: CANCELLED_MESSAGE.to_string(),
                                    sources: Vec::new(),
                                    errored: true,
                                };
                            }
                            _ = sleep(decision.delay) => {}
                        }
                        attempt = attempt.next();
                        continue;
                    }

                    self.state = SessionState::Failed;
                    let terminal = if self.policy.is_transient(&error) {
                        TransportError::RetriesExhausted {
                            attempts: attempt.index(),
                            last: Box::new(error),
                        }
                    } else {
                        error
                    };
                    warn!(session = self.id, error = %terminal, "stream failed");
                    return FinalResult {
                        answer: failure_message(&terminal),
                        sources: Vec::new(),
                        errored: true,
                    };
                }
            }
        }
    }

    async fn run_attempt<P>(
        &mut self,
        params: &ChatParams,
        on_progress: &mut P,
    ) -> Result<StreamOutcome, AttemptError>
    where
        P: FnMut(&str),
    {
        self.state = SessionState::Sending;
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AttemptError::Cancelled),
            opened = self.transport.open(params) => opened,
        };
        let mut fragments = opened.map_err(AttemptError::Transport)?;

        let mut decoder = StreamDecoder::new();
        let mut receiving = false;
        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => return Err(AttemptError::Cancelled),
                item = fragments.next() => item,
            };
            let Some(item) = item else { break };
            let bytes = item.map_err(AttemptError::Transport)?;
            if !receiving {
                receiving = true;
                self.state = SessionState::Streaming;
                debug!(session = self.id, "first fragment received");
            }
            if let Some(snapshot) = decoder.feed(&bytes) {
                on_progress(&snapshot);
            }
        }
        Ok(decoder.finish())
    }

    /// The same session as a lazy event sequence: `Progress` zero or more
    /// times, then exactly one `Final`. Unbounded because the transport has
    /// no backpressure; fragments are consumed as fast as delivered.
    pub fn events(mut self, params: ChatParams) -> UnboundedReceiverStream<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let progress_tx = tx.clone();
            let result = self
                .run(&params, move |snapshot| {
                    let _ = progress_tx.send(SessionEvent::Progress(snapshot.to_string()));
                })
                .await;
            let _ = tx.send(SessionEvent::Final(result));
        });
        UnboundedReceiverStream::new(rx)
    }
}

fn failure_message(error: &TransportError) -> String {
    match error {
        TransportError::RetriesExhausted { .. } => UNAVAILABLE_MESSAGE.to_string(),
        other => format!("The request could not be completed: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let exhausted = TransportError::RetriesExhausted {
            attempts: 3,
            last: Box::new(TransportError::Network("reset".to_string())),
        };
        assert_eq!(failure_message(&exhausted), UNAVAILABLE_MESSAGE);

        let denied = TransportError::Status {
            code: 401,
            body: "missing token".to_string(),
        };
        assert!(failure_message(&denied).contains("status 401"));
    }

    struct NullTransport;

    #[async_trait::async_trait]
    impl StreamTransport for NullTransport {
        async fn open(
            &self,
            _params: &ChatParams,
        ) -> Result<crate::api::client::ByteFragmentStream, TransportError> {
            Err(TransportError::Network("unreachable".to_string()))
        }
    }

    #[test]
    fn test_new_sessions_start_idle_with_distinct_ids() {
        let transport = Arc::new(NullTransport);
        let a = StreamSession::new(transport.clone());
        let b = StreamSession::new(transport);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), SessionState::Idle);
        assert_eq!(a.attempt_count(), 0);
    }
}
