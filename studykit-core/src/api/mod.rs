//! Request/response plumbing: bearer-token client, wire types, failure
//! taxonomy, and bounded retry.

pub mod client;
pub mod error;
pub mod models;
pub mod retry;

pub use client::{ApiClient, ByteFragmentStream, StreamTransport};
pub use error::TransportError;
pub use models::{AnswerResponse, ChatParams, ChatRole, ChatTurn, FinalResult, SourceCitation};
pub use retry::{Attempt, RequestExecutor, RetryConfig, RetryDecision, RetryPolicy};
