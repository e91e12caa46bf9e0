//! # studykit-core - Resilient transport for streamed answers
//!
//! `studykit-core` is the transport layer of the StudyKit assistant. It
//! turns a chunked, unstructured byte stream from the generation backend
//! into a well-formed answer plus a structured citation list, and wraps
//! atomic JSON calls in bounded, backed-off retries.
//!
//! ## Highlights
//!
//! - **Fragment-safe decoding**: multi-byte text and the citation marker may
//!   straddle arbitrary fragment boundaries; both are reassembled without
//!   garbage characters or lost prose.
//! - **Bounded retries**: transient failures (429/502/503, network drops,
//!   mid-stream read errors) are retried with deterministic exponential
//!   backoff; nothing from a failed attempt leaks into a later one.
//! - **One terminal result**: a streaming session reports progress zero or
//!   more times and completes exactly once, on every path - success,
//!   exhausted retries, client error, or cancellation.
//!
//! ## Architecture Overview
//!
//! - `config/`: HTTP client tuning and centralized constants.
//! - `api/`: bearer-token client, wire types, failure taxonomy, retry.
//! - `streaming/`: UTF-8 decoder, sentinel frame buffer, session state
//!   machine.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use studykit_core::{ApiClient, ChatParams, StreamSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), anyhow::Error> {
//!     let client = ApiClient::new("http://localhost:8000", "token")?;
//!     let session = StreamSession::new(Arc::new(client));
//!     let params = ChatParams::new("project-1", "What is photosynthesis?");
//!     session
//!         .open(
//!             &params,
//!             |snapshot| print!("\r{snapshot}"),
//!             |result| println!("\n{} sources", result.sources.len()),
//!         )
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod streaming;

pub use api::{
    AnswerResponse, ApiClient, Attempt, ByteFragmentStream, ChatParams, ChatRole, ChatTurn,
    FinalResult, RequestExecutor, RetryConfig, RetryDecision, RetryPolicy, SourceCitation,
    StreamTransport, TransportError,
};
pub use config::ClientConfig;
pub use streaming::{SessionEvent, SessionState, StreamDecoder, StreamFrameBuffer, StreamSession};
