//! Streaming answer reconstruction: fragment-safe decoding, sentinel
//! detection, and attempt orchestration.

pub mod decoder;
pub mod frame;
pub mod session;

pub use decoder::StreamDecoder;
pub use frame::{StreamFrameBuffer, StreamOutcome};
pub use session::{SessionEvent, SessionState, StreamSession};
