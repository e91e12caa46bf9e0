//! Centralized constants for routes, environment variables, and transport
//! defaults.

pub mod env {
    /// Bearer token presented on every request.
    pub const API_TOKEN: &str = "STUDYKIT_API_TOKEN";
    /// Backend base URL override.
    pub const API_BASE: &str = "STUDYKIT_API_BASE";
}

pub mod routes {
    /// Atomic ask endpoint: one JSON request, one JSON response.
    pub const CHAT: &str = "/api/v1/learning/chat";
    /// Streaming ask endpoint: chunked UTF-8 text terminated by the
    /// citation payload.
    pub const CHAT_STREAM: &str = "/api/v1/learning/chat/stream";
}

pub mod protocol {
    /// Marker the backend emits between the free-text answer and the JSON
    /// citation list. Everything before it is prose; everything after it is
    /// the payload, and nothing follows the payload.
    pub const SOURCES_SENTINEL: &str = "__SOURCES__:";
}

pub mod defaults {
    pub const BASE_URL: &str = "http://localhost:8000";
    pub const USER_AGENT: &str = "studykit/0.1.0";
}

pub mod retry {
    /// Attempt ceiling shared by both tuned policies.
    pub const MAX_ATTEMPTS: u32 = 3;
    /// First-retry delay for atomic JSON requests.
    pub const ATOMIC_BASE_DELAY_MS: u64 = 1_000;
    /// First-retry delay for streaming answers.
    pub const STREAM_BASE_DELAY_MS: u64 = 1_500;
    /// Exponential backoff never exceeds this.
    pub const MAX_DELAY_MS: u64 = 10_000;
    /// Status codes worth retrying; every other status fails immediately.
    pub const RETRYABLE_STATUSES: &[u16] = &[429, 502, 503];
    /// Message substrings treated as transient on the streaming path.
    /// Deliberately broad: the streaming backend surfaces upstream outages
    /// as free-text errors rather than clean status codes.
    pub const TRANSIENT_SIGNATURES: &[&str] = &["503", "network", "fetch"];
}
