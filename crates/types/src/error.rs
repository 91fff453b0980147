// crates/types/src/error.rs
use serde::{Deserialize, Serialize};

/// Error code the backend uses when the stored mailbox credential has to be
/// re-authorized before any further sync can run.
pub const RECONNECT_REQUIRED_CODE: &str = "GMAIL_RECONNECT_REQUIRED";

/// Error code the backend uses for an unknown resource.
pub const NOT_FOUND_CODE: &str = "NOT_FOUND";

/// Structured JSON error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, alias = "error")]
    pub message: String,
    #[serde(default, alias = "details", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
