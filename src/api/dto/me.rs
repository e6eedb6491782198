//! DTOs for the caller introspection endpoint.

use serde::{Deserialize, Serialize};

/// The authenticated caller as the pipeline sees it.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: String,
    pub request_id: String,
    pub credential_id: Option<String>,
}
