//! Limits imposed by the chat transport.

use serde::{Deserialize, Serialize};

/// Inline-button payload ceiling of the reference transport, in bytes.
const fn default_max_token_len() -> usize {
    64
}

/// Shortest useful ceiling: `confirm_` + one-character action + `_` + a UUID.
pub const MIN_TOKEN_LEN: usize = 46;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum byte length of an action token.
    #[serde(default = "default_max_token_len")]
    pub max_token_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_token_len: default_max_token_len(),
        }
    }
}
