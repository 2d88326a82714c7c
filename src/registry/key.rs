//! Key and group id generation
//!
//! Endpoint keys are 8 random alphanumeric characters. Group ids minted for
//! endpoints that do not name one use the same alphabet.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of generated endpoint keys
pub const KEY_LEN: usize = 8;

/// Generate a fresh endpoint key
pub fn generate_key() -> String {
    random_token(KEY_LEN)
}

/// Mint a group id for an endpoint that did not request one
pub fn generate_group_id() -> String {
    random_token(KEY_LEN)
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
