//! Derives short, collision-resistant pipe names for spawned plugin host
//! processes. Unix domain socket paths must fit within roughly 108
//! bytes, so the name is built from a truncated plugin prefix, a hash of
//! the discriminator, and a random nonce rather than the raw ids.

use sha2::{Digest, Sha256};

const PLUGIN_PREFIX_MAX_CHARS: usize = 12;
const HASH_PREFIX_CHARS: usize = 20;
const NONCE_CHARS: usize = 8;

/// Builds a pipe/socket name of the form `devhost-{plugin}-{hash}-{nonce}`,
/// safe to embed in a Unix socket path or a Windows named pipe.
pub fn derive_pipe_name(plugin_id: &str, discriminator: &str) -> String {
    let prefix: String = plugin_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(PLUGIN_PREFIX_MAX_CHARS)
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(plugin_id.as_bytes());
    hasher.update(b"|");
    hasher.update(discriminator.as_bytes());
    let digest = hasher.finalize();
    let hash_hex = hex::encode(digest);
    let hash_prefix = &hash_hex[..HASH_PREFIX_CHARS.min(hash_hex.len())];

    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let nonce = &nonce[..NONCE_CHARS.min(nonce.len())];

    format!("devhost-{prefix}-{hash_prefix}-{nonce}")
}

/// Derivation key for the supervisor's single-session vs multi-session
/// grouping, mirrored here so `derive_pipe_name`'s discriminator matches
/// the group key the supervisor computes independently.
pub fn group_key(plugin_id: &str, capability_id: &str, session_id: &str, supports_multi_session: bool) -> String {
    if supports_multi_session {
        format!("multi:{plugin_id}:{capability_id}")
    } else {
        format!("session:{session_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_are_short_enough_for_unix_sockets() {
        let name = derive_pipe_name("plugin.very.long.identifier.example", "session:abcdefgh-1234");
        assert!(name.len() < 64, "name too long: {name} ({} chars)", name.len());
    }

    #[test]
    fn derived_names_are_distinct_per_call() {
        let a = derive_pipe_name("plugin.serial", "session:s1");
        let b = derive_pipe_name("plugin.serial", "session:s1");
        assert_ne!(a, b, "nonce should differ across calls");
    }

    #[test]
    fn group_key_distinguishes_single_and_multi_session() {
        assert_eq!(group_key("p", "c", "s1", false), "session:s1");
        assert_eq!(group_key("p", "c", "s1", true), "multi:p:c");
    }
}
