use crate::config::ProtocolConfig;
use rand::Rng;

/// Room code alphabet: uppercase letters and digits minus the confusable `0`, `O`, `1`, `I`.
pub const ROOM_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generate a room code of the configured length from [`ROOM_CODE_ALPHABET`].
pub fn generate_clean_room_code_with_config(config: &ProtocolConfig) -> String {
    generate_clean_room_code_of_length(config.room_code_length)
}

/// Generate a clean room code of the requested length.
pub fn generate_clean_room_code_of_length(length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = ROOM_CODE_ALPHABET[idx] as char;
            ch
        })
        .collect()
}

/// Canonical form of a user-typed code: trimmed and uppercased.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_room_code_char(ch: char) -> bool {
    ch.is_ascii() && ROOM_CODE_ALPHABET.contains(&(ch as u8))
}
