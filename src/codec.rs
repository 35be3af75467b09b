//! At-rest obscuring of the doctor's vote.
//!
//! Labels are XORed byte by byte with a repeating secret and stored as
//! lowercase hex. This keeps the value unreadable to someone glancing at the
//! `votes` table; it is not encryption and gives no confidentiality against
//! anyone who knows or guesses the secret.
//!
//! Decoding never fails. Rows written before obfuscation existed hold the
//! plain label, so anything that does not decode to a valid label is handed
//! back untouched.
use crate::types::Team;
use std::str::FromStr;

pub fn encode(label: &str, secret: &str) -> String {
    hex::encode(xor_cycle(label.as_bytes(), secret.as_bytes()))
}

pub fn decode(stored: &str, secret: &str) -> String {
    let Ok(bytes) = hex::decode(stored) else {
        return stored.to_string();
    };
    let Ok(candidate) = String::from_utf8(xor_cycle(&bytes, secret.as_bytes())) else {
        return stored.to_string();
    };
    match Team::from_str(&candidate) {
        Ok(team) => team.as_str().to_string(),
        Err(_) => stored.to_string(),
    }
}

fn xor_cycle(data: &[u8], secret: &[u8]) -> Vec<u8> {
    if secret.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(secret.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}
