//! Anti-forgery tokens for forms rendered with `@csrf`.
//!
//! The token is generated on first use and stored in the session, so every form
//! rendered for the same session carries the same token. Sessions belong to the HTTP layer;
//! the engine only needs to read and write one key, see [`Session`].
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;

/// Name of the hidden form input.
pub static CSRF_INPUT: &str = "_token";
/// Session key holding the token.
pub static CSRF_SESSION_KEY: &str = "_csrf_token";

/// Session storage, provided by the HTTP layer.
pub trait Session: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String);
}

/// Session kept in memory, e.g. for rendering outside of a request.
#[derive(Default, Debug)]
pub struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.values.lock().insert(key.to_string(), value);
    }
}

/// Get the session's token, generating and storing a new one if needed.
pub fn csrf_token(session: &dyn Session) -> String {
    if let Some(token) = session.get(CSRF_SESSION_KEY) {
        return token;
    }

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>();

    session.put(CSRF_SESSION_KEY, token.clone());
    token
}

/// Hidden form input carrying the session's token.
pub fn csrf_field(session: &dyn Session) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        CSRF_INPUT,
        csrf_token(session)
    )
}

/// Check a submitted token against the session.
pub fn csrf_token_validate(session: &dyn Session, token: &str) -> bool {
    match session.get(CSRF_SESSION_KEY) {
        Some(expected) => {
            expected.len() == token.len()
                && expected
                    .bytes()
                    .zip(token.bytes())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        }
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_token_persisted() {
        let session = MemorySession::new();
        let token = csrf_token(&session);

        assert_eq!(token.len(), 64);
        assert_eq!(csrf_token(&session), token);
        assert!(csrf_token_validate(&session, &token));
        assert!(!csrf_token_validate(&session, "forged"));
    }

    #[test]
    fn test_field() {
        let session = MemorySession::new();
        let field = csrf_field(&session);

        assert!(field.starts_with(r#"<input type="hidden" name="_token" value=""#));
        assert!(field.contains(&csrf_token(&session)));
    }
}
