//! Opaque pagination cursor
//!
//! A cursor pins the position of the last record a caller has seen in a
//! descending `(ts, id)` scan. Callers only ever handle the encoded token.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Invalid cursor format")]
pub struct CursorError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    ts: f64,
    id: i64,
}

impl Cursor {
    pub(crate) fn new(ts: f64, id: i64) -> Self {
        Self { ts, id }
    }

    pub(crate) fn ts(&self) -> f64 {
        self.ts
    }

    pub(crate) fn id(&self) -> i64 {
        self.id
    }

    /// Encode as URL-safe base64 of `{"ts": .., "id": ..}`
    pub fn encode(&self) -> String {
        // Serializing two plain numbers cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        general_purpose::URL_SAFE.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(token.trim().trim_end_matches('='))
            .map_err(|_| CursorError)?;
        let cursor: Cursor = serde_json::from_slice(&bytes).map_err(|_| CursorError)?;
        if !cursor.ts.is_finite() {
            return Err(CursorError);
        }

        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        for (ts, id) in [(1700000000.123456, 42), (0.1 + 0.2, 1), (1e-9, i64::MAX)] {
            let cursor = Cursor::new(ts, id);
            assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
        }
    }

    #[test]
    fn test_cursor_token_is_json() {
        let token = Cursor::new(12.5, 7).encode();
        let bytes = general_purpose::URL_SAFE.decode(token).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, serde_json::json!({"ts": 12.5, "id": 7}));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert_eq!(Cursor::decode("not a cursor!"), Err(CursorError));
        let not_object = general_purpose::URL_SAFE.encode("12345");
        assert_eq!(Cursor::decode(&not_object), Err(CursorError));
        let missing_id = general_purpose::URL_SAFE.encode(r#"{"ts": 1.5}"#);
        assert_eq!(Cursor::decode(&missing_id), Err(CursorError));
    }
}
