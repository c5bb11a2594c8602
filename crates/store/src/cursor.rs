//! Signed cursor pagination.
//!
//! All list endpoints order by `(created_at DESC, id DESC)` and encode the
//! last row's `(created_at, id)` into an opaque, URL-safe token. The token
//! is HMAC-SHA256-signed with a process-wide secret so a tampered cursor is
//! rejected rather than silently truncating a result set.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

type HmacSha256 = Hmac<Sha256>;

pub const PAGE_SIZE_MIN: i64 = 1;
pub const PAGE_SIZE_MAX: i64 = 100;
pub const PAGE_SIZE_DEFAULT: i64 = 20;

/// Hex digest length kept in the token. Half of SHA-256 is plenty for
/// tamper detection and keeps cursors short.
const SIG_LEN: usize = 16;

/// Decoded cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// One page of rows plus the continuation token.
#[derive(Debug)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Rows that can act as a pagination anchor.
pub trait CursorAnchor {
    fn cursor_created_at(&self) -> DateTime<Utc>;
    fn cursor_id(&self) -> Uuid;
}

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    c: DateTime<Utc>,
    i: Uuid,
}

/// Encodes and verifies pagination cursors with an HMAC secret.
#[derive(Clone)]
pub struct CursorSigner {
    secret: Vec<u8>,
}

impl CursorSigner {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Create from `VULNSENTINEL_CURSOR_SECRET`, with a development
    /// fallback when unset.
    #[must_use]
    pub fn from_env() -> Self {
        let secret = std::env::var("VULNSENTINEL_CURSOR_SECRET")
            .unwrap_or_else(|_| "changeme-cursor-secret".to_string());
        Self::new(secret.into_bytes())
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(payload.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());
        digest[..SIG_LEN].to_string()
    }

    /// Encode `(created_at, id)` into a signed, URL-safe token.
    #[must_use]
    pub fn encode(&self, created_at: DateTime<Utc>, id: Uuid) -> String {
        let payload = serde_json::to_string(&CursorPayload { c: created_at, i: id })
            .unwrap_or_else(|_| unreachable!("cursor payload always serializes"));
        let sig = self.sign(&payload);
        URL_SAFE_NO_PAD.encode(format!("{payload}|{sig}"))
    }

    /// Decode a token back into a [`Cursor`].
    ///
    /// Returns [`StoreError::InvalidCursor`] for malformed or tampered
    /// tokens.
    pub fn decode(&self, token: &str) -> StoreResult<Cursor> {
        let invalid = || StoreError::InvalidCursor(token.to_string());

        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let raw = String::from_utf8(raw).map_err(|_| invalid())?;
        let (payload, sig) = raw.rsplit_once('|').ok_or_else(invalid)?;

        let expected = self.sign(payload);
        let ok: bool = expected.as_bytes().ct_eq(sig.as_bytes()).into();
        if !ok {
            return Err(StoreError::InvalidCursor(format!(
                "signature mismatch: {token}"
            )));
        }

        let payload: CursorPayload = serde_json::from_str(payload).map_err(|_| invalid())?;
        Ok(Cursor {
            created_at: payload.c,
            id: payload.i,
        })
    }

    /// Slice `page_size + 1` fetched rows into a [`Page`], computing the
    /// continuation token from the last returned row.
    #[must_use]
    pub fn build_page<T: CursorAnchor>(&self, mut rows: Vec<T>, page_size: i64) -> Page<T> {
        let page_size = page_size as usize;
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);

        let next_cursor = if has_more {
            rows.last()
                .map(|last| self.encode(last.cursor_created_at(), last.cursor_id()))
        } else {
            None
        };

        Page {
            data: rows,
            next_cursor,
            has_more,
        }
    }
}

/// Clamp a caller-supplied page size into the allowed range.
#[must_use]
pub fn clamp_page_size(page_size: i64) -> i64 {
    page_size.clamp(PAGE_SIZE_MIN, PAGE_SIZE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> CursorSigner {
        CursorSigner::new(b"test-secret".to_vec())
    }

    #[test]
    fn round_trips_timestamp_and_id() {
        let s = signer();
        let at = Utc::now();
        let id = Uuid::new_v4();

        let token = s.encode(at, id);
        let decoded = s.decode(&token).unwrap();

        assert_eq!(decoded.created_at, at);
        assert_eq!(decoded.id, id);
    }

    #[test]
    fn rejects_tampered_payload() {
        let s = signer();
        let token = s.encode(Utc::now(), Uuid::new_v4());

        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let mut raw = String::from_utf8(raw).unwrap();
        // Flip a character inside the JSON payload.
        raw.replace_range(5..6, "X");
        let tampered = URL_SAFE_NO_PAD.encode(raw);

        assert!(matches!(
            s.decode(&tampered),
            Err(StoreError::InvalidCursor(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        let s = signer();
        assert!(matches!(
            s.decode("not-a-cursor"),
            Err(StoreError::InvalidCursor(_))
        ));
        assert!(matches!(s.decode(""), Err(StoreError::InvalidCursor(_))));
    }

    #[test]
    fn rejects_cursor_from_other_secret() {
        let a = CursorSigner::new(b"secret-a".to_vec());
        let b = CursorSigner::new(b"secret-b".to_vec());
        let token = a.encode(Utc::now(), Uuid::new_v4());
        assert!(matches!(b.decode(&token), Err(StoreError::InvalidCursor(_))));
    }

    #[test]
    fn clamps_page_size() {
        assert_eq!(clamp_page_size(0), PAGE_SIZE_MIN);
        assert_eq!(clamp_page_size(20), 20);
        assert_eq!(clamp_page_size(5000), PAGE_SIZE_MAX);
    }

    struct Row {
        created_at: DateTime<Utc>,
        id: Uuid,
    }

    impl CursorAnchor for Row {
        fn cursor_created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
        fn cursor_id(&self) -> Uuid {
            self.id
        }
    }

    #[test]
    fn builds_page_with_continuation() {
        let s = signer();
        let rows: Vec<Row> = (0..4)
            .map(|_| Row {
                created_at: Utc::now(),
                id: Uuid::new_v4(),
            })
            .collect();
        let anchor = (rows[2].created_at, rows[2].id);

        let page = s.build_page(rows, 3);
        assert_eq!(page.data.len(), 3);
        assert!(page.has_more);

        let cur = s.decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!((cur.created_at, cur.id), anchor);
    }

    #[test]
    fn last_page_has_no_cursor() {
        let s = signer();
        let rows: Vec<Row> = (0..2)
            .map(|_| Row {
                created_at: Utc::now(),
                id: Uuid::new_v4(),
            })
            .collect();

        let page = s.build_page(rows, 3);
        assert_eq!(page.data.len(), 2);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }
}
