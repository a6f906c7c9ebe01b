//! Response recorder
//!
//! Captures what a handler wrote: the status code (first write wins), the
//! number of body bytes and, for error statuses, the body text.

use axum::http::StatusCode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    bytes: usize,
    error_body: Option<String>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the status code. Only the first call (or the implicit `200` of
    /// a body write) counts.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    /// Record a chunk of body bytes.
    pub fn write(&mut self, chunk: &[u8]) {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }

        self.bytes += chunk.len();

        // On error the body is an error message.
        if self.is_error() && !chunk.is_empty() {
            self.error_body
                .get_or_insert_with(String::new)
                .push_str(&String::from_utf8_lossy(chunk));
        }
    }

    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    /// Recorded status code, `0` when nothing was written.
    pub fn status_code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }

    pub fn is_error(&self) -> bool {
        self.status_code() >= 400
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    pub fn error_body(&self) -> Option<&str> {
        self.error_body.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_status_wins() {
        let mut rec = ResponseRecorder::new();
        rec.write_header(StatusCode::NOT_FOUND);
        rec.write_header(StatusCode::OK);
        rec.write(b"gone");
        assert_eq!(rec.status_code(), 404);
        assert_eq!(rec.bytes_written(), 4);
    }

    #[test]
    fn test_body_write_implies_ok() {
        let mut rec = ResponseRecorder::new();
        assert!(!rec.is_written());
        rec.write(b"{}");
        rec.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rec.status_code(), 200);
        assert_eq!(rec.error_body(), None);
    }

    #[test]
    fn test_byte_count_sums_chunks() {
        let mut rec = ResponseRecorder::new();
        for chunk in [&b"abc"[..], b"", b"defgh"] {
            rec.write(chunk);
        }
        assert_eq!(rec.bytes_written(), 8);
    }

    #[test]
    fn test_error_body_captured() {
        let mut rec = ResponseRecorder::new();
        rec.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rec.error_body(), None);
        rec.write(b"failed to dial ");
        rec.write(b"metal client");
        assert_eq!(rec.error_body(), Some("failed to dial metal client"));
    }

    #[test]
    fn test_nothing_written() {
        let rec = ResponseRecorder::new();
        assert_eq!(rec.status_code(), 0);
        assert!(!rec.is_error());
    }
}
