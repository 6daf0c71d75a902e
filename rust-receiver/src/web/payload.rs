//! Bounded request body reader.
//!
//! Reads at most `max_bytes` of a body. An over-limit body is abandoned as
//! soon as it is detected, so memory use never depends on how much the
//! sender actually transmits.

use axum::body::{Body, Bytes};
use futures::StreamExt;
use thiserror::Error;

/// Result of reading a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadRead {
    /// A non-empty body, exactly as received.
    Ok(Bytes),
    /// Nothing but whitespace.
    Empty,
    /// Body exceeded the limit; reading stopped.
    TooLarge { limit: usize },
}

/// The body could not be read at the transport level.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to read request body: {0}")]
    Unreadable(String),
}

/// Read a request body up to `max_bytes`.
///
/// `content_length` is the declared length, when the sender supplied one. A
/// declared length over the limit is refused before any of the body is read.
pub async fn read_payload(
    body: Body,
    content_length: Option<u64>,
    max_bytes: usize,
) -> Result<PayloadRead, PayloadError> {
    if let Some(declared) = content_length {
        if declared > max_bytes as u64 {
            return Ok(PayloadRead::TooLarge { limit: max_bytes });
        }
    }

    let capacity = content_length
        .map(|len| len as usize)
        .unwrap_or(0)
        .min(max_bytes);
    let mut buf = Vec::with_capacity(capacity);

    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PayloadError::Unreadable(e.to_string()))?;
        if buf.len() + chunk.len() > max_bytes {
            return Ok(PayloadRead::TooLarge { limit: max_bytes });
        }
        buf.extend_from_slice(&chunk);
    }

    if buf.iter().all(u8::is_ascii_whitespace) {
        return Ok(PayloadRead::Empty);
    }

    Ok(PayloadRead::Ok(Bytes::from(buf)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn test_reads_body_verbatim() {
        let raw = b"{\"event\":\"ping\"}".to_vec();
        let result = read_payload(Body::from(raw.clone()), Some(raw.len() as u64), 1024)
            .await
            .unwrap();
        assert_eq!(result, PayloadRead::Ok(Bytes::from(raw)));
    }

    #[tokio::test]
    async fn test_surrounding_whitespace_is_preserved() {
        let result = read_payload(Body::from(" x \n"), None, 1024).await.unwrap();
        assert_eq!(result, PayloadRead::Ok(Bytes::from_static(b" x \n")));
    }

    #[tokio::test]
    async fn test_empty_and_blank_bodies() {
        assert_eq!(
            read_payload(Body::empty(), None, 1024).await.unwrap(),
            PayloadRead::Empty
        );
        assert_eq!(
            read_payload(Body::from(" \r\n\t"), None, 1024).await.unwrap(),
            PayloadRead::Empty
        );
    }

    #[tokio::test]
    async fn test_exactly_at_limit_is_accepted() {
        let result = read_payload(Body::from(vec![b'a'; 16]), Some(16), 16)
            .await
            .unwrap();
        assert!(matches!(result, PayloadRead::Ok(bytes) if bytes.len() == 16));
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_rejected_without_reading() {
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polled);
        let chunks = stream::iter(0..4).map(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(Bytes::from_static(b"xxxx"))
        });

        let result = read_payload(Body::from_stream(chunks), Some(10 * 1024 * 1024), 1024)
            .await
            .unwrap();

        assert_eq!(result, PayloadRead::TooLarge { limit: 1024 });
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit_stops_early() {
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polled);
        // 10MB worth of 64KB chunks against a 1MB limit.
        let chunks = stream::iter(0..160).map(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(Bytes::from(vec![b'z'; 64 * 1024]))
        });

        let result = read_payload(Body::from_stream(chunks), None, 1024 * 1024)
            .await
            .unwrap();

        assert_eq!(result, PayloadRead::TooLarge { limit: 1024 * 1024 });
        // 16 chunks fill the limit exactly; the 17th trips it.
        assert_eq!(polled.load(Ordering::SeqCst), 17);
    }

    #[tokio::test]
    async fn test_transport_error_is_unreadable() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);

        let result = read_payload(Body::from_stream(chunks), None, 1024).await;
        assert!(matches!(result, Err(PayloadError::Unreadable(_))));
    }
}
