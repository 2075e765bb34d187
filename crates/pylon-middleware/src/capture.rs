//! Response capture.
//!
//! [`CapturingBody`] sits between the handler's body and the client. Every
//! frame is forwarded unchanged and in order while data bytes are copied into
//! a capture buffer. The capture is handed to a completion callback exactly
//! once, on the poll after the last frame went out, so validation never holds
//! back bytes the client is waiting for.
//!
//! ```text
//! handler body ──frames──▶ CapturingBody ──same frames──▶ client
//!                               │
//!                               └─ at end-of-stream ──▶ on_complete(CapturedResponse)
//! ```

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Everything observed about a response once its body finished.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// Response status.
    pub status: StatusCode,
    /// Full response header map.
    pub headers: HeaderMap,
    /// Captured body bytes; empty when truncated.
    pub body: Bytes,
    /// Whether the capture limit was exceeded.
    pub truncated: bool,
}

impl CapturedResponse {
    /// Returns the body, or `None` when nothing was written.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        (!self.body.is_empty()).then_some(&self.body[..])
    }
}

/// Callback run with the capture at end-of-stream.
pub type OnComplete = Box<dyn FnOnce(CapturedResponse) + Send + Sync>;

/// A body wrapper that forwards frames and captures data bytes.
pub struct CapturingBody<B> {
    inner: B,
    status: StatusCode,
    headers: HeaderMap,
    buffer: BytesMut,
    limit: Option<usize>,
    truncated: bool,
    on_complete: Option<OnComplete>,
}

impl<B> CapturingBody<B> {
    /// Wraps `inner`, remembering the status and headers it was sent with.
    pub fn new(
        inner: B,
        status: StatusCode,
        headers: HeaderMap,
        limit: Option<usize>,
        on_complete: OnComplete,
    ) -> Self {
        Self {
            inner,
            status,
            headers,
            buffer: BytesMut::new(),
            limit,
            truncated: false,
            on_complete: Some(on_complete),
        }
    }

    fn capture(&mut self, data: &[u8]) {
        if self.truncated {
            return;
        }
        if let Some(limit) = self.limit {
            if self.buffer.len() + data.len() > limit {
                self.truncated = true;
                self.buffer = BytesMut::new();
                return;
            }
        }
        self.buffer.extend_from_slice(data);
    }

    fn complete(&mut self) {
        let Some(on_complete) = self.on_complete.take() else {
            return;
        };
        on_complete(CapturedResponse {
            status: self.status,
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.buffer).freeze(),
            truncated: self.truncated,
        });
    }
}

impl<B> Body for CapturingBody<B>
where
    B: Body + Unpin,
    B::Data: AsRef<[u8]>,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture(data.as_ref());
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                if this.on_complete.take().is_some() {
                    debug!(status = this.status.as_u16(), "response body failed; skipping validation");
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    // Stays open until the completion poll has run.
    fn is_end_stream(&self) -> bool {
        self.on_complete.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for CapturingBody<B> {
    fn drop(&mut self) {
        if self.on_complete.is_none() {
            return;
        }
        debug!(
            status = self.status.as_u16(),
            "response body dropped before completion; skipping validation"
        );
    }
}

/// Completes capture for bodies a server never polls because they report
/// end-of-stream up front (for example an empty body).
pub(crate) fn complete_if_finished<B: Body>(body: &mut CapturingBody<B>) {
    if body.inner.is_end_stream() {
        body.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{empty, full};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn sink() -> (Arc<Mutex<Vec<CapturedResponse>>>, OnComplete) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let clone = Arc::clone(&seen);
        (seen, Box::new(move |captured| clone.lock().push(captured)))
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        headers
    }

    /// Body yielding prepared chunks one frame at a time.
    struct Chunks(std::collections::VecDeque<Bytes>);

    impl Body for Chunks {
        type Data = Bytes;
        type Error = std::convert::Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
            Poll::Ready(self.0.pop_front().map(|chunk| Ok(Frame::data(chunk))))
        }
    }

    fn chunks(parts: &[&'static str]) -> Chunks {
        Chunks(parts.iter().map(|p| Bytes::from_static(p.as_bytes())).collect())
    }

    #[tokio::test]
    async fn test_forwards_bytes_and_captures_once() {
        let (seen, on_complete) = sink();
        let body = CapturingBody::new(
            full(r#"{"id":"a"}"#),
            StatusCode::OK,
            json_headers(),
            None,
            on_complete,
        );

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"id":"a"}"#);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].status, StatusCode::OK);
        assert_eq!(
            seen[0].headers.get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(seen[0].body(), Some(&br#"{"id":"a"}"#[..]));
        assert!(!seen[0].truncated);
    }

    #[tokio::test]
    async fn test_truncates_past_limit_but_forwards_everything() {
        let (seen, on_complete) = sink();
        let body = CapturingBody::new(
            full("0123456789"),
            StatusCode::OK,
            HeaderMap::new(),
            Some(4),
            on_complete,
        );

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"0123456789");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].truncated);
        assert!(seen[0].body().is_none());
    }

    #[tokio::test]
    async fn test_empty_body_completes_without_polling() {
        let (seen, on_complete) = sink();
        let mut body = CapturingBody::new(
            empty(),
            StatusCode::NO_CONTENT,
            HeaderMap::new(),
            None,
            on_complete,
        );
        complete_if_finished(&mut body);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].body().is_none());
    }

    #[tokio::test]
    async fn test_chunks_are_forwarded_in_order() {
        let (seen, on_complete) = sink();
        let body = CapturingBody::new(
            chunks(&[r#"{"id":"#, r#""a""#, "}"]),
            StatusCode::OK,
            json_headers(),
            None,
            on_complete,
        );

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"id":"a"}"#);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].body(), Some(&br#"{"id":"a"}"#[..]));
    }

    #[tokio::test]
    async fn test_completes_after_last_frame_is_delivered() {
        let (seen, on_complete) = sink();
        let mut body = CapturingBody::new(
            full(r#"{"id":"a"}"#),
            StatusCode::OK,
            json_headers(),
            None,
            on_complete,
        );

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(&frame.into_data().unwrap()[..], br#"{"id":"a"}"#);
        assert!(seen.lock().is_empty());
        assert!(!body.is_end_stream());

        assert!(body.frame().await.is_none());
        assert_eq!(seen.lock().len(), 1);
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_dropped_body_never_completes() {
        let (seen, on_complete) = sink();
        let body = CapturingBody::new(
            full("partial"),
            StatusCode::OK,
            HeaderMap::new(),
            None,
            on_complete,
        );
        drop(body);
        assert!(seen.lock().is_empty());
    }
}
