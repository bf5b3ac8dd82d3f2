use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc;
use http_body::{Body as HttpBody, Frame};
use http_body_util::BodyExt;
use loopbridge_protocol::query::{QueryParams, decode_query_with_limit};
use serde::de::DeserializeOwned;

use crate::abort::AbortFlag;
use crate::error::BodyError;

pub(crate) type ChunkReceiver = mpsc::UnboundedReceiver<(Bytes, bool)>;

/// The request body, fed chunk by chunk from the engine's data callback.
///
/// Obtained through [`Response::body`](crate::Response::body). The stream ends after the chunk
/// flagged as last; it fails with [`BodyError::Aborted`] if the connection goes away first and
/// with [`BodyError::TooLarge`] once more than the configured number of bytes arrived.
pub struct RequestBody {
    receiver: ChunkReceiver,
    aborted: AbortFlag,
    limit: usize,
    form_limit: usize,
    received: usize,
    done: bool,
}

impl RequestBody {
    pub(crate) fn new(receiver: ChunkReceiver, aborted: AbortFlag, limit: usize, form_limit: usize) -> Self {
        Self { receiver, aborted, limit, form_limit, received: 0, done: false }
    }

    /// Collects the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::Aborted`] or [`BodyError::TooLarge`] as described on the type.
    pub async fn bytes(self) -> Result<Bytes, BodyError> {
        Ok(self.collect().await?.to_bytes())
    }

    /// Collects the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::InvalidUtf8`] in addition to the failures of [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, BodyError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.into()).map_err(|_e| BodyError::InvalidUtf8)
    }

    /// Collects the body and deserializes it as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::Json`] in addition to the failures of [`bytes`](Self::bytes).
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, BodyError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Collects the body and decodes it as `application/x-www-form-urlencoded`, with the same
    /// decoder and parameter limit as query strings.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::Form`] if the parameter limit is exceeded, in addition to the
    /// failures of [`text`](Self::text).
    pub async fn form(self) -> Result<QueryParams, BodyError> {
        let limit = self.form_limit;
        let text = self.text().await?;
        Ok(decode_query_with_limit(&text, limit)?)
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<(Bytes, bool)>> {
        if let Poll::Ready(next) = self.receiver.poll_next_unpin(cx) {
            return Poll::Ready(next);
        }

        self.aborted.register(cx.waker());
        if !self.aborted.is_set() {
            return Poll::Pending;
        }

        // the flag is set, so the data callback will not send again; drain what is queued
        match self.receiver.poll_next_unpin(cx) {
            Poll::Ready(next) => Poll::Ready(next),
            Poll::Pending => Poll::Ready(None),
        }
    }

    fn fail(&mut self, error: BodyError) -> Poll<Option<Result<Frame<Bytes>, BodyError>>> {
        self.done = true;
        self.receiver.close();
        Poll::Ready(Some(Err(error)))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody")
            .field("limit", &self.limit)
            .field("received", &self.received)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl HttpBody for RequestBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            if this.done {
                return Poll::Ready(None);
            }

            let Some((chunk, is_last)) = std::task::ready!(this.poll_chunk(cx)) else {
                return this.fail(BodyError::Aborted);
            };

            this.received = this.received.saturating_add(chunk.len());
            if this.received > this.limit {
                return this.fail(BodyError::too_large(this.limit));
            }

            if is_last {
                this.done = true;
            }

            if !chunk.is_empty() {
                return Poll::Ready(Some(Ok(Frame::data(chunk))));
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }
}
