use crate::error::CoTeacherError;
use crate::llm::traits::StreamEvent;
use futures::channel::mpsc;
use futures::{ready, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Lazy sequence of reply fragments.
///
/// Yields each non-empty text fragment in arrival order and ends when the
/// upstream stream closes. An upstream error is yielded once as
/// `ModelUnavailable` and ends the sequence. Dropping the stream cancels the
/// upstream request. Not restartable: issue a new request to regenerate.
pub struct ReplyStream {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    finished: bool,
    _cancel_on_drop: DropGuard,
}

impl ReplyStream {
    pub fn new(events: mpsc::UnboundedReceiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            events,
            finished: false,
            _cancel_on_drop: cancel.drop_guard(),
        }
    }

    /// Drain the stream, feeding every fragment to `on_fragment`, and return
    /// the concatenated reply.
    pub async fn read_to_end(
        mut self,
        mut on_fragment: impl FnMut(&str),
    ) -> Result<String, CoTeacherError> {
        let mut reply = String::new();
        while let Some(fragment) = self.next().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            reply.push_str(&fragment);
        }
        Ok(reply)
    }
}

impl Stream for ReplyStream {
    type Item = Result<String, CoTeacherError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            match ready!(self.events.poll_next_unpin(cx)) {
                Some(StreamEvent::TextDelta(text)) if !text.is_empty() => {
                    return Poll::Ready(Some(Ok(text)));
                }
                Some(StreamEvent::TextDelta(_)) => continue,
                Some(StreamEvent::Error(message)) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(CoTeacherError::ModelUnavailable(message))));
                }
                Some(StreamEvent::Done) | None => {
                    self.finished = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}
