use crate::body::ResponseBody;
use crate::responder::{HandlerResult, Reply, Responder};
use crate::response::ResponseModel;
use bytes::Bytes;
use futures::channel::mpsc::{SendError, channel};
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http::{HeaderValue, Response};
use std::fmt::Write;
use std::time::Duration;

#[derive(Debug)]
pub struct SseStream<S> {
    stream: S,
}

#[derive(Debug)]
pub struct SseEmitter<S> {
    sink: S,
}

impl<S> SseStream<S>
where
    S: Stream<Item = Event>,
{
    pub fn new(stream: S) -> Self {
        SseStream { stream }
    }
}

impl<S> SseEmitter<S>
where
    S: Sink<Event, Error = SendError>,
{
    fn new(sink: S) -> Self {
        SseEmitter { sink }
    }
}

impl<S> SseEmitter<S>
where
    S: Sink<Event, Error = SendError> + Unpin,
{
    pub async fn send(&mut self, event: Event) -> Result<(), SendError> {
        self.sink.send(event).await
    }

    pub async fn close(&mut self) -> Result<(), SendError> {
        self.sink.close().await
    }
}

/// Creates a bounded channel whose receiving half can be returned from an SSE handler
/// while the emitter keeps producing events from another task.
pub fn build_sse_stream_emitter(
    buffer: usize,
) -> (SseStream<impl Stream<Item = Event> + Send + 'static>, SseEmitter<impl Sink<Event, Error = SendError> + Unpin>) {
    let (sender, receiver) = channel::<Event>(buffer);
    (SseStream::new(receiver), SseEmitter::new(sender))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Retry(Duration),
    Message(Message),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    // https://html.spec.whatwg.org/multipage/server-sent-events.html#concept-event-stream-last-event-id
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl Event {
    pub fn message(data: impl Into<String>, id: Option<String>, event: Option<String>) -> Event {
        Event::Message(Message { id, event, data: data.into() })
    }

    pub fn from_data(data: impl Into<String>) -> Event {
        Event::Message(Message { id: None, event: None, data: data.into() })
    }

    pub fn retry(duration: impl Into<Duration>) -> Event {
        Event::Retry(duration.into())
    }

    /// Encodes the event as one `text/event-stream` frame, terminated by a blank line.
    pub fn to_frame(&self) -> Bytes {
        match self {
            Event::Message(Message { id, event, data }) => {
                let mut frame = String::with_capacity(data.len() + 16);

                if let Some(i) = id {
                    let _ = writeln!(frame, "id: {i}");
                }

                if let Some(e) = event {
                    let _ = writeln!(frame, "event: {e}");
                }

                if data.is_empty() {
                    frame.push_str("data: \n");
                }
                for line in data.lines() {
                    let _ = writeln!(frame, "data: {line}");
                }

                frame.push('\n');
                Bytes::from(frame)
            }
            Event::Retry(duration) => Bytes::from(format!("retry: {}\n\n", duration.as_millis())),
        }
    }
}

impl<S> Responder for SseStream<S>
where
    S: Stream<Item = Event> + Send + 'static,
{
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Events(self.stream.boxed()))
    }
}

/// Builds the streaming response around the status and headers accumulated in `model`.
pub(crate) fn sse_response(mut model: ResponseModel, events: BoxStream<'static, Event>) -> Response<ResponseBody> {
    let headers = model.headers_mut();
    headers.reserve(16);
    headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(http::header::CONNECTION, HeaderValue::from_static("keep-alive"));
    model.set_content_type(mime::TEXT_EVENT_STREAM);

    let body = ResponseBody::from_chunks(events.map(|event| event.to_frame()));
    model.into_response_with_body(body)
}
