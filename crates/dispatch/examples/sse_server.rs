use futures::Stream;
use http::Method;
use http_body_util::BodyExt;
use micro_dispatch::router::{Router, get};
use micro_dispatch::{Args, Dispatcher, Event, Request, SseStream, build_sse_stream_emitter, handler_fn};
use std::time::Duration;

async fn sse_process(_args: Args) -> SseStream<impl Stream<Item = Event> + Send + 'static> {
    let (stream, mut emitter) = build_sse_stream_emitter(2);

    tokio::spawn(async move {
        let _ = emitter.send(Event::retry(Duration::from_secs(3))).await;
        for i in 0..5 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = emitter.send(Event::message(format!("tick {i}"), Some(i.to_string()), Some("tick".into()))).await;
        }

        let _ = emitter.close().await;
    });

    stream
}

#[tokio::main]
async fn main() {
    let router = Router::builder().route("/sse", get(handler_fn(sse_process)).sse()).build().expect("routes are valid");
    let dispatcher = Dispatcher::builder().router(router).build().expect("dispatcher is complete");

    let response = dispatcher.dispatch(Request::new(Method::GET, "/sse")).await;
    println!("{:?}", response.headers());

    let mut body = response.into_body();
    while let Some(Ok(frame)) = body.frame().await {
        if let Ok(data) = frame.into_data() {
            print!("{}", String::from_utf8_lossy(&data));
        }
    }
}
