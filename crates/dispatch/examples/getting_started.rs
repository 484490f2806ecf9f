use http::header::{IF_NONE_MATCH, ETAG};
use http::{HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use micro_dispatch::interceptor::LoggingInterceptor;
use micro_dispatch::params::{ParamDescriptor, ParseIntPipe};
use micro_dispatch::router::{get, post};
use micro_dispatch::{Args, DispatchError, Dispatcher, Json, Request, ResponseBody, Router, VersioningStrategy, handler_fn};
use serde::Serialize;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Serialize, Debug)]
struct User {
    id: i64,
    name: String,
}

async fn get_user(args: Args) -> Result<Json<User>, DispatchError> {
    let id: i64 = args.parse("id")?;
    Ok(Json(User { id, name: format!("user-{id}") }))
}

async fn get_user_v2(args: Args) -> serde_json::Value {
    serde_json::json!({ "id": args.get("id"), "version": 2 })
}

async fn create_user(args: Args) -> (StatusCode, serde_json::Value) {
    (StatusCode::CREATED, serde_json::json!({ "created": args.get("name") }))
}

async fn print(label: &str, response: http::Response<ResponseBody>) {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
    info!(label, status = %parts.status, etag = ?parts.headers.get(ETAG), body = %String::from_utf8_lossy(&bytes));
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder()
        .global_prefix("/api")
        .versioning(VersioningStrategy::uri())
        .route("/users/:id", get(handler_fn(get_user)).neutral().param(ParamDescriptor::path("id").pipe(ParseIntPipe)))
        .route("/users/:id", get(handler_fn(get_user_v2)).version("2").param(ParamDescriptor::path("id")))
        .route("/users", post(handler_fn(create_user)).param(ParamDescriptor::body("name").key("name")))
        .build()
        .expect("routes are valid");

    let dispatcher = Dispatcher::builder()
        .router(router)
        .interceptor(LoggingInterceptor)
        .powered_by("micro-dispatch")
        .build()
        .expect("dispatcher is complete");

    let response = dispatcher.dispatch(Request::new(Method::GET, "/api/v1/users/7")).await;
    let etag = response.headers().get(ETAG).cloned();
    print("v1", response).await;

    print("v2", dispatcher.dispatch(Request::new(Method::GET, "/api/v2/users/7")).await).await;

    if let Some(etag) = etag {
        let request = Request::new(Method::GET, "/api/v1/users/7").with_header(IF_NONE_MATCH, etag);
        print("revalidate", dispatcher.dispatch(request).await).await;
    }

    let request = Request::new(Method::POST, "/api/users").with_body(serde_json::json!({ "name": "alice" }));
    print("create", dispatcher.dispatch(request).await).await;

    print("bad id", dispatcher.dispatch(Request::new(Method::GET, "/api/v1/users/abc")).await).await;
    print("missing", dispatcher.dispatch(Request::new(Method::GET, "/api/nothing")).await).await;

    let request = Request::new(Method::GET, "/api/v1/users/1").with_header(IF_NONE_MATCH, HeaderValue::from_static("*"));
    print("wildcard", dispatcher.dispatch(request).await).await;
}
