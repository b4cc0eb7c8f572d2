//! axum bridge: HTTP requests in, `WebCommand`s dispatched, responses out.
//!
//! The action is the request path below the router's mount point, without
//! surrounding slashes (`/users/list` mounted at `/users` → `list`). Dispatch
//! runs on the blocking pool because processors are synchronous.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRequest, Query, Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use sparks_core::properties::SERVER_NAME_PROPERTY;
use sparks_infra::ApplicationContext;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::command::WebCommand;
use crate::errors::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// `Server` header value when `serverName` is not configured.
pub const DEFAULT_SERVER_NAME: &str = "sparks";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Build a router that sends every request to `context`.
///
/// Nest it to mount under a prefix: `Router::new().nest("/app", router(context))`.
pub fn router(context: Arc<ApplicationContext>) -> Router {
    Router::new()
        .fallback(handle)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(context)
}

/// Serve `context` on `listener` until the server fails.
pub async fn serve(listener: TcpListener, context: Arc<ApplicationContext>) -> Result<(), TransportError> {
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(context)).await?;
    Ok(())
}

async fn handle(State(context): State<Arc<ApplicationContext>>, request: Request) -> Response {
    let mut response = match dispatch(Arc::clone(&context), request).await {
        Ok(response) => response.into_response(),
        Err(error) => {
            warn!(error = %error, "request failed outside the action router");
            error.into_response()
        }
    };
    stamp_headers(&context, response.headers_mut());
    response
}

async fn dispatch(
    context: Arc<ApplicationContext>,
    request: Request,
) -> Result<HttpResponse, TransportError> {
    let command = into_command(request).await?;
    debug!(
        action = command.action(),
        request_id = %command.request().id(),
        "dispatching web command"
    );
    let response = tokio::task::spawn_blocking(move || context.process_command(command)).await??;
    Ok(response)
}

async fn into_command(request: Request) -> Result<WebCommand, TransportError> {
    let Query(parameters) = Query::<BTreeMap<String, String>>::try_from_uri(request.uri())?;
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let headers = request.headers().clone();
    // Honors the `DefaultBodyLimit` layer; oversized bodies reject with 413.
    let body = Bytes::from_request(request, &()).await?;

    let action = path.trim_matches('/').to_string();
    let request = HttpRequest::new(method, path)
        .with_parameters(parameters)
        .with_headers(headers)
        .with_body(body.to_vec());
    Ok(WebCommand::new(action, request))
}

/// Add `Date` and `Server` unless the processor already set them.
fn stamp_headers(context: &ApplicationContext, headers: &mut HeaderMap) {
    let date = Utc::now().format(HTTP_DATE_FORMAT).to_string();
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.entry(header::DATE).or_insert(value);
    }

    let server = context
        .property(SERVER_NAME_PROPERTY)
        .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());
    if let Ok(value) = HeaderValue::from_str(&server) {
        headers.entry(header::SERVER).or_insert(value);
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let (status, headers, body) = self.into_parts();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}
