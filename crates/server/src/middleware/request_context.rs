use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use orp_core::context::RequestContext;

/// Injects a `RequestContext` as an axum Extension and stamps the response
/// with the resulting `X-Request-Id` (opaque, monotonic+random per §4.H).
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        });

    let ctx = RequestContext::new(client_ip);
    let request_id = ctx.request_id.clone();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
