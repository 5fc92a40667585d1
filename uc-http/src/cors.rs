//! CORS middleware with Origin/Referer fallback and preflight handling.
//!
//! Unlike `tower_http::cors::CorsLayer`, a request that carries no `Origin`
//! header falls back to `Referer` before the origin is matched against the
//! configured allow-list — a workaround for older browsers that omit
//! `Origin` on same-origin-looking requests.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, Response, StatusCode, header};
use tower::{Layer, Service};

#[derive(Clone)]
pub struct CorsConfig {
    pub allow_origins: Arc<Vec<String>>,
    pub allow_methods: Arc<Vec<String>>,
    pub max_age: u64,
}

impl CorsConfig {
    pub fn new(allow_origins: Vec<String>, allow_methods: Vec<String>, max_age: u64) -> Self {
        Self {
            allow_origins: Arc::new(allow_origins),
            allow_methods: Arc::new(allow_methods),
            max_age,
        }
    }

    fn allows(&self, origin: &str) -> bool {
        self.allow_origins.iter().any(|o| o == "*" || o == origin)
    }

    fn allows_any(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }
}

#[derive(Clone)]
pub struct CorsLayer {
    config: CorsConfig,
}

impl CorsLayer {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CorsMiddleware<S> {
    inner: S,
    config: CorsConfig,
}

/// Origin header, falling back to Referer — a workaround for browsers that
/// omit `Origin` on some CORS requests.
fn request_origin(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(header::ORIGIN)
        .or_else(|| req.headers().get(header::REFERER))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn preflight_response(config: &CorsConfig, req: &Request<Body>) -> Response<Body> {
    let origin = request_origin(req);

    let allow_origin = match &origin {
        Some(o) if config.allows(o) => o.clone(),
        None if config.allows_any() => "*".to_string(),
        _ => {
            return Response::builder()
                .status(StatusCode::FORBIDDEN)
                .body(Body::empty())
                .unwrap();
        }
    };

    let requested_headers = req
        .headers()
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .and_then(|v| v.to_str().ok())
        .map(|h| format!("{h}, Origin"))
        .unwrap_or_else(|| "Origin".to_string());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin)
        .header(header::ACCESS_CONTROL_MAX_AGE, config.max_age.to_string())
        .header(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            config.allow_methods.join(", "),
        )
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, requested_headers);

    builder = builder.header(header::CONTENT_LENGTH, "0");
    builder.body(Body::empty()).unwrap()
}

fn apply_cors_headers(config: &CorsConfig, req_origin: Option<String>, resp: &mut Response<Body>) {
    let allow_origin = match &req_origin {
        Some(o) if config.allows(o) => Some(o.clone()),
        None if config.allows_any() => Some("*".to_string()),
        _ => None,
    };

    if let Some(origin) = allow_origin {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            resp.headers_mut()
                .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
}

impl<S> Service<Request<Body>> for CorsMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        if req.method() == Method::OPTIONS {
            let config = self.config.clone();
            return Box::pin(async move { Ok(preflight_response(&config, &req)) });
        }

        let config = self.config.clone();
        let origin = request_origin(&req);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut resp = inner.call(req).await?;
            apply_cors_headers(&config, origin, &mut resp);
            Ok(resp)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preflight_request(origin: &str, requested_headers: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/uc/power")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, requested_headers)
            .body(Body::empty())
            .unwrap()
    }

    /// Literal end-to-end scenario: `OPTIONS /uc/power` with an `Origin` and
    /// `Access-Control-Request-Headers`, allow-origins `*`.
    #[test]
    fn preflight_echoes_origin_and_advertises_methods() {
        let config = CorsConfig::new(
            vec!["*".to_string()],
            vec![
                "GET".to_string(),
                "PUT".to_string(),
                "POST".to_string(),
                "DELETE".to_string(),
            ],
            2700,
        );
        let req = preflight_request("http://a.example", "X-UCClientAuthorisation");
        let resp = preflight_response(&config, &req);

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://a.example"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET, PUT, POST, DELETE"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "X-UCClientAuthorisation, Origin"
        );
        assert_eq!(resp.headers().get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "2700");
    }

    #[test]
    fn preflight_rejects_origin_outside_allow_list() {
        let config = CorsConfig::new(vec!["http://b.example".to_string()], vec!["GET".to_string()], 60);
        let req = preflight_request("http://a.example", "X-UCClientAuthorisation");
        let resp = preflight_response(&config, &req);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn falls_back_to_referer_when_origin_absent() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/uc/power")
            .header(header::REFERER, "http://a.example/page")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_origin(&req), Some("http://a.example/page".to_string()));
    }

    #[test]
    fn apply_cors_headers_echoes_allowed_origin() {
        let config = CorsConfig::new(vec!["*".to_string()], vec!["GET".to_string()], 60);
        let mut resp = Response::builder().status(StatusCode::OK).body(Body::empty()).unwrap();
        apply_cors_headers(&config, Some("http://a.example".to_string()), &mut resp);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://a.example"
        );
    }

    #[test]
    fn apply_cors_headers_omits_header_for_disallowed_origin() {
        let config = CorsConfig::new(vec!["http://b.example".to_string()], vec!["GET".to_string()], 60);
        let mut resp = Response::builder().status(StatusCode::OK).body(Body::empty()).unwrap();
        apply_cors_headers(&config, Some("http://a.example".to_string()), &mut resp);
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
