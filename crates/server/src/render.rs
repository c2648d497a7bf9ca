//! Relay to the front-end rendering server.
//!
//! Every path the router does not own (pages, `_next` assets) is forwarded to
//! `RENDER_ORIGIN` with its method, path, query, headers and body; the
//! response is streamed back unchanged apart from hop-by-hop headers.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderName, header},
    response::Response,
};
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Rendering server failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("rendering server unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
}

/// Forwards requests to the rendering server.
#[derive(Clone)]
pub struct RenderProxy {
    client: reqwest::Client,
    origin: String,
}

impl RenderProxy {
    /// Create a proxy for `origin`.
    ///
    /// Redirects from the rendering server are relayed, not followed.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` if the HTTP client cannot be built.
    pub fn new(origin: &Url) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            origin: origin.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Forward `request` and stream back the response.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Unreachable` if no response arrives.
    #[instrument(skip(self, request), fields(path = %request.uri().path()))]
    pub async fn forward(&self, request: Request) -> Result<Response, RenderError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let url = format!("{}{path_and_query}", self.origin);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "text/html");
    }

    #[test]
    fn test_origin_trailing_slash_trimmed() {
        let proxy = RenderProxy::new(&Url::parse("http://127.0.0.1:3000/").unwrap()).unwrap();
        assert_eq!(proxy.origin, "http://127.0.0.1:3000");
    }
}
