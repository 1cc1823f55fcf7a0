//! Upload transport over HTTP (libcurl on blocking worker threads).
//!
//! Endpoints, relative to the configured base URL:
//! - `POST sessions` with `{"total_size", "nonce"}` → `{"session_id", "max_part_size"?}`
//! - `PUT sessions/{id}/parts` with `Content-Range: bytes s-e/t` → `{"ordinal", "etag"?}`
//! - `GET sessions/{id}/parts?page=P&page_size=N` → `{"parts": [...], "has_more"?}`
//! - `POST sessions/{id}/complete`

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TransportError;

use super::plan::ContentRange;
use super::session::SessionId;
use super::transport::{PartAck, PartPage, SessionGrant, UploadTransport};

/// HTTP implementation of [`UploadTransport`].
#[derive(Debug, Clone)]
pub struct HttpUploadTransport {
    base: Url,
    extra_headers: Vec<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct BeginRequest<'a> {
    total_size: u64,
    nonce: &'a str,
}

#[derive(Deserialize)]
struct BeginResponse {
    session_id: String,
    #[serde(default)]
    max_part_size: Option<u64>,
}

#[derive(Deserialize)]
struct ListResponse {
    parts: Vec<PartAck>,
    #[serde(default)]
    has_more: Option<bool>,
}

struct HttpRequest {
    method: &'static str,
    url: Url,
    headers: Vec<String>,
    body: Option<Vec<u8>>,
    connect_timeout: Duration,
    timeout: Duration,
}

struct HttpResponse {
    code: u32,
    body: Vec<u8>,
}

impl HttpUploadTransport {
    /// Transport rooted at `endpoint` (a trailing `/` is added if missing).
    pub fn new(endpoint: &str) -> Result<Self, url::ParseError> {
        let mut base = endpoint.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            base: Url::parse(&base)?,
            extra_headers: Vec::new(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(600),
        })
    }

    /// Add a header sent with every request (e.g. a credential supplied by the caller).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers
            .push(format!("{}: {}", name.trim(), value.trim()));
        self
    }

    /// Hard per-request timeout; parts are large, so keep this generous.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Rejected(format!("invalid request path {}: {}", path, e)))
    }

    fn session_url(&self, session: &SessionId, suffix: &str) -> Result<Url, TransportError> {
        let mut url = self.url("sessions/")?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Rejected("endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .push(session.as_str());
        if !suffix.is_empty() {
            url.path_segments_mut()
                .map_err(|_| TransportError::Rejected("endpoint cannot be a base URL".into()))?
                .push(suffix);
        }
        Ok(url)
    }

    fn list_url(
        &self,
        session: &SessionId,
        page_index: u32,
        page_size: u32,
    ) -> Result<Url, TransportError> {
        let mut url = self.session_url(session, "parts")?;
        url.query_pairs_mut()
            .append_pair("page", &page_index.to_string())
            .append_pair("page_size", &page_size.to_string());
        Ok(url)
    }

    fn request(&self, method: &'static str, url: Url, body: Option<(Vec<u8>, &str)>) -> HttpRequest {
        let mut headers = self.extra_headers.clone();
        let body = body.map(|(bytes, content_type)| {
            headers.push(format!("Content-Type: {}", content_type));
            bytes
        });
        HttpRequest {
            method,
            url,
            headers,
            body,
            connect_timeout: self.connect_timeout,
            timeout: self.request_timeout,
        }
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = req.method;
        let url = req.url.clone();
        let resp = tokio::task::spawn_blocking(move || perform(req))
            .await
            .map_err(|e| TransportError::Failure(format!("request task failed: {}", e)))??;
        tracing::trace!(method, %url, code = resp.code, "upload transport response");
        classify_status(resp.code, &resp.body)?;
        Ok(resp)
    }
}

fn curl_failure(e: curl::Error) -> TransportError {
    TransportError::Failure(format!("curl: {}", e))
}

/// Map an HTTP status to the transport taxonomy. Client errors that mean the
/// session or range is unusable are rejections; everything else is transient.
pub(crate) fn classify_status(code: u32, body: &[u8]) -> Result<(), TransportError> {
    if (200..300).contains(&code) {
        return Ok(());
    }
    let detail = String::from_utf8_lossy(&body[..body.len().min(200)]).trim().to_string();
    let msg = if detail.is_empty() {
        format!("HTTP {}", code)
    } else {
        format!("HTTP {}: {}", code, detail)
    };
    match code {
        400 | 403 | 404 | 409 | 410 | 412 | 416 | 422 => Err(TransportError::Rejected(msg)),
        _ => Err(TransportError::Failure(msg)),
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(body)
        .map_err(|e| TransportError::Failure(format!("malformed response body: {}", e)))
}

/// Runs one request to completion on the current (blocking) thread.
fn perform(req: HttpRequest) -> Result<HttpResponse, TransportError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(req.url.as_str()).map_err(curl_failure)?;
    easy.connect_timeout(req.connect_timeout).map_err(curl_failure)?;
    easy.timeout(req.timeout).map_err(curl_failure)?;

    let mut list = curl::easy::List::new();
    for h in &req.headers {
        list.append(h).map_err(curl_failure)?;
    }
    match &req.body {
        Some(body) => {
            easy.post(true).map_err(curl_failure)?;
            easy.post_fields_copy(body).map_err(curl_failure)?;
            if req.method != "POST" {
                easy.custom_request(req.method).map_err(curl_failure)?;
            }
        }
        None if req.method == "GET" => easy.get(true).map_err(curl_failure)?,
        None => {
            easy.post(true).map_err(curl_failure)?;
            easy.post_fields_copy(&[]).map_err(curl_failure)?;
            if req.method != "POST" {
                easy.custom_request(req.method).map_err(curl_failure)?;
            }
        }
    }
    easy.http_headers(list).map_err(curl_failure)?;

    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_failure)?;
        transfer.perform().map_err(curl_failure)?;
    }
    let code = easy.response_code().map_err(curl_failure)?;
    Ok(HttpResponse { code, body })
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn begin_session(
        &self,
        total_size: u64,
        nonce: &str,
    ) -> Result<SessionGrant, TransportError> {
        let payload = serde_json::to_vec(&BeginRequest { total_size, nonce })
            .map_err(|e| TransportError::Rejected(format!("encode begin request: {}", e)))?;
        let url = self.url("sessions")?;
        let resp = self
            .send(self.request("POST", url, Some((payload, "application/json"))))
            .await?;
        let begin: BeginResponse = decode(&resp.body)?;
        Ok(SessionGrant {
            session_id: SessionId::new(begin.session_id),
            max_part_size: begin.max_part_size,
        })
    }

    async fn upload_part(
        &self,
        session: &SessionId,
        range: ContentRange,
        body: Vec<u8>,
    ) -> Result<PartAck, TransportError> {
        let url = self.session_url(session, "parts")?;
        let mut req = self.request("PUT", url, Some((body, "application/octet-stream")));
        req.headers.push(format!("Content-Range: {}", range));
        let resp = self.send(req).await?;
        decode(&resp.body)
    }

    async fn list_parts(
        &self,
        session: &SessionId,
        page_index: u32,
        page_size: u32,
    ) -> Result<PartPage, TransportError> {
        let url = self.list_url(session, page_index, page_size)?;
        let resp = self.send(self.request("GET", url, None)).await?;
        let list: ListResponse = decode(&resp.body)?;
        Ok(PartPage {
            parts: list.parts,
            has_more: list.has_more,
        })
    }

    async fn complete_session(&self, session: &SessionId) -> Result<(), TransportError> {
        let url = self.session_url(session, "complete")?;
        self.send(self.request("POST", url, None)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_under_endpoint() {
        let t = HttpUploadTransport::new("https://mods.example.com/api/v1").unwrap();
        assert_eq!(t.endpoint().as_str(), "https://mods.example.com/api/v1/");
        let id = SessionId::new("abc 123");
        assert_eq!(
            t.session_url(&id, "parts").unwrap().as_str(),
            "https://mods.example.com/api/v1/sessions/abc%20123/parts"
        );
        assert_eq!(
            t.session_url(&id, "").unwrap().as_str(),
            "https://mods.example.com/api/v1/sessions/abc%20123"
        );
        assert_eq!(
            t.list_url(&id, 2, 50).unwrap().as_str(),
            "https://mods.example.com/api/v1/sessions/abc%20123/parts?page=2&page_size=50"
        );
    }

    #[test]
    fn session_id_cannot_escape_path() {
        let t = HttpUploadTransport::new("http://127.0.0.1:9/").unwrap();
        let url = t
            .session_url(&SessionId::new("../admin"), "complete")
            .unwrap();
        assert_eq!(url.path(), "/sessions/..%2Fadmin/complete");
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(200, b"").is_ok());
        assert!(classify_status(204, b"").is_ok());
        assert!(matches!(
            classify_status(404, b"no such session"),
            Err(TransportError::Rejected(m)) if m.contains("no such session")
        ));
        assert!(matches!(classify_status(410, b""), Err(TransportError::Rejected(_))));
        assert!(matches!(classify_status(500, b""), Err(TransportError::Failure(_))));
        assert!(matches!(classify_status(503, b""), Err(TransportError::Failure(_))));
        assert!(matches!(classify_status(429, b""), Err(TransportError::Failure(_))));
        assert!(matches!(classify_status(408, b""), Err(TransportError::Failure(_))));
    }

    #[test]
    fn status_table() {
        for code in [400, 403, 404, 409, 410, 412, 416, 422] {
            assert!(
                matches!(classify_status(code, b""), Err(TransportError::Rejected(_))),
                "{} should be a rejection",
                code
            );
        }
        for code in [401, 405, 408, 413, 425, 429, 500, 502, 503, 504, 301] {
            assert!(
                matches!(classify_status(code, b""), Err(TransportError::Failure(_))),
                "{} should be a transient failure",
                code
            );
        }
        for code in [200, 201, 202, 206, 299] {
            assert!(classify_status(code, b"").is_ok(), "{}", code);
        }
    }

    #[test]
    fn list_response_decodes_with_optional_fields() {
        let list: ListResponse =
            decode(br#"{"parts":[{"ordinal":0,"etag":"a"},{"ordinal":1}]}"#).unwrap();
        assert_eq!(list.parts.len(), 2);
        assert_eq!(list.parts[1].etag, None);
        assert_eq!(list.has_more, None);
        let begin: BeginResponse = decode(br#"{"session_id":"s1"}"#).unwrap();
        assert_eq!(begin.session_id, "s1");
        assert!(begin.max_part_size.is_none());
        assert!(decode::<BeginResponse>(b"not json").is_err());
    }
}
