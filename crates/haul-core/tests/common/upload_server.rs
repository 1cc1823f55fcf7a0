//! Minimal HTTP/1.1 upload service for exercising `HttpUploadTransport`.
//!
//! Routes (under `/api/`): `POST sessions`, `PUT sessions/{id}/parts`,
//! `GET sessions/{id}/parts?page=&page_size=`, `POST sessions/{id}/complete`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Session {
    total: u64,
    parts: Vec<Vec<u8>>,
    completed: bool,
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, Session>,
    next_id: u64,
    /// Answer the next part upload with 503.
    unavailable_once: bool,
}

#[derive(Clone)]
pub struct UploadServer {
    pub endpoint: String,
    state: Arc<Mutex<State>>,
    max_part_size: Option<u64>,
}

impl UploadServer {
    pub fn assembled(&self, id: &str) -> Vec<u8> {
        self.state.lock().unwrap().sessions[id].parts.concat()
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.state.lock().unwrap().sessions[id].completed
    }

    pub fn fail_next_part(&self) {
        self.state.lock().unwrap().unavailable_once = true;
    }
}

/// Starts the server; `max_part_size` is dictated to clients when set.
pub fn start(max_part_size: Option<u64>) -> UploadServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = UploadServer {
        endpoint: format!("http://127.0.0.1:{}/api", port),
        state: Arc::new(Mutex::new(State::default())),
        max_part_size,
    };
    let shared = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = shared.clone();
            thread::spawn(move || handle(stream, &shared));
        }
    });
    server
}

struct Request {
    method: String,
    path: String,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let head_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let len: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if headers
        .get("expect")
        .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    {
        stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").ok()?;
    }
    let mut body = data[head_end..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&buf[..n]);
    }

    let (path, q) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let query = q
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Some(Request {
        method,
        path: path.to_string(),
        query,
        headers,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let resp = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(resp.as_bytes());
}

fn handle(mut stream: TcpStream, server: &UploadServer) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let segments: Vec<&str> = req
        .path
        .trim_start_matches("/api/")
        .split('/')
        .collect();
    let mut st = server.state.lock().unwrap();
    match (req.method.as_str(), segments.as_slice()) {
        ("POST", ["sessions"]) => {
            let v: serde_json::Value = match serde_json::from_slice(&req.body) {
                Ok(v) => v,
                Err(_) => return respond(&mut stream, "400 Bad Request", "bad json"),
            };
            let total = v["total_size"].as_u64().unwrap_or(0);
            st.next_id += 1;
            let id = format!("h-{}", st.next_id);
            st.sessions.insert(
                id.clone(),
                Session {
                    total,
                    ..Session::default()
                },
            );
            let body = match server.max_part_size {
                Some(m) => serde_json::json!({ "session_id": id, "max_part_size": m }),
                None => serde_json::json!({ "session_id": id }),
            };
            respond(&mut stream, "200 OK", &body.to_string());
        }
        ("PUT", ["sessions", id, "parts"]) => {
            if st.unavailable_once {
                st.unavailable_once = false;
                return respond(&mut stream, "503 Service Unavailable", "busy");
            }
            let Some(s) = st.sessions.get_mut(*id) else {
                return respond(&mut stream, "404 Not Found", "no such session");
            };
            let expected: u64 = s.parts.iter().map(|p| p.len() as u64).sum();
            let range = req.headers.get("content-range").cloned().unwrap_or_default();
            let want = format!(
                "bytes {}-{}/{}",
                expected,
                expected + req.body.len() as u64 - 1,
                s.total
            );
            if range != want {
                return respond(&mut stream, "409 Conflict", &format!("expected {}", want));
            }
            let ordinal = s.parts.len();
            s.parts.push(req.body);
            respond(
                &mut stream,
                "200 OK",
                &serde_json::json!({ "ordinal": ordinal, "etag": format!("e{}", ordinal) })
                    .to_string(),
            );
        }
        ("GET", ["sessions", id, "parts"]) => {
            let Some(s) = st.sessions.get(*id) else {
                return respond(&mut stream, "404 Not Found", "no such session");
            };
            let page: usize = req.query.get("page").and_then(|v| v.parse().ok()).unwrap_or(0);
            let size: usize = req
                .query
                .get("page_size")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100);
            let from = (page * size).min(s.parts.len());
            let to = (from + size).min(s.parts.len());
            let parts: Vec<_> = (from..to)
                .map(|i| serde_json::json!({ "ordinal": i }))
                .collect();
            let body = serde_json::json!({ "parts": parts, "has_more": to < s.parts.len() });
            respond(&mut stream, "200 OK", &body.to_string());
        }
        ("POST", ["sessions", id, "complete"]) => {
            let Some(s) = st.sessions.get_mut(*id) else {
                return respond(&mut stream, "404 Not Found", "no such session");
            };
            let have: u64 = s.parts.iter().map(|p| p.len() as u64).sum();
            if have != s.total {
                return respond(&mut stream, "409 Conflict", "incomplete");
            }
            s.completed = true;
            respond(&mut stream, "200 OK", "{}");
        }
        _ => respond(&mut stream, "404 Not Found", "no route"),
    }
}
