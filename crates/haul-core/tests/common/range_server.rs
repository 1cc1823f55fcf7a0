//! Minimal HTTP/1.1 GET server with optional `Range: bytes=N-` support.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Answer every request with this status and an empty body.
    pub fail_status: Option<u16>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            fail_status: None,
        }
    }
}

pub struct RangeServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl RangeServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Serves `body` from a background thread until the process exits.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            counter.fetch_add(1, Ordering::SeqCst);
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, opts));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/pack.bin", port),
        hits,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    if let Some(code) = opts.fail_status {
        let resp = format!(
            "HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code
        );
        let _ = stream.write_all(resp.as_bytes());
        return;
    }
    let total = body.len() as u64;
    let start = parse_range_start(request).filter(|_| opts.support_ranges);
    let (status, headers, slice) = match start {
        Some(s) if s >= total => (
            "416 Range Not Satisfiable",
            format!("Content-Range: bytes */{}\r\n", total),
            &body[0..0],
        ),
        Some(s) => (
            "206 Partial Content",
            format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                s,
                total.saturating_sub(1),
                total
            ),
            &body[s as usize..],
        ),
        None => ("200 OK", String::new(), body),
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        headers
    );
    let _ = stream.write_all(head.as_bytes());
    // Several writes so the client sees more than one delivery.
    for piece in slice.chunks(16 * 1024) {
        if stream.write_all(piece).is_err() {
            return;
        }
    }
}

/// Start offset of `Range: bytes=N-`.
fn parse_range_start(request: &str) -> Option<u64> {
    request.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("range") {
            return None;
        }
        let range = value.trim().strip_prefix("bytes=")?;
        range.split_once('-')?.0.trim().parse().ok()
    })
}
