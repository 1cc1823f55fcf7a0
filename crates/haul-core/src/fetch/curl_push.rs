//! Blocking curl transfer that pushes the body into a [`StreamProducer`].

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::stream::StreamProducer;

pub(super) struct PushRequest {
    pub url: String,
    /// Non-zero asks for `Range: bytes=N-` and requires a 206 answer.
    pub resume_from: u64,
    pub connect_timeout: Duration,
}

/// Status code of an HTTP status line (`HTTP/1.1 206 Partial Content`).
pub(super) fn parse_status_line(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Value of `name: value` when `name` matches case-insensitively.
fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (n, v) = line.split_once(':')?;
    n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
}

/// Complete size from `Content-Range: bytes s-e/total` (`*` means unknown).
pub(super) fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Why the body cannot be accepted, checked before the first byte is pushed.
pub(super) fn reject_reason(code: u32, resume_from: u64) -> Option<String> {
    if !(200..300).contains(&code) {
        return Some(format!("HTTP {}", code));
    }
    if resume_from > 0 && code != 206 {
        return Some(format!(
            "server ignored range request (HTTP {}); cannot resume from byte {}",
            code, resume_from
        ));
    }
    None
}

fn curl_err(e: curl::Error) -> String {
    format!("curl: {}", e)
}

/// Run the transfer to completion on the current thread, ending with exactly
/// one terminal signal on `producer`. `total_hint` receives the full resource
/// size once headers reveal it.
pub(super) fn run(req: PushRequest, producer: StreamProducer, total_hint: Arc<AtomicU64>) {
    match perform(&req, &producer, &total_hint) {
        Ok(()) => {
            producer.complete();
        }
        Err(reason) => {
            if producer.fail(reason.clone()) {
                tracing::debug!(url = %req.url, reason = %reason, "fetch transport failed");
            }
        }
    }
}

fn perform(
    req: &PushRequest,
    producer: &StreamProducer,
    total_hint: &AtomicU64,
) -> Result<(), String> {
    let mut easy = curl::easy::Easy::new();
    easy.url(&req.url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(10).map_err(curl_err)?;
    easy.connect_timeout(req.connect_timeout).map_err(curl_err)?;
    easy.low_speed_limit(1024).map_err(curl_err)?;
    easy.low_speed_time(Duration::from_secs(60)).map_err(curl_err)?;
    // Lets the progress callback abort a stalled transfer once the reader is gone.
    easy.progress(true).map_err(curl_err)?;
    if req.resume_from > 0 {
        easy.range(&format!("{}-", req.resume_from)).map_err(curl_err)?;
    }

    let status = Cell::new(0u32);
    let checked = Cell::new(false);
    let rejected: Cell<Option<String>> = Cell::new(None);
    let result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                let Ok(line) = std::str::from_utf8(data) else {
                    return true;
                };
                if let Some(code) = parse_status_line(line) {
                    // New response after a redirect.
                    status.set(code);
                    checked.set(false);
                } else if let Some(v) = header_value(line, "content-range") {
                    if let Some(total) = content_range_total(v) {
                        total_hint.store(total, Ordering::Relaxed);
                    }
                } else if let Some(v) = header_value(line, "content-length") {
                    if let Ok(len) = v.parse::<u64>() {
                        if status.get() == 200 {
                            total_hint.store(len, Ordering::Relaxed);
                        }
                    }
                }
                true
            })
            .map_err(curl_err)?;
        transfer
            .write_function(|data| {
                if !checked.get() {
                    checked.set(true);
                    if let Some(reason) = reject_reason(status.get(), req.resume_from) {
                        rejected.set(Some(reason));
                        return Ok(0);
                    }
                }
                match producer.write(data) {
                    Ok(()) => Ok(data.len()),
                    // Consumer went away; returning short aborts the transfer.
                    Err(_) => Ok(0),
                }
            })
            .map_err(curl_err)?;
        transfer
            .progress_function(|_, _, _, _| !producer.is_closed())
            .map_err(curl_err)?;
        transfer.perform()
    };

    if let Some(reason) = rejected.take() {
        return Err(reason);
    }
    match result {
        Err(e) if e.is_write_error() || e.is_aborted_by_callback() => {
            Err("receiver closed".to_string())
        }
        Err(e) => Err(curl_err(e)),
        Ok(()) => {
            let code = easy.response_code().map_err(curl_err)?;
            match reject_reason(code, req.resume_from) {
                Some(reason) => Err(reason),
                None => Ok(()),
            }
        }
    }
}
