//! libcurl-backed transport.
//!
//! Each attempt runs one `curl::easy::Easy` transfer on tokio's blocking pool.
//! The response body is buffered in memory. Dropping the send future sets an
//! abort flag that curl's progress callback checks, so a cancelled attempt
//! stops mid-transfer instead of running to its timeout.

use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    Headers, HttpResponse, Method, RequestBody, RequestHead, Transport, TransportError,
    TransportErrorKind,
};

/// Connection-level knobs applied to every transfer.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Whole-transfer timeout used when the operation sets none.
    pub default_timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            default_timeout: Duration::from_secs(120),
            follow_redirects: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    opts: CurlOptions,
}

impl CurlTransport {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }
}

/// Raises the abort flag unless disarmed; held across the blocking hop.
struct AbortOnDrop {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Transport for CurlTransport {
    async fn send(
        &self,
        request: &RequestHead,
        body: &mut RequestBody,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        let payload = body
            .read_to_vec()
            .map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
        let head = request.clone();
        let opts = self.opts;
        let flag = Arc::new(AtomicBool::new(false));
        let mut guard = AbortOnDrop {
            flag: Arc::clone(&flag),
            armed: true,
        };

        let joined = tokio::task::spawn_blocking(move || perform(&head, &payload, timeout, opts, &flag)).await;
        guard.armed = false;

        joined.map_err(|e| {
            TransportError::new(TransportErrorKind::Other, format!("transport task failed: {}", e))
        })?
    }
}

fn perform(
    head: &RequestHead,
    payload: &[u8],
    timeout: Option<Duration>,
    opts: CurlOptions,
    abort: &AtomicBool,
) -> Result<HttpResponse, TransportError> {
    let mut header_lines: Vec<String> = Vec::new();
    let mut response_body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(head.url.as_str()).map_err(map_curl_error)?;
    match head.method {
        Method::Head => easy.nobody(true).map_err(map_curl_error)?,
        Method::Get => easy.get(true).map_err(map_curl_error)?,
        Method::Put | Method::Post | Method::Patch | Method::Delete => {
            if !payload.is_empty() || head.method != Method::Delete {
                easy.post_fields_copy(payload).map_err(map_curl_error)?;
            }
            easy.custom_request(head.method.as_str())
                .map_err(map_curl_error)?;
        }
    }
    easy.follow_location(opts.follow_redirects)
        .map_err(map_curl_error)?;
    easy.connect_timeout(opts.connect_timeout)
        .map_err(map_curl_error)?;
    // libcurl treats a zero timeout as unlimited.
    easy.timeout(timeout.unwrap_or(opts.default_timeout).max(Duration::from_millis(1)))
        .map_err(map_curl_error)?;
    // Needed for the progress callback to fire.
    easy.progress(true).map_err(map_curl_error)?;

    let mut list = curl::easy::List::new();
    for (k, v) in head.headers.iter() {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(map_curl_error)?;
    }
    // Suppress `Expect: 100-continue` round trips on uploads.
    list.append("Expect:").map_err(map_curl_error)?;
    easy.http_headers(list).map_err(map_curl_error)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    header_lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(map_curl_error)?;
        transfer
            .write_function(|data| {
                response_body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(map_curl_error)?;
        transfer
            .progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))
            .map_err(map_curl_error)?;
        transfer.perform().map_err(map_curl_error)?;
    }

    let status = easy.response_code().map_err(map_curl_error)?;
    let status = u16::try_from(status).map_err(|_| {
        TransportError::new(TransportErrorKind::Other, format!("invalid status code {}", status))
    })?;

    Ok(HttpResponse {
        status,
        headers: Headers::parse_lines(&header_lines),
        body: response_body,
    })
}

/// Map a curl error onto the transport error kinds used for retry decisions.
fn map_curl_error(e: curl::Error) -> TransportError {
    let kind = if e.is_operation_timedout() {
        TransportErrorKind::Timeout
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
    {
        TransportErrorKind::Connection
    } else if e.is_aborted_by_callback() {
        TransportErrorKind::Aborted
    } else if e.is_url_malformed() || e.is_unsupported_protocol() {
        TransportErrorKind::InvalidRequest
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, e.to_string())
}
