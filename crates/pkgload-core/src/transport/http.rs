//! libcurl transport: one Easy handle per GET.

use std::cell::Cell;
use std::str;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{ChunkFn, Response, Transport};
use crate::error::FetchError;

/// Timeouts applied to every transfer.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Hard wall-clock limit for one attempt.
    pub timeout: Duration,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
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

impl Transport for CurlTransport {
    fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
        mut on_chunk: Option<&mut ChunkFn>,
    ) -> Result<Response, FetchError> {
        let curl_err = |e: curl::Error| FetchError::Transport(e.to_string());

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(curl_err)?;
        easy.follow_location(true).map_err(curl_err)?;
        easy.max_redirections(10).map_err(curl_err)?;
        easy.connect_timeout(self.opts.connect_timeout).map_err(curl_err)?;
        // Abort if throughput drops below 1 KiB/s for 60s.
        easy.low_speed_limit(1024).map_err(curl_err)?;
        easy.low_speed_time(Duration::from_secs(60)).map_err(curl_err)?;
        easy.timeout(self.opts.timeout).map_err(curl_err)?;
        easy.progress(true).map_err(curl_err)?;

        let status = Cell::new(0u32);
        let content_length: Cell<Option<u64>> = Cell::new(None);
        let mut body: Vec<u8> = Vec::new();

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(line) = str::from_utf8(data) {
                        // Redirects produce several header blocks; keep the last.
                        if let Some(code) = parse_status_line(line) {
                            status.set(code);
                            content_length.set(None);
                        } else if let Some(len) = parse_content_length(line) {
                            content_length.set(Some(len));
                        }
                    }
                    true
                })
                .map_err(curl_err)?;
            transfer
                .write_function(|data| {
                    if cancel.is_cancelled() {
                        return Ok(0); // abort transfer
                    }
                    body.extend_from_slice(data);
                    if (200..300).contains(&status.get()) {
                        if let Some(cb) = on_chunk.as_deref_mut() {
                            cb(body.len() as u64, content_length.get());
                        }
                    }
                    Ok(data.len())
                })
                .map_err(curl_err)?;
            transfer
                .progress_function(|_, _, _, _| !cancel.is_cancelled())
                .map_err(curl_err)?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if cancel.is_cancelled() {
                return Err(FetchError::Aborted);
            }
            return Err(FetchError::Transport(e.to_string()));
        }

        let code = easy.response_code().map_err(curl_err)?;
        let content_type = easy.content_type().ok().flatten().map(str::to_string);
        Ok(Response {
            status: code,
            content_length: content_length.get(),
            content_type,
            body,
        })
    }
}

fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

fn parse_content_length(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}
