use std::io;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use tracing::debug;

use super::ReadAt;

/// HTTP Range reader for remote ZIP files
///
/// Every [`ReadAt::read_at`] call is one blocking `Range` request. Failures
/// are reported as they happen; nothing is retried.
#[derive(Debug)]
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: u64,
}

fn other<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::other(err.to_string())
}

/// Inclusive last byte of a `len`-byte read at `offset`, for the `Range` header.
fn range_end(offset: u64, len: usize, size: u64) -> io::Result<u64> {
    offset
        .checked_add(len as u64 - 1)
        .filter(|&end| end < size)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {len} bytes at {offset} is past the end of {size} bytes"),
            )
        })
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub fn new(url: String) -> io::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(other)?;

        let resp = client.head(&url).send().map_err(other)?;

        if !resp.status().is_success() {
            return Err(other(format!(
                "HTTP request failed with status: {}",
                resp.status()
            )));
        }

        let accept_ranges = resp
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "remote server does not support Range requests",
            ));
        }

        let size = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| other("remote server did not return Content-Length"))?;

        debug!(%url, size, "opened remote archive");

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: 0,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }
}

impl ReadAt for HttpRangeReader {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let end = range_end(offset, buf.len(), self.size)?;

        let resp = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-{end}"))
            .send()
            .map_err(other)?;

        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(other(format!(
                "HTTP request failed with status: {}",
                resp.status()
            )));
        }

        let bytes = resp.bytes().map_err(other)?;
        if bytes.len() < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short range response: {} of {} bytes", bytes.len(), buf.len()),
            ));
        }

        buf.copy_from_slice(&bytes[..buf.len()]);
        self.transferred_bytes += buf.len() as u64;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}
