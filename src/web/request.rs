//! Request-head parsing with bounded buffers and a total deadline.

use std::io::{BufRead, ErrorKind};
use std::time::{Duration, Instant};

use heapless::{String, Vec};

use crate::error::HttpError;

/// Longest accepted request or header line, excluding the line ending.
pub const MAX_LINE_LEN: usize = 512;

/// The parts of a request line the router needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String<8>,
    pub path: String<64>,
    pub query: String<128>,
}

impl Request {
    /// Parse `"GET /path?query HTTP/1.1"`.
    pub fn parse_line(line: &str) -> Result<Self, HttpError> {
        let mut parts = line.split_ascii_whitespace();
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(HttpError::BadRequest);
        };
        if !version.starts_with("HTTP/") || !target.starts_with('/') {
            return Err(HttpError::BadRequest);
        }

        let (path, query) = target.split_once('?').unwrap_or((target, ""));

        let mut req = Self {
            method: String::new(),
            path: String::new(),
            query: String::new(),
        };
        req.method.push_str(method).map_err(|()| HttpError::BadRequest)?;
        req.path.push_str(path).map_err(|()| HttpError::TooLong)?;
        req.query.push_str(query).map_err(|()| HttpError::TooLong)?;
        Ok(req)
    }

    /// Value of the first `key=value` pair in the query string.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find_map(|(k, v)| (k == key).then_some(v))
    }
}

/// Read the request line and headers up to the blank line.
///
/// Header contents are discarded.  The whole head must arrive within
/// `timeout`.
pub fn read_request<R: BufRead>(reader: &mut R, timeout: Duration) -> Result<Request, HttpError> {
    let deadline = Instant::now() + timeout;
    let mut line: Vec<u8, MAX_LINE_LEN> = Vec::new();

    read_line(reader, &mut line, deadline)?;
    let first = core::str::from_utf8(&line).map_err(|_| HttpError::BadRequest)?;
    let request = Request::parse_line(first)?;

    loop {
        read_line(reader, &mut line, deadline)?;
        if line.is_empty() {
            return Ok(request);
        }
    }
}

/// Read up to and including `\n`; `\r` and `\n` are not stored.
fn read_line<R: BufRead>(
    reader: &mut R,
    line: &mut Vec<u8, MAX_LINE_LEN>,
    deadline: Instant,
) -> Result<(), HttpError> {
    line.clear();
    loop {
        if Instant::now() >= deadline {
            return Err(HttpError::Timeout);
        }
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(HttpError::Timeout);
            }
            Err(_) => return Err(HttpError::Io),
        };
        if buf.is_empty() {
            return Err(HttpError::Closed);
        }

        let (take, done) = match buf.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (buf.len(), false),
        };
        for &b in buf[..take].iter().filter(|&&b| b != b'\r' && b != b'\n') {
            line.push(b).map_err(|_| HttpError::TooLong)?;
        }
        reader.consume(take);
        if done {
            return Ok(());
        }
    }
}
