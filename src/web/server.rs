//! Non-blocking HTTP listener driven from the control loop.

use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};

use super::request::read_request;
use super::routes::{Response, route};
use crate::app::ports::BlockDevice;
use crate::app::service::ChamberService;
use crate::error::HttpError;

pub struct WebServer {
    listener: TcpListener,
    read_timeout: Duration,
    served: u32,
}

impl WebServer {
    /// Bind and switch the listener to non-blocking accepts.
    pub fn bind(addr: impl ToSocketAddrs, read_timeout: Duration) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!("HTTP: listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            read_timeout,
            served: 0,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Requests answered since bind.
    pub fn served(&self) -> u32 {
        self.served
    }

    /// Accept and serve at most one client.  Returns `Ok(false)` when
    /// nobody was waiting.
    pub fn poll<D: BlockDevice>(&mut self, svc: &mut ChamberService<D>) -> Result<bool, HttpError> {
        let (stream, peer) = match self.listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) => {
                warn!("HTTP: accept failed: {}", e);
                return Err(HttpError::Io);
            }
        };
        debug!("HTTP: client {}", peer);

        let result = self.serve(&stream, svc);
        let _ = stream.shutdown(Shutdown::Both);
        match result {
            Ok(()) => {
                self.served = self.served.wrapping_add(1);
                Ok(true)
            }
            Err(e) => {
                debug!("HTTP: client {} dropped: {}", peer, e);
                Err(e)
            }
        }
    }

    fn serve<D: BlockDevice>(
        &self,
        stream: &TcpStream,
        svc: &mut ChamberService<D>,
    ) -> Result<(), HttpError> {
        stream.set_nonblocking(false).map_err(|_| HttpError::Io)?;
        stream
            .set_read_timeout(Some(self.read_timeout.max(Duration::from_millis(1))))
            .map_err(|_| HttpError::Io)?;
        stream
            .set_write_timeout(Some(self.read_timeout.max(Duration::from_millis(1))))
            .map_err(|_| HttpError::Io)?;

        let mut reader = BufReader::new(stream);
        let response = match read_request(&mut reader, self.read_timeout) {
            Ok(req) => route(&req, svc),
            Err(e @ (HttpError::BadRequest | HttpError::TooLong)) => {
                write_response(stream, &Response::error(400, "bad request"))?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        write_response(stream, &response)
    }
}

fn write_response(mut stream: &TcpStream, response: &Response) -> Result<(), HttpError> {
    stream
        .write_all(&response.to_bytes())
        .and_then(|()| stream.flush())
        .map_err(|_| HttpError::Io)
}
