//! Minimal HTTP/1.1 front end over the control kernel.
//!
//! One client per [`WebServer::poll`], read with a deadline, answered
//! and closed.  Nothing here blocks the control loop for longer than the
//! configured read timeout.

pub mod request;
pub mod routes;
pub mod server;

pub use request::{Request, read_request};
pub use routes::{Response, route};
pub use server::WebServer;
