//! Request routing.
//!
//! | Method | Path             | Effect                                   |
//! |--------|------------------|------------------------------------------|
//! | GET    | `/`              | HTML page with the counter               |
//! | GET    | `/inc`           | increment counter, `{"count":n}`         |
//! | GET    | `/api/status`    | kernel status snapshot                   |
//! | GET    | `/api/history`   | every history channel                    |
//! | GET    | `/api/setpoints` | read; `?co2=&rh=&temp=` applies first    |

use std::fmt::Write as _;

use log::{debug, warn};
use serde::Serialize;
use serde::ser::SerializeMap;

use super::request::Request;
use crate::app::ports::BlockDevice;
use crate::app::service::ChamberService;
use crate::history::{Channel, History};

/// A complete response, rendered by [`Response::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    /// `{"error": message}` with the given status.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::json(status, body)
    }

    /// Serialize `value` as a 200 JSON response.
    pub fn ok_json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::json(200, body),
            Err(e) => {
                warn!("HTTP: JSON encoding failed: {}", e);
                Self::error(500, "encoding failed")
            }
        }
    }

    pub fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            _ => "Internal Server Error",
        }
    }

    /// Status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::with_capacity(128);
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len()
        );
        let mut out = head.into_bytes();
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

/// Every history channel keyed by its JSON name.
struct HistoryBody<'a>(&'a History);

impl Serialize for HistoryBody<'_> {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(Channel::ALL.len()))?;
        for ch in Channel::ALL {
            map.serialize_entry(ch.key(), &self.0.read(ch))?;
        }
        map.end()
    }
}

/// Dispatch one request against the kernel.
pub fn route<D: BlockDevice>(req: &Request, svc: &mut ChamberService<D>) -> Response {
    debug!("HTTP: {} {}?{}", req.method, req.path, req.query);

    if req.method.as_str() != "GET" {
        return Response::error(405, "method not allowed");
    }

    match req.path.as_str() {
        "/" => Response::html(index_page(svc.counter())),
        "/inc" => {
            let count = svc.increment_counter();
            Response::ok_json(&serde_json::json!({ "count": count }))
        }
        "/api/status" => Response::ok_json(&svc.status()),
        "/api/history" => Response::ok_json(&HistoryBody(svc.history())),
        "/api/setpoints" => setpoints(req, svc),
        _ => Response::error(404, "not found"),
    }
}

/// Validate every parameter before applying any of them.
fn setpoints<D: BlockDevice>(req: &Request, svc: &mut ChamberService<D>) -> Response {
    let co2 = match req.query_param("co2").map(str::parse::<u32>).transpose() {
        Ok(v) => v,
        Err(_) => return Response::error(400, "invalid co2"),
    };
    let Ok(rh) = parse_float(req.query_param("rh")) else {
        return Response::error(400, "invalid rh");
    };
    let Ok(temp) = parse_float(req.query_param("temp")) else {
        return Response::error(400, "invalid temp");
    };

    if let Some(ppm) = co2 {
        svc.set_co2_setpoint(u16::try_from(ppm).unwrap_or(u16::MAX));
    }
    if let Some(percent) = rh {
        svc.set_rh_setpoint(percent);
    }
    if let Some(celsius) = temp {
        svc.set_temp_setpoint(celsius);
    }
    Response::ok_json(&svc.setpoints())
}

fn parse_float(raw: Option<&str>) -> Result<Option<f32>, ()> {
    match raw {
        None => Ok(None),
        Some(s) => match s.parse::<f32>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(()),
        },
    }
}

fn index_page(count: u16) -> String {
    let mut html = String::with_capacity(512);
    html.push_str(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Chamber</title>\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\"></head><body>",
    );
    let _ = write!(html, "<h1 id=\"count\">Counter: {count}</h1>");
    html.push_str(
        "<button id=\"inc\">Increment</button>\
         <script>document.getElementById('inc').onclick=function(){fetch('/inc')\
         .then(r=>r.json()).then(j=>{document.getElementById('count').innerText=\
         'Counter: '+j.count});};</script></body></html>",
    );
    html
}
