//! HTTP surface over a real loopback socket.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use chamber::adapters::block_device::NoDevice;
use chamber::app::service::ChamberService;
use chamber::config::ChamberConfig;
use chamber::error::HttpError;
use chamber::storage::Storage;
use chamber::web::WebServer;

use crate::mock_hw::{MockHardware, RecordingSink};

fn service() -> ChamberService<NoDevice> {
    let config = ChamberConfig::default();
    let storage = Storage::new(NoDevice, &config);
    let mut svc = ChamberService::new(config, storage);
    svc.start(0, &mut MockHardware::new(), &mut RecordingSink::new());
    svc
}

fn server(read_timeout: Duration) -> (WebServer, SocketAddr) {
    let server = WebServer::bind("127.0.0.1:0", read_timeout).expect("bind loopback");
    let addr = server.local_addr().expect("local addr");
    (server, addr)
}

/// Poll until a client has been handled or five seconds pass.
fn serve_one(server: &mut WebServer, svc: &mut ChamberService<NoDevice>) -> Result<bool, HttpError> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match server.poll(svc) {
            Ok(false) if Instant::now() < deadline => thread::sleep(Duration::from_millis(1)),
            other => return other,
        }
    }
}

fn client(addr: SocketAddr, request: &'static str) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).expect("connect");
        stream.write_all(request.as_bytes()).expect("send");
        let mut response = String::new();
        stream.read_to_string(&mut response).expect("receive");
        response
    })
}

#[test]
fn inc_over_tcp() {
    let mut svc = service();
    let (mut server, addr) = server(Duration::from_secs(2));

    let c = client(addr, "GET /inc HTTP/1.1\r\nHost: chamber\r\n\r\n");
    assert_eq!(serve_one(&mut server, &mut svc), Ok(true));
    let response = c.join().unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("Content-Type: application/json\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.ends_with(r#"{"count":1}"#));
    assert_eq!(svc.counter(), 1);
    assert_eq!(server.served(), 1);
}

#[test]
fn setpoints_over_tcp() {
    let mut svc = service();
    let (mut server, addr) = server(Duration::from_secs(2));

    let c = client(addr, "GET /api/setpoints?co2=1100&temp=22.5 HTTP/1.1\r\n\r\n");
    assert_eq!(serve_one(&mut server, &mut svc), Ok(true));
    let response = c.join().unwrap();

    let (_, body) = response.split_once("\r\n\r\n").expect("head/body split");
    let v: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(v["co2_ppm"], 1100);
    assert_eq!(svc.co2_setpoint(), 1100);
    assert!((svc.temp_setpoint() - 22.5).abs() < 1e-3);
}

#[test]
fn garbage_request_line_gets_400() {
    let mut svc = service();
    let (mut server, addr) = server(Duration::from_secs(2));

    let c = client(addr, "HELLO\r\n");
    assert_eq!(serve_one(&mut server, &mut svc), Err(HttpError::BadRequest));
    let response = c.join().unwrap();
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
    assert_eq!(server.served(), 0);
}

#[test]
fn silent_client_times_out() {
    let mut svc = service();
    let (mut server, addr) = server(Duration::from_millis(100));

    let idle = TcpStream::connect(addr).expect("connect");
    let started = Instant::now();
    assert_eq!(serve_one(&mut server, &mut svc), Err(HttpError::Timeout));
    assert!(started.elapsed() < Duration::from_secs(2));
    drop(idle);

    // The listener keeps working afterwards.
    let c = client(addr, "GET / HTTP/1.1\r\n\r\n");
    assert_eq!(serve_one(&mut server, &mut svc), Ok(true));
    assert!(c.join().unwrap().contains("Counter: 0"));
}

#[test]
fn nobody_waiting_is_not_an_error() {
    let mut svc = service();
    let (mut server, _) = server(Duration::from_millis(100));
    assert_eq!(server.poll(&mut svc), Ok(false));
}
