//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed routes for GET and HEAD and records the `User-Agent` of every
//! request. Unknown paths get 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn image(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "image/jpeg",
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageServer {
    pub base_url: String,
    user_agents: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl PageServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents.lock().unwrap().clone()
    }

    /// `"METHOD /path"` for every request served, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. Routes are built by `routes`,
/// which receives the base URL (e.g. "http://127.0.0.1:12345") so pages can
/// link to absolute addresses on the same server.
pub fn start<F>(routes: F) -> PageServer
where
    F: FnOnce(&str) -> HashMap<String, Route>,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{port}");
    let routes = Arc::new(routes(&base_url));
    let user_agents = Arc::new(Mutex::new(Vec::new()));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let server = PageServer {
        base_url,
        user_agents: Arc::clone(&user_agents),
        requests: Arc::clone(&requests),
    };
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let user_agents = Arc::clone(&user_agents);
            let requests = Arc::clone(&requests);
            thread::spawn(move || handle(stream, &routes, &user_agents, &requests));
        }
    });
    server
}

fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    user_agents: &Mutex<Vec<String>>,
    requests: &Mutex<Vec<String>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&raw).into_owned();

    let mut lines = request.lines();
    let mut start = lines.next().unwrap_or("").split_whitespace();
    let method = start.next().unwrap_or("").to_string();
    let path = start.next().unwrap_or("/").to_string();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("user-agent") {
                user_agents.lock().unwrap().push(value.trim().to_string());
            }
        }
    }
    requests.lock().unwrap().push(format!("{method} {path}"));

    let not_found = Route {
        status: 404,
        content_type: "text/plain",
        body: b"not found".to_vec(),
    };
    let route = routes.get(&path).unwrap_or(&not_found);
    let reason = if route.status < 400 { "OK" } else { "Error" };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        reason,
        route.content_type,
        route.body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    if method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(&route.body);
    }
    let _ = stream.flush();
}
