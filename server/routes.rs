use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::context::AppContext;
use crate::handlers;

pub type HttpResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn with_content_type(response: HttpResponse, value: &str) -> HttpResponse {
    match Header::from_bytes(&b"Content-Type"[..], value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

pub fn text_response(status: u16, body: &str) -> HttpResponse {
    let response = Response::from_data(body.as_bytes().to_vec()).with_status_code(StatusCode(status));
    with_content_type(response, "text/plain; charset=utf-8")
}

pub fn json_response<T: Serialize>(status: u16, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let response = Response::from_data(bytes).with_status_code(StatusCode(status));
            with_content_type(response, "application/json")
        }
        Err(e) => {
            tracing::error!("cannot serialize response: {e}");
            text_response(500, "internal error")
        }
    }
}

pub fn not_found() -> HttpResponse {
    text_response(404, "404 Not Found")
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Routes one request and answers it. Runs on the request's own thread.
pub fn dispatch(mut request: Request, ctx: Arc<AppContext>) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or_default().to_owned();

    let response = match (&method, path.as_str()) {
        (Method::Get, "/") => handlers::health::handle(),
        (Method::Post, "/post") => handlers::predict::handle(&mut request, &ctx),
        _ => not_found(),
    };

    let status = response.status_code().0;
    if let Err(e) = request.respond(response) {
        tracing::warn!(%method, %path, "failed to send response: {e}");
    }
    tracing::debug!(
        %method,
        %path,
        status,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "request served"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::fixtures::{context, png_base64};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use tiny_http::Server;

    /// Serves `count` requests on an ephemeral port through `dispatch`.
    fn serve(count: usize) -> SocketAddr {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let ctx = Arc::new(context(8));
        std::thread::spawn(move || {
            for _ in 0..count {
                let request = server.recv().unwrap();
                dispatch(request, Arc::clone(&ctx));
            }
        });
        addr
    }

    fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
             Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .unwrap();

        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).unwrap();
        let status = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

        let mut len = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    len = value.trim().parse().unwrap();
                }
            }
        }
        let mut body = vec![0; len];
        reader.read_exact(&mut body).unwrap();
        (status, String::from_utf8(body).unwrap())
    }

    #[test]
    fn routing_table() {
        let addr = serve(5);

        assert_eq!(send(addr, "GET", "/", ""), (200, "hello".to_owned()));
        assert_eq!(send(addr, "GET", "/nope", "").0, 404);
        // Right path, wrong method.
        assert_eq!(send(addr, "GET", "/post", "").0, 404);

        let (status, body) = send(addr, "POST", "/post", "data=bm90IGFuIGltYWdl");
        assert_eq!(status, 400);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["error"].is_string());

        let payload = png_base64().replace('+', "%2B").replace('/', "%2F").replace('=', "%3D");
        let (status, body) = send(addr, "POST", "/post?src=test", &format!("data={payload}"));
        assert_eq!(status, 200);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["0", "1", "2", "3", "4", "5"]);
        assert!(json["0"]["cls"].as_str().unwrap().starts_with('k'));
        assert!(json["0"]["score"].as_f64().unwrap() <= 0.0);
    }
}
