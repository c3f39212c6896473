// Local servers shared by the integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, RawQuery};
use axum::http::{header, HeaderMap, Method};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;

pub const FILE_SIZE: usize = 256 * 1024 + 17;
pub const CHUNKED_PIECES: usize = 9;
pub const CHUNKED_PIECE_SIZE: usize = 10_000;
pub const GZIP_PLAIN_SIZE: usize = 10_000;

/// Deterministic download payload.
pub fn file_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// `file_content(GZIP_PLAIN_SIZE)` gzip-compressed, as served by `/gzip`.
pub fn gzip_content() -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&file_content(GZIP_PLAIN_SIZE)).unwrap();
    encoder.finish().unwrap()
}

async fn echo_headers(headers: HeaderMap) -> Json<serde_json::Value> {
    let get = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(serde_json::json!({
        "user-agent": get(header::USER_AGENT),
        "accept": get(header::ACCEPT),
        "accept-encoding": get(header::ACCEPT_ENCODING),
        "x-token": get(header::HeaderName::from_static("x-token")),
    }))
}

async fn echo_body(method: Method, body: String) -> String {
    format!("{} {}", method, body)
}

async fn echo_query(RawQuery(query): RawQuery) -> String {
    query.unwrap_or_default()
}

async fn set_cookie(Path((name, value)): Path<(String, String)>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, format!("{}={}; Path=/", name, value))],
        "ok",
    )
}

async fn echo_cookies(headers: HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn serve_file() -> Vec<u8> {
    file_content(FILE_SIZE)
}

async fn serve_chunked() -> Body {
    let content = file_content(CHUNKED_PIECES * CHUNKED_PIECE_SIZE);
    let pieces = content
        .chunks(CHUNKED_PIECE_SIZE)
        .map(|c| Ok::<_, std::io::Error>(Bytes::copy_from_slice(c)))
        .collect::<Vec<_>>();
    Body::from_stream(futures_util::stream::iter(pieces))
}

async fn serve_gzip() -> impl IntoResponse {
    ([(header::CONTENT_ENCODING, "gzip")], gzip_content())
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "late"
}

/// Start the HTTP test server, returning its base URL.
pub async fn start_server() -> String {
    let app = Router::new()
        .route("/get", get(echo_headers))
        .route("/echo", any(echo_body))
        .route("/query", get(echo_query))
        .route("/cookies", get(echo_cookies))
        .route("/cookies/set/{name}/{value}", get(set_cookie))
        .route("/file", get(serve_file))
        .route("/chunked", get(serve_chunked))
        .route("/gzip", get(serve_gzip))
        .route("/slow", get(slow));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Websocket echo server. Records the `Cookie` header of the last handshake
/// and answers every handshake with `Set-Cookie: ws=joined; Path=/`.
pub async fn start_ws_server() -> (String, Arc<Mutex<Option<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen_cookie = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&seen_cookie);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let callback = |req: &Request, mut resp: Response| {
                    *seen.lock() = req
                        .headers()
                        .get("cookie")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    resp.headers_mut()
                        .insert("set-cookie", HeaderValue::from_static("ws=joined; Path=/"));
                    Ok::<_, ErrorResponse>(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_text() || msg.is_binary() {
                        if ws.send(msg).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });

    (format!("ws://{}", addr), seen_cookie)
}

/// URL pointing at a port nothing listens on.
pub fn closed_port_url(path: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, path)
}

/// HTTP CONNECT proxy. Returns its URL and the number of tunnels it opened.
pub async fn start_connect_proxy() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tunnels = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&tunnels);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut byte = [0u8; 1];
                while !head.ends_with(b"\r\n\r\n") {
                    if stream.read(&mut byte).await.unwrap_or(0) == 0 {
                        return;
                    }
                    head.push(byte[0]);
                }
                let head = String::from_utf8_lossy(&head).into_owned();
                let Some(target) = head
                    .strip_prefix("CONNECT ")
                    .and_then(|rest| rest.split_whitespace().next())
                else {
                    return;
                };
                let Ok(mut upstream) = TcpStream::connect(target).await else {
                    let _ = stream.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").await;
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                if stream
                    .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                    .await
                    .is_ok()
                {
                    let _ = tokio::io::copy_bidirectional(&mut stream, &mut upstream).await;
                }
            });
        }
    });

    (format!("http://{}", addr), tunnels)
}

/// SOCKS5 proxy without authentication, IPv4 targets only.
pub async fn start_socks5_proxy() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tunnels = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&tunnels);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut greeting = [0u8; 2];
                if stream.read_exact(&mut greeting).await.is_err() {
                    return;
                }
                let mut methods = vec![0u8; usize::from(greeting[1])];
                if stream.read_exact(&mut methods).await.is_err()
                    || stream.write_all(&[5, 0]).await.is_err()
                {
                    return;
                }

                let mut request = [0u8; 10];
                if stream.read_exact(&mut request).await.is_err() || request[3] != 1 {
                    return;
                }
                let ip = [request[4], request[5], request[6], request[7]];
                let port = u16::from_be_bytes([request[8], request[9]]);
                let Ok(mut upstream) = TcpStream::connect(SocketAddr::from((ip, port))).await
                else {
                    let _ = stream.write_all(&[5, 5, 0, 1, 0, 0, 0, 0, 0, 0]).await;
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                if stream
                    .write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0])
                    .await
                    .is_ok()
                {
                    let _ = tokio::io::copy_bidirectional(&mut stream, &mut upstream).await;
                }
            });
        }
    });

    (format!("socks5://{}", addr), tunnels)
}

/// Accepts connections and never answers. Returns `http://host:port`.
pub async fn start_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("http://{}", addr)
}
