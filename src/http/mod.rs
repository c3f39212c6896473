// Free request helpers that run through the process-wide session.

use std::path::Path;

use reqwest::Response;

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::Result;
use crate::session::Session;

pub mod download;
pub mod headers;
pub mod options;
pub mod request;

pub use download::Download;
pub use headers::{default_headers, Headers};
pub use options::{Body, Method, RequestOptions};
pub use request::{Reply, WebSocket};

pub async fn request(method: Method, url: &str, options: RequestOptions) -> Result<Reply> {
    Session::global().request(method, url, options).await
}

pub async fn get(url: &str, options: RequestOptions) -> Result<Response> {
    Session::global().get(url, options).await
}

pub async fn post(url: &str, options: RequestOptions) -> Result<Response> {
    Session::global().post(url, options).await
}

pub async fn put(url: &str, options: RequestOptions) -> Result<Response> {
    Session::global().put(url, options).await
}

pub async fn patch(url: &str, options: RequestOptions) -> Result<Response> {
    Session::global().patch(url, options).await
}

pub async fn delete(url: &str, options: RequestOptions) -> Result<Response> {
    Session::global().delete(url, options).await
}

pub async fn websocket(url: &str, options: RequestOptions) -> Result<WebSocket> {
    Session::global().websocket(url, options).await
}

/// Download `url` to `path` with the default 4 KB read size.
pub async fn download_file(
    url: &str,
    path: impl AsRef<Path>,
    options: RequestOptions,
) -> Result<Download> {
    Session::global()
        .download_file(url, path, DEFAULT_CHUNK_SIZE, options)
        .await
}
