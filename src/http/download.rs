// Streaming file download through the shared session.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::write::{GzDecoder, ZlibDecoder};
use futures_util::TryStreamExt;
use reqwest::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use super::options::RequestOptions;
use crate::error::Result;
use crate::session::Session;

/// Outcome of [`Session::download_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Destination written to; empty when the request failed.
    pub path: PathBuf,
    pub bytes_written: u64,
    /// `Content-Length` announced by the server, 0 if absent or unparseable.
    pub content_length: u64,
}

impl Download {
    fn failed() -> Self {
        Self {
            path: PathBuf::new(),
            bytes_written: 0,
            content_length: 0,
        }
    }

    /// False when the request itself failed and nothing was written.
    pub fn succeeded(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }
}

/// Inflates a `Content-Encoding: gzip` or `deflate` body piece by piece.
enum BodyDecoder {
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(ZlibDecoder<Vec<u8>>),
}

impl BodyDecoder {
    /// Decoder for `encoding`, `None` for identity and unknown codings.
    fn for_encoding(encoding: &str) -> Option<Self> {
        match encoding.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(Self::Gzip(GzDecoder::new(Vec::new()))),
            "deflate" => Some(Self::Deflate(ZlibDecoder::new(Vec::new()))),
            _ => None,
        }
    }

    /// Feed encoded bytes, returning whatever decoded output is ready.
    fn decode(&mut self, input: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(d) => {
                d.write_all(input)?;
                Ok(std::mem::take(d.get_mut()))
            }
            Self::Deflate(d) => {
                d.write_all(input)?;
                Ok(std::mem::take(d.get_mut()))
            }
        }
    }

    fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(d) => d.finish(),
            Self::Deflate(d) => d.finish(),
        }
    }
}

impl Session {
    /// GET `url` and stream the body into a new file at `path`.
    ///
    /// The body is read in pieces of at most `chunk_size` bytes and gzip or
    /// deflate content is decoded before writing. A transport failure yields an
    /// empty [`Download`]; a file that already exists or a write failure is
    /// returned as [`Error::Io`](crate::Error::Io). `content_length` is the
    /// length announced on the wire, so `bytes_written` differs from it for
    /// compressed responses.
    pub async fn download_file(
        &self,
        url: &str,
        path: impl AsRef<Path>,
        chunk_size: usize,
        options: RequestOptions,
    ) -> Result<Download> {
        let path = path.as_ref();
        let response = match self.get_raw(url, options).await {
            Ok(response) => response,
            Err(e) if e.is_transport() => return Ok(Download::failed()),
            Err(e) => return Err(e),
        };

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let mut decoder = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .and_then(BodyDecoder::for_encoding);
        let encoded = decoder.is_some();

        debug!("downloading {} to {}", url, path.display());

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;

        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = StreamReader::new(Box::pin(stream));
        let mut buf = vec![0u8; chunk_size.max(1)];
        let mut bytes_written = 0u64;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            match decoder.as_mut() {
                Some(decoder) => {
                    let decoded = decoder.decode(&buf[..n])?;
                    file.write_all(&decoded).await?;
                    bytes_written += decoded.len() as u64;
                }
                None => {
                    file.write_all(&buf[..n]).await?;
                    bytes_written += n as u64;
                }
            }
        }
        if let Some(decoder) = decoder {
            let rest = decoder.finish()?;
            file.write_all(&rest).await?;
            bytes_written += rest.len() as u64;
        }
        file.flush().await?;

        if content_length != 0 && !encoded && bytes_written != content_length {
            warn!(
                "download {} wrote {} bytes, server announced {}",
                url, bytes_written, content_length
            );
        }
        debug!(
            "downloaded {} bytes to {} (content-length {})",
            bytes_written,
            path.display(),
            content_length
        );

        Ok(Download {
            path: path.to_path_buf(),
            bytes_written,
            content_length,
        })
    }
}
