// TCP tunnels through HTTP CONNECT and SOCKS5 proxies for websocket handshakes.

use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

const MAX_HEAD_LEN: usize = 8 * 1024;
const SOCKS_DEFAULT_PORT: u16 = 1080;

/// Open a TCP stream to `host:port` through the proxy at `proxy_url`.
///
/// Supports `http://` (CONNECT) and `socks5://` / `socks5h://` proxies, with
/// credentials taken from the URL userinfo.
pub(crate) async fn open(proxy_url: &str, host: &str, port: u16) -> Result<TcpStream> {
    let proxy = Url::parse(proxy_url)?;
    let default_port = match proxy.scheme() {
        "http" => 80,
        "socks5" | "socks5h" => SOCKS_DEFAULT_PORT,
        other => {
            return Err(Error::Proxy(format!(
                "unsupported proxy scheme for websocket: {}",
                other
            )))
        }
    };
    let proxy_host = proxy
        .host_str()
        .map(strip_brackets)
        .ok_or(Error::InvalidUrl(url::ParseError::EmptyHost))?;
    let proxy_port = proxy.port().unwrap_or(default_port);

    let mut stream = TcpStream::connect((proxy_host, proxy_port))
        .await
        .map_err(|e| Error::Proxy(format!("{}:{}: {}", proxy_host, proxy_port, e)))?;
    stream.set_nodelay(true).ok();

    match proxy.scheme() {
        "http" => http_connect(&mut stream, &proxy, host, port).await?,
        scheme => socks5_connect(&mut stream, &proxy, host, port, scheme == "socks5h").await?,
    }
    debug!("tunnel to {}:{} via {}:{}", host, port, proxy_host, proxy_port);
    Ok(stream)
}

async fn http_connect<S>(stream: &mut S, proxy: &Url, host: &str, port: u16) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let authority = format!("{}:{}", host, port);
    let mut request = format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n", authority);
    if let Some((user, password)) = credentials(proxy) {
        let token = STANDARD.encode(format!("{}:{}", user, password));
        request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", token));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await.map_err(proxy_io)?;

    let head = read_head(stream).await?;
    let status_line = head.lines().next().unwrap_or_default();
    if status_line.split_whitespace().nth(1) != Some("200") {
        return Err(Error::Proxy(format!(
            "CONNECT {} refused: {}",
            authority, status_line
        )));
    }
    Ok(())
}

/// Read an HTTP head up to and including the blank line, leaving the rest unread.
async fn read_head<S>(stream: &mut S) -> Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_HEAD_LEN {
            return Err(Error::Proxy("proxy response head too large".to_string()));
        }
        if stream.read(&mut byte).await.map_err(proxy_io)? == 0 {
            return Err(Error::Proxy("proxy closed the connection".to_string()));
        }
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

async fn socks5_connect<S>(
    stream: &mut S,
    proxy: &Url,
    host: &str,
    port: u16,
    remote_dns: bool,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let credentials = credentials(proxy);
    let greeting: &[u8] = if credentials.is_some() {
        &[5, 2, 0, 2]
    } else {
        &[5, 1, 0]
    };
    stream.write_all(greeting).await.map_err(proxy_io)?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await.map_err(proxy_io)?;
    match (choice, &credentials) {
        ([5, 0], _) => {}
        ([5, 2], Some((user, password))) => {
            socks5_authenticate(stream, user, password).await?;
        }
        _ => {
            return Err(Error::Proxy(format!(
                "SOCKS5 proxy offered no usable auth method: {:?}",
                choice
            )))
        }
    }

    let mut request = vec![5, 1, 0];
    let bare_host = strip_brackets(host);
    let address = match bare_host.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) if remote_dns => None,
        Err(_) => Some(resolve(bare_host, port).await?),
    };
    match address {
        Some(IpAddr::V4(ip)) => {
            request.push(1);
            request.extend_from_slice(&ip.octets());
        }
        Some(IpAddr::V6(ip)) => {
            request.push(4);
            request.extend_from_slice(&ip.octets());
        }
        None => {
            let len = u8::try_from(bare_host.len())
                .map_err(|_| Error::Proxy(format!("host name too long: {}", bare_host)))?;
            request.push(3);
            request.push(len);
            request.extend_from_slice(bare_host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await.map_err(proxy_io)?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await.map_err(proxy_io)?;
    if reply[1] != 0 {
        return Err(Error::Proxy(format!(
            "SOCKS5 connect to {}:{} failed with code {}",
            bare_host, port, reply[1]
        )));
    }
    let bound_len = match reply[3] {
        1 => 4,
        4 => 16,
        3 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await.map_err(proxy_io)?;
            usize::from(len[0])
        }
        other => {
            return Err(Error::Proxy(format!(
                "SOCKS5 reply with unknown address type {}",
                other
            )))
        }
    };
    let mut bound = vec![0u8; bound_len + 2];
    stream.read_exact(&mut bound).await.map_err(proxy_io)?;
    Ok(())
}

async fn socks5_authenticate<S>(stream: &mut S, user: &str, password: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let too_long = || Error::Proxy("SOCKS5 credentials longer than 255 bytes".to_string());
    let user_len = u8::try_from(user.len()).map_err(|_| too_long())?;
    let password_len = u8::try_from(password.len()).map_err(|_| too_long())?;

    let mut auth = vec![1, user_len];
    auth.extend_from_slice(user.as_bytes());
    auth.push(password_len);
    auth.extend_from_slice(password.as_bytes());
    stream.write_all(&auth).await.map_err(proxy_io)?;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await.map_err(proxy_io)?;
    if status[1] != 0 {
        return Err(Error::Proxy("SOCKS5 authentication rejected".to_string()));
    }
    Ok(())
}

async fn resolve(host: &str, port: u16) -> Result<IpAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(proxy_io)?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| Error::Proxy(format!("no address for {}", host)))
}

/// Percent-decoded userinfo of the proxy URL, if it carries a user name.
fn credentials(proxy: &Url) -> Option<(String, String)> {
    if proxy.username().is_empty() {
        return None;
    }
    let decode = |s: &str| {
        urlencoding::decode(s)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| s.to_string())
    };
    Some((
        decode(proxy.username()),
        decode(proxy.password().unwrap_or_default()),
    ))
}

fn strip_brackets(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

fn proxy_io(e: std::io::Error) -> Error {
    Error::Proxy(e.to_string())
}
