// Minimal HTTP/1.0 client for the txt2img endpoint. One request per
// connection, Connection: close, body read to EOF. A 200 whose body is
// exactly one raw RGB565 frame (by Content-Length and content type) is
// streamed to the SD card instead of being held in RAM.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Write as _;

use clicker_core::api::{self, GenerationRequest, ImageKind};
use clicker_core::config::AppConfig;
use clicker_core::storage::{RAW_FILE, RAW_TMP};
use clicker_core::{FetchOutcome, Storage, TransportError};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Stack};
use embedded_io_async::{Read, Write};
use embassy_time::{Duration, with_timeout};

use crate::store::CardStore;

const MAX_HEADER: usize = 8 * 1024;
const MAX_BODY: usize = 256 * 1024;

pub async fn fetch<SPI>(
    stack: Stack<'static>,
    config: &AppConfig,
    auth: Option<&str>,
    api_key: Option<&str>,
    request: &GenerationRequest,
    files: &mut CardStore<SPI>,
) -> FetchOutcome
where
    SPI: embedded_hal::spi::SpiDevice,
{
    match fetch_inner(stack, config, auth, api_key, request, files).await {
        Ok(outcome) => outcome,
        Err(e) => FetchOutcome::Failure(e),
    }
}

async fn fetch_inner<SPI>(
    stack: Stack<'static>,
    config: &AppConfig,
    auth: Option<&str>,
    api_key: Option<&str>,
    request: &GenerationRequest,
    files: &mut CardStore<SPI>,
) -> Result<FetchOutcome, TransportError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    let (host, port) = endpoint(&config.api_base_url)
        .ok_or(TransportError::Malformed("bad api_base_url"))?;

    let addr = resolve(stack, host).await?;

    let mut rx_buffer = [0u8; 8192];
    let mut tx_buffer = [0u8; 2048];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(config.timeout_seconds as u64)));

    with_timeout(
        Duration::from_secs(config.timeout_seconds as u64),
        socket.connect((addr, port)),
    )
    .await
    .map_err(|_| TransportError::Timeout)?
    .map_err(|_| TransportError::Io("connect failed"))?;

    let body = request.payload();
    let mut head = String::new();
    let _ = write!(
        head,
        "POST {} HTTP/1.0\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n",
        config.api_path,
        host,
        body.len()
    );
    if let Some(auth) = auth {
        let _ = write!(head, "Authorization: {}\r\n", auth);
    }
    if let Some(key) = api_key {
        let _ = write!(head, "X-API-Key: {}\r\n", key);
    }
    head.push_str("Connection: close\r\n\r\n");

    socket
        .write_all(head.as_bytes())
        .await
        .map_err(|_| TransportError::Io("send failed"))?;
    socket
        .write_all(body.as_bytes())
        .await
        .map_err(|_| TransportError::Io("send failed"))?;

    // status line and headers; the generation itself happens server-side
    // during this read, so it gets the full configured timeout
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = api::header_end(&raw) {
            break pos;
        }
        if raw.len() > MAX_HEADER {
            return Err(TransportError::Malformed("oversized response header"));
        }
        let n = socket
            .read(&mut buf)
            .await
            .map_err(|_| TransportError::Io("recv failed"))?;
        if n == 0 {
            return Err(TransportError::Malformed("connection closed in headers"));
        }
        raw.extend_from_slice(&buf[..n]);
    };

    let head_text = core::str::from_utf8(&raw[..header_end])
        .map_err(|_| TransportError::Malformed("non-utf8 header"))?;
    let mut lines = head_text.split("\r\n");
    let status: u16 = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .ok_or(TransportError::Malformed("bad status line"))?;
    if status != 200 {
        return Err(TransportError::Status(status));
    }

    let mut content_type: Option<String> = None;
    let mut content_length: Option<usize> = None;
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            } else if key.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().ok();
            }
        }
    }

    let leftover = &raw[header_end + 4..];
    let frame_len =
        config.display_width as usize * config.display_height as usize * 2;

    if content_length == Some(frame_len) && is_octet_stream(content_type.as_deref()) {
        return stream_raw_frame(&mut socket, files, leftover, frame_len).await;
    }

    let mut payload = leftover.to_vec();
    loop {
        let n = socket
            .read(&mut buf)
            .await
            .map_err(|_| TransportError::Io("recv failed"))?;
        if n == 0 {
            break;
        }
        if payload.len() + n > MAX_BODY {
            return Err(TransportError::Malformed("response body too large"));
        }
        payload.extend_from_slice(&buf[..n]);
    }

    let image = api::extract_image(content_type.as_deref(), &payload)?;
    Ok(
        match api::classify(image.len(), config.display_width, config.display_height) {
            ImageKind::Raw565 => FetchOutcome::RawFrameBytes(image),
            ImageKind::Compressed => FetchOutcome::CompressedImageBytes(image),
        },
    )
}

/// Write the frame to a temp file as it arrives, then move it into
/// place. RAM never holds more than one socket buffer of pixels.
async fn stream_raw_frame<SPI>(
    socket: &mut TcpSocket<'_>,
    files: &mut CardStore<SPI>,
    leftover: &[u8],
    frame_len: usize,
) -> Result<FetchOutcome, TransportError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    let sd_err = |_| TransportError::Io("sd write failed");

    files.write(RAW_TMP, leftover).map_err(sd_err)?;
    let mut total = leftover.len();

    let mut buf = [0u8; 1024];
    while total < frame_len {
        let n = socket.read(&mut buf).await.map_err(|_| {
            let _ = files.remove(RAW_TMP);
            TransportError::Io("recv failed")
        })?;
        if n == 0 {
            break;
        }
        files.append(RAW_TMP, &buf[..n]).map_err(sd_err)?;
        total += n;
    }
    if total != frame_len {
        let _ = files.remove(RAW_TMP);
        return Err(TransportError::Malformed("short raw frame"));
    }

    files.remove(RAW_FILE).map_err(sd_err)?;
    files.rename(RAW_TMP, RAW_FILE).map_err(sd_err)?;
    Ok(FetchOutcome::RawFramePath(RAW_FILE.to_string()))
}

fn is_octet_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .is_some_and(|t| t.eq_ignore_ascii_case("application/octet-stream"))
}

/// `http://host[:port]`, default port 80. No TLS on this chip.
fn endpoint(base_url: &str) -> Option<(&str, u16)> {
    let rest = base_url.strip_prefix("http://")?;
    let rest = rest.split('/').next()?;
    match rest.split_once(':') {
        Some((host, port)) => Some((host, port.parse().ok()?)),
        None if !rest.is_empty() => Some((rest, 80)),
        None => None,
    }
}

async fn resolve(stack: Stack<'static>, host: &str) -> Result<IpAddress, TransportError> {
    if let Ok(v4) = host.parse::<core::net::Ipv4Addr>() {
        return Ok(IpAddress::from(v4));
    }
    let addrs = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|_| TransportError::Io("dns lookup failed"))?;
    addrs
        .first()
        .copied()
        .ok_or(TransportError::Io("dns returned no address"))
}
