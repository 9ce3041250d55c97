// Request/response contract for the image generation endpoint
// (Automatic1111 `/sdapi/v1/txt2img`). Everything here is pure and
// host-tested; the firmware's HTTP client only moves bytes.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::b64;
use crate::error::TransportError;
use crate::json;

const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// One txt2img request, fully resolved from config and selection state.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub sampler: String,
    pub steps: u32,
    pub cfg_scale: f32,
    pub width: u32,
    pub height: u32,
    pub seed: Option<u32>,
}

impl GenerationRequest {
    /// JSON request body. `seed` is omitted when absent so the server
    /// picks its own.
    pub fn payload(&self) -> String {
        let mut out = String::from("{\"prompt\": ");
        json::escape_into(&mut out, &self.prompt);
        out.push_str(", \"sampler_name\": ");
        json::escape_into(&mut out, &self.sampler);
        let _ = write!(
            out,
            ", \"steps\": {}, \"cfg_scale\": {}, \"width\": {}, \"height\": {}",
            self.steps, self.cfg_scale, self.width, self.height
        );
        if let Some(seed) = self.seed {
            let _ = write!(out, ", \"seed\": {}", seed);
        }
        out.push('}');
        out
    }
}

/// Byte offset of the `\r\n\r\n` separating response headers from the
/// body, once the accumulated bytes contain one.
pub fn header_end(response: &[u8]) -> Option<usize> {
    response.windows(4).position(|w| w == b"\r\n\r\n")
}

/// `Authorization: Basic` header value.
pub fn basic_auth(user: &str, password: &str) -> String {
    let mut creds = String::with_capacity(user.len() + password.len() + 1);
    creds.push_str(user);
    creds.push(':');
    creds.push_str(password);
    let mut out = String::from("Basic ");
    out.push_str(&b64::encode(creds.as_bytes()));
    out
}

/// How a delivered image payload should reach the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Exactly `width * height * 2` bytes: a pre-rendered RGB565 frame.
    Raw565,
    /// Anything else: a compressed image for the decoder.
    Compressed,
}

/// Length is the sole discriminator. A payload of exactly one raw frame
/// is raw even if its first bytes happen to spell a PNG signature.
pub fn classify(len: usize, width: u32, height: u32) -> ImageKind {
    if len == width as usize * height as usize * 2 {
        ImageKind::Raw565
    } else {
        ImageKind::Compressed
    }
}

/// Reduce a 200 response body to image bytes.
///
/// `Content-Type: application/octet-stream` is taken at its word. For
/// anything else the body is sniffed: a JSON document is unwrapped as
/// the server's `{"images": [base64, ...]}` envelope; a PNG signature or
/// a mostly-binary body passes through unchanged.
pub fn extract_image(content_type: Option<&str>, body: &[u8]) -> Result<Vec<u8>, TransportError> {
    if body.is_empty() {
        return Err(TransportError::Empty);
    }
    if let Some(ct) = content_type {
        if ct
            .split(';')
            .next()
            .map(str::trim)
            .is_some_and(|t| t.eq_ignore_ascii_case("application/octet-stream"))
        {
            return Ok(body.to_vec());
        }
    }

    let trimmed = skip_ascii_ws(body);
    if trimmed.first().is_some_and(|&c| c == b'{' || c == b'[') {
        return unwrap_json_envelope(trimmed);
    }
    if body.len() >= 8 && body[..8] == PNG_MAGIC {
        return Ok(body.to_vec());
    }
    if looks_binary(body) {
        return Ok(body.to_vec());
    }
    Err(TransportError::Malformed("unrecognized response body"))
}

fn skip_ascii_ws(body: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < body.len() && matches!(body[i], b' ' | b'\t' | b'\r' | b'\n') {
        i += 1;
    }
    &body[i..]
}

fn unwrap_json_envelope(body: &[u8]) -> Result<Vec<u8>, TransportError> {
    let doc = json::parse(body).map_err(TransportError::Malformed)?;
    let first = doc
        .get("images")
        .and_then(|imgs| imgs.idx(0))
        .and_then(json::Value::as_str)
        .ok_or(TransportError::Malformed("no images in response"))?;
    b64::decode(first).map_err(TransportError::Malformed)
}

// text responses (error pages) are overwhelmingly printable ASCII; a
// real image hits this threshold within a few bytes
fn looks_binary(body: &[u8]) -> bool {
    let sample = &body[..body.len().min(512)];
    let opaque = sample
        .iter()
        .filter(|&&b| b >= 0x80 || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r')))
        .count();
    opaque * 5 >= sample.len()
}
