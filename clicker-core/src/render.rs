// Decode, scale and push a frame to the sink. Pixel traffic is staged
// through a 4KB chunk buffer, matching the bus transfer size the panel
// driver uses.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use png565::{DecodeError, Decoder, ScaledRows};

use crate::error::SinkError;
use crate::sink::FrameSink;

const CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    Decode(DecodeError),
    Sink(SinkError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Decode(e) => write!(f, "{}", e),
            RenderError::Sink(e) => write!(f, "{}", e),
        }
    }
}

impl From<DecodeError> for RenderError {
    fn from(e: DecodeError) -> Self {
        RenderError::Decode(e)
    }
}

impl From<SinkError> for RenderError {
    fn from(e: SinkError) -> Self {
        RenderError::Sink(e)
    }
}

/// Decode a compressed image and draw it scaled to the full panel.
pub fn draw_png(sink: &mut dyn FrameSink, data: &[u8]) -> Result<(), RenderError> {
    let decoder = Decoder::new(data)?;
    let (w, h) = sink.size();
    let scaled = ScaledRows::new(&decoder, w, h);

    sink.set_window(0, 0, w - 1, h - 1)?;

    let line_len = w as usize * 2;
    let mut line = vec![0u8; line_len];
    let mut chunk: Vec<u8> = Vec::with_capacity(CHUNK);
    for oy in 0..h {
        scaled.scanline(oy, &mut line);
        chunk.extend_from_slice(&line);
        if chunk.len() + line_len > CHUNK {
            sink.write_chunk(&chunk)?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        sink.write_chunk(&chunk)?;
    }
    Ok(())
}

/// Draw an in-memory raw RGB565 frame (big-endian, full panel size).
pub fn draw_raw(sink: &mut dyn FrameSink, data: &[u8]) -> Result<(), SinkError> {
    let (w, h) = sink.size();
    sink.set_window(0, 0, w - 1, h - 1)?;
    for chunk in data.chunks(CHUNK) {
        sink.write_chunk(chunk)?;
    }
    Ok(())
}

/// Fallback frame when nothing has ever been generated: dark field with
/// a hint text.
pub fn draw_placeholder(sink: &mut dyn FrameSink) -> Result<(), SinkError> {
    sink.fill_solid(png565::pack565(24, 28, 36))?;
    sink.show_text("NO IMAGE")
}
