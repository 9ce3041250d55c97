// Display seam. The firmware implements this over an ST7789 panel; the
// recording implementation below stands in for it on the host.

use crate::error::SinkError;

pub trait FrameSink {
    /// Output raster dimensions in pixels.
    fn size(&self) -> (u32, u32);

    /// Open a drawing window; subsequent chunks fill it left-to-right,
    /// top-to-bottom. Coordinates are inclusive.
    fn set_window(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) -> Result<(), SinkError>;

    /// Push big-endian RGB565 pixel data into the open window.
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), SinkError>;

    /// Flood the whole panel with one RGB565 color.
    fn fill_solid(&mut self, color: u16) -> Result<(), SinkError>;

    /// Stream a stored full-frame raw RGB565 file straight to the panel.
    /// A stored size different from `expected_len` is drawn anyway; the
    /// implementation logs the mismatch.
    fn write_raw_file(&mut self, name: &str, expected_len: usize) -> Result<(), SinkError>;

    /// Replace the frame with a short status or error message.
    fn show_text(&mut self, msg: &str) -> Result<(), SinkError>;
}
