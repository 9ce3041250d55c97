// Minimal PNG decoder for small RGB565 SPI displays.
// Decodes 8-bit RGB / RGBA / palette PNGs and serves raw scanlines for
// nearest-neighbour scaling to the display raster; never holds a full
// decoded-and-scaled frame in memory.
//
// Deliberate non-goals: interlacing (rejected, not silently corrupted),
// bit depths other than 8, greyscale colour types, filter types 1-4
// (skipped or rejected per FilterPolicy), colour management, dithering.

#![no_std]

extern crate alloc;

mod decode;
mod scale;

#[cfg(test)]
mod tests_util;

pub use decode::{ColorMode, DecodeError, Decoder, FilterPolicy, Header};
pub use scale::{ScaledRows, pack565};
