// PNG container parsing and incremental zlib inflate.
//
// The whole compressed file is already in memory (it arrives as one HTTP
// payload), so chunks are walked in place. IDAT is inflated through
// miniz_oxide's streaming core in 4KB input slices with a 32KB circular
// dictionary; the decompressed raster is the one buffer we keep, because
// the scaler needs random row access. Trade-off: peak memory is the full
// decompressed image (w * bpp + 1 per row), which bounds the largest
// decodable source by available RAM.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

const PNG_SIG: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

const CHUNK_IHDR: [u8; 4] = *b"IHDR";
const CHUNK_PLTE: [u8; 4] = *b"PLTE";
const CHUNK_IDAT: [u8; 4] = *b"IDAT";
const CHUNK_IEND: [u8; 4] = *b"IEND";

const COLOR_RGB: u8 = 2;
const COLOR_PALETTE: u8 = 3;
const COLOR_RGBA: u8 = 6;

const FILTER_NONE: u8 = 0;

// max total pixels we are willing to decode (memory guard)
const MAX_PIXELS: u32 = 1024 * 1024;

// miniz_oxide LZ dictionary size; must be a power of two >= 32768
const DICT_SIZE: usize = 32_768;

// compressed input fed to the inflater per step
const INFLATE_CHUNK: usize = 4096;

/// Why a decode pass gave up on an image. All variants are terminal for
/// that image only; the caller falls back to a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Malformed container: bad signature, missing mandatory chunk.
    Format(&'static str),
    /// Valid PNG, but a feature this decoder does not handle.
    UnsupportedFormat(&'static str),
    /// The zlib stream inside IDAT is corrupt or truncated.
    Decompress(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Format(m) => write!(f, "png format: {}", m),
            DecodeError::UnsupportedFormat(m) => write!(f, "png unsupported: {}", m),
            DecodeError::Decompress(m) => write!(f, "png decompress: {}", m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Rgb,
    Rgba,
    Palette,
}

impl ColorMode {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ColorMode::Rgb => 3,
            ColorMode::Rgba => 4,
            ColorMode::Palette => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_mode: ColorMode,
}

impl Header {
    // byte length of one unfiltered row (without the leading filter byte)
    pub(crate) fn scanline_bytes(&self) -> usize {
        self.width as usize * self.color_mode.bytes_per_pixel()
    }
}

/// What to do with scanlines whose filter byte is not 0 (None).
/// Filters 1-4 are never applied by this decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    /// Serve the row as blank (the caller renders a gap). Source behaviour.
    #[default]
    SkipRow,
    /// Fail the whole image with `UnsupportedFormat`.
    Reject,
}

/// One decode pass over a PNG byte stream. Owns the header, the palette
/// (palette mode only) and the decompressed raster; rows are served by
/// index, so the scaler can walk them more than once.
#[derive(Debug)]
pub struct Decoder {
    header: Header,
    palette: Vec<u8>, // RGB triples; empty unless palette mode
    raster: Vec<u8>,  // height rows of (1 filter byte + scanline_bytes)
}

impl Decoder {
    pub fn new(data: &[u8]) -> Result<Self, DecodeError> {
        Self::with_policy(data, FilterPolicy::default())
    }

    pub fn with_policy(data: &[u8], policy: FilterPolicy) -> Result<Self, DecodeError> {
        if data.len() < 8 || data[..8] != PNG_SIG {
            return Err(DecodeError::Format("invalid signature"));
        }

        let header = parse_ihdr(data)?;
        let palette = match header.color_mode {
            ColorMode::Palette => collect_plte(data)?,
            _ => Vec::new(),
        };
        let idat = collect_idat(data)?;

        let stride = 1 + header.scanline_bytes();
        let expected = stride * header.height as usize;
        let raster = inflate_all(&idat, expected)?;

        if raster.len() < expected {
            log::warn!(
                "png: short pixel stream, {} of {} bytes",
                raster.len(),
                expected
            );
        }

        if policy == FilterPolicy::Reject {
            let complete_rows = raster.len() / stride;
            for y in 0..complete_rows {
                if raster[y * stride] != FILTER_NONE {
                    return Err(DecodeError::UnsupportedFormat("filtered scanline"));
                }
            }
        }

        Ok(Self {
            header,
            palette,
            raster,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Raw samples of source row `y`, or `None` for a blank row: out of
    /// range, truncated out of the pixel stream, or carrying an unapplied
    /// filter (under `FilterPolicy::SkipRow`).
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.header.height {
            return None;
        }
        let stride = 1 + self.header.scanline_bytes();
        let start = y as usize * stride;
        let end = start + stride;
        if end > self.raster.len() {
            return None;
        }
        if self.raster[start] != FILTER_NONE {
            return None;
        }
        Some(&self.raster[start + 1..end])
    }

    /// Palette entry as an RGB triple; `None` for an out-of-range index.
    pub fn palette_rgb(&self, index: u8) -> Option<(u8, u8, u8)> {
        let base = index as usize * 3;
        if base + 3 > self.palette.len() {
            return None;
        }
        Some((
            self.palette[base],
            self.palette[base + 1],
            self.palette[base + 2],
        ))
    }
}

// ── Chunk walking ───────────────────────────────────────────────────────

// big-endian u32 (PNG uses network byte order)
#[inline]
fn be_u32(d: &[u8], o: usize) -> u32 {
    u32::from_be_bytes([d[o], d[o + 1], d[o + 2], d[o + 3]])
}

// iterator over PNG chunks; yields (type, data) pairs, stops at IEND
// or on a structurally short chunk. CRCs are not verified.
struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> ChunkIter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 8,
            done: false,
        }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos + 12 > self.data.len() {
            return None;
        }
        let len = be_u32(self.data, self.pos) as usize;
        let ctype: [u8; 4] = self.data[self.pos + 4..self.pos + 8].try_into().ok()?;
        let data_start = self.pos + 8;
        let data_end = data_start.checked_add(len)?;
        if data_end + 4 > self.data.len() {
            return None;
        }
        self.pos = data_end + 4; // skip CRC
        if ctype == CHUNK_IEND {
            self.done = true;
        }
        Some((ctype, &self.data[data_start..data_end]))
    }
}

fn parse_ihdr(data: &[u8]) -> Result<Header, DecodeError> {
    let mut chunks = ChunkIter::new(data);
    let (ctype, cdata) = chunks.next().ok_or(DecodeError::Format("missing IHDR"))?;
    if ctype != CHUNK_IHDR || cdata.len() < 13 {
        return Err(DecodeError::Format("IHDR must be the first chunk"));
    }

    let width = be_u32(cdata, 0);
    let height = be_u32(cdata, 4);
    let bit_depth = cdata[8];
    let color_type = cdata[9];
    let interlace = cdata[12];

    if width == 0 || height == 0 {
        return Err(DecodeError::Format("zero dimensions"));
    }
    if interlace != 0 {
        return Err(DecodeError::UnsupportedFormat("interlaced (Adam7)"));
    }
    if bit_depth != 8 {
        return Err(DecodeError::UnsupportedFormat("bit depth is not 8"));
    }
    let color_mode = match color_type {
        COLOR_RGB => ColorMode::Rgb,
        COLOR_PALETTE => ColorMode::Palette,
        COLOR_RGBA => ColorMode::Rgba,
        _ => return Err(DecodeError::UnsupportedFormat("colour type")),
    };
    if width.saturating_mul(height) > MAX_PIXELS {
        return Err(DecodeError::UnsupportedFormat("image exceeds pixel limit"));
    }

    Ok(Header {
        width,
        height,
        bit_depth,
        color_mode,
    })
}

// concatenate all IDAT chunk payloads into a single buffer; PNG permits
// splitting one zlib stream across any number of IDAT chunks
fn collect_idat(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let total: usize = ChunkIter::new(data)
        .filter(|(t, _)| *t == CHUNK_IDAT)
        .map(|(_, d)| d.len())
        .sum();
    if total == 0 {
        return Err(DecodeError::Format("no IDAT data"));
    }

    let mut idat = Vec::new();
    idat.try_reserve_exact(total)
        .map_err(|_| DecodeError::Decompress("OOM for IDAT"))?;
    for (ctype, cdata) in ChunkIter::new(data) {
        if ctype == CHUNK_IDAT {
            idat.extend_from_slice(cdata);
        }
    }
    Ok(idat)
}

// PLTE chunk as raw RGB triples; mandatory for palette-mode images
fn collect_plte(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    for (ctype, cdata) in ChunkIter::new(data) {
        if ctype == CHUNK_PLTE {
            if cdata.is_empty() || cdata.len() % 3 != 0 || cdata.len() > 768 {
                return Err(DecodeError::Format("invalid PLTE"));
            }
            let mut plte = Vec::new();
            plte.try_reserve_exact(cdata.len())
                .map_err(|_| DecodeError::Decompress("OOM for PLTE"))?;
            plte.extend_from_slice(cdata);
            return Ok(plte);
        }
        if ctype == CHUNK_IDAT {
            break; // PLTE must precede IDAT
        }
    }
    Err(DecodeError::UnsupportedFormat("palette image without PLTE"))
}

// ── Incremental inflate ─────────────────────────────────────────────────

// inflate the concatenated IDAT stream, feeding INFLATE_CHUNK bytes at a
// time through a DICT_SIZE circular window; output accumulates into one
// buffer capped at `expected` bytes (trailing zlib output is dropped)
fn inflate_all(idat: &[u8], expected: usize) -> Result<Vec<u8>, DecodeError> {
    use miniz_oxide::inflate::TINFLStatus;
    use miniz_oxide::inflate::core::{DecompressorOxide, decompress, inflate_flags};

    let mut out = Vec::new();
    out.try_reserve_exact(expected)
        .map_err(|_| DecodeError::Decompress("OOM for raster"))?;

    // ~11KB of inflater state; heap-allocated zeroed so no_std targets
    // never stage it on the stack
    let decomp_layout = core::alloc::Layout::new::<DecompressorOxide>();
    let decomp_ptr = unsafe { alloc::alloc::alloc_zeroed(decomp_layout) };
    if decomp_ptr.is_null() {
        return Err(DecodeError::Decompress("OOM for decompressor"));
    }
    let mut decomp = unsafe { Box::from_raw(decomp_ptr as *mut DecompressorOxide) };

    let mut dict = vec![0u8; DICT_SIZE];
    let mut in_pos: usize = 0;
    let mut dict_pos: usize = 0; // cumulative output position

    loop {
        let fed = INFLATE_CHUNK.min(idat.len() - in_pos);
        let has_more = in_pos + fed < idat.len();

        let flags = inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER
            | if has_more {
                inflate_flags::TINFL_FLAG_HAS_MORE_INPUT
            } else {
                0
            };

        let write_pos = dict_pos & (DICT_SIZE - 1);
        let (status, consumed, produced) = decompress(
            &mut *decomp,
            &idat[in_pos..in_pos + fed],
            &mut dict,
            write_pos,
            flags,
        );

        in_pos += consumed;

        // drain produced bytes out of the circular window
        for i in 0..produced {
            if out.len() >= expected {
                break;
            }
            out.push(dict[(write_pos + i) & (DICT_SIZE - 1)]);
        }

        dict_pos += produced;

        match status {
            TINFLStatus::Done => break,
            TINFLStatus::NeedsMoreInput => {
                if !has_more && consumed == fed {
                    return Err(DecodeError::Decompress("truncated IDAT stream"));
                }
                if consumed == 0 && produced == 0 {
                    return Err(DecodeError::Decompress("IDAT decompression stuck"));
                }
            }
            TINFLStatus::HasMoreOutput => {
                // window full; recycled on the next pass
                if produced == 0 && consumed == 0 {
                    return Err(DecodeError::Decompress("decompression stalled"));
                }
                if out.len() >= expected {
                    break; // raster complete; ignore trailing output
                }
            }
            _ => return Err(DecodeError::Decompress("IDAT decompression error")),
        }
    }

    Ok(out)
}
