// Nearest-neighbour scaling to the display raster, one output scanline
// at a time. The caller owns the scanline buffer (out_w * 2 bytes), so
// the largest live allocation stays the decoded raster.

use crate::decode::{ColorMode, Decoder};

/// Pack 8-bit RGB into RGB565. The display bus takes the two bytes
/// big-endian, high byte first.
#[inline]
pub const fn pack565(r: u8, g: u8, b: u8) -> u16 {
    (((r & 0xF8) as u16) << 8) | (((g & 0xFC) as u16) << 3) | ((b >> 3) as u16)
}

/// View of a decoded image resampled to `out_w` x `out_h`. Rows missing
/// from the source (truncated or filter-skipped) come out black rather
/// than failing the frame.
pub struct ScaledRows<'a> {
    decoder: &'a Decoder,
    out_w: u32,
    out_h: u32,
}

impl<'a> ScaledRows<'a> {
    pub fn new(decoder: &'a Decoder, out_w: u32, out_h: u32) -> Self {
        Self {
            decoder,
            out_w,
            out_h,
        }
    }

    pub fn width(&self) -> u32 {
        self.out_w
    }

    pub fn height(&self) -> u32 {
        self.out_h
    }

    /// Fill `out` with output row `oy` as big-endian RGB565. `out` must
    /// hold at least `out_w * 2` bytes; excess is left untouched.
    pub fn scanline(&self, oy: u32, out: &mut [u8]) {
        debug_assert!(out.len() >= self.out_w as usize * 2);

        let header = self.decoder.header();
        let src_w = header.width;
        let src_h = header.height;

        let sy = ((oy as u64 * src_h as u64) / self.out_h as u64).min(src_h as u64 - 1) as u32;
        let row = self.decoder.row(sy);

        let bpp = header.color_mode.bytes_per_pixel();
        for ox in 0..self.out_w {
            let sx = ((ox as u64 * src_w as u64) / self.out_w as u64).min(src_w as u64 - 1) as u32;
            let (r, g, b) = match row {
                Some(row) => self.sample(row, sx as usize * bpp),
                None => (0, 0, 0),
            };
            let px = pack565(r, g, b);
            let o = ox as usize * 2;
            out[o] = (px >> 8) as u8;
            out[o + 1] = px as u8;
        }
    }

    // fetch one source pixel; anything unresolvable reads as black
    fn sample(&self, row: &[u8], base: usize) -> (u8, u8, u8) {
        match self.decoder.header().color_mode {
            ColorMode::Rgb => {
                if base + 3 > row.len() {
                    return (0, 0, 0);
                }
                (row[base], row[base + 1], row[base + 2])
            }
            ColorMode::Rgba => {
                if base + 4 > row.len() {
                    return (0, 0, 0);
                }
                // alpha dropped; no compositing on this display
                (row[base], row[base + 1], row[base + 2])
            }
            ColorMode::Palette => {
                if base >= row.len() {
                    return (0, 0, 0);
                }
                self.decoder.palette_rgb(row[base]).unwrap_or((0, 0, 0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use crate::tests_util::{chunk, png_bytes, rgb_image, signature};
    use alloc::vec;

    #[test]
    fn pack565_matches_reference_values() {
        assert_eq!(pack565(0, 0, 0), 0x0000);
        assert_eq!(pack565(255, 255, 255), 0xFFFF);
        assert_eq!(pack565(255, 0, 0), 0xF800);
        assert_eq!(pack565(0, 255, 0), 0x07E0);
        assert_eq!(pack565(0, 0, 255), 0x001F);
        // low bits discarded, not rounded
        assert_eq!(pack565(0x07, 0x03, 0x07), 0x0000);
    }

    #[test]
    fn identity_scale_copies_pixels() {
        let data = rgb_image(2, 2, |x, y| ((x * 255) as u8, (y * 255) as u8, 0));
        let dec = Decoder::new(&data).unwrap();
        let scaled = ScaledRows::new(&dec, 2, 2);

        let mut line = [0u8; 4];
        scaled.scanline(0, &mut line);
        let px0 = u16::from_be_bytes([line[0], line[1]]);
        let px1 = u16::from_be_bytes([line[2], line[3]]);
        assert_eq!(px0, pack565(0, 0, 0));
        assert_eq!(px1, pack565(255, 0, 0));

        scaled.scanline(1, &mut line);
        let px0 = u16::from_be_bytes([line[0], line[1]]);
        assert_eq!(px0, pack565(0, 255, 0));
    }

    #[test]
    fn upscale_to_display_raster() {
        // 100x100 source, 240x240 output: every scanline fills 480 bytes
        let data = rgb_image(100, 100, |x, _| if x < 50 { (255, 0, 0) } else { (0, 0, 255) });
        let dec = Decoder::new(&data).unwrap();
        let scaled = ScaledRows::new(&dec, 240, 240);

        let mut line = vec![0xAAu8; 480];
        for oy in [0u32, 119, 239] {
            scaled.scanline(oy, &mut line);
            let left = u16::from_be_bytes([line[0], line[1]]);
            let right = u16::from_be_bytes([line[478], line[479]]);
            assert_eq!(left, pack565(255, 0, 0));
            assert_eq!(right, pack565(0, 0, 255));
        }
    }

    #[test]
    fn downscale_picks_nearest_source_rows() {
        // 4x4 source with distinct row colors, scaled to 2x2:
        // oy=0 -> sy = 0*4/2 = 0, oy=1 -> sy = 1*4/2 = 2
        let data = rgb_image(4, 4, |_, y| ((y * 60) as u8, 0, 0));
        let dec = Decoder::new(&data).unwrap();
        let scaled = ScaledRows::new(&dec, 2, 2);

        let mut line = [0u8; 4];
        scaled.scanline(0, &mut line);
        assert_eq!(u16::from_be_bytes([line[0], line[1]]), pack565(0, 0, 0));
        scaled.scanline(1, &mut line);
        assert_eq!(u16::from_be_bytes([line[0], line[1]]), pack565(120, 0, 0));
    }

    #[test]
    fn blank_rows_render_black() {
        let mut raw = alloc::vec::Vec::new();
        raw.push(0u8);
        raw.extend_from_slice(&[255, 255, 255]);
        raw.push(1u8); // filter Sub, skipped
        raw.extend_from_slice(&[255, 255, 255]);
        let z = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
        let data = png_bytes(1, 2, 8, 2, 0, &[], Some(&z));

        let dec = Decoder::new(&data).unwrap();
        let scaled = ScaledRows::new(&dec, 1, 2);
        let mut line = [0xFFu8; 2];
        scaled.scanline(1, &mut line);
        assert_eq!(line, [0, 0]);
    }

    #[test]
    fn rgba_alpha_is_dropped() {
        let mut raw = alloc::vec::Vec::new();
        raw.push(0u8);
        raw.extend_from_slice(&[200, 100, 50, 0]); // fully transparent
        let z = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
        let data = png_bytes(1, 1, 8, 6, 0, &[], Some(&z));

        let dec = Decoder::new(&data).unwrap();
        let scaled = ScaledRows::new(&dec, 1, 1);
        let mut line = [0u8; 2];
        scaled.scanline(0, &mut line);
        assert_eq!(u16::from_be_bytes([line[0], line[1]]), pack565(200, 100, 50));
    }

    #[test]
    fn palette_out_of_range_index_is_black() {
        let plte = [10u8, 20, 30]; // one entry
        let raw = [0u8, 0, 5]; // index 5 has no palette entry
        let z = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
        let mut data = signature();
        let mut ihdr = [0u8; 13];
        ihdr[..4].copy_from_slice(&2u32.to_be_bytes());
        ihdr[4..8].copy_from_slice(&1u32.to_be_bytes());
        ihdr[8] = 8;
        ihdr[9] = 3;
        data.extend_from_slice(&chunk(*b"IHDR", &ihdr));
        data.extend_from_slice(&chunk(*b"PLTE", &plte));
        data.extend_from_slice(&chunk(*b"IDAT", &z));
        data.extend_from_slice(&chunk(*b"IEND", &[]));

        let dec = Decoder::new(&data).unwrap();
        let scaled = ScaledRows::new(&dec, 2, 1);
        let mut line = [0xFFu8; 4];
        scaled.scanline(0, &mut line);
        assert_eq!(
            u16::from_be_bytes([line[0], line[1]]),
            pack565(10, 20, 30)
        );
        assert_eq!(u16::from_be_bytes([line[2], line[3]]), 0);
    }

    proptest::proptest! {
        // every output coordinate maps inside the source raster
        #[test]
        fn mapping_stays_in_bounds(
            src in 1u32..512,
            out in 1u32..512,
            o in 0u32..512,
        ) {
            proptest::prop_assume!(o < out);
            let s = ((o as u64 * src as u64) / out as u64).min(src as u64 - 1);
            proptest::prop_assert!(s < src as u64);
            // first output pixel always maps to source origin
            let first = ((0u64 * src as u64) / out as u64).min(src as u64 - 1);
            proptest::prop_assert_eq!(first, 0);
        }
    }
}
