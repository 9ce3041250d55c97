// Fixture builders shared by the decode and scale tests. Images are
// synthesized in memory with miniz_oxide's own zlib compressor, so the
// tests never depend on binary files.

use alloc::vec::Vec;

pub fn signature() -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);
    v
}

// length + type + data + dummy CRC (CRCs are not verified by the decoder)
pub fn chunk(ctype: [u8; 4], data: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&(data.len() as u32).to_be_bytes());
    v.extend_from_slice(&ctype);
    v.extend_from_slice(data);
    v.extend_from_slice(&[0u8; 4]);
    v
}

// assemble a PNG from parts; `raw` is the filtered pixel stream to
// compress unless a precompressed stream `z` is supplied
pub fn png_bytes(
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
    raw: &[u8],
    z: Option<&[u8]>,
) -> Vec<u8> {
    let mut ihdr = [0u8; 13];
    ihdr[..4].copy_from_slice(&width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&height.to_be_bytes());
    ihdr[8] = bit_depth;
    ihdr[9] = color_type;
    ihdr[12] = interlace;

    let compressed;
    let idat: &[u8] = match z {
        Some(z) => z,
        None => {
            compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw, 6);
            &compressed
        }
    };

    let mut data = signature();
    data.extend_from_slice(&chunk(*b"IHDR", &ihdr));
    data.extend_from_slice(&chunk(*b"IDAT", idat));
    data.extend_from_slice(&chunk(*b"IEND", &[]));
    data
}

// well-formed 8-bit RGB image with all-None filter bytes
pub fn rgb_image(width: u32, height: u32, px: impl Fn(u32, u32) -> (u8, u8, u8)) -> Vec<u8> {
    let mut raw = Vec::new();
    for y in 0..height {
        raw.push(0u8);
        for x in 0..width {
            let (r, g, b) = px(x, y);
            raw.push(r);
            raw.push(g);
            raw.push(b);
        }
    }
    png_bytes(width, height, 8, 2, 0, &raw, None)
}
