// ST7789VW panel behind the Waveshare Pico LCD 1.3 hat, SPI with a
// shared data/command pin. Pixel traffic is big-endian RGB565, pushed
// through an inclusive CASET/RASET window.

use alloc::vec;
use alloc::vec::Vec;

use clicker_core::{FrameSink, SinkError};
use embassy_rp::gpio::Output;
use embassy_time::{Duration, block_for};
use embedded_hal::spi::SpiDevice;

use crate::drivers::font;
use crate::drivers::sdcard::SdStorage;
use crate::store;

mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
}

// 16 bits per pixel
const COLMOD_RGB565: u8 = 0x05;
const TEXT_FG: u16 = 0xFFFF;
const TEXT_BG: u16 = 0x0000;
const FILE_CHUNK: usize = 4096;

pub struct St7789<SPI, SD>
where
    SPI: SpiDevice,
    SD: SpiDevice + 'static,
{
    spi: SPI,
    dc: Output<'static>,
    rst: Output<'static>,
    width: u16,
    height: u16,
    sd: &'static SdStorage<SD>,
}

impl<SPI, SD> St7789<SPI, SD>
where
    SPI: SpiDevice,
    SD: SpiDevice,
{
    pub fn new(
        spi: SPI,
        dc: Output<'static>,
        rst: Output<'static>,
        width: u16,
        height: u16,
        sd: &'static SdStorage<SD>,
    ) -> Self {
        Self {
            spi,
            dc,
            rst,
            width,
            height,
            sd,
        }
    }

    pub fn init(&mut self) -> Result<(), SinkError> {
        self.rst.set_low();
        block_for(Duration::from_millis(50));
        self.rst.set_high();
        block_for(Duration::from_millis(50));

        self.command(cmd::SWRESET)?;
        block_for(Duration::from_millis(150));
        self.command(cmd::SLPOUT)?;
        block_for(Duration::from_millis(10));
        self.command(cmd::COLMOD)?;
        self.data(&[COLMOD_RGB565])?;
        self.command(cmd::MADCTL)?;
        self.data(&[0x00])?;
        self.command(cmd::DISPON)?;
        block_for(Duration::from_millis(10));
        Ok(())
    }

    fn command(&mut self, c: u8) -> Result<(), SinkError> {
        self.dc.set_low();
        let r = self.spi.write(&[c]).map_err(|_| SinkError::Bus("command write failed"));
        self.dc.set_high();
        r
    }

    fn data(&mut self, d: &[u8]) -> Result<(), SinkError> {
        self.spi.write(d).map_err(|_| SinkError::Bus("data write failed"))
    }

    // scale x scale solid block, used by the text renderer
    fn fill_rect(&mut self, x: u16, y: u16, side: u16, color: u16) -> Result<(), SinkError> {
        self.set_window(
            x as u32,
            y as u32,
            (x + side - 1) as u32,
            (y + side - 1) as u32,
        )?;
        let [hi, lo] = color.to_be_bytes();
        let mut px = Vec::with_capacity(side as usize * side as usize * 2);
        for _ in 0..side as usize * side as usize {
            px.push(hi);
            px.push(lo);
        }
        self.write_chunk(&px)
    }
}

impl<SPI, SD> FrameSink for St7789<SPI, SD>
where
    SPI: SpiDevice,
    SD: SpiDevice,
{
    fn size(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    fn set_window(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) -> Result<(), SinkError> {
        let coords = |a: u32, b: u32| -> [u8; 4] {
            let (a, b) = (a as u16, b as u16);
            [(a >> 8) as u8, a as u8, (b >> 8) as u8, b as u8]
        };
        self.command(cmd::CASET)?;
        self.data(&coords(x0, x1))?;
        self.command(cmd::RASET)?;
        self.data(&coords(y0, y1))?;
        self.command(cmd::RAMWR)
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), SinkError> {
        self.data(data)
    }

    fn fill_solid(&mut self, color: u16) -> Result<(), SinkError> {
        self.set_window(0, 0, self.width as u32 - 1, self.height as u32 - 1)?;
        let [hi, lo] = color.to_be_bytes();
        let mut row = Vec::with_capacity(self.width as usize * 2);
        for _ in 0..self.width {
            row.push(hi);
            row.push(lo);
        }
        for _ in 0..self.height {
            self.write_chunk(&row)?;
        }
        Ok(())
    }

    fn write_raw_file(&mut self, name: &str, expected_len: usize) -> Result<(), SinkError> {
        let size = store::file_size(self.sd, name)
            .map_err(|_| SinkError::Bus("sd probe failed"))?
            .ok_or(SinkError::Bus("raw frame missing"))? as usize;
        if size != expected_len {
            defmt::warn!("raw frame {} is {} bytes, expected {}", name, size, expected_len);
        }

        self.set_window(0, 0, self.width as u32 - 1, self.height as u32 - 1)?;
        let mut buf = vec![0u8; FILE_CHUNK];
        let mut offset: u32 = 0;
        while (offset as usize) < size {
            let n = store::read_chunk(self.sd, name, offset, &mut buf)
                .map_err(|_| SinkError::Bus("sd read failed"))?
                .ok_or(SinkError::Bus("raw frame missing"))?;
            if n == 0 {
                break;
            }
            self.write_chunk(&buf[..n])?;
            offset += n as u32;
        }
        Ok(())
    }

    fn show_text(&mut self, msg: &str) -> Result<(), SinkError> {
        self.fill_solid(TEXT_BG)?;

        let lines: Vec<&str> = msg.split('\n').collect();
        let max_chars = lines
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);

        // largest scale that keeps the block inside 90% of the panel
        let (w, h) = (self.width as usize, self.height as usize);
        let scale_w = (w * 9 / 10) / (font::ADVANCE * max_chars);
        let scale_h = (h * 9 / 10) / (font::GLYPH_HEIGHT * lines.len());
        let scale = scale_w.min(scale_h).max(1);

        let block_h = lines.len() * font::LINE_ADVANCE * scale;
        let mut y = h.saturating_sub(block_h) / 2;
        for line in &lines {
            let chars = line.chars().count();
            let line_w = chars * font::ADVANCE * scale;
            let mut x = w.saturating_sub(line_w) / 2;
            for c in line.chars() {
                let columns = font::glyph(c);
                for (cx, col) in columns.iter().enumerate() {
                    for cy in 0..font::GLYPH_HEIGHT {
                        if col & (1 << cy) != 0 {
                            self.fill_rect(
                                (x + cx * scale) as u16,
                                (y + cy * scale) as u16,
                                scale as u16,
                                TEXT_FG,
                            )?;
                        }
                    }
                }
                x += font::ADVANCE * scale;
            }
            y += font::LINE_ADVANCE * scale;
        }
        Ok(())
    }
}
