// Pin assignments and peripheral bring-up for the Pico 2 W with the
// Waveshare Pico LCD 1.3 hat and an SPI microSD breakout.
//
//   Display: SPI1 @ 62.5 MHz, SCK GP10, MOSI GP11, DC GP8, CS GP9,
//            RST GP12, backlight GP13
//   Buttons: A GP15, B GP17, X GP19, Y GP21, joystick press GP3
//   SD card: SPI0 @ 16 MHz, SCK GP2, MOSI GP7, MISO GP4, CS GP5
//   Radio:   CYW43439 on PIO0 (PWR GP23, CS GP25, DIO GP24, CLK GP29)

use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0, SPI0, SPI1};
use embassy_rp::spi::{self, Blocking, Spi};
use embassy_rp::{Peri, Peripherals};
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;

use crate::drivers::input::InputDriver;

pub type DisplaySpi = ExclusiveDevice<Spi<'static, SPI1, Blocking>, Output<'static>, Delay>;
pub type SdSpi = ExclusiveDevice<Spi<'static, SPI0, Blocking>, Output<'static>, Delay>;

/// Raw peripherals for the CYW43439; the network layer owns bring-up.
pub struct RadioHw {
    pub pwr: Peri<'static, PIN_23>,
    pub cs: Peri<'static, PIN_25>,
    pub pio: Peri<'static, PIO0>,
    pub dio: Peri<'static, PIN_24>,
    pub clk: Peri<'static, PIN_29>,
    pub dma: Peri<'static, DMA_CH0>,
}

pub struct Board {
    pub display_spi: DisplaySpi,
    pub dc: Output<'static>,
    pub rst: Output<'static>,
    pub backlight: Output<'static>,
    pub input: InputDriver,
    pub sd_spi: SdSpi,
    pub radio: RadioHw,
}

impl Board {
    pub fn new(p: Peripherals) -> Self {
        let mut display_cfg = spi::Config::default();
        display_cfg.frequency = 62_500_000;
        let display_bus = Spi::new_blocking_txonly(p.SPI1, p.PIN_10, p.PIN_11, display_cfg);
        let display_cs = Output::new(p.PIN_9, Level::High);
        let display_spi = ExclusiveDevice::new(display_bus, display_cs, Delay).unwrap();

        let mut sd_cfg = spi::Config::default();
        sd_cfg.frequency = 16_000_000;
        let sd_bus = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_7, p.PIN_4, sd_cfg);
        let sd_cs = Output::new(p.PIN_5, Level::High);
        let sd_spi = ExclusiveDevice::new(sd_bus, sd_cs, Delay).unwrap();

        let input = InputDriver::new(
            Input::new(p.PIN_15, Pull::Up),
            Input::new(p.PIN_17, Pull::Up),
            Input::new(p.PIN_19, Pull::Up),
            Input::new(p.PIN_21, Pull::Up),
            Input::new(p.PIN_3, Pull::Up),
        );

        Self {
            display_spi,
            dc: Output::new(p.PIN_8, Level::High),
            rst: Output::new(p.PIN_12, Level::High),
            backlight: Output::new(p.PIN_13, Level::High),
            input,
            sd_spi,
            radio: RadioHw {
                pwr: p.PIN_23,
                cs: p.PIN_25,
                pio: p.PIO0,
                dio: p.PIN_24,
                clk: p.PIN_29,
                dma: p.DMA_CH0,
            },
        }
    }
}
