// Person clicker: four face buttons rotate one prompt category each,
// the joystick press re-rolls the seed, and every press asks an
// Automatic1111 server for a fresh portrait to put on the panel.
//
// One sequential control task owns the panel, the SD card and the
// fetch controller; button presses arrive through a channel from the
// input poller. Presses that land while a fetch is in flight supersede
// it, so only the newest request ever renders.

#![no_std]
#![no_main]

extern crate alloc;

mod board;
mod drivers;
mod logger;
mod net;
mod store;

use clicker_core::api;
use clicker_core::catalog::Catalog;
use clicker_core::config::{AppConfig, Secrets};
use clicker_core::{ButtonEvent, Controller, FetchOutcome, FrameSink, SeedSource, TransportError};

use defmt_rtt as _;
use panic_probe as _;

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_rp::clocks::RoscRng;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker, Timer};
use embedded_alloc::LlffHeap as Heap;
use rand_core::RngCore;
use static_cell::StaticCell;

use crate::board::{Board, SdSpi};
use crate::drivers::input::InputDriver;
use crate::drivers::sdcard::SdStorage;
use crate::drivers::st7789::St7789;
use crate::store::CardStore;

#[global_allocator]
static HEAP: Heap = Heap::empty();

const HEAP_SIZE: usize = 320 * 1024;

const LED_TICK: Duration = Duration::from_millis(500);

static EVENTS: Channel<CriticalSectionRawMutex, ButtonEvent, 8> = Channel::new();

fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
}

struct HwSeeds(RoscRng);

impl SeedSource for HwSeeds {
    fn next_seed(&mut self) -> u32 {
        self.0.next_u32()
    }
}

#[embassy_executor::task]
async fn input_task(mut input: InputDriver) {
    let mut ticker = Ticker::every(Duration::from_millis(10));
    loop {
        ticker.next().await;
        while let Some(ev) = input.poll() {
            if EVENTS.try_send(ev).is_err() {
                defmt::debug!("event queue full, dropping press");
            }
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    init_heap();
    logger::init();
    defmt::info!("clicker-os starting");

    let board = Board::new(p);
    let _backlight = board.backlight;

    static SD: StaticCell<SdStorage<SdSpi>> = StaticCell::new();
    let sd: &'static SdStorage<SdSpi> = SD.init(SdStorage::new(board.sd_spi));
    if let Err(e) = store::ensure_app_dir(sd) {
        defmt::warn!("app dir unavailable: {}", defmt::Display2Format(&e));
    }
    let mut files = CardStore::new(sd);

    let config = AppConfig::load(&mut files);
    let secrets = Secrets::load(&mut files);
    let catalog = Catalog::load(&mut files);

    let mut panel = St7789::new(
        board.display_spi,
        board.dc,
        board.rst,
        config.display_width as u16,
        config.display_height as u16,
        sd,
    );
    if let Err(e) = panel.init() {
        defmt::error!("panel init failed: {}", defmt::Display2Format(&e));
    }

    let mut seeds = HwSeeds(RoscRng);
    let net_seed = (seeds.0.next_u32() as u64) << 32 | seeds.0.next_u32() as u64;

    let ssid = secrets.wifi_ssid.clone().unwrap_or_default();
    let password = secrets.wifi_password.clone().unwrap_or_default();
    let mut wifi = net::wifi::start(&spawner, board.radio, ssid, password, net_seed).await;

    let _ = panel.show_text(wifi.status());
    wifi.bring_up().await;
    defmt::info!("link: {}", wifi.status());

    let auth = match (&secrets.api_user, &secrets.api_password) {
        (Some(user), Some(password)) => Some(api::basic_auth(user, password)),
        _ => None,
    };

    let mut controller = Controller::new(config.clone(), catalog, &mut files);
    controller.startup_render(&mut panel, &mut files);

    spawner.must_spawn(input_task(board.input));

    let mut led_on = false;
    let mut next_tick = Instant::now() + LED_TICK;
    loop {
        match select(EVENTS.receive(), Timer::at(next_tick)).await {
            Either::First(event) => {
                let (mut token, mut request) =
                    controller.begin(event, &mut seeds, &mut panel, &mut files);
                // collapse presses that queued during the previous fetch;
                // only the newest token may render
                while let Ok(ev) = EVENTS.try_receive() {
                    (token, request) = controller.begin(ev, &mut seeds, &mut panel, &mut files);
                }

                let outcome = if wifi.is_up() {
                    net::http::fetch(
                        wifi.stack(),
                        &config,
                        auth.as_deref(),
                        secrets.api_key.as_deref(),
                        &request,
                        &mut files,
                    )
                    .await
                } else {
                    FetchOutcome::Failure(TransportError::LinkDown)
                };
                controller.complete(token, outcome, &mut panel, &mut files);
            }
            Either::Second(()) => {
                led_on = !led_on;
                wifi.led(led_on).await;
                wifi.poll().await;
                next_tick += LED_TICK;
            }
        }
    }
}
