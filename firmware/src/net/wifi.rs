// CYW43439 bring-up and link supervision. Joining blocks the boot path
// for a handful of attempts; after that the idle tick keeps retrying
// with exponential backoff, capped at one minute.

use alloc::string::String;

use cyw43::{Control, JoinOptions, PowerManagementMode};
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use embassy_executor::Spawner;
use embassy_net::{Config, Stack, StackResources};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use static_cell::StaticCell;

use crate::board::RadioHw;

const BOOT_JOIN_ATTEMPTS: u32 = 5;
const DHCP_WAIT: Duration = Duration::from_secs(20);

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

#[embassy_executor::task]
async fn radio_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

pub struct WifiLink {
    control: Control<'static>,
    stack: Stack<'static>,
    ssid: String,
    password: String,
    attempt: u32,
    next_try: Instant,
}

pub async fn start(
    spawner: &Spawner,
    hw: RadioHw,
    ssid: String,
    password: String,
    seed: u64,
) -> WifiLink {
    // blobs are fetched separately; see cyw43-firmware/README.md
    let fw = include_bytes!("../../cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../../cyw43-firmware/43439A0_clm.bin");

    let pwr = Output::new(hw.pwr, Level::Low);
    let cs = Output::new(hw.cs, Level::High);
    let mut pio = Pio::new(hw.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        hw.dio,
        hw.clk,
        hw.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.must_spawn(radio_task(runner));
    control.init(clm).await;
    control
        .set_power_management(PowerManagementMode::PowerSave)
        .await;

    static RESOURCES: StaticCell<StackResources<8>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.must_spawn(net_task(runner));

    WifiLink {
        control,
        stack,
        ssid,
        password,
        attempt: 0,
        next_try: Instant::now(),
    }
}

impl WifiLink {
    pub fn stack(&self) -> Stack<'static> {
        self.stack
    }

    pub fn is_up(&self) -> bool {
        self.stack.is_config_up()
    }

    /// Human-readable link state for the boot screen and logs.
    pub fn status(&self) -> &'static str {
        if self.ssid.is_empty() {
            "NO WIFI CONFIG"
        } else if self.is_up() {
            "CONNECTED"
        } else {
            "CONNECTING"
        }
    }

    /// The on-board LED hangs off the radio chip.
    pub async fn led(&mut self, on: bool) {
        self.control.gpio_set(0, on).await;
    }

    /// Boot-time join: a few attempts with backoff, then give up and
    /// let the idle tick keep trying. The device is usable offline.
    pub async fn bring_up(&mut self) {
        if self.ssid.is_empty() {
            defmt::warn!("no wifi credentials; staying offline");
            return;
        }
        for _ in 0..BOOT_JOIN_ATTEMPTS {
            if self.try_join().await {
                return;
            }
            let delay = backoff(self.attempt);
            defmt::info!("wifi retry in {}s", delay.as_secs());
            Timer::after(delay).await;
        }
        defmt::warn!("wifi unavailable at boot, retrying in background");
    }

    /// One reconnect step for the idle tick: a single attempt when the
    /// link is down and the backoff window has elapsed.
    pub async fn poll(&mut self) {
        if self.ssid.is_empty() || self.is_up() {
            self.attempt = 0;
            return;
        }
        if Instant::now() < self.next_try {
            return;
        }
        self.try_join().await;
    }

    async fn try_join(&mut self) -> bool {
        defmt::info!("joining {}", self.ssid.as_str());
        let result = if self.password.is_empty() {
            self.control.join(&self.ssid, JoinOptions::new_open()).await
        } else {
            self.control
                .join(&self.ssid, JoinOptions::new(self.password.as_bytes()))
                .await
        };

        match result {
            Ok(()) => {
                if with_timeout(DHCP_WAIT, self.stack.wait_config_up())
                    .await
                    .is_ok()
                {
                    defmt::info!("wifi up");
                    self.attempt = 0;
                    self.next_try = Instant::now();
                    return true;
                }
                defmt::warn!("dhcp timed out");
            }
            Err(e) => defmt::warn!("join failed, status {}", e.status),
        }
        self.attempt += 1;
        self.next_try = Instant::now() + backoff(self.attempt);
        false
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6)).min(Duration::from_secs(60))
}
