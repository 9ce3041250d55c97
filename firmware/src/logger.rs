// The portable crates log through the `log` facade; this routes their
// records onto the defmt/RTT transport next to the firmware's own logs.

use log::{LevelFilter, Metadata, Record};

struct DefmtBridge;

impl log::Log for DefmtBridge {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        match record.level() {
            log::Level::Error => defmt::error!("{}", defmt::Display2Format(record.args())),
            log::Level::Warn => defmt::warn!("{}", defmt::Display2Format(record.args())),
            log::Level::Info => defmt::info!("{}", defmt::Display2Format(record.args())),
            log::Level::Debug | log::Level::Trace => {
                defmt::debug!("{}", defmt::Display2Format(record.args()))
            }
        }
    }

    fn flush(&self) {}
}

static BRIDGE: DefmtBridge = DefmtBridge;

pub fn init() {
    if log::set_logger(&BRIDGE).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}
