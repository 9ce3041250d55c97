// Debounced input from the five hat buttons (four face buttons plus the
// joystick center press). All are active-low GPIOs with internal
// pull-ups; only press edges matter, releases are ignored.
//
// 30ms debounce, polled every 10ms.

use clicker_core::ButtonEvent;
use clicker_core::state::Category;
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Instant};

const DEBOUNCE: Duration = Duration::from_millis(30);

struct Key {
    pin: Input<'static>,
    event: ButtonEvent,
    stable: bool,
    candidate: bool,
    candidate_since: Instant,
}

impl Key {
    fn new(pin: Input<'static>, event: ButtonEvent) -> Self {
        Self {
            pin,
            event,
            stable: false,
            candidate: false,
            candidate_since: Instant::now(),
        }
    }

    fn poll(&mut self, now: Instant) -> Option<ButtonEvent> {
        let raw = self.pin.is_low();
        if raw != self.candidate {
            self.candidate = raw;
            self.candidate_since = now;
        }
        if self.candidate != self.stable && now - self.candidate_since >= DEBOUNCE {
            self.stable = self.candidate;
            if self.stable {
                return Some(self.event);
            }
        }
        None
    }
}

pub struct InputDriver {
    keys: [Key; 5],
}

impl InputDriver {
    pub fn new(
        a: Input<'static>,
        b: Input<'static>,
        x: Input<'static>,
        y: Input<'static>,
        joystick: Input<'static>,
    ) -> Self {
        Self {
            keys: [
                Key::new(a, ButtonEvent::Category(Category::A)),
                Key::new(b, ButtonEvent::Category(Category::B)),
                Key::new(x, ButtonEvent::Category(Category::X)),
                Key::new(y, ButtonEvent::Category(Category::Y)),
                Key::new(joystick, ButtonEvent::Remix),
            ],
        }
    }

    /// One debounce step over every key; at most one event per call.
    pub fn poll(&mut self) -> Option<ButtonEvent> {
        let now = Instant::now();
        for key in self.keys.iter_mut() {
            if let Some(ev) = key.poll(now) {
                return Some(ev);
            }
        }
        None
    }
}
