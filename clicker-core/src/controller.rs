// Fetch controller. One image request is in flight at most; every
// request gets a fresh token and only the newest token may touch the
// panel or the persisted state when it completes. The transport side
// (HTTP, sockets, timeouts) lives in the firmware; this state machine
// only sees the tagged outcome.

use alloc::string::String;
use alloc::vec::Vec;

use crate::api::GenerationRequest;
use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::error::TransportError;
use crate::render::{self, RenderError};
use crate::sink::FrameSink;
use crate::state::{Category, SelectionState};
use crate::storage::{self, Storage};

/// Entropy for seeds and category picks. The firmware feeds this from
/// the hardware RNG; tests feed it fixed sequences.
pub trait SeedSource {
    fn next_seed(&mut self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// A face button: rotate that category's selection.
    Category(Category),
    /// Joystick press: same prompt, fresh seed.
    Remix,
}

/// Monotonic request identity. Tokens never repeat within a boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// What the transport produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The transport already streamed a full raw frame to this file.
    RawFramePath(String),
    /// A full raw RGB565 frame in memory.
    RawFrameBytes(Vec<u8>),
    /// Compressed image bytes for the decoder.
    CompressedImageBytes(Vec<u8>),
    Failure(TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteStatus {
    /// This token won; the frame is on the panel.
    Rendered,
    /// A newer request superseded this one; nothing was touched.
    Discarded,
    /// The outcome was an error; the failure latch is set.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Requesting,
}

pub struct Controller {
    config: AppConfig,
    catalog: Catalog,
    state: SelectionState,
    token: u64,
    phase: Phase,
    last_failed: bool,
}

impl Controller {
    pub fn new(config: AppConfig, catalog: Catalog, storage: &mut dyn Storage) -> Self {
        let state = SelectionState::load(storage);
        Self {
            config,
            catalog,
            state,
            token: 0,
            phase: Phase::Idle,
            last_failed: false,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn frame_len(&self) -> usize {
        self.config.display_width as usize * self.config.display_height as usize * 2
    }

    /// Bring back whatever was on screen before the last power-down:
    /// the raw frame if one exists, else the last compressed image,
    /// else the placeholder.
    pub fn startup_render(&self, sink: &mut dyn FrameSink, storage: &mut dyn Storage) {
        match storage.len(storage::RAW_FILE) {
            Ok(Some(_)) => {
                if let Err(e) = sink.write_raw_file(storage::RAW_FILE, self.frame_len()) {
                    log::warn!("startup raw draw failed: {}", e);
                    let _ = render::draw_placeholder(sink);
                }
                return;
            }
            Ok(None) => {}
            Err(e) => log::warn!("startup raw probe failed: {}", e),
        }

        match storage.read(storage::PNG_FILE) {
            Ok(Some(bytes)) => {
                if let Err(e) = render::draw_png(sink, &bytes) {
                    log::warn!("startup png draw failed: {}", e);
                    let _ = render::draw_placeholder(sink);
                }
            }
            _ => {
                let _ = render::draw_placeholder(sink);
            }
        }
    }

    /// Handle a button press: mutate selection/seed state, persist it,
    /// and issue a new request. Any request still in flight is
    /// superseded by the returned token.
    pub fn begin(
        &mut self,
        event: ButtonEvent,
        seeds: &mut dyn SeedSource,
        sink: &mut dyn FrameSink,
        storage: &mut dyn Storage,
    ) -> (RequestToken, GenerationRequest) {
        if self.last_failed {
            // transient retry indicator; the latch clears on success
            let _ = sink.show_text("Retrying");
        }

        match event {
            ButtonEvent::Category(cat) => {
                if let Some(picked) = self.pick_new_for_category(cat, seeds) {
                    log::info!("category {} -> {}", cat.key(), picked);
                }
                if self.config.reseed_on_category_change {
                    self.state.seed = seeds.next_seed() & 0x7FFF_FFFF;
                }
            }
            ButtonEvent::Remix => {
                self.state.seed = seeds.next_seed() & 0x7FFF_FFFF;
                log::info!("remix -> seed {}", self.state.seed);
            }
        }
        if let Err(e) = self.state.save(storage) {
            log::warn!("state save failed: {}", e);
        }

        self.token += 1;
        self.phase = Phase::Requesting;

        let (w, h) = self.config.request_dims();
        let request = GenerationRequest {
            prompt: self.build_prompt(),
            sampler: self.config.sampler.clone(),
            steps: self.config.steps,
            cfg_scale: self.config.cfg_scale,
            width: w,
            height: h,
            seed: Some(self.state.seed),
        };
        (RequestToken(self.token), request)
    }

    /// Deliver a transport outcome. A stale token is dropped without
    /// touching the panel, the state or the failure latch.
    pub fn complete(
        &mut self,
        token: RequestToken,
        outcome: FetchOutcome,
        sink: &mut dyn FrameSink,
        storage: &mut dyn Storage,
    ) -> CompleteStatus {
        if token.0 != self.token {
            log::debug!("discarding superseded request {}", token.0);
            return CompleteStatus::Discarded;
        }
        self.phase = Phase::Idle;

        let drawn = match outcome {
            FetchOutcome::RawFramePath(name) => sink
                .write_raw_file(&name, self.frame_len())
                .map_err(RenderError::Sink),
            FetchOutcome::RawFrameBytes(bytes) => {
                self.persist(storage, storage::RAW_FILE, storage::RAW_TMP, &bytes);
                render::draw_raw(sink, &bytes).map_err(RenderError::Sink)
            }
            FetchOutcome::CompressedImageBytes(bytes) => {
                self.persist(storage, storage::PNG_FILE, storage::PNG_TMP, &bytes);
                render::draw_png(sink, &bytes)
            }
            FetchOutcome::Failure(e) => {
                log::warn!("fetch failed: {}", e);
                let _ = sink.show_text("API Error");
                self.last_failed = true;
                return CompleteStatus::Failed;
            }
        };

        match drawn {
            Ok(()) => {
                self.last_failed = false;
                CompleteStatus::Rendered
            }
            Err(e) => {
                log::warn!("render failed: {}", e);
                let msg = match e {
                    RenderError::Decode(_) => "Image Error",
                    RenderError::Sink(_) => "Display Error",
                };
                let _ = sink.show_text(msg);
                self.last_failed = true;
                CompleteStatus::Failed
            }
        }
    }

    // a stale frame on disk is better than no frame; persistence
    // failures are logged and the in-memory render proceeds
    fn persist(&self, storage: &mut dyn Storage, name: &str, tmp: &str, bytes: &[u8]) {
        if let Err(e) = storage::atomic_write(storage, name, tmp, bytes) {
            log::warn!("persisting {} failed: {}", name, e);
        }
    }

    /// Pick a value for `cat` different from the current one: bounded
    /// random retries, then the first different value deterministically.
    fn pick_new_for_category(&mut self, cat: Category, seeds: &mut dyn SeedSource) -> Option<&str> {
        let values = self.catalog.values(cat);
        if values.is_empty() {
            return None;
        }
        let current = self.state.selection(cat);

        let mut pick = None;
        for _ in 0..self.config.max_retry_pick_different {
            let cand = &values[seeds.next_seed() as usize % values.len()];
            if current != Some(cand.as_str()) {
                pick = Some(cand.clone());
                break;
            }
        }
        if pick.is_none() {
            pick = values
                .iter()
                .find(|v| current != Some(v.as_str()))
                .cloned();
        }

        let picked = pick?;
        self.state.set_selection(cat, picked);
        self.state.selection(cat)
    }

    /// Selected values in A, B, X, Y order joined with ", ", wrapped by
    /// the optional prefix/suffix with single spaces.
    pub fn build_prompt(&self) -> String {
        let mut body = String::new();
        for cat in crate::state::CATEGORIES {
            if let Some(v) = self.state.selection(cat) {
                if !body.is_empty() {
                    body.push_str(", ");
                }
                body.push_str(v);
            }
        }

        let prefix = self.config.prompt_prefix.trim();
        let suffix = self.config.prompt_suffix.trim();

        let mut prompt = String::new();
        if !prefix.is_empty() {
            prompt.push_str(prefix);
        }
        if !body.is_empty() {
            if !prompt.is_empty() {
                prompt.push(' ');
            }
            prompt.push_str(&body);
        }
        if !suffix.is_empty() {
            if !prompt.is_empty() {
                prompt.push(' ');
            }
            prompt.push_str(suffix);
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::mock::{Op, RecordingSink};
    use crate::storage::MemStorage;
    use alloc::string::ToString;
    use alloc::vec;

    struct SeqSeeds {
        values: Vec<u32>,
        next: usize,
    }

    impl SeqSeeds {
        fn new(values: Vec<u32>) -> Self {
            Self { values, next: 0 }
        }
    }

    impl SeedSource for SeqSeeds {
        fn next_seed(&mut self) -> u32 {
            let v = self.values[self.next % self.values.len()];
            self.next += 1;
            v
        }
    }

    fn controller(storage: &mut MemStorage) -> Controller {
        Controller::new(AppConfig::default(), Catalog::default(), storage)
    }

    fn tiny_png() -> Vec<u8> {
        let raw = [0u8, 10, 20, 30]; // one RGB pixel, filter 0
        let z = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
        let mut data = vec![137u8, 80, 78, 71, 13, 10, 26, 10];
        let mut push_chunk = |ctype: &[u8; 4], payload: &[u8]| {
            data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            data.extend_from_slice(ctype);
            data.extend_from_slice(payload);
            data.extend_from_slice(&[0u8; 4]);
        };
        let mut ihdr = [0u8; 13];
        ihdr[..4].copy_from_slice(&1u32.to_be_bytes());
        ihdr[4..8].copy_from_slice(&1u32.to_be_bytes());
        ihdr[8] = 8;
        ihdr[9] = 2;
        push_chunk(b"IHDR", &ihdr);
        push_chunk(b"IDAT", &z);
        push_chunk(b"IEND", &[]);
        data
    }

    #[test]
    fn stale_token_never_touches_the_panel() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![7, 8, 9]);
        let mut ctl = controller(&mut storage);

        let (t1, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        let (t2, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        sink.ops.clear();
        storage.ops.clear();

        let status = ctl.complete(
            t1,
            FetchOutcome::CompressedImageBytes(tiny_png()),
            &mut sink,
            &mut storage,
        );
        assert_eq!(status, CompleteStatus::Discarded);
        assert!(sink.ops.is_empty());
        assert!(storage.ops.is_empty());

        let status = ctl.complete(
            t2,
            FetchOutcome::CompressedImageBytes(tiny_png()),
            &mut sink,
            &mut storage,
        );
        assert_eq!(status, CompleteStatus::Rendered);
        assert!(matches!(sink.ops[0], Op::Window(0, 0, 239, 239)));
    }

    #[test]
    fn remix_reseeds_and_persists_immediately() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![0x1234]);
        let mut ctl = controller(&mut storage);

        let (_, req) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        assert_eq!(req.seed, Some(0x1234));
        assert_eq!(ctl.state().seed, 0x1234);

        // persisted before the fetch even starts
        let saved = SelectionState::load(&mut storage);
        assert_eq!(saved.seed, 0x1234);
    }

    #[test]
    fn remix_seed_is_masked_to_31_bits() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![0xFFFF_FFFF]);
        let mut ctl = controller(&mut storage);

        let (_, req) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        assert_eq!(req.seed, Some(0x7FFF_FFFF));
    }

    #[test]
    fn category_press_reuses_the_seed() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![0x42]);
        let mut ctl = controller(&mut storage);

        let (_, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        let before = ctl.state().seed;
        let (_, req) = ctl.begin(
            ButtonEvent::Category(Category::A),
            &mut seeds,
            &mut sink,
            &mut storage,
        );
        assert_eq!(ctl.state().seed, before);
        assert_eq!(req.seed, Some(before));
    }

    #[test]
    fn category_press_reseeds_when_configured() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![5, 99]);
        let mut config = AppConfig::default();
        config.reseed_on_category_change = true;
        let mut ctl = Controller::new(config, Catalog::default(), &mut storage);

        let (_, req) = ctl.begin(
            ButtonEvent::Category(Category::B),
            &mut seeds,
            &mut sink,
            &mut storage,
        );
        // first draw picked the category value, second drew the seed
        assert_eq!(req.seed, Some(99));
    }

    #[test]
    fn category_pick_avoids_current_value() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        // index 0 every time: retries keep hitting the current value,
        // the deterministic fallback must pick a different one
        let mut seeds = SeqSeeds::new(vec![0]);
        let mut ctl = controller(&mut storage);

        ctl.begin(
            ButtonEvent::Category(Category::A),
            &mut seeds,
            &mut sink,
            &mut storage,
        );
        let first = ctl.state().selection(Category::A).unwrap().to_string();
        ctl.begin(
            ButtonEvent::Category(Category::A),
            &mut seeds,
            &mut sink,
            &mut storage,
        );
        let second = ctl.state().selection(Category::A).unwrap().to_string();
        assert_ne!(first, second);
    }

    #[test]
    fn prompt_joins_selected_values_in_button_order() {
        let mut storage = MemStorage::new();
        let mut ctl = controller(&mut storage);
        assert_eq!(ctl.build_prompt(), "");

        ctl.state.set_selection(Category::X, "smiling".to_string());
        ctl.state.set_selection(Category::A, "adult".to_string());
        assert_eq!(ctl.build_prompt(), "adult, smiling");

        ctl.config.prompt_prefix = "photo of".to_string();
        ctl.config.prompt_suffix = "high detail".to_string();
        assert_eq!(ctl.build_prompt(), "photo of adult, smiling high detail");

        // prefix alone, nothing selected
        ctl.state = SelectionState::default();
        ctl.config.prompt_suffix = String::new();
        assert_eq!(ctl.build_prompt(), "photo of");
    }

    #[test]
    fn failure_latches_and_next_press_shows_retrying() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![1]);
        let mut ctl = controller(&mut storage);

        let (t, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        let status = ctl.complete(
            t,
            FetchOutcome::Failure(TransportError::Timeout),
            &mut sink,
            &mut storage,
        );
        assert_eq!(status, CompleteStatus::Failed);
        assert!(sink.texts().contains(&"API Error"));

        sink.ops.clear();
        let (t, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        assert!(sink.texts().contains(&"Retrying"));

        // success clears the latch
        let frame = vec![0u8; 240 * 240 * 2];
        let status = ctl.complete(t, FetchOutcome::RawFrameBytes(frame), &mut sink, &mut storage);
        assert_eq!(status, CompleteStatus::Rendered);

        sink.ops.clear();
        ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        assert!(!sink.texts().contains(&"Retrying"));
    }

    #[test]
    fn decode_failure_shows_image_error() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![1]);
        let mut ctl = controller(&mut storage);

        let (t, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        let status = ctl.complete(
            t,
            FetchOutcome::CompressedImageBytes(b"definitely not an image".to_vec()),
            &mut sink,
            &mut storage,
        );
        assert_eq!(status, CompleteStatus::Failed);
        assert!(sink.texts().contains(&"Image Error"));
    }

    #[test]
    fn raw_bytes_are_persisted_then_drawn() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![1]);
        let mut ctl = controller(&mut storage);

        let (t, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        let frame = vec![0xA5u8; 240 * 240 * 2];
        let status = ctl.complete(
            t,
            FetchOutcome::RawFrameBytes(frame.clone()),
            &mut sink,
            &mut storage,
        );
        assert_eq!(status, CompleteStatus::Rendered);
        assert_eq!(
            storage.read(storage::RAW_FILE).unwrap().unwrap(),
            frame
        );
        assert_eq!(sink.pixels, frame);
    }

    #[test]
    fn streamed_path_draws_from_storage() {
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let mut seeds = SeqSeeds::new(vec![1]);
        let mut ctl = controller(&mut storage);

        let (t, _) = ctl.begin(ButtonEvent::Remix, &mut seeds, &mut sink, &mut storage);
        let status = ctl.complete(
            t,
            FetchOutcome::RawFramePath(storage::RAW_FILE.to_string()),
            &mut sink,
            &mut storage,
        );
        assert_eq!(status, CompleteStatus::Rendered);
        assert_eq!(
            sink.ops,
            [Op::RawFile(storage::RAW_FILE.to_string(), 240 * 240 * 2)]
        );
    }

    #[test]
    fn startup_prefers_raw_then_png_then_placeholder() {
        // nothing stored: placeholder
        let mut storage = MemStorage::new();
        let mut sink = RecordingSink::new(240, 240);
        let ctl = controller(&mut storage);
        ctl.startup_render(&mut sink, &mut storage);
        assert!(matches!(sink.ops[0], Op::Fill(_)));
        assert!(sink.texts().contains(&"NO IMAGE"));

        // png only
        let mut storage = MemStorage::new();
        storage.write(storage::PNG_FILE, &tiny_png()).unwrap();
        let mut sink = RecordingSink::new(240, 240);
        let ctl = controller(&mut storage);
        ctl.startup_render(&mut sink, &mut storage);
        assert!(matches!(sink.ops[0], Op::Window(..)));

        // raw wins over png
        storage.write(storage::RAW_FILE, &[0u8; 8]).unwrap();
        let mut sink = RecordingSink::new(240, 240);
        let ctl = controller(&mut storage);
        ctl.startup_render(&mut sink, &mut storage);
        assert!(matches!(sink.ops[0], Op::RawFile(..)));
    }
}
