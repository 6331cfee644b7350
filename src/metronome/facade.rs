use crossbeam::channel::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use super::MetronomeEvent;
use super::scheduler::{BeatScheduler, TickPlan};
use super::signature::{SignatureConfig, TimeSignature};
use super::tap_tempo::{TapTempoEstimator, TapTempoSettings};
use super::tempo::{BpmRange, Tempo, TempoError};
use super::ticker::TickSource;
use crate::audio::ClickSynthesizer;
use crate::config::{Config, MetronomeSettings};

/// Everything the UI thread and the tick thread share.
struct Engine {
    scheduler: BeatScheduler,
    taps: TapTempoEstimator,
    synth: ClickSynthesizer,
    ticker: Option<TickSource>,
    // Bumped whenever a tick source is cancelled; ticks from older
    // generations are ignored.
    generation: u64,
    event_sender: Option<Sender<MetronomeEvent>>,
}

impl Engine {
    fn send_event(&self, event: MetronomeEvent) {
        if let Some(ref sender) = self.event_sender {
            let _ = sender.try_send(event);
        }
    }

    fn cancel_ticker(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.ticker = None;
    }

    fn emit_click(&mut self, beat: u32) {
        let signature = self.scheduler.signature();
        let muted = self.scheduler.is_muted();
        self.synth.emit(beat, signature, muted);
    }

    fn tick(&mut self) {
        let beat = self.scheduler.advance();
        self.emit_click(beat);
        self.send_event(MetronomeEvent::Beat(beat));
    }
}

/// The metronome as seen by the rest of the application.
///
/// All methods return immediately. Internally there is at most one live tick
/// source: every path that arms one cancels the previous one first, under
/// the same lock the tick thread takes.
pub struct Metronome {
    engine: Arc<Mutex<Engine>>,
}

impl Metronome {
    pub fn new(
        settings: &MetronomeSettings,
        tap_settings: TapTempoSettings,
        synth: ClickSynthesizer,
    ) -> Self {
        let tempo = Tempo::new(settings.bpm, BpmRange::ADJUST).unwrap_or_else(|err| {
            log::warn!("Ignoring configured tempo: {}", err);
            Tempo::default()
        });

        let engine = Engine {
            scheduler: BeatScheduler::new(tempo, settings.signature, settings.muted),
            taps: TapTempoEstimator::new(tap_settings),
            synth,
            ticker: None,
            generation: 0,
            event_sender: None,
        };

        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn from_config(config: &Config, synth: ClickSynthesizer) -> Self {
        Self::new(&config.metronome, config.tap_tempo.clone(), synth)
    }

    pub fn set_event_sender(&self, sender: Sender<MetronomeEvent>) {
        self.lock().event_sender = Some(sender);
    }

    fn lock(&self) -> MutexGuard<'_, Engine> {
        // Every mutation leaves the engine consistent, so a panic elsewhere
        // does not invalidate it.
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start from the top of the cycle. Calling it while running restarts
    /// the run instead of layering a second timer.
    pub fn start(&self) {
        let mut engine = self.lock();
        if engine.scheduler.is_running() {
            log::debug!("start while running: restarting");
            self.stop_locked(&mut engine);
        }

        let (beat, plan) = engine.scheduler.start(Instant::now());
        log::debug!(
            "metronome started at {:.2} BPM on beat {}",
            engine.scheduler.tempo().bpm(),
            beat
        );
        engine.emit_click(beat);
        engine.send_event(MetronomeEvent::Started);
        engine.send_event(MetronomeEvent::Beat(beat));
        self.arm(&mut engine, plan);
    }

    /// Stop the run. Always clears the tick source; harmless when stopped.
    pub fn stop(&self) {
        let mut engine = self.lock();
        self.stop_locked(&mut engine);
    }

    fn stop_locked(&self, engine: &mut Engine) {
        engine.cancel_ticker();
        if engine.scheduler.stop() {
            log::debug!("metronome stopped on beat {}", engine.scheduler.current_beat());
            engine.send_event(MetronomeEvent::Stopped);
        }
    }

    fn arm(&self, engine: &mut Engine, plan: TickPlan) {
        engine.cancel_ticker();
        let generation = engine.generation;
        let weak: Weak<Mutex<Engine>> = Arc::downgrade(&self.engine);

        let spawned = TickSource::spawn(generation, plan, move |generation| {
            let Some(shared) = weak.upgrade() else {
                return false;
            };
            let mut engine = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if engine.generation != generation || !engine.scheduler.is_running() {
                return false;
            }
            engine.tick();
            true
        });

        match spawned {
            Ok(ticker) => {
                log::trace!("armed tick source {}", ticker.generation());
                engine.ticker = Some(ticker);
            }
            Err(err) => {
                log::error!("Failed to spawn tick thread: {}", err);
                engine.scheduler.stop();
                engine.send_event(MetronomeEvent::Stopped);
            }
        }
    }

    /// Realign the counter and the tick source with the start reference.
    fn resync_locked(&self, engine: &mut Engine) {
        engine.cancel_ticker();
        if let Some(plan) = engine.scheduler.resync(Instant::now()) {
            let beat = engine.scheduler.current_beat();
            log::debug!(
                "resync: beat {}, next click in {:.1} ms",
                beat,
                plan.first_deadline
                    .saturating_duration_since(Instant::now())
                    .as_secs_f64()
                    * 1000.0
            );
            engine.send_event(MetronomeEvent::Beat(beat));
            self.arm(engine, plan);
        }
    }

    fn apply_tempo(&self, engine: &mut Engine, tempo: Tempo) {
        engine.scheduler.set_tempo(tempo);
        engine.send_event(MetronomeEvent::BpmChanged(tempo.bpm()));
        if engine.scheduler.is_running() {
            self.resync_locked(engine);
        }
    }

    /// Set the tempo, clamped to 40–300 BPM. Non-finite or non-positive
    /// values are ignored.
    pub fn set_bpm(&self, bpm: f64) {
        match Tempo::new(bpm, BpmRange::ADJUST) {
            Ok(tempo) => {
                let mut engine = self.lock();
                self.apply_tempo(&mut engine, tempo);
            }
            Err(err) => log::debug!("set_bpm rejected: {}", err),
        }
    }

    /// [`Metronome::set_bpm`] for text input; unparsable text is ignored.
    pub fn set_bpm_text(&self, text: &str) {
        match Tempo::parse(text, BpmRange::ADJUST) {
            Ok(tempo) => {
                let mut engine = self.lock();
                self.apply_tempo(&mut engine, tempo);
            }
            Err(err) => log::debug!("set_bpm_text rejected: {}", err),
        }
    }

    /// Typed BPM entry: whole numbers, clamped to 30–300. The error is
    /// returned so the caller can restore its field; the tempo is unchanged.
    pub fn enter_bpm(&self, text: &str) -> Result<f64, TempoError> {
        let tempo = Tempo::parse_entry(text)?;
        let mut engine = self.lock();
        self.apply_tempo(&mut engine, tempo);
        Ok(tempo.bpm())
    }

    pub fn adjust_bpm(&self, delta: f64) {
        let current = self.bpm();
        self.set_bpm(current + delta);
    }

    pub fn tap_tempo(&self) {
        self.tap_tempo_at(Instant::now());
    }

    /// Record a tap at `now` and apply the estimate once there is one.
    pub fn tap_tempo_at(&self, now: Instant) {
        let mut engine = self.lock();
        engine.taps.record_tap_at(now);
        let signature = engine.scheduler.signature();
        if let Some(tempo) = engine.taps.estimated_tempo(signature) {
            log::debug!(
                "tap tempo: {:.2} BPM from {} taps",
                tempo.bpm(),
                engine.taps.tap_count()
            );
            self.apply_tempo(&mut engine, tempo);
        }
    }

    /// Switch cycles. A running metronome keeps its start reference and is
    /// realigned to the new cycle length; restart for a clean downbeat.
    pub fn set_signature(&self, signature: TimeSignature) {
        let mut engine = self.lock();
        if engine.scheduler.signature() == signature {
            return;
        }
        engine.scheduler.set_signature(signature);
        engine.send_event(MetronomeEvent::SignatureChanged(signature));
        if engine.scheduler.is_running() {
            self.resync_locked(&mut engine);
        }
    }

    pub fn toggle_signature(&self) -> TimeSignature {
        let next = self.signature().toggled();
        self.set_signature(next);
        next
    }

    /// Returns the new mute state. Timing is realigned, never shifted.
    pub fn toggle_mute(&self) -> bool {
        let mut engine = self.lock();
        let muted = !engine.scheduler.is_muted();
        engine.scheduler.set_muted(muted);
        engine.send_event(MetronomeEvent::MuteToggled(muted));
        if engine.scheduler.is_running() {
            self.resync_locked(&mut engine);
        }
        muted
    }

    /// Override the beat counter, e.g. to begin a flamenco phrase on 12.
    pub fn set_current_beat(&self, beat: u32) {
        let mut engine = self.lock();
        let beat = engine.scheduler.set_current_beat(beat);
        engine.send_event(MetronomeEvent::Beat(beat));
    }

    /// Beat a start would begin on right now.
    pub fn next_start_beat(&self) -> u32 {
        self.lock().scheduler.start_beat()
    }

    pub fn bpm(&self) -> f64 {
        self.lock().scheduler.tempo().bpm()
    }

    pub fn current_beat(&self) -> u32 {
        self.lock().scheduler.current_beat()
    }

    pub fn is_running(&self) -> bool {
        self.lock().scheduler.is_running()
    }

    pub fn signature(&self) -> TimeSignature {
        self.lock().scheduler.signature()
    }

    pub fn signature_config(&self) -> &'static SignatureConfig {
        self.signature().config()
    }

    pub fn is_muted(&self) -> bool {
        self.lock().scheduler.is_muted()
    }

    pub fn tap_count(&self) -> usize {
        self.lock().taps.tap_count()
    }

    /// Whether clicks currently reach an audio device.
    pub fn audio_connected(&self) -> bool {
        self.lock().synth.is_connected()
    }

    pub fn has_tick_source(&self) -> bool {
        self.lock().ticker.is_some()
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        self.stop();
    }
}
