//! Push-to-talk hotkey handling.
//!
//! A global key listener feeds every press and release through a small
//! state machine. While the configured combo is fully held the microphone
//! records; releasing any member of the combo stops it and hands the audio
//! to the pipeline. Escape ends the whole listener session.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::RwLock;
use rdev::{EventType, Key};
use sotto_audio::CaptureSession;
use sotto_core::{Config, MicState};
use tracing::{debug, error, info, trace, warn};

use crate::event::{EventSink, SottoEvent};
use crate::notify::Alerts;
use crate::pipeline::{SubmitResult, TranscribePipeline};

/// A key as the state machine tracks it: one of the four side-agnostic
/// modifiers, or a concrete key that keeps its own identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComboKey {
    Control,
    Alt,
    Shift,
    Super,
    Key(Key),
}

/// Side-specific modifier keys and their side-agnostic forms. rdev names
/// the left alt key `Alt` and the right one `AltGr`.
const SIDE_VARIANTS: [(Key, ComboKey); 8] = [
    (Key::ControlLeft, ComboKey::Control),
    (Key::ControlRight, ComboKey::Control),
    (Key::Alt, ComboKey::Alt),
    (Key::AltGr, ComboKey::Alt),
    (Key::ShiftLeft, ComboKey::Shift),
    (Key::ShiftRight, ComboKey::Shift),
    (Key::MetaLeft, ComboKey::Super),
    (Key::MetaRight, ComboKey::Super),
];

fn generic_of(key: Key) -> Option<ComboKey> {
    SIDE_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == key)
        .map(|(_, generic)| *generic)
}

/// Combo string tokens. `_l`/`_r` suffixes bind one side only and stay
/// distinct from the generic form.
const TOKENS: &[(&str, ComboKey)] = &[
    ("ctrl", ComboKey::Control),
    ("control", ComboKey::Control),
    ("ctrl_l", ComboKey::Key(Key::ControlLeft)),
    ("ctrl_r", ComboKey::Key(Key::ControlRight)),
    ("alt", ComboKey::Alt),
    ("alt_l", ComboKey::Key(Key::Alt)),
    ("alt_r", ComboKey::Key(Key::AltGr)),
    ("shift", ComboKey::Shift),
    ("shift_l", ComboKey::Key(Key::ShiftLeft)),
    ("shift_r", ComboKey::Key(Key::ShiftRight)),
    ("super", ComboKey::Super),
    ("win", ComboKey::Super),
    ("cmd", ComboKey::Super),
    ("meta", ComboKey::Super),
    ("super_l", ComboKey::Key(Key::MetaLeft)),
    ("super_r", ComboKey::Key(Key::MetaRight)),
    ("space", ComboKey::Key(Key::Space)),
];

fn parse_token(token: &str) -> Option<ComboKey> {
    if let Some((_, key)) = TOKENS.iter().find(|(name, _)| *name == token) {
        return Some(*key);
    }

    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => char_key(c).map(ComboKey::Key),
        _ => None,
    }
}

fn char_key(c: char) -> Option<Key> {
    let key = match c.to_ascii_lowercase() {
        'a' => Key::KeyA,
        'b' => Key::KeyB,
        'c' => Key::KeyC,
        'd' => Key::KeyD,
        'e' => Key::KeyE,
        'f' => Key::KeyF,
        'g' => Key::KeyG,
        'h' => Key::KeyH,
        'i' => Key::KeyI,
        'j' => Key::KeyJ,
        'k' => Key::KeyK,
        'l' => Key::KeyL,
        'm' => Key::KeyM,
        'n' => Key::KeyN,
        'o' => Key::KeyO,
        'p' => Key::KeyP,
        'q' => Key::KeyQ,
        'r' => Key::KeyR,
        's' => Key::KeyS,
        't' => Key::KeyT,
        'u' => Key::KeyU,
        'v' => Key::KeyV,
        'w' => Key::KeyW,
        'x' => Key::KeyX,
        'y' => Key::KeyY,
        'z' => Key::KeyZ,
        '0' => Key::Num0,
        '1' => Key::Num1,
        '2' => Key::Num2,
        '3' => Key::Num3,
        '4' => Key::Num4,
        '5' => Key::Num5,
        '6' => Key::Num6,
        '7' => Key::Num7,
        '8' => Key::Num8,
        '9' => Key::Num9,
        _ => return None,
    };
    Some(key)
}

/// The set of keys that must all be held to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyCombo {
    keys: HashSet<ComboKey>,
}

impl Default for HotkeyCombo {
    fn default() -> Self {
        Self {
            keys: HashSet::from([ComboKey::Control, ComboKey::Super]),
        }
    }
}

impl HotkeyCombo {
    /// Parses a '+'-joined combo string such as "ctrl+win" or "ctrl_l+alt+x".
    ///
    /// Unrecognized tokens are skipped with a warning so a typo in one key
    /// does not silently disable the rest; a string with no usable keys at
    /// all is an error.
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let mut keys = HashSet::new();
        for token in spec.split('+') {
            let token = token.trim().to_lowercase();
            if token.is_empty() {
                continue;
            }
            match parse_token(&token) {
                Some(key) => {
                    keys.insert(key);
                }
                None => warn!(token = %token, "Unknown key in hotkey, skipping"),
            }
        }

        if keys.is_empty() {
            anyhow::bail!("hotkey {spec:?} contains no recognized keys");
        }
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &ComboKey) -> bool {
        self.keys.contains(key)
    }

    fn is_satisfied_by(&self, pressed: &HashSet<ComboKey>) -> bool {
        self.keys.is_subset(pressed)
    }

    /// Collapses a side-specific modifier to its generic form when this
    /// combo names the generic key. Every other key, recognized or not,
    /// keeps its own identity.
    pub fn translate(&self, key: Key) -> ComboKey {
        if let Some(generic) = generic_of(key) {
            if self.keys.contains(&generic) {
                return generic;
            }
        }
        if let Key::Unknown(code) = key {
            trace!(code, "Unmapped key passed through");
        }
        ComboKey::Key(key)
    }
}

/// What the listener should do after one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    StartCapture,
    StopCapture,
}

/// Press-and-hold state machine for one listener session.
///
/// Owns the set of currently held keys; the set lives and dies with the
/// session. StartCapture fires on the transition into a fully held combo,
/// StopCapture when any combo member is released while recording.
pub struct PushToTalk {
    combo: Arc<RwLock<HotkeyCombo>>,
    pressed: HashSet<ComboKey>,
    recording: bool,
}

impl PushToTalk {
    pub fn new(combo: Arc<RwLock<HotkeyCombo>>) -> Self {
        Self {
            combo,
            pressed: HashSet::new(),
            recording: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Feed a key press. Auto-repeat of a held key cannot re-trigger: the
    /// set insert is a no-op and the recording flag gates the transition.
    pub fn on_press(&mut self, key: Key) -> Option<HotkeyAction> {
        let combo = self.combo.read();
        self.pressed.insert(combo.translate(key));

        if !self.recording && combo.is_satisfied_by(&self.pressed) {
            self.recording = true;
            return Some(HotkeyAction::StartCapture);
        }
        None
    }

    /// Feed a key release.
    pub fn on_release(&mut self, key: Key) -> Option<HotkeyAction> {
        let combo = self.combo.read();
        let key = combo.translate(key);
        self.pressed.remove(&key);

        if self.recording && combo.contains(&key) {
            self.recording = false;
            return Some(HotkeyAction::StopCapture);
        }
        None
    }

    /// Roll back to idle after a capture that failed to start.
    pub fn abort_recording(&mut self) {
        self.recording = false;
    }
}

/// Spawns the global key listener thread.
///
/// The thread owns the capture session and the state machine. It probes
/// the configured device once before listening so a broken microphone is
/// reported at startup instead of on the first hotkey press, then blocks
/// in the OS key event loop until escape or a listener failure ends the
/// session, at which point it posts ListenerEnded.
pub fn spawn_listener<E>(
    combo: Arc<RwLock<HotkeyCombo>>,
    config: Arc<RwLock<Config>>,
    pipeline: Arc<TranscribePipeline>,
    alerts: Arc<dyn Alerts>,
    events: E,
) -> JoinHandle<()>
where
    E: EventSink + Clone,
{
    std::thread::spawn(move || {
        // The cpal stream is not Send, so the session must live on this
        // thread for as long as the listener runs.
        let mut session = CaptureSession::new(config);

        if let Err(e) = session.probe() {
            alerts.report_microphone_error(&session.device_label(), &e.to_string(), true);
        }

        let mut machine = PushToTalk::new(combo);
        let mut done = false;
        let callback_events = events.clone();

        info!("Hotkey listener running");
        let result = rdev::listen(move |event| {
            if done {
                return;
            }

            match event.event_type {
                EventType::KeyRelease(Key::Escape) => {
                    info!("Escape released, ending listener session");
                    if machine.is_recording() {
                        finish_capture(&mut session, &pipeline, &callback_events);
                    }
                    done = true;
                    callback_events.emit(SottoEvent::ListenerEnded);
                }
                EventType::KeyPress(key) => {
                    if machine.on_press(key) == Some(HotkeyAction::StartCapture) {
                        match session.start() {
                            Ok(()) => {
                                callback_events.emit(SottoEvent::StateChanged(MicState::Recording));
                            }
                            Err(e) => {
                                machine.abort_recording();
                                alerts.report_microphone_error(
                                    &session.device_label(),
                                    &e.to_string(),
                                    false,
                                );
                            }
                        }
                    }
                }
                EventType::KeyRelease(key) => {
                    if machine.on_release(key) == Some(HotkeyAction::StopCapture) {
                        finish_capture(&mut session, &pipeline, &callback_events);
                    }
                }
                _ => {}
            }
        });

        if let Err(e) = result {
            error!("Key listener failed: {:?}", e);
            events.emit(SottoEvent::ListenerEnded);
        }
    })
}

/// Stops the active capture and hands the audio to the pipeline.
fn finish_capture<E: EventSink>(
    session: &mut CaptureSession,
    pipeline: &TranscribePipeline,
    events: &E,
) {
    let state = match session.stop() {
        Some(recording) => match pipeline.submit(recording) {
            Ok(SubmitResult::Sent) => MicState::Processing,
            Ok(SubmitResult::Discarded) => MicState::Idle,
            Err(e) => {
                error!("Failed to submit recording: {:#}", e);
                MicState::Idle
            }
        },
        None => {
            debug!("Stop with no active capture");
            MicState::Idle
        }
    };
    events.emit(SottoEvent::StateChanged(state));
}
