//! Text injection as synthetic keystrokes.

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use enigo::{Enigo, Keyboard, Settings};
use tracing::{debug, error};

/// Delay before typing so focus can settle after the hotkey release.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Spawns the typing task and returns a channel to send text to.
///
/// Enigo is not Send, so it lives on its own thread and transcripts are
/// fed to it through the channel. Injection failures are logged and
/// swallowed; losing one utterance must not take anything else down.
pub fn spawn_typist() -> Sender<String> {
    let (sender, receiver) = mpsc::channel::<String>();

    thread::spawn(move || {
        let mut enigo = match Enigo::new(&Settings::default()) {
            Ok(enigo) => enigo,
            Err(e) => {
                error!("Failed to initialize keystroke output: {}", e);
                return;
            }
        };

        while let Ok(text) = receiver.recv() {
            // Give the foreground app a moment to regain focus after the
            // hotkey release before typing into it.
            thread::sleep(SETTLE_DELAY);
            match enigo.text(&text) {
                Ok(()) => debug!(chars = text.chars().count(), "injected text"),
                Err(e) => error!("Failed to inject text: {}", e),
            }
        }

        debug!("Typist channel closed");
    });

    sender
}
