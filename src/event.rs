//! Application events for the tao event loop.

use sotto_core::MicState;

/// Events posted to the tao event loop from the listener and worker threads.
#[derive(Debug, Clone)]
pub enum SottoEvent {
    /// The microphone state has changed
    StateChanged(MicState),
    /// The key listener session is over (escape, or a listener failure);
    /// the application should shut down
    ListenerEnded,
}

/// Sink for events headed to the tray thread.
///
/// The event loop proxy implements this in the running application; tests
/// use a plain channel so no event loop is needed.
pub trait EventSink: Send + 'static {
    fn emit(&self, event: SottoEvent);
}

impl EventSink for tao::event_loop::EventLoopProxy<SottoEvent> {
    fn emit(&self, event: SottoEvent) {
        // Send fails only once the loop is gone, and then there is nothing
        // left to update.
        self.send_event(event).ok();
    }
}

#[cfg(test)]
impl EventSink for std::sync::mpsc::Sender<SottoEvent> {
    fn emit(&self, event: SottoEvent) {
        self.send(event).ok();
    }
}
