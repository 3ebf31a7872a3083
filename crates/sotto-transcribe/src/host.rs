//! Resident engine slot and the model swap protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::warn;

use crate::Transcriber;

/// Holds the one resident transcription engine.
///
/// A model switch brackets its load with `begin_switch` and
/// `install`/`abort_switch`: the replacement is installed only after it
/// loaded successfully, a failed load keeps the previous engine, and a
/// second switch requested while one is in flight is refused.
pub struct EngineHost {
    active: RwLock<Arc<dyn Transcriber>>,
    switching: AtomicBool,
}

impl EngineHost {
    pub fn new(engine: Arc<dyn Transcriber>) -> Self {
        Self {
            active: RwLock::new(engine),
            switching: AtomicBool::new(false),
        }
    }

    /// The engine jobs should use right now.
    pub fn active(&self) -> Arc<dyn Transcriber> {
        self.active.read().clone()
    }

    /// Claims the switch slot. Returns false if another switch is already
    /// in flight; the caller must drop the request in that case.
    pub fn begin_switch(&self) -> bool {
        let claimed = self
            .switching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !claimed {
            warn!("Model switch already in progress, ignoring request");
        }
        claimed
    }

    /// Installs a successfully loaded engine and releases the switch slot.
    pub fn install(&self, engine: Arc<dyn Transcriber>) {
        *self.active.write() = engine;
        self.switching.store(false, Ordering::Release);
    }

    /// Releases the switch slot without replacing the engine, after a
    /// failed load.
    pub fn abort_switch(&self) {
        self.switching.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::Result;

    struct FixedEngine {
        name: &'static str,
        text: &'static str,
    }

    #[async_trait]
    impl Transcriber for FixedEngine {
        async fn transcribe(&self, _samples: &[f32], _language: Option<&str>) -> Result<String> {
            Ok(self.text.to_string())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn engine(name: &'static str) -> Arc<dyn Transcriber> {
        Arc::new(FixedEngine { name, text: "" })
    }

    #[test]
    fn test_successful_switch_replaces_engine() {
        let host = EngineHost::new(engine("base"));
        assert_eq!(host.active().name(), "base");

        assert!(host.begin_switch());
        host.install(engine("small"));
        assert_eq!(host.active().name(), "small");
    }

    #[test]
    fn test_failed_switch_keeps_previous_engine() {
        let host = EngineHost::new(engine("base"));

        assert!(host.begin_switch());
        // The load failed, so nothing gets installed
        host.abort_switch();

        assert_eq!(host.active().name(), "base");
        // The slot is free again for the next attempt
        assert!(host.begin_switch());
    }

    #[test]
    fn test_overlapping_switches_refused() {
        let host = EngineHost::new(engine("base"));

        assert!(host.begin_switch());
        assert!(!host.begin_switch());

        host.install(engine("small"));
        assert!(host.begin_switch());
    }

    #[tokio::test]
    async fn test_jobs_use_the_active_engine() {
        let host = EngineHost::new(Arc::new(FixedEngine {
            name: "base",
            text: "before",
        }));
        let text = host.active().transcribe(&[0.0; 16], None).await.unwrap();
        assert_eq!(text, "before");

        assert!(host.begin_switch());
        host.install(Arc::new(FixedEngine {
            name: "small",
            text: "after",
        }));
        let text = host.active().transcribe(&[0.0; 16], None).await.unwrap();
        assert_eq!(text, "after");
    }
}
