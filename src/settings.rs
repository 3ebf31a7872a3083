//! Runtime configuration control.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use sotto_core::{CloseBehavior, Config, ConfigManager};
use sotto_transcribe::WhisperModel;
use tracing::{error, info, warn};

use crate::hotkey::HotkeyCombo;
use crate::notify::{Alerts, CloseDecision};
use crate::pipeline::TranscribePipeline;

/// Applies configuration changes coming from the tray and other surfaces.
///
/// Every accepted change lands in the shared config under a single write
/// so readers never see a half-applied update, hot-swappable fields get
/// their specific treatment (combo re-parse, model reload), and the
/// merged config is persisted afterwards regardless of how the individual
/// swaps went, so the user's last intent is never silently dropped.
pub struct SettingsController {
    config: Arc<RwLock<Config>>,
    manager: ConfigManager,
    combo: Arc<RwLock<HotkeyCombo>>,
    pipeline: Arc<TranscribePipeline>,
    alerts: Arc<dyn Alerts>,
}

impl SettingsController {
    pub fn new(
        config: Arc<RwLock<Config>>,
        manager: ConfigManager,
        combo: Arc<RwLock<HotkeyCombo>>,
        pipeline: Arc<TranscribePipeline>,
        alerts: Arc<dyn Alerts>,
    ) -> Self {
        Self {
            config,
            manager,
            combo,
            pipeline,
            alerts,
        }
    }

    /// Full configuration update from a settings surface.
    pub fn on_config_change(&self, new_config: Config) {
        let previous = self.config.read().clone();

        if new_config.hotkey != previous.hotkey {
            self.apply_hotkey(&new_config.hotkey);
        }
        if new_config.model != previous.model {
            self.apply_model(&new_config.model);
        }
        if new_config.microphone_device != previous.microphone_device {
            info!(
                device = ?new_config.microphone_device,
                "Input device changed, applies to the next recording"
            );
        }
        if new_config.sample_rate != previous.sample_rate {
            info!(
                sample_rate = new_config.sample_rate,
                "Sample rate changed, applies to the next recording"
            );
        }
        if new_config.language != previous.language {
            info!(
                language = ?new_config.language,
                "Language changed, applies to the next transcription"
            );
        }

        *self.config.write() = new_config;
        self.persist();
    }

    /// Model picked from the tray menu.
    pub fn on_model_select(&self, model: WhisperModel) {
        {
            let mut config = self.config.write();
            if config.model == model.name() {
                return;
            }
            config.model = model.name().to_string();
        }
        self.pipeline.switch_model(model);
        self.persist();
    }

    /// Input device picked from the tray menu; None selects the system
    /// default.
    pub fn on_device_select(&self, device: Option<usize>) {
        self.config.write().microphone_device = device;
        info!(device = ?device, "Input device changed, applies to the next recording");
        self.persist();
    }

    /// Collaborator exit request.
    pub fn on_exit(&self) {
        info!("Exit requested");
    }

    /// Resolves a close request against the configured close behavior.
    pub fn close_requested(&self) -> CloseDecision {
        match self.config.read().close_behavior {
            CloseBehavior::Quit => CloseDecision::Quit,
            CloseBehavior::Minimize => CloseDecision::Minimize,
            CloseBehavior::Ask => self.alerts.confirm_quit_or_minimize(),
        }
    }

    /// Where the configuration is persisted.
    pub fn config_path(&self) -> &Path {
        self.manager.config_path()
    }

    fn apply_hotkey(&self, spec: &str) {
        match HotkeyCombo::parse(spec) {
            Ok(parsed) => {
                *self.combo.write() = parsed;
                info!(hotkey = %spec, "Hotkey combo updated");
            }
            // The active combo stays as it was; the string is still
            // persisted as the user's intent
            Err(e) => warn!("Ignoring hotkey update: {:#}", e),
        }
    }

    fn apply_model(&self, name: &str) {
        match WhisperModel::from_name(name) {
            Some(model) => self.pipeline.switch_model(model),
            None => warn!(model = %name, "Unknown model in config update, keeping the current one"),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.manager.save(&self.config.read()) {
            error!("Failed to persist configuration: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use async_trait::async_trait;
    use sotto_transcribe::{EngineHost, Transcriber};

    use super::*;

    struct SilentEngine;

    #[async_trait]
    impl Transcriber for SilentEngine {
        async fn transcribe(
            &self,
            _samples: &[f32],
            _language: Option<&str>,
        ) -> sotto_transcribe::Result<String> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    struct FixedAlerts(CloseDecision);

    impl Alerts for FixedAlerts {
        fn report_microphone_error(&self, _device_name: &str, _detail: &str, _is_startup: bool) {}
        fn notify(&self, _title: &str, _message: &str) {}
        fn confirm_quit_or_minimize(&self) -> CloseDecision {
            self.0
        }
    }

    struct Harness {
        controller: SettingsController,
        config: Arc<RwLock<Config>>,
        combo: Arc<RwLock<HotkeyCombo>>,
        dir: tempfile::TempDir,
    }

    fn harness(decision: CloseDecision) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_paths(
            dir.path().join("config.json"),
            dir.path().join("legacy.json"),
        );
        let config = Arc::new(RwLock::new(Config::default()));
        let combo = Arc::new(RwLock::new(HotkeyCombo::default()));
        let alerts: Arc<dyn Alerts> = Arc::new(FixedAlerts(decision));

        let (event_sender, _event_receiver) = channel();
        let (text_sender, _text_receiver) = channel();
        let pipeline = Arc::new(TranscribePipeline::with_host(
            config.clone(),
            alerts.clone(),
            Arc::new(EngineHost::new(Arc::new(SilentEngine))),
            Box::new(event_sender),
            text_sender,
        ));

        let controller = SettingsController::new(
            config.clone(),
            manager,
            combo.clone(),
            pipeline,
            alerts,
        );
        Harness {
            controller,
            config,
            combo,
            dir,
        }
    }

    fn saved_config(harness: &Harness) -> Config {
        assert!(harness.dir.path().join("config.json").exists());
        ConfigManager::with_config_paths(
            harness.dir.path().join("config.json"),
            harness.dir.path().join("legacy.json"),
        )
        .load()
        .unwrap()
    }

    #[test]
    fn test_device_select_updates_and_persists() {
        let harness = harness(CloseDecision::Dismissed);
        harness.controller.on_device_select(Some(2));

        assert_eq!(harness.config.read().microphone_device, Some(2));
        assert_eq!(saved_config(&harness).microphone_device, Some(2));
    }

    #[test]
    fn test_config_change_reparses_the_hotkey() {
        let harness = harness(CloseDecision::Dismissed);
        let mut update = harness.config.read().clone();
        update.hotkey = "alt+x".to_string();
        harness.controller.on_config_change(update);

        assert_eq!(*harness.combo.read(), HotkeyCombo::parse("alt+x").unwrap());
        assert_eq!(saved_config(&harness).hotkey, "alt+x");
    }

    #[test]
    fn test_unusable_hotkey_keeps_the_previous_combo() {
        let harness = harness(CloseDecision::Dismissed);
        let mut update = harness.config.read().clone();
        update.hotkey = "garbage+tokens".to_string();
        harness.controller.on_config_change(update);

        // The combo is untouched but the string is persisted as intent
        assert_eq!(*harness.combo.read(), HotkeyCombo::default());
        assert_eq!(saved_config(&harness).hotkey, "garbage+tokens");
    }

    #[test]
    fn test_partial_update_persists_the_merged_config() {
        let harness = harness(CloseDecision::Dismissed);
        let mut update = harness.config.read().clone();
        update.language = Some("de".to_string());
        update.microphone_device = Some(1);
        harness.controller.on_config_change(update);

        let saved = saved_config(&harness);
        assert_eq!(saved.language.as_deref(), Some("de"));
        assert_eq!(saved.microphone_device, Some(1));
        assert_eq!(saved.model, Config::default().model);
    }

    #[test]
    fn test_reselecting_the_current_model_is_a_no_op() {
        let harness = harness(CloseDecision::Dismissed);
        harness
            .controller
            .on_model_select(WhisperModel::from_name(&Config::default().model).unwrap());

        // Nothing changed, so nothing was written
        assert!(!harness.dir.path().join("config.json").exists());
    }

    #[test]
    fn test_close_follows_the_configured_behavior() {
        let harness = harness(CloseDecision::Dismissed);

        harness.config.write().close_behavior = CloseBehavior::Quit;
        assert_eq!(harness.controller.close_requested(), CloseDecision::Quit);

        harness.config.write().close_behavior = CloseBehavior::Minimize;
        assert_eq!(
            harness.controller.close_requested(),
            CloseDecision::Minimize
        );
    }

    #[test]
    fn test_ask_behavior_defers_to_the_alert_surface() {
        let harness = harness(CloseDecision::Quit);
        harness.config.write().close_behavior = CloseBehavior::Ask;
        assert_eq!(harness.controller.close_requested(), CloseDecision::Quit);

        let harness = harness(CloseDecision::Dismissed);
        harness.config.write().close_behavior = CloseBehavior::Ask;
        assert_eq!(
            harness.controller.close_requested(),
            CloseDecision::Dismissed
        );
    }
}
