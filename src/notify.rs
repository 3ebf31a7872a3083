//! System notifications and the alert surface.

use notify_rust::Notification;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber, debug, error, info};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::{APP_NAME, APP_NAME_PRETTY};

/// Send a system notification with a summary and body.
pub fn notify(summary: &str, body: &str) {
    Notification::new()
        .appname(APP_NAME)
        .summary(&format!("{} - {}", APP_NAME_PRETTY, summary))
        .body(body)
        .show()
        // debug, not error: the notification layer forwards errors back
        // here, and a broken notifier must not recurse
        .map_err(|e| debug!("Failed to send notification: {}", e))
        .ok();
}

/// How a close request should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Quit,
    Minimize,
    /// The user dismissed the prompt, or no prompt surface exists
    Dismissed,
}

/// User-facing alerts raised by the capture and transcription machinery.
///
/// The tray build routes these through logging and system notifications;
/// a frontend with real dialogs can substitute its own surface.
pub trait Alerts: Send + Sync {
    /// A microphone could not be opened or stopped delivering.
    /// `is_startup` distinguishes the probe at launch from a failure
    /// while a session is live.
    fn report_microphone_error(&self, device_name: &str, detail: &str, is_startup: bool);

    /// Informational message for the user.
    fn notify(&self, title: &str, message: &str);

    /// Ask the user whether a close request means quit or minimize.
    fn confirm_quit_or_minimize(&self) -> CloseDecision;
}

/// Alert surface backed by the notification layer.
///
/// Errors are logged once and the layer mirrors them to the desktop, so
/// the user sees exactly one alert per failure.
pub struct SystemAlerts;

impl Alerts for SystemAlerts {
    fn report_microphone_error(&self, device_name: &str, detail: &str, is_startup: bool) {
        if is_startup {
            error!(
                "Cannot initialize microphone ({device_name}): {detail}. \
                 Sotto keeps running, but recording will not work until a \
                 working device is selected."
            );
        } else {
            error!(
                "Recording on {device_name} failed: {detail}. \
                 The device stays selected; pick another one from the tray \
                 if this keeps happening."
            );
        }
    }

    fn notify(&self, title: &str, message: &str) {
        info!("{title}: {message}");
        notify(title, message);
    }

    fn confirm_quit_or_minimize(&self) -> CloseDecision {
        // The tray build has no dialog surface to ask with.
        info!("Close requested with ask behavior and no prompt surface, ignoring");
        CloseDecision::Dismissed
    }
}

/// Visitor to extract the message field from tracing events.
struct MessageVisitor {
    message: Option<String>,
}

impl MessageVisitor {
    fn new() -> Self {
        Self { message: None }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }
}

/// Tracing layer that sends notifications for warnings and errors.
#[derive(Debug, Default)]
pub struct NotificationLayer {}

impl NotificationLayer {
    pub fn new() -> Self {
        Self {}
    }
}

fn should_notify(level: Level) -> Option<&'static str> {
    match level {
        Level::ERROR => Some("error"),
        Level::WARN => Some("warning"),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for NotificationLayer {
    fn on_event(&self, event: &Event<'_>, _: Context<'_, S>) {
        let level = *event.metadata().level();

        if let Some(summary) = should_notify(level) {
            let mut visitor = MessageVisitor::new();
            event.record(&mut visitor);

            if let Some(message) = visitor.message {
                notify(summary, &message);
            }
        }
    }
}
