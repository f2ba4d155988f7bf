// User-facing failure notifications, decoupled from any UI mechanism.
// Services report each failure message here in addition to returning the
// typed error; the front-end decides how to render them (toasts, banners).

use std::sync::Arc;

use parking_lot::Mutex;

pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

// Default sink for callers that do not wire up a UI channel.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn error(&self, _message: &str) {}
}

// Collects messages so tests can assert on what a user would have seen.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_messages_in_order() {
        let notifier = RecordingNotifier::new();
        notifier.error("first");
        notifier.error("second");
        assert_eq!(notifier.messages(), vec!["first", "second"]);
    }
}
