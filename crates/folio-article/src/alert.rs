//! User-facing alerts.

use folio_types::error::FolioError;

/// Shows errors to the user.
pub trait AlertSink {
    /// `sticky` alerts stay until dismissed; `dismiss_previous` clears
    /// whatever alert is currently showing first.
    fn show_error(&self, error: &FolioError, sticky: bool, dismiss_previous: bool);
}

/// Alert sink for headless hosts: writes alerts to the log.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn show_error(&self, error: &FolioError, sticky: bool, _dismiss_previous: bool) {
        if sticky {
            log::error!("Alert: {error}");
        } else {
            log::warn!("Alert: {error}");
        }
    }
}
