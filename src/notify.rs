//! Blocking notices shown to the user.

use crate::error::{CanvasError, TransportError};

/// Presents notices and transport failures to the user.
pub trait Notifier {
    /// Shows a blocking notice. `message` is already safe to display as markup.
    fn show_notice(&self, header: &str, message: &str);

    /// Generic handling for a failed request.
    fn transport_error(&self, error: &TransportError);
}

/// Escapes text so it can be shown inside markup verbatim.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '/' => escaped.push_str("&#x2f;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Reports `error` after a failed structural update.
///
/// Client errors carry a message meant for the user and are shown under `header`;
/// anything else goes to the generic transport handler. Errors raised before any
/// request was made are shown as notices.
pub fn report_update_error(notifier: &dyn Notifier, header: &str, error: &CanvasError) {
    match error {
        CanvasError::Transport(e) if e.is_client_error() => {
            notifier.show_notice(header, &escape_html(&e.response_text));
        }
        CanvasError::Transport(e) => notifier.transport_error(e),
        CanvasError::NotAuthorized { header, message } => notifier.show_notice(header, message),
        CanvasError::Cancelled => {}
        other => {
            log::warn!("{header}: {other}");
            notifier.show_notice(header, &escape_html(&other.to_string()));
        }
    }
}
