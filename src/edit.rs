/// Rule that separates a short icon/marker token from the editable part of a label.
///
/// The first whitespace-delimited token is a prefix when text follows it, it is at most
/// `max_units` UTF-16 code units long, and it is not entirely alphanumeric.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixRule {
    pub enabled: bool,
    pub max_units: usize,
}

impl PrefixRule {
    pub const fn new() -> Self {
        Self {
            enabled: true,
            max_units: 2,
        }
    }

    /// Treats every label as plain text.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_units: 0,
        }
    }

    /// Splits a label into an optional prefix and its editable text.
    pub fn split<'a>(&self, label: &'a str) -> LabelParts<'a> {
        let plain = LabelParts {
            prefix: None,
            text: label,
        };
        if !self.enabled {
            return plain;
        }
        let Some((token, rest)) = label.split_once(char::is_whitespace) else {
            return plain;
        };
        let text = rest.trim_start();
        if token.is_empty()
            || text.is_empty()
            || token.encode_utf16().count() > self.max_units
            || token.chars().all(char::is_alphanumeric)
        {
            return plain;
        }
        LabelParts {
            prefix: Some(token),
            text,
        }
    }
}

impl Default for PrefixRule {
    fn default() -> Self {
        Self::new()
    }
}

/// A label split by [`PrefixRule::split`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelParts<'a> {
    pub prefix: Option<&'a str>,
    pub text: &'a str,
}

/// Re-attaches a prefix to edited text using the given separator.
pub fn join_label(prefix: Option<&str>, separator: &str, text: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{separator}{text}"),
        None => text.to_owned(),
    }
}

/// The single active inline-label edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditSession {
    slot: usize,
    id: String,
    original: String,
    prefix: Option<String>,
    /// Whitespace between prefix and text in the original label.
    separator: String,
    draft: String,
}

/// Result of finishing or cancelling an [`EditSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditOutcome {
    pub id: String,
    pub original: String,
    /// Final label; equals `original` when cancelled.
    pub label: String,
    pub changed: bool,
    pub cancelled: bool,
}

impl EditSession {
    pub(crate) fn start(slot: usize, id: &str, label: &str, rule: PrefixRule) -> Self {
        let parts = rule.split(label);
        let separator = parts
            .prefix
            .and_then(|prefix| label.get(prefix.len()..label.len() - parts.text.len()))
            .unwrap_or(" ");
        Self {
            slot,
            id: id.to_owned(),
            original: label.to_owned(),
            prefix: parts.prefix.map(str::to_owned),
            separator: separator.to_owned(),
            draft: parts.text.to_owned(),
        }
    }

    pub(crate) const fn slot(&self) -> usize {
        self.slot
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Editable text as currently typed.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Label that finishing now would produce.
    pub fn preview(&self) -> String {
        join_label(self.prefix.as_deref(), &self.separator, &self.draft)
    }

    /// Commits `value` (or the current draft) behind the prefix.
    pub fn finish(self, value: Option<&str>) -> EditOutcome {
        let text = value.unwrap_or(&self.draft);
        let label = join_label(self.prefix.as_deref(), &self.separator, text);
        EditOutcome {
            changed: label != self.original,
            id: self.id,
            original: self.original,
            label,
            cancelled: false,
        }
    }

    /// Abandons the edit, restoring the original label.
    pub fn cancel(self) -> EditOutcome {
        EditOutcome {
            id: self.id,
            label: self.original.clone(),
            original: self.original,
            changed: false,
            cancelled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_prefix_is_split_off() {
        let parts = PrefixRule::new().split("📁 Documents");
        assert_eq!(parts.prefix, Some("📁"));
        assert_eq!(parts.text, "Documents");
    }

    #[test]
    fn alphanumeric_or_long_tokens_stay_text() {
        let rule = PrefixRule::new();
        assert_eq!(rule.split("A1 sheet").prefix, None);
        assert_eq!(rule.split("--> arrow").prefix, None);
        assert_eq!(rule.split("Documents").prefix, None);
        assert_eq!(rule.split("📁").text, "📁");
        assert_eq!(rule.split("- item").prefix, Some("-"));
        assert_eq!(PrefixRule::disabled().split("📁 Docs").prefix, None);
    }

    #[test]
    fn finish_rejoins_prefix() {
        let session = EditSession::start(0, "docs", "📁 Documents", PrefixRule::new());
        assert_eq!(session.draft(), "Documents");

        let outcome = session.finish(Some("My Docs"));
        assert_eq!(outcome.label, "📁 My Docs");
        assert!(outcome.changed);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn finish_without_value_uses_draft() {
        let mut session = EditSession::start(0, "n", "📄 notes", PrefixRule::new());
        assert_eq!(session.preview(), "📄 notes");
        session.set_draft("todo");

        let outcome = session.finish(None);
        assert_eq!(outcome.label, "📄 todo");
        assert!(outcome.changed);
    }

    #[test]
    fn untouched_finish_is_unchanged() {
        let session = EditSession::start(0, "n", "plain label", PrefixRule::new());
        let outcome = session.finish(None);
        assert_eq!(outcome.label, "plain label");
        assert!(!outcome.changed);
    }

    #[test]
    fn untouched_finish_keeps_original_separator() {
        for label in ["📁  Docs", "📁\tDocs"] {
            let session = EditSession::start(0, "d", label, PrefixRule::new());
            assert_eq!(session.draft(), "Docs");
            assert_eq!(session.preview(), label);

            let outcome = session.finish(None);
            assert_eq!(outcome.label, label);
            assert!(!outcome.changed);
        }

        let session = EditSession::start(0, "d", "📁\tDocs", PrefixRule::new());
        assert_eq!(session.finish(Some("Notes")).label, "📁\tNotes");
    }

    #[test]
    fn cancel_restores_original() {
        let mut session = EditSession::start(0, "n", "📄 notes", PrefixRule::new());
        session.set_draft("something else");

        let outcome = session.cancel();
        assert_eq!(outcome.label, "📄 notes");
        assert!(!outcome.changed);
        assert!(outcome.cancelled);
    }
}
