//! Per-recipient values substituted into attachment placeholders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity fields of a single campaign recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseRecipient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Job title or role, if known.
    pub position: String,
}

/// Everything a template may reference while rendering one recipient's copy.
///
/// Placeholder names follow the field names used by campaign templates:
/// `FirstName`, `LastName`, `Email`, `Position`, `BaseURL`, `URL`,
/// `TrackingURL`, `Tracker`, `From` and `RId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateContext {
    /// Recipient identity. Flattened so JSON contexts read naturally.
    #[serde(flatten)]
    pub recipient: BaseRecipient,

    /// Root URL of the landing server.
    pub base_url: String,

    /// Landing page URL including the recipient id.
    pub url: String,

    /// Open-tracking URL including the recipient id.
    pub tracking_url: String,

    /// Pre-rendered tracking fragment (a hidden `<img>` tag).
    pub tracker: String,

    /// Sender display name.
    pub from: String,

    /// Unique recipient identifier.
    pub rid: String,
}

impl TemplateContext {
    /// Build a context for one recipient, deriving the URLs and tracker from
    /// `base_url` and `rid`.
    pub fn for_recipient(
        recipient: BaseRecipient,
        base_url: &str,
        from: &str,
        rid: &str,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        let url = format!("{base}/?rid={rid}");
        let tracking_url = format!("{base}/track?rid={rid}");
        let tracker = tracker_tag(&tracking_url);
        Self {
            recipient,
            base_url: base_url.to_string(),
            url,
            tracking_url,
            tracker,
            from: from.to_string(),
            rid: rid.to_string(),
        }
    }

    /// The fixed synthetic context used to pre-flight attachments before a
    /// campaign is enabled.
    pub fn sample() -> Self {
        Self {
            recipient: BaseRecipient {
                first_name: "Foo".to_string(),
                last_name: "Bar".to_string(),
                email: "foo@bar.com".to_string(),
                position: String::new(),
            },
            base_url: "http://testurl.com".to_string(),
            url: "http://testurl.com/?rid=1234567".to_string(),
            tracking_url: "http://testurl.local/track?rid=1234567".to_string(),
            tracker: tracker_tag("http://testurl.local/track?rid=1234567"),
            from: "From Address".to_string(),
            rid: "1234567".to_string(),
        }
    }

    /// Placeholder names understood by [`lookup`](Self::lookup).
    pub const FIELDS: [&'static str; 10] = [
        "FirstName",
        "LastName",
        "Email",
        "Position",
        "BaseURL",
        "URL",
        "TrackingURL",
        "Tracker",
        "From",
        "RId",
    ];

    /// Every placeholder with its value, keyed by placeholder name.
    pub fn fields(&self) -> BTreeMap<&'static str, &str> {
        Self::FIELDS
            .iter()
            .filter_map(|&field| self.lookup(field).map(|value| (field, value)))
            .collect()
    }

    /// Resolve a placeholder field name to its value.
    pub fn lookup(&self, field: &str) -> Option<&str> {
        let value = match field {
            "FirstName" => &self.recipient.first_name,
            "LastName" => &self.recipient.last_name,
            "Email" => &self.recipient.email,
            "Position" => &self.recipient.position,
            "BaseURL" => &self.base_url,
            "URL" => &self.url,
            "TrackingURL" => &self.tracking_url,
            "Tracker" => &self.tracker,
            "From" => &self.from,
            "RId" => &self.rid,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Invisible tracking pixel pointing at `tracking_url`.
fn tracker_tag(tracking_url: &str) -> String {
    format!("<img alt='' style='display: none' src='{tracking_url}'/>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_context() {
        let ctx = TemplateContext::sample();
        assert_eq!(ctx.lookup("FirstName"), Some("Foo"));
        assert_eq!(ctx.lookup("Email"), Some("foo@bar.com"));
        assert_eq!(ctx.lookup("RId"), Some("1234567"));
        assert_eq!(
            ctx.tracker,
            "<img alt='' style='display: none' src='http://testurl.local/track?rid=1234567'/>"
        );
    }

    #[test]
    fn test_for_recipient_derives_urls() {
        let recipient = BaseRecipient {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            position: "Analyst".into(),
        };
        let ctx = TemplateContext::for_recipient(recipient, "https://phish.test/", "IT Desk", "r42");
        assert_eq!(ctx.url, "https://phish.test/?rid=r42");
        assert_eq!(ctx.tracking_url, "https://phish.test/track?rid=r42");
        assert!(ctx.tracker.contains("https://phish.test/track?rid=r42"));
        assert_eq!(ctx.lookup("From"), Some("IT Desk"));
        assert_eq!(ctx.lookup("Position"), Some("Analyst"));
    }

    #[test]
    fn test_lookup_unknown_field() {
        let ctx = TemplateContext::sample();
        assert_eq!(ctx.lookup("Password"), None);
        assert_eq!(ctx.lookup("firstname"), None);
    }

    #[test]
    fn test_fields_cover_every_placeholder() {
        let ctx = TemplateContext::sample();
        let fields = ctx.fields();
        assert_eq!(fields.len(), TemplateContext::FIELDS.len());
        assert_eq!(fields["RId"], "1234567");
        assert_eq!(fields["BaseURL"], "http://testurl.com");
    }

    #[test]
    fn test_deserialize_flat_json() {
        let json = r#"{"first_name":"Foo","email":"foo@example.com","rid":"abc"}"#;
        let ctx: TemplateContext = serde_json::from_str(json).expect("parse");
        assert_eq!(ctx.recipient.first_name, "Foo");
        assert_eq!(ctx.recipient.last_name, "");
        assert_eq!(ctx.rid, "abc");
    }
}
