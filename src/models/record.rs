//! Profile and stored record structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields extracted from a detail page.
///
/// Free-text attributes are best-effort and may be empty when the page
/// layout deviates from the expected line order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// Stable identifier taken from the detail URL
    pub id: String,
    pub display_name: String,
    pub badge_type: String,
    pub role_title: String,
    pub organization: String,
    pub bio_text: String,
    pub location_text: String,
    pub category_text: String,

    /// Groups/communities the profile belongs to
    #[serde(default)]
    pub groups: Vec<String>,

    /// Canonical detail page URL
    pub source_url: String,
}

impl Profile {
    /// Map content lines to fields by fixed position.
    ///
    /// Order: badge, name, title, company, bio, location, category.
    /// Missing positions become empty strings.
    pub fn from_lines(
        id: impl Into<String>,
        source_url: impl Into<String>,
        lines: &[String],
        groups: Vec<String>,
    ) -> Self {
        let at = |i: usize| lines.get(i).cloned().unwrap_or_default();
        Self {
            id: id.into(),
            badge_type: at(0),
            display_name: at(1),
            role_title: at(2),
            organization: at(3),
            bio_text: at(4),
            location_text: at(5),
            category_text: at(6),
            groups,
            source_url: source_url.into(),
        }
    }
}

/// Outcome of the action for a record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Sent => "sent",
            ActionStatus::Failed => "failed",
        }
    }
}

/// A persisted record: the extracted profile plus action bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(flatten)]
    pub profile: Profile,

    pub discovered_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,

    /// True once a sent or failed outcome has been recorded
    pub action_requested: bool,
    pub action_status: ActionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
}

impl Record {
    /// Wrap a freshly extracted profile in a pending record.
    pub fn new(profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            profile,
            discovered_at: now,
            last_updated_at: now,
            action_requested: false,
            action_status: ActionStatus::Pending,
            action_completed_at: None,
            last_error_message: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    /// Whether the action succeeded; such records are never processed again.
    pub fn is_terminal(&self) -> bool {
        self.action_status == ActionStatus::Sent
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.action_requested = true;
        self.action_status = ActionStatus::Sent;
        self.action_completed_at = Some(now);
        self.last_error_message = None;
        self.last_updated_at = now;
    }

    /// Record a failed attempt. A sent record is left untouched.
    ///
    /// Returns whether the record changed.
    pub fn mark_failed(&mut self, message: &str, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.action_requested = true;
        self.action_status = ActionStatus::Failed;
        self.action_completed_at = None;
        self.last_error_message = Some(message.to_string());
        self.last_updated_at = now;
        true
    }
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub action_sent: usize,
    /// Records with no recorded action attempt
    pub pending: usize,
    pub failed: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total={} sent={} pending={} failed={}",
            self.total, self.action_sent, self.pending, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_lines_positional() {
        let profile = Profile::from_lines(
            "42",
            "https://example.com/profiles/42",
            &lines(&[
                "Attendee", "Ada", "CTO", "Acme", "Builds things", "Lisbon", "Energy",
            ]),
            vec!["Climate".into()],
        );
        assert_eq!(profile.badge_type, "Attendee");
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.role_title, "CTO");
        assert_eq!(profile.organization, "Acme");
        assert_eq!(profile.bio_text, "Builds things");
        assert_eq!(profile.location_text, "Lisbon");
        assert_eq!(profile.category_text, "Energy");
        assert_eq!(profile.groups, vec!["Climate".to_string()]);
    }

    #[test]
    fn test_from_lines_missing_positions_are_empty() {
        let profile = Profile::from_lines("1", "u", &lines(&["Partner", "Bob"]), Vec::new());
        assert_eq!(profile.display_name, "Bob");
        assert!(profile.role_title.is_empty());
        assert!(profile.category_text.is_empty());
    }

    #[test]
    fn test_failed_does_not_override_sent() {
        let now = Utc::now();
        let mut record = Record::new(Profile::default(), now);
        record.mark_sent(now);
        assert!(!record.mark_failed("boom", now));
        assert_eq!(record.action_status, ActionStatus::Sent);
        assert!(record.last_error_message.is_none());
    }

    #[test]
    fn test_sent_after_failed_clears_error() {
        let now = Utc::now();
        let mut record = Record::new(Profile::default(), now);
        assert!(record.mark_failed("boom", now));
        assert!(record.action_requested);
        record.mark_sent(now);
        assert_eq!(record.action_status, ActionStatus::Sent);
        assert!(record.last_error_message.is_none());
        assert!(record.action_completed_at.is_some());
    }
}
