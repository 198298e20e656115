use crate::constants::DEFAULT_RETENTION_MS;
use crate::constants::DEFAULT_THEME;
use crate::EntryId;

/// Persisted scalar settings, independent of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSettings {
    pub theme: String,
    /// Retention horizon in milliseconds; `0` disables pruning.
    pub retention_ms: u64,
    /// Sorted and de-duplicated
    pub proto_paths: Vec<String>,
    /// Sorted and de-duplicated
    pub proto_files: Vec<String>,
    pub has_seen_onboarding: bool,
    pub has_seen_tour: bool,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION_MS)
    }
}

impl DocumentSettings {
    pub fn with_retention(retention_ms: u64) -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            retention_ms,
            proto_paths: vec![],
            proto_files: vec![],
            has_seen_onboarding: false,
            // Onboarding flips this to false to start the tour.
            has_seen_tour: true,
        }
    }

    /// Returns true when any field changed.
    pub(crate) fn apply_patch(
        &mut self,
        patch: SettingsPatch,
    ) -> bool {
        let before = self.clone();
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(ms) = patch.retention_ms {
            self.retention_ms = ms;
        }
        if let Some(seen) = patch.has_seen_onboarding {
            self.has_seen_onboarding = seen;
        }
        if let Some(seen) = patch.has_seen_tour {
            self.has_seen_tour = seen;
        }
        *self != before
    }
}

/// Partial update of [`DocumentSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub theme: Option<String>,
    pub retention_ms: Option<u64>,
    pub has_seen_onboarding: Option<bool>,
    pub has_seen_tour: Option<bool>,
}

/// Adds the paths that are not present yet and keeps the list sorted.
/// Returns true when the list changed.
pub(crate) fn union_sorted(
    list: &mut Vec<String>,
    paths: &[String],
) -> bool {
    let before = list.len();
    for p in paths {
        if !list.contains(p) {
            list.push(p.clone());
        }
    }
    list.sort();
    list.len() != before
}

/// Returns true when the list changed.
pub(crate) fn remove_all(
    list: &mut Vec<String>,
    paths: &[String],
) -> bool {
    let before = list.len();
    list.retain(|p| !paths.contains(p));
    list.len() != before
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomHeader {
    pub key: String,
    pub value: String,
}

/// UI state that lives only in memory. It is never written and survives rehydration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Entry whose title is currently being edited
    pub editing_title_of: Option<EntryId>,
    pub custom_headers: Vec<CustomHeader>,
}
