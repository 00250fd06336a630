//! Per-task record of which fields were explicitly set or cleared.
use std::collections::BTreeMap;

use crate::error::TrackingError;

/// Tracking state of one logical field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStatus {
    /// The latest declaration supplied a concrete value.
    pub has_new_value: bool,
    /// The latest declaration asked for the field to be cleared.
    pub clear: bool,
}

/// Bookkeeping of explicit field changes for a task kind whose executor
/// patches persisted state field by field.
///
/// Only the kind's change fields may be marked; everything else is
/// rejected with [`TrackingError`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldStatusTracker {
    change_fields: &'static [&'static str],
    statuses: BTreeMap<String, FieldStatus>,
}

impl FieldStatusTracker {
    /// Create a tracker accepting marks for `change_fields`.
    #[must_use]
    pub fn new(change_fields: &'static [&'static str]) -> Self {
        Self {
            change_fields,
            statuses: BTreeMap::new(),
        }
    }

    /// `true` if `name` is one of the tracked change fields.
    #[must_use]
    pub fn is_change_field(&self, name: &str) -> bool {
        self.change_fields.contains(&name)
    }

    /// Start (or restart) tracking `name` with an empty status.
    pub fn set_field_status(&mut self, name: &str) {
        self.statuses.insert(name.to_string(), FieldStatus::default());
    }

    /// Record that a declaration supplied a value for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotChangeField`] if `name` is not tracked.
    pub fn set_has_new_value(&mut self, name: &str) -> Result<(), TrackingError> {
        self.mark(
            name,
            FieldStatus {
                has_new_value: true,
                clear: false,
            },
        )
    }

    /// Record an explicit clear request for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotChangeField`] if `name` is not tracked.
    pub fn set_clear(&mut self, name: &str) -> Result<(), TrackingError> {
        self.mark(
            name,
            FieldStatus {
                has_new_value: false,
                clear: true,
            },
        )
    }

    fn mark(&mut self, name: &str, status: FieldStatus) -> Result<(), TrackingError> {
        if !self.is_change_field(name) {
            return Err(TrackingError::NotChangeField(name.to_string()));
        }
        self.statuses.insert(name.to_string(), status);
        Ok(())
    }

    /// Current status of `name`, or `None` if it was never declared.
    #[must_use]
    pub fn field_status(&self, name: &str) -> Option<FieldStatus> {
        self.statuses.get(name).copied()
    }

    /// Tracked fields with a pending set or clear, in name order.
    pub fn changed(&self) -> impl Iterator<Item = (&str, FieldStatus)> {
        self.statuses
            .iter()
            .filter(|(_, s)| s.has_new_value || s.clear)
            .map(|(k, s)| (k.as_str(), *s))
    }
}
