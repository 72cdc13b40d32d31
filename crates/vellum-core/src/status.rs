//! The version lifecycle state machine.
//!
//! A version's status only ever moves along the edges listed in
//! [`VersionStatus::can_transition_to`]. There is no soft-delete flag:
//! supersession and retirement are explicit states, which is what makes the
//! rollback and reinstatement paths representable at all.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of one [`PolicyVersion`](crate::version::PolicyVersion).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
  /// Staged but not yet promoted; optional entry point for a review step.
  Draft,
  /// The single current version of its document.
  Active,
  /// Replaced by a newer version of the same document.
  Superseded,
  /// Withdrawn with no replacement; terminal but kept for audit.
  Retired,
}

impl VersionStatus {
  /// The discriminant string stored in the `status` database column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Active => "active",
      Self::Superseded => "superseded",
      Self::Retired => "retired",
    }
  }

  /// Parse the database discriminant back into a status.
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "draft" => Some(Self::Draft),
      "active" => Some(Self::Active),
      "superseded" => Some(Self::Superseded),
      "retired" => Some(Self::Retired),
      _ => None,
    }
  }

  /// The edge table. Creation (`None -> Draft` / `None -> Active`) is not a
  /// transition and is handled by ingest; nothing ever re-enters Draft.
  pub fn can_transition_to(self, to: Self) -> bool {
    matches!(
      (self, to),
      (Self::Draft, Self::Active)
        | (Self::Active, Self::Superseded)
        | (Self::Active, Self::Retired)
        | (Self::Superseded, Self::Active)
        | (Self::Retired, Self::Active)
    )
  }

  pub fn is_active(self) -> bool { matches!(self, Self::Active) }
}

impl fmt::Display for VersionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::VersionStatus::*;

  #[test]
  fn legal_edges() {
    assert!(Draft.can_transition_to(Active));
    assert!(Active.can_transition_to(Superseded));
    assert!(Active.can_transition_to(Retired));
    assert!(Superseded.can_transition_to(Active));
    assert!(Retired.can_transition_to(Active));
  }

  #[test]
  fn nothing_reenters_draft() {
    for from in [Draft, Active, Superseded, Retired] {
      assert!(!from.can_transition_to(Draft));
    }
  }

  #[test]
  fn active_cannot_go_back_to_draft() {
    // Scenario: an operator tries to "un-publish" a live version.
    assert!(!Active.can_transition_to(Draft));
  }

  #[test]
  fn terminal_states_only_reactivate() {
    assert!(!Superseded.can_transition_to(Retired));
    assert!(!Retired.can_transition_to(Superseded));
    assert!(!Draft.can_transition_to(Superseded));
    assert!(!Draft.can_transition_to(Retired));
  }

  #[test]
  fn self_transitions_are_illegal() {
    for s in [Draft, Active, Superseded, Retired] {
      assert!(!s.can_transition_to(s));
    }
  }

  #[test]
  fn discriminant_round_trip() {
    for s in [Draft, Active, Superseded, Retired] {
      assert_eq!(super::VersionStatus::parse(s.as_str()), Some(s));
    }
    assert_eq!(super::VersionStatus::parse("deleted"), None);
  }
}
