// src/models/attempt.rs

use serde::{Deserialize, Serialize};

/// Lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptState {
    #[serde(rename = "inprogress")]
    InProgress,
    Overdue,
    Finished,
    Abandoned,
}

impl AttemptState {
    /// Finished and abandoned attempts are completed and may be reviewed.
    pub fn is_completed(self) -> bool {
        matches!(self, AttemptState::Finished | AttemptState::Abandoned)
    }

    /// Transitions only move forward; a state never regresses.
    pub fn can_transition_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (InProgress, Overdue)
                | (InProgress, Finished)
                | (InProgress, Abandoned)
                | (Overdue, Finished)
                | (Overdue, Abandoned)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptState::InProgress => "inprogress",
            AttemptState::Overdue => "overdue",
            AttemptState::Finished => "finished",
            AttemptState::Abandoned => "abandoned",
        }
    }

    /// Label shown next to an attempt in attempt lists.
    pub fn readable(self) -> &'static str {
        match self {
            AttemptState::InProgress => "In progress",
            AttemptState::Overdue => "Overdue, needs submitting",
            AttemptState::Finished => "Finished",
            AttemptState::Abandoned => "Never submitted",
        }
    }
}

/// One user's attempt at a quiz, as returned by the remote site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    #[serde(default)]
    pub quiz: i64,
    pub userid: i64,
    /// Sequence number of the attempt for this user.
    #[serde(default)]
    pub attempt: i64,
    pub state: AttemptState,
    #[serde(default)]
    pub timestart: i64,
    /// 0 while the attempt is not finished.
    #[serde(default)]
    pub timefinish: i64,
    #[serde(default)]
    pub timemodified: i64,
    #[serde(default, deserialize_with = "crate::models::int_bool")]
    pub preview: bool,
    #[serde(default)]
    pub currentpage: i64,
    #[serde(default)]
    pub sumgrades: Option<f64>,
    /// Slot numbers separated by commas, `0` marks a page break.
    #[serde(default)]
    pub layout: String,

    /// Set locally when the attempt was finished while offline and the
    /// finish has not reached the site yet.
    #[serde(default, skip_deserializing)]
    pub finishedoffline: bool,
}

impl Attempt {
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }
}
