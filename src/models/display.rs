// src/models/display.rs

use serde::Serialize;

/// Seconds after finishing during which an attempt counts as "immediately after".
pub const IMMEDIATELY_AFTER_PERIOD: i64 = 120;

/// Temporal phase of an attempt, used to pick the review settings that apply.
///
/// The discriminants are the bits the remote site uses in the review
/// settings of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    During = 0x10000,
    ImmediatelyAfter = 0x01000,
    LaterWhileOpen = 0x00100,
    AfterClose = 0x00010,
}

impl DisplayState {
    pub const fn bit(self) -> i64 {
        self as i64
    }

    /// Whether `setting` has this state's bit. An undefined setting has none.
    pub fn is_set_in(self, setting: Option<i64>) -> bool {
        setting.is_some_and(|bits| bits & self.bit() != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarksVisibility {
    Hidden,
    MaxOnly,
    MarkAndMax,
}

/// What parts of an attempt a viewer may see in the review screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayOptions {
    pub attempt: bool,
    pub correctness: Visibility,
    pub marks: MarksVisibility,
    pub feedback: Visibility,
    pub general_feedback: Visibility,
    pub right_answer: Visibility,
    pub overall_feedback: Visibility,
    pub num_parts_correct: Visibility,
    pub manual_comment: Visibility,
    pub mark_dp: i64,
}
