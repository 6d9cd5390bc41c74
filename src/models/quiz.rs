// src/models/quiz.rs

use serde::{Deserialize, Serialize};

/// Navigation method of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NavigationMode {
    #[default]
    Free,
    /// Pages must be answered in order.
    #[serde(rename = "seq")]
    Sequential,
}

/// A quiz as returned by `mod_quiz_get_quizzes_by_course`.
///
/// Field names follow the remote payload. Review settings are kept as
/// `Option` because older sites omit them, and "absent" must stay distinct
/// from "no bits set".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    #[serde(default)]
    pub course: i64,
    /// Course module id, used for group lookups.
    #[serde(default)]
    pub coursemodule: i64,
    #[serde(default)]
    pub name: String,

    /// Maximum grade the quiz is scaled to.
    #[serde(default)]
    pub grade: Option<f64>,
    /// Raw maximum of all question marks.
    #[serde(default)]
    pub sumgrades: Option<f64>,
    #[serde(default)]
    pub decimalpoints: Option<i64>,
    /// `-1` means "same as decimalpoints".
    #[serde(default)]
    pub questiondecimalpoints: Option<i64>,

    #[serde(default)]
    pub timeopen: i64,
    /// 0 means the quiz never closes.
    #[serde(default)]
    pub timeclose: i64,
    #[serde(default)]
    pub timelimit: i64,
    /// Maximum number of attempts, 0 for unlimited.
    #[serde(default)]
    pub attempts: i64,

    #[serde(default)]
    pub navmethod: NavigationMode,
    #[serde(default, deserialize_with = "crate::models::int_bool")]
    pub allowofflineattempts: bool,
    #[serde(default, deserialize_with = "crate::models::int_bool")]
    pub hasquestions: bool,

    #[serde(default)]
    pub reviewattempt: Option<i64>,
    #[serde(default)]
    pub reviewcorrectness: Option<i64>,
    #[serde(default)]
    pub reviewmaxmarks: Option<i64>,
    #[serde(default)]
    pub reviewmarks: Option<i64>,
    #[serde(default)]
    pub reviewspecificfeedback: Option<i64>,
    #[serde(default)]
    pub reviewgeneralfeedback: Option<i64>,
    #[serde(default)]
    pub reviewrightanswer: Option<i64>,
    #[serde(default)]
    pub reviewoverallfeedback: Option<i64>,
}

impl Quiz {
    pub fn is_sequential(&self) -> bool {
        self.navmethod == NavigationMode::Sequential
    }

    /// Whether attempts of this quiz may be taken without a connection.
    ///
    /// Offline answering needs free navigation, since pages may be answered
    /// out of order while disconnected.
    pub fn is_offline(&self, offline_disabled: bool) -> bool {
        self.allowofflineattempts && !self.is_sequential() && !offline_disabled
    }
}
