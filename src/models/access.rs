// src/models/access.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Capabilities and rule state of the current viewer for one quiz.
/// Read-only snapshot from `mod_quiz_get_quiz_access_information`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessInformation {
    #[serde(default)]
    pub canattempt: bool,
    #[serde(default)]
    pub canpreview: bool,
    #[serde(default)]
    pub canreviewmyattempts: bool,
    #[serde(default)]
    pub canviewreports: bool,
    #[serde(default)]
    pub canmanage: bool,
    /// Identifiers of the access rules enforced for this quiz.
    #[serde(default)]
    pub activerulenames: Vec<String>,
    /// Human readable descriptions of the rules.
    #[serde(default)]
    pub accessrules: Vec<String>,
    #[serde(default)]
    pub preventaccessreasons: Vec<String>,
    #[serde(default)]
    pub preventnewattemptreasons: Vec<String>,
    #[serde(default)]
    pub isfinished: bool,
}

/// Preflight data, field name to value (e.g. `quizpassword`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreflightData(pub BTreeMap<String, String>);

impl PreflightData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every field of `other` over this one.
    pub fn merge(&mut self, other: PreflightData) {
        self.0.extend(other.0);
    }

    /// Flattens the data into the indexed form the web service expects:
    /// `preflightdata[0][name]=…`, `preflightdata[0][value]=…`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .enumerate()
            .flat_map(|(i, (name, value))| {
                [
                    (format!("preflightdata[{}][name]", i), name.clone()),
                    (format!("preflightdata[{}][value]", i), value.clone()),
                ]
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PreflightData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
