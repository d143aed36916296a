// src/model/process.rs

//! Process resources and process match criteria.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifier;

identifier! {
    /// A unique identifier for a process resource.
    ProcessResourceId
}

/// Describes a process that may be running on the local machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessResource {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "match")]
    pub matcher: ProcessMatch,
}

/// An attribute of a process that match criteria can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessAttribute {
    #[serde(rename = "name")]
    Name,
}

/// The type of comparison to apply to a process attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "contains")]
    Contains,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Equals => f.write_str("equals"),
            MatchType::Contains => f.write_str("contains"),
        }
    }
}

/// Criteria for identifying running processes.
///
/// A match is either a leaf comparison against a process attribute or a
/// compound of `any`/`all` submatches. Populating both `any` and `all` is
/// a validation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessMatch {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<ProcessAttribute>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<ProcessMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<ProcessMatch>,
}

impl ProcessMatch {
    /// Returns an error if the match criteria are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.any.is_empty() && !self.all.is_empty() {
            return Err(
                "the \"any\" and \"all\" match lists are mutually exclusive".to_string(),
            );
        }

        if !self.any.is_empty() {
            for (i, submatch) in self.any.iter().enumerate() {
                submatch
                    .validate()
                    .map_err(|err| format!("Match Any [{i}]: {err}"))?;
            }
            return Ok(());
        }

        if !self.all.is_empty() {
            for (i, submatch) in self.all.iter().enumerate() {
                submatch
                    .validate()
                    .map_err(|err| format!("Match All [{i}]: {err}"))?;
            }
            return Ok(());
        }

        match self.attribute {
            Some(ProcessAttribute::Name) => match self.match_type {
                Some(_) => Ok(()),
                None => Err("a process match type was not provided".to_string()),
            },
            None => Err("a process attribute was not provided".to_string()),
        }
    }
}
