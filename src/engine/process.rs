// src/engine/process.rs

//! Evaluation of process match criteria against running processes.

use crate::error::{Error, Result};
use crate::model::{MatchType, ProcessAttribute, ProcessMatch};
use crate::platform::{Platform, ProcessInfo};

/// Returns the number of processes running on the local system that match
/// the given criteria.
pub fn number_of_running_processes(
    platform: &dyn Platform,
    matcher: &ProcessMatch,
) -> Result<usize> {
    // Surface bad criteria before touching the process list.
    validate(matcher)?;

    let processes = platform.list_processes()?;
    Ok(processes
        .iter()
        .filter(|process| matches(process, matcher))
        .count())
}

fn validate(matcher: &ProcessMatch) -> Result<()> {
    // Document validation rejects this too, but callers can hand over a
    // match tree directly, and "any" would otherwise shadow "all".
    if !matcher.any.is_empty() && !matcher.all.is_empty() {
        return Err(Error::InvalidConfiguration(
            "the \"any\" and \"all\" match lists are mutually exclusive".to_string(),
        ));
    }

    if !matcher.any.is_empty() {
        for (i, submatch) in matcher.any.iter().enumerate() {
            validate(submatch)
                .map_err(|err| Error::InvalidConfiguration(format!("Match Any [{i}]: {err}")))?;
        }
        return Ok(());
    }

    if !matcher.all.is_empty() {
        for (i, submatch) in matcher.all.iter().enumerate() {
            validate(submatch)
                .map_err(|err| Error::InvalidConfiguration(format!("Match All [{i}]: {err}")))?;
        }
        return Ok(());
    }

    match matcher.attribute {
        Some(ProcessAttribute::Name) => match matcher.match_type {
            Some(_) => Ok(()),
            None => Err(Error::InvalidConfiguration(
                "a process match type was not provided".to_string(),
            )),
        },
        None => Err(Error::InvalidConfiguration(
            "a process attribute was not provided".to_string(),
        )),
    }
}

fn matches(process: &ProcessInfo, matcher: &ProcessMatch) -> bool {
    if !matcher.any.is_empty() {
        return matcher
            .any
            .iter()
            .any(|submatch| matches(process, submatch));
    }

    if !matcher.all.is_empty() {
        return matcher
            .all
            .iter()
            .all(|submatch| matches(process, submatch));
    }

    match (matcher.attribute, matcher.match_type) {
        (Some(ProcessAttribute::Name), Some(MatchType::Equals)) => {
            process.name.eq_ignore_ascii_case(&matcher.value)
        }
        (Some(ProcessAttribute::Name), Some(MatchType::Contains)) => process
            .name
            .to_ascii_lowercase()
            .contains(&matcher.value.to_ascii_lowercase()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;

    fn name_match(match_type: MatchType, value: &str) -> ProcessMatch {
        ProcessMatch {
            attribute: Some(ProcessAttribute::Name),
            match_type: Some(match_type),
            value: value.to_string(),
            ..ProcessMatch::default()
        }
    }

    #[test]
    fn test_equals_is_case_insensitive() {
        let platform = MockPlatform::new();
        platform.add_process("Setup.EXE");

        let count =
            number_of_running_processes(&platform, &name_match(MatchType::Equals, "setup.exe"))
                .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_contains() {
        let platform = MockPlatform::new();
        platform.add_process("contoso-agent.exe");
        platform.add_process("other.exe");

        let count =
            number_of_running_processes(&platform, &name_match(MatchType::Contains, "agent"))
                .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_any_and_all_combinators() {
        let platform = MockPlatform::new();
        platform.add_process("alpha.exe");
        platform.add_process("beta.exe");

        let any = ProcessMatch {
            any: vec![
                name_match(MatchType::Equals, "alpha.exe"),
                name_match(MatchType::Equals, "beta.exe"),
            ],
            ..ProcessMatch::default()
        };
        assert_eq!(number_of_running_processes(&platform, &any).unwrap(), 2);

        let all = ProcessMatch {
            all: vec![
                name_match(MatchType::Contains, "a"),
                name_match(MatchType::Contains, "beta"),
            ],
            ..ProcessMatch::default()
        };
        assert_eq!(number_of_running_processes(&platform, &all).unwrap(), 1);
    }

    #[test]
    fn test_invalid_criteria_error_before_enumeration() {
        let platform = MockPlatform::new();
        let err =
            number_of_running_processes(&platform, &ProcessMatch::default()).unwrap_err();
        assert!(err.to_string().contains("process attribute"));

        let nested = ProcessMatch {
            any: vec![ProcessMatch {
                attribute: Some(ProcessAttribute::Name),
                ..ProcessMatch::default()
            }],
            ..ProcessMatch::default()
        };
        let err = number_of_running_processes(&platform, &nested).unwrap_err();
        assert!(err.to_string().contains("Match Any [0]"));
    }

    #[test]
    fn test_mixed_any_and_all_are_rejected() {
        let platform = MockPlatform::new();
        platform.add_process("alpha.exe");

        let mixed = ProcessMatch {
            any: vec![name_match(MatchType::Equals, "alpha.exe")],
            all: vec![name_match(MatchType::Equals, "beta.exe")],
            ..ProcessMatch::default()
        };
        let err = number_of_running_processes(&platform, &mixed).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }
}
