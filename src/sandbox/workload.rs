//! Read helpers over raw workload snapshots.
//!
//! Workloads arrive as untyped [`Mapping`]s from the provider. These
//! functions pull out the handful of fields the domain model needs and
//! derive expiration and status the way agent-sandbox resources report them.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::provider::{ProviderStatus, SANDBOX_ID_LABEL};
use super::SandboxState;
use crate::template::{lookup, Mapping, Value};

/// Ready condition reasons that mean the sandbox has stopped for good.
const TERMINATED_REASONS: &[&str] = &["Terminated", "Expired", "SandboxExpired"];

/// Ready condition reasons that mean the sandbox failed.
const ERROR_REASONS: &[&str] = &["Failed", "Error", "CrashLoopBackOff", "ImagePullBackOff"];

/// Parses an RFC3339 timestamp into UTC.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Value of the reserved id label.
pub(crate) fn sandbox_id(workload: &Mapping) -> Option<&str> {
    lookup(workload, &["metadata", "labels", SANDBOX_ID_LABEL])?.as_str()
}

/// All scalar labels rendered as strings.
pub(crate) fn labels(workload: &Mapping) -> BTreeMap<String, String> {
    lookup(workload, &["metadata", "labels"])
        .and_then(Value::as_mapping)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| Some((k.clone(), v.to_scalar_string()?)))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn creation_timestamp(workload: &Mapping) -> Option<DateTime<Utc>> {
    parse_timestamp(lookup(workload, &["metadata", "creationTimestamp"])?)
}

/// First container of the pod template.
pub(crate) fn main_container(workload: &Mapping) -> Option<&Mapping> {
    lookup(workload, &["spec", "podTemplate", "spec", "containers"])?
        .as_sequence()?
        .first()?
        .as_mapping()
}

/// True when every selector pair is present in the workload's labels.
pub(crate) fn matches_selector(workload: &Mapping, selector: &BTreeMap<String, String>) -> bool {
    if selector.is_empty() {
        return true;
    }
    let labels = labels(workload);
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Expiration as recorded in `spec.shutdownTime`.
pub(crate) fn expiration_from_shutdown_time(workload: &Mapping) -> Option<DateTime<Utc>> {
    parse_timestamp(lookup(workload, &["spec", "shutdownTime"])?)
}

/// Derives the sandbox state from deletion marker and the `Ready` condition.
pub(crate) fn status_from_conditions(workload: &Mapping) -> ProviderStatus {
    if let Some(deleted_at) = lookup(workload, &["metadata", "deletionTimestamp"]) {
        return ProviderStatus {
            state: SandboxState::Terminating.to_string(),
            reason: "Deleting".to_string(),
            message: "Sandbox is being deleted".to_string(),
            last_transition_at: parse_timestamp(deleted_at),
        };
    }

    let Some(ready) = ready_condition(workload) else {
        return ProviderStatus::unknown();
    };

    let text = |key: &str| {
        ready
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let reason = text("reason");

    // Unquoted YAML `True` arrives as a bool
    let status = ready
        .get("status")
        .and_then(Value::to_scalar_string)
        .map(|s| s.to_ascii_lowercase());
    let state = match status.as_deref() {
        Some("true") => SandboxState::Running,
        Some("false") if TERMINATED_REASONS.contains(&reason.as_str()) => SandboxState::Terminated,
        Some("false") if ERROR_REASONS.contains(&reason.as_str()) => SandboxState::Error,
        Some("false") => SandboxState::Pending,
        _ => SandboxState::Unknown,
    };

    ProviderStatus {
        state: state.to_string(),
        message: text("message"),
        reason,
        last_transition_at: ready.get("lastTransitionTime").and_then(parse_timestamp),
    }
}

fn ready_condition(workload: &Mapping) -> Option<&Mapping> {
    lookup(workload, &["status", "conditions"])?
        .as_sequence()?
        .iter()
        .filter_map(Value::as_mapping)
        .find(|c| c.get("type").and_then(Value::as_str) == Some("Ready"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn workload(yaml: &str) -> Mapping {
        match serde_yaml::from_str::<Value>(yaml).unwrap() {
            Value::Mapping(map) => map,
            other => panic!("expected mapping, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_labels_and_id() {
        let w = workload(
            r#"
metadata:
  labels:
    opensandbox.io/id: abc
    team: platform
    tier: 3
    nested: {a: b}
"#,
        );
        assert_eq!(sandbox_id(&w), Some("abc"));
        let labels = labels(&w);
        assert_eq!(labels.get("team").map(String::as_str), Some("platform"));
        assert_eq!(labels.get("tier").map(String::as_str), Some("3"));
        assert!(!labels.contains_key("nested"));
    }

    #[test]
    fn test_missing_labels_yield_empty() {
        let w = workload("metadata: {name: x}");
        assert!(sandbox_id(&w).is_none());
        assert!(labels(&w).is_empty());
    }

    #[test]
    fn test_creation_timestamp_parses_rfc3339() {
        let w = workload("metadata: {creationTimestamp: '2025-12-31T09:00:00Z'}");
        assert_eq!(
            creation_timestamp(&w),
            Some(Utc.with_ymd_and_hms(2025, 12, 31, 9, 0, 0).unwrap())
        );

        let offset = workload("metadata: {creationTimestamp: '2025-12-31T11:00:00+02:00'}");
        assert_eq!(creation_timestamp(&offset), creation_timestamp(&w));

        let bad = workload("metadata: {creationTimestamp: yesterday}");
        assert!(creation_timestamp(&bad).is_none());
    }

    #[test]
    fn test_main_container_is_first() {
        let w = workload(
            "spec: {podTemplate: {spec: {containers: [{name: a, image: one}, {name: b, image: two}]}}}",
        );
        let container = main_container(&w).unwrap();
        assert_eq!(container.get("image"), Some(&Value::from("one")));

        let empty = workload("spec: {podTemplate: {spec: {containers: []}}}");
        assert!(main_container(&empty).is_none());
    }

    #[test]
    fn test_selector_matching() {
        let w = workload("metadata: {labels: {team: platform, env: dev}}");
        let mut selector = BTreeMap::new();
        assert!(matches_selector(&w, &selector));

        selector.insert("team".to_string(), "platform".to_string());
        assert!(matches_selector(&w, &selector));

        selector.insert("env".to_string(), "prod".to_string());
        assert!(!matches_selector(&w, &selector));
    }

    #[test]
    fn test_expiration_from_shutdown_time() {
        let w = workload("spec: {shutdownTime: '2026-01-01T00:00:00Z'}");
        assert_eq!(
            expiration_from_shutdown_time(&w),
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(expiration_from_shutdown_time(&workload("spec: {}")).is_none());
    }

    #[test]
    fn test_status_ready_true_is_running() {
        let w = workload(
            r"
status:
  conditions:
    - type: Ready
      status: 'True'
      reason: SandboxReady
      message: ready
      lastTransitionTime: '2025-12-31T09:00:05Z'
",
        );
        let status = status_from_conditions(&w);
        assert_eq!(status.state, "Running");
        assert_eq!(status.reason, "SandboxReady");
        assert_eq!(status.message, "ready");
        assert_eq!(
            status.last_transition_at,
            Some(Utc.with_ymd_and_hms(2025, 12, 31, 9, 0, 5).unwrap())
        );
    }

    #[test]
    fn test_status_ready_false_reasons() {
        let cases = [
            ("Terminated", "Terminated"),
            ("SandboxExpired", "Terminated"),
            ("ImagePullBackOff", "Error"),
            ("DependenciesNotReady", "Pending"),
        ];
        for (reason, expected) in cases {
            let w = workload(&format!(
                "status: {{conditions: [{{type: Ready, status: 'False', reason: {reason}}}]}}"
            ));
            assert_eq!(status_from_conditions(&w).state, expected, "reason {reason}");
        }
    }

    #[test]
    fn test_status_accepts_unquoted_bool() {
        let w = workload("status: {conditions: [{type: Ready, status: true}]}");
        assert_eq!(status_from_conditions(&w).state, "Running");
    }

    #[test]
    fn test_status_without_conditions_is_unknown() {
        assert_eq!(status_from_conditions(&workload("spec: {}")).state, "Unknown");

        let other = workload("status: {conditions: [{type: Scheduled, status: 'True'}]}");
        assert_eq!(status_from_conditions(&other).state, "Unknown");

        let odd = workload("status: {conditions: [{type: Ready, status: Maybe}]}");
        assert_eq!(status_from_conditions(&odd).state, "Unknown");
    }

    #[test]
    fn test_deletion_timestamp_wins() {
        let w = workload(
            r"
metadata:
  deletionTimestamp: '2025-12-31T10:00:00Z'
status:
  conditions:
    - {type: Ready, status: 'True'}
",
        );
        let status = status_from_conditions(&w);
        assert_eq!(status.state, "Terminating");
        assert_eq!(status.reason, "Deleting");
    }
}
