//! Integration tests for loading triage policy files.

use std::io::Write;
use triage_engine::error::Error;
use triage_engine::policy::TriagePolicy;

fn write_policy(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_partial_policy_over_defaults() {
    let file = write_policy(
        r#"
[urgency]
stat = 120.0

[sla]
red = 0.2
yellow = 0.4

[cadence]
idle_secs = 30
"#,
    );

    let policy = TriagePolicy::load(file.path()).unwrap();
    assert_eq!(policy.urgency.stat, 120.0);
    assert_eq!(policy.urgency.routine, 20.0);
    assert_eq!(policy.sla.red, 0.2);
    assert_eq!(policy.cadence.idle_secs, 30);
    assert_eq!(policy.cadence.live_secs, 1);
    assert_eq!(policy.weights, TriagePolicy::default().weights);
}

#[test]
fn empty_file_is_the_default_policy() {
    let file = write_policy("");
    assert_eq!(TriagePolicy::load(file.path()).unwrap(), TriagePolicy::default());
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let file = write_policy("[sla]\nred = 0.7\nyellow = 0.5\n");
    assert!(matches!(
        TriagePolicy::load(file.path()),
        Err(Error::InvalidPolicy(_))
    ));
}

#[test]
fn cadence_slower_than_display_bounds_is_rejected() {
    let file = write_policy("[cadence]\nlive_secs = 30\nidle_secs = 3600\n");
    assert!(matches!(
        TriagePolicy::load(file.path()),
        Err(Error::InvalidPolicy(_))
    ));
}

#[test]
fn malformed_toml_is_rejected() {
    let file = write_policy("[weights\nsla = ");
    assert!(matches!(
        TriagePolicy::load(file.path()),
        Err(Error::InvalidPolicy(_))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = TriagePolicy::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::Io(_))));
}
