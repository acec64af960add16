use super::*;

#[test]
fn test_constraints_default_is_empty() {
    let constraints = Constraints::default();
    assert!(constraints.is_empty());
    assert_eq!(constraints.code(), "");
}

#[test]
fn test_constraints_code_network_and_flags() {
    let constraints = Constraints {
        network: NetworkClass::Unmetered,
        battery_not_low: true,
        charging: true,
        ..Default::default()
    };
    assert!(!constraints.is_empty());
    assert_eq!(constraints.code(), "U-BC");
}

#[test]
fn test_constraints_code_flags_only() {
    let constraints = Constraints {
        device_idle: true,
        storage_not_low: true,
        ..Default::default()
    };
    assert_eq!(constraints.code(), "IS");
}

#[test]
fn test_entry_constraint_code_marks_exact() {
    let spec = JobSpec::new("*/5 * * * *", "/bin/true").with_exact(true);
    let entry = JobEntry::from_spec(JobId(1), &spec).unwrap();
    assert_eq!(entry.constraint_code(), "!");
    assert!(!entry.is_constrained());
}

#[test]
fn test_spec_required_missing_cron() {
    let spec = JobSpec {
        script_path: Some("/bin/true".into()),
        ..Default::default()
    };
    assert!(matches!(
        spec.required(),
        Err(ValidationError::MissingField("cron_expression"))
    ));
}

#[test]
fn test_spec_required_missing_script() {
    let spec = JobSpec {
        cron_expression: Some("* * * * *".into()),
        ..Default::default()
    };
    assert!(matches!(
        spec.required(),
        Err(ValidationError::MissingField("script_path"))
    ));
}

#[test]
fn test_spec_required_blank_cron_is_missing() {
    let spec = JobSpec::new("   ", "/bin/true");
    assert!(spec.required().is_err());
}

#[test]
fn test_entry_from_spec_default_grace() {
    let spec = JobSpec::new("0 * * * *", "/bin/true");
    let entry = JobEntry::from_spec(JobId(7), &spec).unwrap();
    assert_eq!(entry.id, JobId(7));
    assert_eq!(entry.grace_period_ms, 5_000);
    assert_eq!(entry.max_runtime_ms, 0);
}

#[test]
fn test_entry_deserialize_minimal() {
    let json = r#"{"id": 3, "cron_expression": "0 0 * * *", "script_path": "/tmp/x.sh"}"#;
    let entry: JobEntry = serde_json::from_str(json).unwrap();
    assert_eq!(entry.id, JobId(3));
    assert!(!entry.exact);
    assert!(entry.constraints.is_empty());
    assert_eq!(entry.grace_period_ms, 5_000);
}

#[test]
fn test_network_class_from_str() {
    assert_eq!("unmetered".parse::<NetworkClass>().unwrap(), NetworkClass::Unmetered);
    assert_eq!("not-roaming".parse::<NetworkClass>().unwrap(), NetworkClass::NotRoaming);
    assert_eq!("any".parse::<NetworkClass>().unwrap(), NetworkClass::Connected);
    assert!("wifi6".parse::<NetworkClass>().is_err());
}

#[test]
fn test_network_class_allows() {
    let wifi = NetworkState { connected: true, metered: false, roaming: false };
    let cell = NetworkState { connected: true, metered: true, roaming: true };
    let offline = NetworkState::default();

    assert!(NetworkClass::NotRequired.allows(&offline));
    assert!(!NetworkClass::Connected.allows(&offline));
    assert!(NetworkClass::Unmetered.allows(&wifi));
    assert!(!NetworkClass::Unmetered.allows(&cell));
    assert!(NetworkClass::Metered.allows(&cell));
    assert!(!NetworkClass::NotRoaming.allows(&cell));
}

#[test]
fn test_conditions_satisfies() {
    let constraints = Constraints {
        battery_not_low: true,
        charging: true,
        ..Default::default()
    };
    let mut conditions = DeviceConditions { charging: true, ..Default::default() };
    assert!(conditions.satisfies(&constraints));

    conditions.battery_low = true;
    assert!(!conditions.satisfies(&constraints));
}

#[test]
fn test_job_id_parse_and_display() {
    let id: JobId = " 42 ".parse().unwrap();
    assert_eq!(id, JobId(42));
    assert_eq!(id.to_string(), "42");
}
