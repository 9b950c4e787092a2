use kubectl_smart::validation::{
    validate_context, validate_depth, validate_horizon, validate_namespace,
    validate_resource_name, validate_subject, ValidationError,
};

#[test]
fn valid_dns_labels_pass() {
    assert!(validate_resource_name("web-1").is_ok());
    assert!(validate_resource_name("a").is_ok());
    assert!(validate_resource_name("my-app-2024").is_ok());
}

#[test]
fn invalid_resource_names_fail() {
    assert_eq!(validate_resource_name(""), Err(ValidationError::EmptyName));
    assert!(matches!(
        validate_resource_name("Web-1"),
        Err(ValidationError::InvalidName(_))
    ));
    assert!(matches!(
        validate_resource_name("-leading"),
        Err(ValidationError::InvalidName(_))
    ));
    assert!(matches!(
        validate_resource_name("trailing-"),
        Err(ValidationError::InvalidName(_))
    ));
    assert!(matches!(
        validate_resource_name("has.dots"),
        Err(ValidationError::InvalidName(_))
    ));
    // Shell metacharacters never get near an argv.
    assert!(matches!(
        validate_resource_name("web;rm -rf /"),
        Err(ValidationError::InvalidName(_))
    ));

    let long = "a".repeat(254);
    assert_eq!(
        validate_resource_name(&long),
        Err(ValidationError::NameTooLong(254))
    );
    assert!(validate_resource_name(&"a".repeat(253)).is_ok());
}

#[test]
fn namespace_rules_are_tighter_than_names() {
    assert!(validate_namespace(None).is_ok());
    assert!(validate_namespace(Some("kube-system")).is_ok());
    assert_eq!(
        validate_namespace(Some("")),
        Err(ValidationError::EmptyNamespace)
    );
    let too_long = "n".repeat(64);
    assert_eq!(
        validate_namespace(Some(&too_long)),
        Err(ValidationError::NamespaceTooLong(64))
    );
    assert!(validate_namespace(Some(&"n".repeat(63))).is_ok());
    assert!(matches!(
        validate_namespace(Some("Bad_NS")),
        Err(ValidationError::InvalidNamespace(_))
    ));
}

#[test]
fn context_allows_dots_and_underscores() {
    assert!(validate_context(None).is_ok());
    assert!(validate_context(Some("prod-cluster")).is_ok());
    assert!(validate_context(Some("gke_project.zone_cluster-1")).is_ok());
    assert!(matches!(
        validate_context(Some("ctx with spaces")),
        Err(ValidationError::InvalidContext(_))
    ));
    assert!(matches!(
        validate_context(Some("ctx$(boom)")),
        Err(ValidationError::InvalidContext(_))
    ));
    assert_eq!(
        validate_context(Some("")),
        Err(ValidationError::EmptyContext)
    );
}

#[test]
fn horizon_bounds() {
    assert!(validate_horizon(1).is_ok());
    assert!(validate_horizon(48).is_ok());
    assert!(validate_horizon(720).is_ok());
    assert_eq!(validate_horizon(0), Err(ValidationError::HorizonTooSmall(0)));
    assert_eq!(
        validate_horizon(721),
        Err(ValidationError::HorizonTooLarge(721))
    );
}

#[test]
fn depth_bounds() {
    assert!(validate_depth(1).is_ok());
    assert!(validate_depth(10).is_ok());
    assert_eq!(validate_depth(0), Err(ValidationError::DepthTooSmall(0)));
    assert_eq!(validate_depth(11), Err(ValidationError::DepthTooLarge(11)));
}

#[test]
fn subject_validation_composes() {
    assert!(validate_subject("web-1", Some("default"), Some("prod-ctx")).is_ok());
    assert!(validate_subject("web-1", Some("BAD"), None).is_err());
    assert!(validate_subject("", None, None).is_err());
}
