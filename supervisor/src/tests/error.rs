use crate::SupervisorError;

use std::panic::Location;

use error_location::ErrorLocation;

#[test]
fn test_transient_errors() {
    let exit = SupervisorError::UnexpectedExit {
        name: "memory".into(),
        code: Some(1),
        location: ErrorLocation::from(Location::caller()),
    };
    let range = SupervisorError::NoPortInRange {
        start: 3002,
        end: 3101,
        location: ErrorLocation::from(Location::caller()),
    };

    assert!(exit.is_transient());
    assert!(!range.is_transient());
    assert!(!SupervisorError::no_services().is_transient());
}

#[test]
fn test_recovery_hints_are_specific() {
    let range = SupervisorError::NoPortInRange {
        start: 3002,
        end: 3101,
        location: ErrorLocation::from(Location::caller()),
    };

    assert!(range.recovery_hint().contains("port_scan_attempts"));
    assert!(
        SupervisorError::no_services()
            .recovery_hint()
            .contains("[[services]]")
    );
}

#[test]
fn test_display_includes_port_range() {
    let range = SupervisorError::NoPortInRange {
        start: 3002,
        end: 3101,
        location: ErrorLocation::from(Location::caller()),
    };

    assert!(range.to_string().contains("3002-3101"));
}
