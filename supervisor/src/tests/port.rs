use crate::{PortAllocator, SupervisorError};

use std::collections::HashSet;
use std::net::TcpListener;

use googletest::assert_that;
use googletest::prelude::{anything, err, eq, ge, is_false, is_true, lt, ok};
use serial_test::serial;

/// Bind an ephemeral port on all interfaces and keep it bound.
fn occupied() -> (TcpListener, u16) {
    let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// A port that was free a moment ago.
fn free_port() -> u16 {
    let (listener, port) = occupied();
    drop(listener);
    port
}

#[test]
#[serial]
fn given_port_bound_by_another_socket_when_is_available_then_false() {
    let (_listener, port) = occupied();

    assert_that!(PortAllocator::is_available(port), is_false());
}

// BSD stacks let a wildcard bind coexist with a loopback listener
#[cfg(target_os = "linux")]
#[test]
#[serial]
fn given_port_bound_on_loopback_when_is_available_then_false() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();

    assert_that!(PortAllocator::is_available(port), is_false());
}

#[test]
#[serial]
fn given_free_port_when_is_available_then_true_and_still_free() {
    let port = free_port();

    assert_that!(PortAllocator::is_available(port), is_true());
    // The probe socket is released immediately
    assert_that!(TcpListener::bind(("0.0.0.0", port)).is_ok(), is_true());
}

#[test]
fn given_port_zero_when_is_available_then_false() {
    assert_that!(PortAllocator::is_available(0), is_false());
}

#[test]
#[serial]
fn given_occupied_start_when_find_available_then_result_in_scan_range() {
    let (_listener, port) = occupied();
    let start = port.min(u16::MAX - 20);

    let result = PortAllocator::find_available(start, 20);

    assert_that!(result, ok(anything()));
    let found = result.unwrap();
    assert_that!(found, ge(start));
    assert_that!(found, lt(start + 20));
    assert_ne!(found, port);
}

#[test]
#[serial]
fn given_single_occupied_port_when_find_available_with_one_attempt_then_no_port_in_range() {
    let (_listener, port) = occupied();

    let result = PortAllocator::find_available(port, 1);

    assert_that!(result, err(anything()));
    match result.unwrap_err() {
        SupervisorError::NoPortInRange { start, end, .. } => {
            assert_that!(start, eq(port));
            assert_that!(end, eq(port));
        }
        other => panic!("Expected NoPortInRange, got {other:?}"),
    }
}

#[test]
fn given_start_near_max_when_scan_end_then_clamped() {
    assert_that!(PortAllocator::scan_end(65_530, 100), eq(65_535));
    assert_that!(PortAllocator::scan_end(9001, 100), eq(9100));
    assert_that!(PortAllocator::scan_end(9001, 1), eq(9001));
}

#[test]
#[serial]
fn given_reserved_preferred_port_when_allocate_then_skips_it() {
    let preferred = free_port();
    let start = preferred.min(u16::MAX - 10);
    let reserved: HashSet<u16> = [start].into_iter().collect();

    let result = PortAllocator::new(10).allocate(start, &reserved);

    assert_that!(result, ok(anything()));
    let port = result.unwrap();
    assert_ne!(port, start);
    assert_that!(port, ge(start));
}

#[test]
#[serial]
fn given_free_preferred_port_when_allocate_then_preferred_returned() {
    let preferred = free_port();

    let result = PortAllocator::default().allocate(preferred, &HashSet::new());

    assert_that!(result, ok(eq(&preferred)));
}
