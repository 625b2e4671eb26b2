use crate::LifecycleState;

use googletest::assert_that;
use googletest::prelude::{eq, is_false, is_true};

#[test]
fn test_with_health_moves_only_serving_states() {
    assert_that!(
        LifecycleState::Running.with_health(false),
        eq(LifecycleState::Unhealthy)
    );
    assert_that!(
        LifecycleState::Unhealthy.with_health(true),
        eq(LifecycleState::Running)
    );
    assert_that!(
        LifecycleState::Running.with_health(true),
        eq(LifecycleState::Running)
    );
    assert_that!(
        LifecycleState::Starting.with_health(false),
        eq(LifecycleState::Starting)
    );
    assert_that!(
        LifecycleState::Failed.with_health(true),
        eq(LifecycleState::Failed)
    );
}

#[test]
fn test_settled_and_terminal() {
    assert_that!(LifecycleState::Pending.is_settled(), is_false());
    assert_that!(LifecycleState::Starting.is_settled(), is_false());
    assert_that!(LifecycleState::Running.is_settled(), is_true());
    assert_that!(LifecycleState::Failed.is_terminal(), is_true());
    assert_that!(LifecycleState::Stopped.is_terminal(), is_true());
    assert_that!(LifecycleState::Unhealthy.is_terminal(), is_false());
}

#[test]
fn test_serializes_lowercase() {
    let json = serde_json::to_string(&LifecycleState::Unhealthy).unwrap();

    assert_that!(json.as_str(), eq("\"unhealthy\""));
}
