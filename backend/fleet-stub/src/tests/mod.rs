
use crate::{AppState, StubConfig};

pub(crate) const TEST_TOKEN: &str = "test-token-123";

pub(crate) fn open_state() -> AppState {
    AppState::new(StubConfig {
        service_name: "memory".into(),
        port: 3005,
        ..StubConfig::default()
    })
}

pub(crate) fn auth_state(token: Option<&str>) -> AppState {
    AppState::new(StubConfig {
        service_name: "taskmaster".into(),
        port: 3003,
        require_auth: true,
        auth_token: token.map(str::to_string),
        ..StubConfig::default()
    })
}
