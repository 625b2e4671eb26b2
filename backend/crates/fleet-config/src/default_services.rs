use crate::ServiceSpec;

const STUB_COMMAND: &str = "fleet-stub";

/// The local MCP fleet: (name, preferred port, requires auth).
const DEFAULT_FLEET: &[(&str, u16, bool)] = &[
    ("context7", 3002, false),
    ("taskmaster", 3003, true),
    ("magicui", 3004, true),
    ("memory", 3005, false),
    ("knowledge", 3006, false),
    ("github_mcp", 3007, true),
];

/// Services launched when `config.toml` declares no `[[services]]`.
pub fn default_services() -> Vec<ServiceSpec> {
    DEFAULT_FLEET
        .iter()
        .map(|&(name, port, requires_auth)| {
            let spec = ServiceSpec::new(name, port, STUB_COMMAND);
            if requires_auth {
                spec.with_auth(None)
            } else {
                spec
            }
        })
        .collect()
}
