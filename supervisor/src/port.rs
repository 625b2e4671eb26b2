//! Port allocation and availability checking.

use crate::{SupervisorError, SupervisorResult};

use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};
use std::panic::Location;

use error_location::ErrorLocation;
use tracing::{debug, info, warn};

/// Finds free TCP ports for services.
///
/// Holds no state beyond the scan width; every check is a transient bind
/// that is released immediately.
#[derive(Debug, Clone, Copy)]
pub struct PortAllocator {
    max_attempts: u16,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

impl PortAllocator {
    pub const DEFAULT_MAX_ATTEMPTS: u16 = 100;

    pub fn new(max_attempts: u16) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Check if a port is available for binding.
    ///
    /// Attempts to bind 0.0.0.0:port. Address-in-use and every other bind
    /// failure count as unavailable. Port 0 is never available since binding
    /// it would hand out an ephemeral port instead.
    pub fn is_available(port: u16) -> bool {
        Self::check(port).is_ok()
    }

    /// Like `is_available`, but reports why a port was rejected.
    #[track_caller]
    pub fn check(port: u16) -> SupervisorResult<()> {
        let caller = Location::caller();
        let unavailable = || SupervisorError::PortUnavailable {
            port,
            location: ErrorLocation::from(caller),
        };

        if port == 0 {
            return Err(unavailable());
        }

        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
            Ok(_listener) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                debug!(port, "Port in use");
                Err(unavailable())
            }
            Err(e) => {
                debug!(port, error = %e, "Bind failed, treating port as unavailable");
                Err(unavailable())
            }
        }
    }

    /// Scan `start_port, start_port + 1, ...` across at most `max_attempts`
    /// ports, never past 65535, and return the first available one.
    pub fn find_available(start_port: u16, max_attempts: u16) -> SupervisorResult<u16> {
        Self::scan(start_port, max_attempts, &HashSet::new())
    }

    /// Resolve a port for a service: the preferred port when free, else the
    /// next free port upward, skipping ports reserved for other services.
    pub fn allocate(&self, preferred: u16, reserved: &HashSet<u16>) -> SupervisorResult<u16> {
        let port = Self::scan(preferred, self.max_attempts, reserved)?;

        if port == preferred {
            debug!(port, "Using preferred port");
        } else {
            info!(preferred, port, "Preferred port unavailable, using next free port");
        }

        Ok(port)
    }

    #[track_caller]
    fn scan(start: u16, max_attempts: u16, reserved: &HashSet<u16>) -> SupervisorResult<u16> {
        let end = Self::scan_end(start, max_attempts);

        if max_attempts > 0 {
            for port in start..=end {
                if reserved.contains(&port) {
                    debug!(port, "Port reserved by another service");
                    continue;
                }
                if Self::is_available(port) {
                    return Ok(port);
                }
            }
        }

        warn!(start, end, "No available port in range");
        Err(SupervisorError::NoPortInRange {
            start,
            end,
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Last port covered by a scan, clamped to 65535.
    pub fn scan_end(start: u16, max_attempts: u16) -> u16 {
        let span = max_attempts.saturating_sub(1);
        start.saturating_add(span)
    }
}
