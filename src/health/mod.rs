//! Health probing bounded context.
//!
//! Probe strategy is chosen from the shape of a candidate (HTTP when an
//! endpoint is known or guessable, TCP when only a port is known, otherwise
//! skipped). Probers never fail: every problem is encoded in the returned
//! [`domain::HealthProbeResult`].

pub mod adapters;
pub mod domain;
pub mod ports;
