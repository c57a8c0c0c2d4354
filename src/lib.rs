//! Vauban: local-first service discovery and health registry.
//!
//! This crate finds candidate backend services on disk, in a container
//! runtime, and in one external registry, decides whether each is alive,
//! and keeps a reconciled, persisted registry of what it found for an API
//! layer to read.
//!
//! # Architecture
//!
//! Vauban follows hexagonal architecture principles:
//!
//! - **Domain**: Pure data and state machines with no infrastructure
//!   dependencies
//! - **Ports**: Abstract trait interfaces for discovery sources, probes, and
//!   persistence
//! - **Adapters**: Concrete implementations of ports (filesystem, docker,
//!   HTTP, JSON files)
//!
//! # Modules
//!
//! - [`discovery`]: Candidate detection from manifests, containers, and an
//!   external registry
//! - [`health`]: HTTP and TCP liveness probing
//! - [`registry`]: Canonical service store, persistence, and change events
//! - [`reconcile`]: Reconciliation cycles and their scheduler
//! - [`config`]: Typed configuration with defaults and validation
//! - [`bootstrap`]: Assembly of a running registry from configuration
//! - [`clock`]: Manually driven clock for deterministic tests

pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod health;
pub mod reconcile;
pub mod registry;

#[cfg(test)]
mod test_support;
