//! Then steps for reconciliation BDD scenarios.

use super::world::ReconcileWorld;
use rstest_bdd_macros::then;
use vauban::discovery::domain::CandidateSource;
use vauban::reconcile::domain::{CycleError, CycleStatus};

#[then("the cycle completes")]
fn cycle_completes(world: &ReconcileWorld) -> Result<(), eyre::Report> {
    let report = world.report()?;
    if report.status != CycleStatus::Completed {
        return Err(eyre::eyre!("expected a completed cycle, got {}", report.status));
    }
    Ok(())
}

#[then("the cycle reports {count:usize} unavailable external source")]
fn cycle_reports_unavailable_external(
    world: &ReconcileWorld,
    count: usize,
) -> Result<(), eyre::Report> {
    let report = world.report()?;
    let external_failures = report
        .errors
        .iter()
        .filter(|error| {
            matches!(
                error,
                CycleError::SourceUnavailable {
                    origin: CandidateSource::External,
                    ..
                }
            )
        })
        .count();
    if report.unavailable_sources() != count || external_failures != count {
        return Err(eyre::eyre!(
            "expected {count} unavailable external source(s), got {:?}",
            report.errors
        ));
    }
    Ok(())
}

#[then(r#""{name}" is registered as "{status}" with a failure count of {failures:u32}"#)]
fn service_registered_with_status(
    world: &ReconcileWorld,
    name: String,
    status: String,
    failures: u32,
) -> Result<(), eyre::Report> {
    let service = world.service_named(&name)?;
    if service.status().as_str() != status {
        return Err(eyre::eyre!(
            "expected '{name}' to be {status}, found {}",
            service.status()
        ));
    }
    if service.consecutive_failures() != failures {
        return Err(eyre::eyre!(
            "expected {failures} consecutive failures, found {}",
            service.consecutive_failures()
        ));
    }
    Ok(())
}

#[then(r#""{name}" has metadata "{key}" set to "{value}""#)]
fn service_has_metadata(
    world: &ReconcileWorld,
    name: String,
    key: String,
    value: String,
) -> Result<(), eyre::Report> {
    let service = world.service_named(&name)?;
    match service.metadata().get(&key) {
        Some(found) if found == value => Ok(()),
        other => Err(eyre::eyre!("expected {key}={value}, found {other:?}")),
    }
}

#[then(r#""{name}" keeps the "{key}" metadata entry"#)]
fn service_keeps_metadata(
    world: &ReconcileWorld,
    name: String,
    key: String,
) -> Result<(), eyre::Report> {
    let service = world.service_named(&name)?;
    if service.metadata().get(&key).is_none() {
        return Err(eyre::eyre!("expected '{name}' to keep metadata '{key}'"));
    }
    Ok(())
}
