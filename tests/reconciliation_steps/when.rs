//! When steps for reconciliation BDD scenarios.

use super::world::{ReconcileWorld, run_async};
use crate::test_helpers::Endpoint;
use rstest_bdd_macros::when;
use serde_json::json;

#[when("a reconciliation cycle runs")]
fn cycle_runs(world: &mut ReconcileWorld) -> Result<(), eyre::Report> {
    world.run_cycle()
}

#[when("the service starts answering its health endpoint")]
fn service_starts_answering(world: &mut ReconcileWorld) -> Result<(), eyre::Report> {
    let port = world
        .service_port
        .ok_or_else(|| eyre::eyre!("no service port in scenario world"))?;
    world.health = Some(run_async(Endpoint::bind(port, "/health", 200, "ok")));
    Ok(())
}

#[when(r#"the external registry reports "{name}" at version "{version}""#)]
fn external_registry_reports(
    world: &mut ReconcileWorld,
    name: String,
    version: String,
) -> Result<(), eyre::Report> {
    let location = world
        .service_location
        .clone()
        .ok_or_else(|| eyre::eyre!("no service location in scenario world"))?;
    let body = json!({
        "services": [{
            "name": name,
            "location": location.as_str(),
            "metadata": { "version": version },
        }]
    })
    .to_string();
    let endpoint = world.external_endpoint()?;
    run_async(endpoint.respond(200, &body));
    Ok(())
}
