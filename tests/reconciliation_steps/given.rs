//! Given steps for reconciliation BDD scenarios.

use super::world::{ReconcileWorld, run_async};
use crate::test_helpers::{closed_port, silent_listener};
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given(r#"a node service "{name}" at version "{version}" listening on a closed port"#)]
fn node_service_on_closed_port(
    world: &mut ReconcileWorld,
    name: String,
    version: String,
) -> Result<(), eyre::Report> {
    let port = run_async(closed_port()).wrap_err("reserve a closed port")?;
    let location = world
        .workspace
        .node_service(&name, &name, &version, port)
        .wrap_err("write node manifest")?;
    world.service_port = Some(port);
    world.service_location = Some(location);
    Ok(())
}

#[given("a reconciliation cycle has run")]
fn cycle_has_run(world: &mut ReconcileWorld) -> Result<(), eyre::Report> {
    world.run_cycle().wrap_err("run the first cycle")
}

#[given("the external registry takes longer than the source timeout")]
fn external_registry_is_slow(world: &mut ReconcileWorld) -> Result<(), eyre::Report> {
    world.config.reconcile.source_timeout_ms = 300;
    let (listener, port) =
        run_async(silent_listener()).wrap_err("bind a silent external registry")?;
    world.use_external_url(format!("http://127.0.0.1:{port}/services"));
    world.silent_external = Some(listener);
    Ok(())
}
