mod bootstrap;
mod dispatch;
mod entity_feed;
mod loop_runner;
mod sim_world;

use std::sync::Arc;

use engine::{EntityRegistry, FrameController};
use tracing::info;

use dispatch::SimDispatcher;
use loop_runner::AppError;
use sim_world::SimWorld;

pub(crate) fn run() -> Result<(), AppError> {
    let wiring = bootstrap::build_app()?;
    let registry = Arc::new(EntityRegistry::new());

    let mut controller = FrameController::new(wiring.settings.clone(), Arc::clone(&registry))?;
    if let Some(seed) = wiring.config.seed {
        controller = controller.with_rng_seed(seed);
    }
    let mut world = SimWorld::new(&wiring.settings);
    let mut dispatcher = SimDispatcher::default();

    let feed = entity_feed::spawn(Arc::clone(&registry), wiring.config.seed.unwrap_or_default())?;
    loop_runner::run_loop(&wiring.config, &mut controller, &mut world, &mut dispatcher);
    feed.stop();

    controller.shutdown();
    info!(dispatched = dispatcher.total_dispatched(), "shutdown_complete");
    Ok(())
}
