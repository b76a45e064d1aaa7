//! # Bus Monitor
//!
//! Mirrors every bus event into the log, standing in for the external
//! broker bridge.

use shared_bus::{EventFilter, InMemoryEventBus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawn the monitor; it stops when `shutdown` turns true or the bus closes.
pub fn spawn_bus_monitor(bus: &InMemoryEventBus, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let mut subscription = bus.subscribe(EventFilter::all());
    tokio::spawn(async move {
        info!("Bus monitor started");
        loop {
            tokio::select! {
                event = subscription.recv() => match event {
                    Some(event) => info!(
                        topic = %event.topic_path(),
                        retained = event.is_retained(),
                        payload = %event.payload(),
                        "publish"
                    ),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Bus monitor stopped");
    })
}
