//! Poll loop: refresh the hub on a steady cadence and update every entity.

use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

use crate::entity::{ClimateEntity, HeaterEntity};
use crate::hub::HeaterHub;

/// Poll every entity on a steady cadence. `max_ticks = None` runs forever.
pub fn run_loop(hub: &HeaterHub<'_>, entities: &mut [HeaterEntity<'_>], interval: Duration, max_ticks: Option<u64>) {
    let mut ticks = 0u64;
    loop {
        let tick_start = Instant::now();
        run_tick(hub, entities);
        ticks += 1;
        if max_ticks.is_some_and(|max| ticks >= max) {
            return;
        }

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

/// One poll tick. Returns how many entities saw a successful refresh.
pub fn run_tick(hub: &HeaterHub<'_>, entities: &mut [HeaterEntity<'_>]) -> usize {
    let mut ok = 0;
    for entity in entities.iter_mut() {
        if entity.update() {
            ok += 1;
        }
        debug!(
            "Adax: {} current={:?} target={:?} mode={:?}",
            entity.name(),
            entity.current_temperature(),
            entity.target_temperature(),
            entity.hvac_mode()
        );
    }

    if ok < entities.len() {
        warn!("Adax: {}/{} heater(s) could not be refreshed", entities.len() - ok, entities.len());
    } else {
        info!(
            "Adax: polled {} heater(s), snapshot from {}",
            entities.len(),
            hub.fetched_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    ok
}
