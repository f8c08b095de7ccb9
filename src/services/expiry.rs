//! Background sweep that hands expired holds back to their spots.
//!
//! Reads already treat an expired hold as free, so the sweep only keeps
//! the stored spot status from lagging behind.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::services::reservation_service::ReservationManager;

/// Run `sweep_expired` every `every` until the task is aborted. The first
/// pass runs immediately.
pub fn spawn_expiry_sweeper(manager: ReservationManager, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "reservation expiry sweeper started");

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match manager.sweep_expired().await {
                Ok(0) => debug!("no expired reservations"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "reservation sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{driver, fixture_clock, test_pool};
    use crate::models::{lot::NewLot, spot::SpotStatus, vehicle::VehicleInput};
    use crate::services::{
        lot_service::LotProvisioner, spot_store, vehicle_service::VehicleRegistry,
    };

    #[tokio::test]
    async fn sweeper_reclaims_expired_holds_in_the_background() {
        let pool = test_pool().await;
        let (manual, clock) = fixture_clock();
        let lots = LotProvisioner::new(pool.clone()).with_clock(clock.clone());
        let lot = lots
            .create_lot(NewLot {
                name: "Central".into(),
                address: "1 MG Road".into(),
                price_per_hour: 20.0,
                pin_code: "560001".into(),
                spot_count: 1,
            })
            .await
            .unwrap();
        let alice = driver();
        let car = VehicleRegistry::new(pool.clone())
            .register(
                &alice,
                VehicleInput {
                    license_plate: "KA01AB0001".into(),
                    vehicle_type: "car".into(),
                },
            )
            .await
            .unwrap();
        let spot = lots.get_spot(lot.id, 1).await.unwrap();
        let reservations = ReservationManager::new(pool.clone(), clock);
        reservations.reserve(&alice, car.id, spot.id).await.unwrap();
        manual.advance_minutes(45);

        let handle = spawn_expiry_sweeper(reservations, Duration::from_millis(20));
        let mut holds = 1;
        for _ in 0..100 {
            holds = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reservations")
                .fetch_one(&*pool)
                .await
                .unwrap();
            if holds == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert_eq!(holds, 0);
        let mut conn = pool.acquire().await.unwrap();
        let stored = spot_store::get_status(&mut conn, spot.id).await.unwrap();
        assert_eq!(stored, SpotStatus::Available);
    }
}
