//! Keep-alive loop behavior against the simulated bus.

mod common;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use power_core::bus::SharedBus;
use power_core::mcu::{MCU_ADDRESS, PowerMcuClient, REG_KEEP_ALIVE, RetryBudget, watchdog};

use common::SimBus;

type Bus = SharedBus<CriticalSectionRawMutex, SimBus>;

async fn connected_client(bus: &Bus) -> PowerMcuClient<'_, CriticalSectionRawMutex, SimBus> {
    PowerMcuClient::connect(bus, RetryBudget::Attempts(1), Duration::from_millis(1))
        .await
        .expect("simulated mcu answers the first probe")
}

#[tokio::test]
async fn pings_arrive_on_cadence_until_stopped() {
    let bus: Bus = SharedBus::new(SimBus::new());
    let client = connected_client(&bus).await;
    let stop: Signal<CriticalSectionRawMutex, ()> = Signal::new();

    tokio::join!(
        watchdog::run(client, Duration::from_millis(20), Some(&stop)),
        async {
            tokio::time::sleep(std::time::Duration::from_millis(110)).await;
            stop.signal(());
        }
    );

    let guard = bus.lock().await;
    let pings = guard.writes_to(MCU_ADDRESS, REG_KEEP_ALIVE);
    assert!((4..=8).contains(&pings), "expected ~5 pings, got {pings}");
}

#[tokio::test]
async fn a_failed_ping_does_not_stop_the_loop() {
    let bus: Bus = SharedBus::new(SimBus::new());
    {
        let mut guard = bus.lock().await;
        guard.fail_keep_alive = true;
    }
    let client = connected_client(&bus).await;
    let stop: Signal<CriticalSectionRawMutex, ()> = Signal::new();

    tokio::join!(
        watchdog::run(client, Duration::from_millis(15), Some(&stop)),
        async {
            // Let a few pings fail, then let the bus recover.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            {
                let mut guard = bus.lock().await;
                guard.fail_keep_alive = false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            stop.signal(());
        }
    );

    let guard = bus.lock().await;
    let pings = guard.writes_to(MCU_ADDRESS, REG_KEEP_ALIVE);
    assert!(pings >= 2, "the loop must keep pinging after failures, got {pings}");
}
