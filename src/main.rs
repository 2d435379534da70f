//! swift-device firmware - BLE peripheral for nRF52840 (SoftDevice S140).
//!
//! Boot sequence:
//! 1. Init Embassy HAL with interrupt priorities the SoftDevice accepts.
//! 2. Park the PWM LED at level 0 (off).
//! 3. Enable the SoftDevice and provision the GATT service.
//! 4. Spawn the SoftDevice, BLE, telemetry and actuation tasks.

#![no_std]
#![no_main]

mod nrf;

use defmt::{debug, error, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_nrf::pwm::SimplePwm;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Ticker, Timer};
use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementDataType, Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload,
    ServiceList,
};
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::Softdevice;
use {defmt_rtt as _, panic_probe as _};

use swift_device::config;
use swift_device::gatt::provision::ProvisionState;
use swift_device::{DutyScale, LevelDriver, Peripheral, StackEvent, TelemetryEmitter};

use nrf::pwm::PwmLed;
use nrf::server::Server;
use nrf::stack::{ProvisioningStack, RadioStack};

static PERIPHERAL: Peripheral<CriticalSectionRawMutex> = Peripheral::new();
static RADIO: RadioStack = RadioStack::new();
static SERVER: Server = Server::new(&PERIPHERAL, &RADIO);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("swift-device v{}", env!("CARGO_PKG_VERSION"));

    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    let led = PwmLed::new(SimplePwm::new_1ch(p.PWM0, p.P0_13));
    let driver = LevelDriver::new(led, DutyScale::DEFAULT);

    let sd = nrf::initialize_sd();
    {
        let stack = ProvisioningStack::new(&mut *sd);
        if let Err(e) = PERIPHERAL.start(&stack) {
            error!("provisioning: start refused: {:?}", e);
        }
        while let Some(event) = stack.next_completion() {
            if let Err(e) = PERIPHERAL.handle_event(&event, &stack) {
                error!("provisioning: {:?}", e);
            }
        }
    }

    let snapshot = PERIPHERAL.snapshot();
    if snapshot.provision != ProvisionState::Started {
        error!(
            "service not started: state={:?} awaiting={:?} failure={:?}, restart required",
            snapshot.provision, snapshot.awaiting, snapshot.last_failure
        );
        core::future::pending::<()>().await;
    }
    info!("service ready: {:?}", snapshot.handles);

    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ble_task(sd)));
    unwrap!(spawner.spawn(notify_task()));
    unwrap!(spawner.spawn(actuate_task(driver)));
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Advertise, serve one connection, repeat.
#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice) -> ! {
    static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
        .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
        .full_name(config::DEVICE_NAME)
        .raw(AdvertisementDataType::TXPOWER_LEVEL, &[0])
        .build();

    static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
        .services_128(ServiceList::Complete, &[config::SERVICE_UUID.to_le_bytes()])
        .build();

    loop {
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &SCAN_DATA,
        };
        let adv_config = peripheral::Config {
            interval: config::BLE_ADV_INTERVAL,
            ..Default::default()
        };

        info!("advertising as {}", config::DEVICE_NAME);
        let conn = match peripheral::advertise_connectable(sd, adv, &adv_config).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("advertising failed: {:?}", e);
                Timer::after_secs(1).await;
                continue;
            }
        };

        RADIO.attach(conn.clone());
        let connected = StackEvent::Connected {
            conn: conn.handle().unwrap_or_default(),
            peer: conn.peer_address().bytes(),
        };
        if let Err(e) = PERIPHERAL.handle_event(&connected, &RADIO) {
            warn!("connect: {:?}", e);
        }

        let reason = gatt_server::run(&conn, &SERVER, |_| {}).await;
        info!("gatt server exited: {:?}", reason);

        RADIO.detach();
        if let Err(e) = PERIPHERAL.handle_event(&StackEvent::Disconnected, &RADIO) {
            warn!("disconnect: {:?}", e);
        }
    }
}

#[embassy_executor::task]
async fn notify_task() -> ! {
    let mut emitter = TelemetryEmitter::new();
    let mut ticker = Ticker::every(Duration::from_millis(config::NOTIFY_PERIOD_MS));
    loop {
        ticker.next().await;
        // Send failures are logged by the core and never stop the emitter.
        let _ = PERIPHERAL.notify_tick(&mut emitter, &RADIO);
    }
}

#[embassy_executor::task]
async fn actuate_task(mut driver: LevelDriver<PwmLed>) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(config::COMMAND_POLL_MS));
    loop {
        ticker.next().await;
        if let Some(level) = PERIPHERAL.actuate_tick(&mut driver) {
            debug!("actuate: level={}", level);
        }
    }
}
