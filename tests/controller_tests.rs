use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use heatlink::config::{ControllerSettings, ZoneConfig};
use heatlink::control::{
    CalendarEvent, CalendarSource, CommandSettings, ControlError, HeatingController,
    HeatingState, RadiatorController, RadioRadiatorController, ScheduleInterval, ScheduleValue,
    SourceError, StaticCalendar, Target, TemperatureFeed, TemperatureReading,
};
use heatlink::radio::cc1101_registers::{TXFIFO, WRITE_BURST};
use heatlink::radio::hal::mock::{MockBus, MockLine};
use heatlink::radio::hal::HalError;
use heatlink::{Cc1101, RadioAddress, RadioConfig, RadioError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedFeed {
    readings: Mutex<Vec<TemperatureReading>>,
    fail: Mutex<bool>,
    fetches: AtomicUsize,
    fetched: Notify,
}

impl ScriptedFeed {
    fn with(readings: &[(&str, f64)]) -> Arc<Self> {
        let feed = Arc::new(Self::default());
        feed.set(readings);
        feed
    }

    fn set(&self, readings: &[(&str, f64)]) {
        *self.readings.lock().unwrap() = readings
            .iter()
            .map(|(zone, temperature)| TemperatureReading::new(*zone, *temperature))
            .collect();
    }

    fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl TemperatureFeed for ScriptedFeed {
    async fn fetch(&self) -> Result<Vec<TemperatureReading>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched.notify_one();
        if *self.fail.lock().unwrap() {
            return Err(SourceError::FeedUnavailable("sensor cloud down".to_string()));
        }
        Ok(self.readings.lock().unwrap().clone())
    }
}

/// Records every command; addresses in `broken` fail
#[derive(Default)]
struct RecordingRadiators {
    commands: Mutex<Vec<(RadioAddress, HeatingState)>>,
    broken: Vec<RadioAddress>,
}

impl RecordingRadiators {
    fn command(&self, address: RadioAddress, state: HeatingState) -> Result<(), RadioError> {
        self.commands.lock().unwrap().push((address, state));
        if self.broken.contains(&address) {
            return Err(RadioError::Bus(HalError::Spi("no ack".to_string())));
        }
        Ok(())
    }

    fn commands(&self) -> Vec<(RadioAddress, HeatingState)> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RadiatorController for RecordingRadiators {
    async fn turn_on(&self, address: RadioAddress) -> Result<(), RadioError> {
        self.command(address, HeatingState::On)
    }

    async fn turn_off(&self, address: RadioAddress) -> Result<(), RadioError> {
        self.command(address, HeatingState::Off)
    }
}

/// Holds every send until released
#[derive(Default)]
struct GatedRadiators {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RadiatorController for GatedRadiators {
    async fn turn_on(&self, _: RadioAddress) -> Result<(), RadioError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn turn_off(&self, address: RadioAddress) -> Result<(), RadioError> {
        self.turn_on(address).await
    }
}

struct BrokenCalendar;

#[async_trait]
impl CalendarSource for BrokenCalendar {
    async fn is_active(&self, _: &str, _: DateTime<Local>) -> Result<bool, SourceError> {
        Err(SourceError::Calendar("token expired".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const KITCHEN_RADIATOR: RadioAddress = RadioAddress::new(0x2B7E);
const HALL_RADIATOR: RadioAddress = RadioAddress::new(0x2BDB);
const STUDY_RADIATOR: RadioAddress = RadioAddress::new(0x1A01);

fn at(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 1, 10, hour, minute, 0)
        .earliest()
        .unwrap()
}

fn all_day(value: ScheduleValue) -> Vec<ScheduleInterval> {
    vec![ScheduleInterval::parse("00:00", "24:00", value).unwrap()]
}

fn controller(
    zones: Vec<ZoneConfig>,
    radiators: Arc<dyn RadiatorController>,
    feed: Arc<dyn TemperatureFeed>,
) -> HeatingController {
    HeatingController::new(
        zones,
        &ControllerSettings::default(),
        radiators,
        feed,
        None,
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_heats_until_target_over_radio() {
    let bus = MockBus::new();
    let gdo2 = MockLine::scripted(&[true, false, true, false], false);
    let config = RadioConfig {
        settle_delay: Duration::ZERO,
        tx_timeout: Duration::from_millis(50),
        ..RadioConfig::default()
    };
    let radio = Arc::new(Cc1101::new(bus.clone(), gdo2, config));
    let settings = CommandSettings {
        repeats: 1,
        ..CommandSettings::default()
    };
    let radiators = Arc::new(RadioRadiatorController::new(radio, settings));

    let feed = ScriptedFeed::with(&[("Kitchen", 15.0)]);
    let zone = ZoneConfig::new("Kitchen")
        .with_radiators([KITCHEN_RADIATOR])
        .with_schedule(all_day(ScheduleValue::On))
        .with_target_temperature(20.0);
    let controller = controller(vec![zone], radiators, feed.clone());

    let report = controller.tick_at(at(8, 0)).await.unwrap();
    let decision = report.decision("Kitchen").unwrap();
    assert_eq!(decision.target, Target::Celsius(20.0));
    assert!(decision.output.unwrap() > 0.0);
    assert_eq!(decision.state, HeatingState::On);

    feed.set(&[("Kitchen", 20.0)]);
    let report = controller.tick_at(at(8, 1)).await.unwrap();
    assert_eq!(report.decision("Kitchen").unwrap().state, HeatingState::Off);

    let packets: Vec<Vec<u8>> = bus
        .transactions()
        .into_iter()
        .filter(|t| t[0] == TXFIFO | WRITE_BURST)
        .map(|t| t[1..].to_vec())
        .collect();
    assert_eq!(
        packets,
        vec![
            vec![0x57, 0x16, 0x0A, 0x2B, 0x7E, 0x05, 60, 60, 20],
            vec![0x57, 0x16, 0x0A, 0x2B, 0x7E, 0x09, 60, 60, 20],
        ]
    );
}

#[tokio::test]
async fn test_elapsed_time_drives_integral() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Kitchen", 19.5)]);
    let zone = ZoneConfig::new("Kitchen").with_schedule(all_day(ScheduleValue::On));
    let controller = controller(vec![zone], radiators, feed);

    let first = controller.tick_at(at(8, 0)).await.unwrap();
    assert_eq!(first.decision("Kitchen").unwrap().output, Some(0.5));

    // 60 s at 0.5 K error with ki = 0.5
    let second = controller.tick_at(at(8, 1)).await.unwrap();
    assert_eq!(second.decision("Kitchen").unwrap().output, Some(15.5));
}

#[tokio::test]
async fn test_stops_heating_once_target_reached() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Kitchen", 15.0)]);
    let zone = ZoneConfig::new("Kitchen")
        .with_radiators([KITCHEN_RADIATOR])
        .with_schedule(all_day(ScheduleValue::On))
        .with_target_temperature(20.0);
    let controller = controller(vec![zone], radiators.clone(), feed.clone());

    controller.tick_at(at(8, 0)).await.unwrap();
    let report = controller.tick_at(at(8, 1)).await.unwrap();
    let decision = report.decision("Kitchen").unwrap();
    assert_eq!(decision.output, Some(100.0));
    assert_eq!(decision.state, HeatingState::On);

    feed.set(&[("Kitchen", 20.0)]);
    for minute in 2..6 {
        let report = controller.tick_at(at(8, minute)).await.unwrap();
        let decision = report.decision("Kitchen").unwrap();
        assert_eq!(decision.state, HeatingState::Off, "at 08:{minute:02}");
        assert_eq!(decision.output, Some(0.0));
    }

    feed.set(&[("Kitchen", 20.5)]);
    for minute in 6..10 {
        let report = controller.tick_at(at(8, minute)).await.unwrap();
        assert_eq!(report.decision("Kitchen").unwrap().state, HeatingState::Off);
    }

    let commands = radiators.commands();
    assert_eq!(commands.len(), 10);
    assert!(commands[..2]
        .iter()
        .all(|&command| command == (KITCHEN_RADIATOR, HeatingState::On)));
    assert!(commands[2..]
        .iter()
        .all(|&command| command == (KITCHEN_RADIATOR, HeatingState::Off)));

    // Cooling down again starts from a fresh integral
    feed.set(&[("Kitchen", 19.0)]);
    let report = controller.tick_at(at(8, 10)).await.unwrap();
    let decision = report.decision("Kitchen").unwrap();
    assert_eq!(decision.state, HeatingState::On);
    assert_eq!(decision.output, Some(31.0));
}

#[tokio::test]
async fn test_unknown_target_turns_off() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Hall", 10.0)]);
    let zone = ZoneConfig::new("Hall")
        .with_radiators([HALL_RADIATOR])
        .with_schedule(vec![
            ScheduleInterval::parse("06:00", "08:00", ScheduleValue::On).unwrap(),
        ]);
    let controller = controller(vec![zone], radiators.clone(), feed);

    let report = controller.tick_at(at(12, 0)).await.unwrap();
    let decision = report.decision("Hall").unwrap();
    assert_eq!(decision.target, Target::Unknown);
    assert_eq!(decision.output, None);
    assert_eq!(radiators.commands(), vec![(HALL_RADIATOR, HeatingState::Off)]);

    let report = controller.tick_at(at(7, 0)).await.unwrap();
    assert_eq!(report.decision("Hall").unwrap().state, HeatingState::On);
}

#[tokio::test]
async fn test_scheduled_off_turns_off() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Hall", 10.0)]);
    let zone = ZoneConfig::new("Hall")
        .with_radiators([HALL_RADIATOR])
        .with_schedule(all_day(ScheduleValue::Off));
    let controller = controller(vec![zone], radiators.clone(), feed);

    let report = controller.tick_at(at(12, 0)).await.unwrap();
    assert_eq!(report.decision("Hall").unwrap().target, Target::Off);
    assert_eq!(radiators.commands(), vec![(HALL_RADIATOR, HeatingState::Off)]);
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_feed_failure_aborts_tick() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Kitchen", 15.0)]);
    feed.fail();
    let zone = ZoneConfig::new("Kitchen")
        .with_radiators([KITCHEN_RADIATOR])
        .with_schedule(all_day(ScheduleValue::On));
    let controller = controller(vec![zone], radiators.clone(), feed);

    let result = controller.tick_at(at(8, 0)).await;
    assert!(matches!(
        result,
        Err(ControlError::TemperatureFeedUnavailable(_))
    ));
    assert!(radiators.commands().is_empty());
    assert_eq!(
        controller.zone_status("Kitchen").await.unwrap().current_temperature,
        None
    );
}

#[tokio::test]
async fn test_zone_without_reading_is_skipped() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Kitchen", 15.0), ("Garage", 4.0)]);
    let zones = vec![
        ZoneConfig::new("Kitchen")
            .with_radiators([KITCHEN_RADIATOR])
            .with_schedule(all_day(ScheduleValue::On)),
        ZoneConfig::new("Hall")
            .with_radiators([HALL_RADIATOR])
            .with_schedule(all_day(ScheduleValue::On)),
    ];
    let controller = controller(zones, radiators.clone(), feed);

    let report = controller.tick_at(at(8, 0)).await.unwrap();
    assert_eq!(report.skipped, vec!["Hall".to_string()]);
    assert!(report.decision("Hall").is_none());
    assert_eq!(
        radiators.commands(),
        vec![(KITCHEN_RADIATOR, HeatingState::On)]
    );
}

#[tokio::test]
async fn test_send_failure_does_not_stop_other_radiators() {
    let radiators = Arc::new(RecordingRadiators {
        broken: vec![KITCHEN_RADIATOR],
        ..RecordingRadiators::default()
    });
    let feed = ScriptedFeed::with(&[("Kitchen", 15.0), ("Study", 15.0)]);
    let zones = vec![
        ZoneConfig::new("Kitchen")
            .with_radiators([KITCHEN_RADIATOR, HALL_RADIATOR])
            .with_schedule(all_day(ScheduleValue::On)),
        ZoneConfig::new("Study")
            .with_radiators([STUDY_RADIATOR])
            .with_schedule(all_day(ScheduleValue::On)),
    ];
    let controller = controller(zones, radiators.clone(), feed);

    let report = controller.tick_at(at(8, 0)).await.unwrap();
    assert_eq!(report.decisions.len(), 2);
    assert_eq!(report.send_failures.len(), 1);
    assert_eq!(report.send_failures[0].zone, "Kitchen");
    assert_eq!(report.send_failures[0].address, KITCHEN_RADIATOR);
    assert_eq!(
        radiators.commands(),
        vec![
            (KITCHEN_RADIATOR, HeatingState::On),
            (HALL_RADIATOR, HeatingState::On),
            (STUDY_RADIATOR, HeatingState::On),
        ]
    );
}

// ---------------------------------------------------------------------------
// Calendar zones
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_calendar_event_heats_zone() {
    let now = at(12, 0);
    let mut calendar = StaticCalendar::new();
    calendar.add_event(
        "study",
        CalendarEvent {
            start: (now - ChronoDuration::hours(1)).fixed_offset(),
            end: (now + ChronoDuration::hours(1)).fixed_offset(),
        },
    );

    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Study", 17.0)]);
    let zone = ZoneConfig::new("Study")
        .with_radiators([STUDY_RADIATOR])
        .with_calendar("study")
        .with_target_temperature(19.0);
    let controller = HeatingController::new(
        vec![zone],
        &ControllerSettings::default(),
        radiators.clone(),
        feed,
        Some(Arc::new(calendar) as Arc<dyn CalendarSource>),
    )
    .unwrap();

    let report = controller.tick_at(now).await.unwrap();
    assert_eq!(report.decision("Study").unwrap().target, Target::Celsius(19.0));
    assert_eq!(report.decision("Study").unwrap().state, HeatingState::On);

    let report = controller
        .tick_at(now + ChronoDuration::hours(2))
        .await
        .unwrap();
    assert_eq!(report.decision("Study").unwrap().target, Target::Unknown);
    assert_eq!(report.decision("Study").unwrap().state, HeatingState::Off);
}

#[tokio::test]
async fn test_calendar_failure_turns_zone_off() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Study", 12.0)]);
    let zone = ZoneConfig::new("Study")
        .with_radiators([STUDY_RADIATOR])
        .with_calendar("study");
    let controller = HeatingController::new(
        vec![zone],
        &ControllerSettings::default(),
        radiators.clone(),
        feed,
        Some(Arc::new(BrokenCalendar) as Arc<dyn CalendarSource>),
    )
    .unwrap();

    let report = controller.tick_at(at(9, 0)).await.unwrap();
    assert_eq!(report.decision("Study").unwrap().state, HeatingState::Off);
    assert_eq!(radiators.commands(), vec![(STUDY_RADIATOR, HeatingState::Off)]);
}

// ---------------------------------------------------------------------------
// Status and administration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_zones_sorted_by_name() {
    let zones = vec![
        ZoneConfig::new("Study"),
        ZoneConfig::new("Attic"),
        ZoneConfig::new("Kitchen"),
    ];
    let controller = controller(
        zones,
        Arc::new(RecordingRadiators::default()),
        ScriptedFeed::with(&[]),
    );

    let names: Vec<String> = controller
        .zones()
        .await
        .into_iter()
        .map(|zone| zone.name)
        .collect();
    assert_eq!(names, vec!["Attic", "Kitchen", "Study"]);
}

#[tokio::test]
async fn test_zone_status_reflects_last_tick() {
    let feed = ScriptedFeed::with(&[("Kitchen", 18.0)]);
    let zone = ZoneConfig::new("Kitchen").with_schedule(all_day(ScheduleValue::On));
    let controller = controller(
        vec![zone],
        Arc::new(RecordingRadiators::default()),
        feed,
    );

    let before = controller.zone_status("Kitchen").await.unwrap();
    assert_eq!(before.state, None);
    assert_eq!(before.target, Target::Unknown);

    let now = at(10, 0);
    controller.tick_at(now).await.unwrap();
    let status = controller.zone_status("Kitchen").await.unwrap();
    assert_eq!(status.name, "Kitchen");
    assert_eq!(status.current_temperature, Some(18.0));
    assert_eq!(status.target, Target::Celsius(20.0));
    assert_eq!(status.state, Some(HeatingState::On));
    assert_eq!(status.pid_output, Some(2.0));
    assert_eq!(status.last_updated, Some(now));

    assert!(matches!(
        controller.zone_status("Cellar").await,
        Err(ControlError::UnknownZone(_))
    ));
}

#[tokio::test]
async fn test_set_zone_schedule_takes_effect() {
    let radiators = Arc::new(RecordingRadiators::default());
    let feed = ScriptedFeed::with(&[("Kitchen", 15.0)]);
    let zone = ZoneConfig::new("Kitchen")
        .with_radiators([KITCHEN_RADIATOR])
        .with_schedule(all_day(ScheduleValue::On));
    let controller = controller(vec![zone], radiators.clone(), feed);

    let report = controller.tick_at(at(8, 0)).await.unwrap();
    assert_eq!(report.decision("Kitchen").unwrap().state, HeatingState::On);

    let evenings = vec![ScheduleInterval::parse("17:00", "22:00", ScheduleValue::On).unwrap()];
    controller
        .set_zone_schedule("Kitchen", evenings.clone())
        .await
        .unwrap();

    let report = controller.tick_at(at(8, 1)).await.unwrap();
    assert_eq!(report.decision("Kitchen").unwrap().state, HeatingState::Off);
    assert_eq!(controller.zones().await[0].schedule, Some(evenings));

    assert!(matches!(
        controller.set_zone_schedule("Cellar", Vec::new()).await,
        Err(ControlError::UnknownZone(_))
    ));
    let empty = vec![ScheduleInterval::parse("09:00", "09:00", ScheduleValue::On).unwrap()];
    assert!(matches!(
        controller.set_zone_schedule("Kitchen", empty).await,
        Err(ControlError::Schedule(_))
    ));
}

#[tokio::test]
async fn test_status_available_while_radiators_are_sent() {
    let radiators = Arc::new(GatedRadiators::default());
    let feed = ScriptedFeed::with(&[("Kitchen", 15.0)]);
    let zone = ZoneConfig::new("Kitchen")
        .with_radiators([KITCHEN_RADIATOR])
        .with_schedule(all_day(ScheduleValue::On));
    let controller = Arc::new(controller(vec![zone], radiators.clone(), feed));

    let tick = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.tick_at(at(8, 0)).await })
    };
    tokio::time::timeout(Duration::from_secs(5), radiators.entered.notified())
        .await
        .expect("tick never reached the radiators");

    let status = tokio::time::timeout(Duration::from_secs(1), controller.zone_status("Kitchen"))
        .await
        .expect("zone lock held during send")
        .unwrap();
    assert_eq!(status.state, Some(HeatingState::On));
    tokio::time::timeout(Duration::from_secs(1), controller.zones())
        .await
        .expect("zone lock held during send");

    radiators.release.notify_one();
    let report = tokio::time::timeout(Duration::from_secs(5), tick)
        .await
        .expect("tick did not finish")
        .unwrap()
        .unwrap();
    assert!(report.send_failures.is_empty());
}

#[test]
fn test_duplicate_zone_rejected() {
    let result = HeatingController::new(
        vec![ZoneConfig::new("Hall"), ZoneConfig::new("Hall")],
        &ControllerSettings::default(),
        Arc::new(RecordingRadiators::default()),
        ScriptedFeed::with(&[]),
        None,
    );
    assert!(matches!(result, Err(ControlError::DuplicateZone(_))));
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_ticks_immediately_and_stops_on_shutdown() {
    let feed = ScriptedFeed::with(&[("Kitchen", 15.0)]);
    let radiators = Arc::new(RecordingRadiators::default());
    let zone = ZoneConfig::new("Kitchen")
        .with_radiators([KITCHEN_RADIATOR])
        .with_schedule(all_day(ScheduleValue::On));
    let controller = Arc::new(controller(vec![zone], radiators, feed.clone()));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run(shutdown_rx).await })
    };

    tokio::time::timeout(Duration::from_secs(5), feed.fetched.notified())
        .await
        .expect("first tick did not run");
    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("controller did not stop")
        .unwrap();

    // Default period is a minute, so only the immediate tick ran
    assert_eq!(feed.fetches.load(Ordering::SeqCst), 1);
}
