//! # Heating Controller
//!
//! Periodic decision loop over all configured zones. Each tick:
//!
//! 1. fetch readings from the temperature feed (a failure aborts the tick),
//! 2. resolve each zone's target from its schedule or calendar,
//! 3. run the zone's PID controller and map its output to ON/OFF,
//! 4. command every radiator of the zone, logging individual failures.
//!
//! Zones without a reading are skipped for the tick. A target that cannot be
//! resolved is treated as OFF. The controller also exposes read-only status
//! projections and schedule replacement for an external admin surface.

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{ControllerSettings, ZoneConfig};
use crate::control::pid::PidController;
use crate::control::radiator::RadiatorController;
use crate::control::schedule::{Schedule, ScheduleError, ScheduleInterval, ScheduleValue};
use crate::control::sources::{CalendarSource, SourceError, TemperatureFeed};
use crate::radio::packet::RadioAddress;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Temperature feed unavailable: {0}")]
    TemperatureFeedUnavailable(#[source] SourceError),

    #[error("Unknown zone: {0}")]
    UnknownZone(String),

    #[error("Duplicate zone: {0}")]
    DuplicateZone(String),

    #[error("Zone {0} has both a schedule and a calendar")]
    ConflictingScheduleSources(String),

    #[error("Zone {0} uses a calendar but no calendar source is configured")]
    MissingCalendar(String),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Resolved target of a zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Celsius(f64),
    /// Scheduled off
    Off,
    /// No interval or event applies
    Unknown,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Celsius(celsius) => write!(f, "{celsius:.1}"),
            Target::Off => write!(f, "off"),
            Target::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeatingState {
    On,
    Off,
}

/// Where a zone's target comes from
#[derive(Debug, Clone)]
enum TargetSource {
    Schedule(Schedule),
    Calendar(String),
    None,
}

/// Runtime state of one zone
struct Zone {
    config: ZoneConfig,
    source: TargetSource,
    pid: PidController,
    last_temperature: Option<f64>,
    last_target: Target,
    last_output: Option<f64>,
    last_state: Option<HeatingState>,
    last_updated: Option<DateTime<Local>>,
}

impl Zone {
    fn new(config: ZoneConfig, has_calendar: bool) -> Result<Self, ControlError> {
        let source = match (&config.schedule, &config.calendar_id) {
            (Some(_), Some(_)) => {
                return Err(ControlError::ConflictingScheduleSources(config.name))
            }
            (Some(intervals), None) => {
                TargetSource::Schedule(Schedule::from_intervals(intervals.iter().copied())?)
            }
            (None, Some(_)) if !has_calendar => {
                return Err(ControlError::MissingCalendar(config.name))
            }
            (None, Some(id)) => TargetSource::Calendar(id.clone()),
            (None, None) => TargetSource::None,
        };
        Ok(Self {
            pid: PidController::new(config.pid),
            config,
            source,
            last_temperature: None,
            last_target: Target::Unknown,
            last_output: None,
            last_state: None,
            last_updated: None,
        })
    }
}

/// Snapshot of a zone for status queries
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStatus {
    pub name: String,
    pub current_temperature: Option<f64>,
    pub target: Target,
    pub state: Option<HeatingState>,
    pub pid_output: Option<f64>,
    pub last_updated: Option<DateTime<Local>>,
}

/// Decision taken for one zone during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDecision {
    pub zone: String,
    pub temperature: f64,
    pub target: Target,
    /// `None` when the PID was not consulted
    pub output: Option<f64>,
    pub state: HeatingState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendFailure {
    pub zone: String,
    pub address: RadioAddress,
    pub error: String,
}

/// Outcome of one control tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub decisions: Vec<ZoneDecision>,
    /// Zones without a reading this tick
    pub skipped: Vec<String>,
    pub send_failures: Vec<SendFailure>,
}

impl TickReport {
    pub fn decision(&self, zone: &str) -> Option<&ZoneDecision> {
        self.decisions.iter().find(|d| d.zone == zone)
    }
}

pub struct HeatingController {
    zones: Mutex<BTreeMap<String, Zone>>,
    radiators: Arc<dyn RadiatorController>,
    feed: Arc<dyn TemperatureFeed>,
    calendar: Option<Arc<dyn CalendarSource>>,
    tick_period: Duration,
}

impl HeatingController {
    /// Build runtime zones from their configuration.
    ///
    /// The radiator controller decides whether commands reach the radio or
    /// are only logged.
    pub fn new(
        zones: Vec<ZoneConfig>,
        settings: &ControllerSettings,
        radiators: Arc<dyn RadiatorController>,
        feed: Arc<dyn TemperatureFeed>,
        calendar: Option<Arc<dyn CalendarSource>>,
    ) -> Result<Self, ControlError> {
        let mut runtime = BTreeMap::new();
        for config in zones {
            let name = config.name.clone();
            if runtime.contains_key(&name) {
                return Err(ControlError::DuplicateZone(name));
            }
            info!("Configuring controller for: {}", name);
            runtime.insert(name, Zone::new(config, calendar.is_some())?);
        }

        Ok(Self {
            zones: Mutex::new(runtime),
            radiators,
            feed,
            calendar,
            tick_period: settings.tick_period(),
        })
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Run one tick against the wall clock
    pub async fn tick(&self) -> Result<TickReport, ControlError> {
        self.tick_at(Local::now()).await
    }

    /// Run one tick as if the current time were `now`
    pub async fn tick_at(&self, now: DateTime<Local>) -> Result<TickReport, ControlError> {
        let readings = self
            .feed
            .fetch()
            .await
            .map_err(ControlError::TemperatureFeedUnavailable)?;

        let mut report = TickReport::default();
        let mut commands = Vec::new();
        {
            let mut zones = self.zones.lock().await;
            let mut temperatures = HashMap::new();
            for reading in readings {
                if zones.contains_key(&reading.zone) {
                    temperatures.insert(reading.zone, reading.temperature);
                } else {
                    debug!("No config for zone: {}", reading.zone);
                }
            }

            for (name, zone) in zones.iter_mut() {
                let Some(&temperature) = temperatures.get(name) else {
                    warn!("No temperature reading for zone {}, skipping", name);
                    report.skipped.push(name.clone());
                    continue;
                };

                let target = self.resolve_target(zone, now).await;
                let elapsed = zone
                    .last_updated
                    .and_then(|previous| (now - previous).to_std().ok())
                    .unwrap_or(Duration::ZERO);

                let (output, state) = match target {
                    Target::Celsius(celsius) => {
                        zone.pid.set_target(celsius);
                        let output = zone.pid.update(temperature, elapsed);
                        let state = if temperature < celsius && output > 0.0 {
                            HeatingState::On
                        } else {
                            HeatingState::Off
                        };
                        (Some(output), state)
                    }
                    Target::Off | Target::Unknown => {
                        zone.pid.reset();
                        (None, HeatingState::Off)
                    }
                };

                info!(
                    "Zone: {} Temperature: {:.1} Target: {} PID: {} -> {:?}",
                    name,
                    temperature,
                    target,
                    output.map_or_else(|| "-".to_string(), |o| format!("{o:.2}")),
                    state
                );

                zone.last_temperature = Some(temperature);
                zone.last_target = target;
                zone.last_output = output;
                zone.last_state = Some(state);
                zone.last_updated = Some(now);

                commands.push((name.clone(), state, zone.config.radiators.clone()));
                report.decisions.push(ZoneDecision {
                    zone: name.clone(),
                    temperature,
                    target,
                    output,
                    state,
                });
            }
        }

        // Zone lock is not held while sending
        for (name, state, radiators) in commands {
            for address in radiators {
                let result = match state {
                    HeatingState::On => self.radiators.turn_on(address).await,
                    HeatingState::Off => self.radiators.turn_off(address).await,
                };
                if let Err(e) = result {
                    warn!(
                        "Failed to turn {:?} radiator {} in zone {}: {}",
                        state, address, name, e
                    );
                    report.send_failures.push(SendFailure {
                        zone: name.clone(),
                        address,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn resolve_target(&self, zone: &Zone, now: DateTime<Local>) -> Target {
        match &zone.source {
            TargetSource::Schedule(schedule) => match schedule.query_time(now.time()) {
                Some(ScheduleValue::On) => Target::Celsius(zone.config.target_temperature),
                Some(ScheduleValue::Temperature(celsius)) => Target::Celsius(celsius),
                Some(ScheduleValue::Off) => Target::Off,
                None => Target::Unknown,
            },
            TargetSource::Calendar(calendar_id) => {
                let Some(calendar) = &self.calendar else {
                    return Target::Unknown;
                };
                match calendar.is_active(calendar_id, now).await {
                    Ok(true) => Target::Celsius(zone.config.target_temperature),
                    Ok(false) => Target::Unknown,
                    Err(e) => {
                        error!(
                            "Failed to get schedule for zone {}: {}",
                            zone.config.name, e
                        );
                        Target::Unknown
                    }
                }
            }
            TargetSource::None => Target::Unknown,
        }
    }

    /// Tick every period until `shutdown` fires.
    ///
    /// The first tick runs immediately. Shutdown is only observed between
    /// ticks, so a tick in progress always completes.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        info!(
            "Heating controller started, tick period {:?}",
            self.tick_period
        );
        let mut ticker = interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Heating controller shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) => debug!(
                            "Tick complete: {} updated, {} skipped, {} send failures",
                            report.decisions.len(),
                            report.skipped.len(),
                            report.send_failures.len()
                        ),
                        Err(e) => error!("Tick aborted: {}", e),
                    }
                }
            }
        }
    }

    /// Zone configurations sorted by name
    pub async fn zones(&self) -> Vec<ZoneConfig> {
        self.zones
            .lock()
            .await
            .values()
            .map(|zone| zone.config.clone())
            .collect()
    }

    pub async fn zone_status(&self, name: &str) -> Result<ZoneStatus, ControlError> {
        let zones = self.zones.lock().await;
        let zone = zones
            .get(name)
            .ok_or_else(|| ControlError::UnknownZone(name.to_string()))?;
        Ok(ZoneStatus {
            name: zone.config.name.clone(),
            current_temperature: zone.last_temperature,
            target: zone.last_target,
            state: zone.last_state,
            pid_output: zone.last_output,
            last_updated: zone.last_updated,
        })
    }

    /// Replace a zone's schedule. Takes effect on the next tick.
    pub async fn set_zone_schedule(
        &self,
        name: &str,
        intervals: Vec<ScheduleInterval>,
    ) -> Result<(), ControlError> {
        let mut zones = self.zones.lock().await;
        let zone = zones
            .get_mut(name)
            .ok_or_else(|| ControlError::UnknownZone(name.to_string()))?;
        if zone.config.calendar_id.is_some() {
            return Err(ControlError::ConflictingScheduleSources(name.to_string()));
        }

        let schedule = Schedule::from_intervals(intervals.iter().copied())?;
        info!("Zone {} schedule replaced ({} intervals)", name, schedule.len());
        zone.source = TargetSource::Schedule(schedule);
        zone.config.schedule = Some(intervals);
        Ok(())
    }
}
