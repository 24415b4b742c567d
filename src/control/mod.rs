pub mod controller;
pub mod pid;
pub mod radiator;
pub mod schedule;
pub mod sources;

pub use controller::{
    ControlError, HeatingController, HeatingState, SendFailure, Target, TickReport, ZoneDecision,
    ZoneStatus,
};
pub use pid::{PidController, PidGains};
pub use radiator::{
    CommandSettings, LoggingRadiatorController, RadiatorController, RadioRadiatorController,
};
pub use schedule::{
    IntervalId, Schedule, ScheduleError, ScheduleInterval, ScheduleValue, TimeOfDay,
};
pub use sources::{
    CalendarEvent, CalendarSource, JsonFileCalendar, JsonFileFeed, SourceError, StaticCalendar,
    TemperatureFeed, TemperatureReading,
};
