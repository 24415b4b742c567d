//! Controller defaults shared by configuration and the control loop.

/// Default PID gains
pub const DEFAULT_KP: f64 = 1.0;
pub const DEFAULT_KI: f64 = 0.5;
pub const DEFAULT_KD: f64 = 0.0;

/// PID output range
pub const PID_OUTPUT_MIN: f64 = 0.0;
pub const PID_OUTPUT_MAX: f64 = 100.0;

/// Seconds between control ticks
pub const DEFAULT_TICK_PERIOD_SECS: u64 = 60;

/// Target used by schedule intervals that only say "on"
pub const DEFAULT_TARGET_TEMPERATURE: f64 = 20.0;

/// Transmissions per radiator command; radiators do not acknowledge
pub const DEFAULT_COMMAND_REPEATS: u8 = 3;

/// Set points carried in every radiator command
pub const DEFAULT_DAY_TEMPERATURE: f32 = 30.0;
pub const DEFAULT_NIGHT_TEMPERATURE: f32 = 30.0;
pub const DEFAULT_COLD_TEMPERATURE: f32 = 10.0;

/// Radio link defaults
pub const DEFAULT_SPI_BUS: u8 = 0;
pub const DEFAULT_SPI_CLOCK_HZ: u32 = 500_000;
pub const DEFAULT_GDO0_PIN: u8 = 24;
pub const DEFAULT_GDO2_PIN: u8 = 25;
pub const DEFAULT_TX_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_SETTLE_DELAY_US: u64 = 1_000;
