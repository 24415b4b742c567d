use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use heatlink::config::{Config, RadioSettings};
use heatlink::control::{
    CalendarSource, CommandSettings, HeatingController, JsonFileCalendar, JsonFileFeed,
    LoggingRadiatorController, RadiatorController, RadioRadiatorController,
};
use heatlink::radio::hal::{Bus, InputLine};
use heatlink::radio::packet::SensorReport;
use heatlink::{init_logger, Cc1101, RadiatorCommand, RadiatorMode, RadioAddress, ReceivedPacket};

type Radio = Cc1101<Box<dyn Bus>, Box<dyn InputLine>>;

#[derive(Parser)]
#[command(name = "heatlink")]
#[command(about = "Radiator control over a CC1101 radio link")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "/etc/heatlink/config.json")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the heating control loop
    Run {
        /// Log radiator commands instead of transmitting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Send one control packet
    Send {
        #[arg(short, long)]
        address: RadioAddress,
        #[arg(short, long, default_value = "day")]
        mode: RadiatorMode,
        #[arg(long)]
        day: Option<f32>,
        #[arg(long)]
        night: Option<f32>,
        #[arg(long)]
        cold: Option<f32>,
    },
    /// Assign an address to a radiator in pairing mode
    Pair {
        #[arg(short, long)]
        address: RadioAddress,
        #[arg(short, long, default_value = "day")]
        mode: RadiatorMode,
    },
    /// Print every packet received until interrupted
    Listen,
    /// Validate the configuration file and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Run { dry_run } => {
            let config = load_config(&cli.config)?;
            run(config, dry_run).await
        }
        Commands::Send {
            address,
            mode,
            day,
            night,
            cold,
        } => {
            let (radio_settings, mut settings) = load_radio_settings(&cli.config)?;
            settings.day_temperature = day.unwrap_or(settings.day_temperature);
            settings.night_temperature = night.unwrap_or(settings.night_temperature);
            settings.cold_temperature = cold.unwrap_or(settings.cold_temperature);

            let (radio, _gdo0) = open_radio(&radio_settings)?;
            let controller = RadioRadiatorController::new(Arc::clone(&radio), settings);
            controller
                .send_command(settings.command(address, mode))
                .await
                .with_context(|| format!("Failed to send to {address}"))?;
            info!("Sent {:?} to {}", mode, address);
            radio.close().context("Failed to shut down radio")?;
            Ok(())
        }
        Commands::Pair { address, mode } => {
            let (radio_settings, settings) = load_radio_settings(&cli.config)?;
            let (radio, _gdo0) = open_radio(&radio_settings)?;
            let controller = RadioRadiatorController::new(Arc::clone(&radio), settings);
            controller
                .pair(settings.command(address, mode))
                .await
                .with_context(|| format!("Failed to pair {address}"))?;
            radio.close().context("Failed to shut down radio")?;
            Ok(())
        }
        Commands::Listen => {
            let (radio_settings, _) = load_radio_settings(&cli.config)?;
            listen(&radio_settings).await
        }
        Commands::CheckConfig => {
            let config = load_config(&cli.config)?;
            for zone in &config.zones {
                info!(
                    "Zone {}: {} radiators, target {:.1}",
                    zone.name,
                    zone.radiators.len(),
                    zone.target_temperature
                );
            }
            info!("Configuration OK ({} zones)", config.zones.len());
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Radio and command settings; defaults when the config file is absent
fn load_radio_settings(path: &Path) -> Result<(RadioSettings, CommandSettings)> {
    if !path.exists() {
        warn!("{} not found, using default radio settings", path.display());
        return Ok((RadioSettings::default(), CommandSettings::default()));
    }
    let config = load_config(path)?;
    Ok((config.radio, CommandSettings::from(&config.controller)))
}

#[cfg(feature = "raspberry-pi")]
fn open_radio(settings: &RadioSettings) -> Result<(Arc<Radio>, Box<dyn InputLine>)> {
    let (bus, gdo0, gdo2) = heatlink::radio::hal::raspberry_pi::open(settings)
        .context("Failed to open radio hardware")?;
    let bus: Box<dyn Bus> = Box::new(bus);
    let gdo2: Box<dyn InputLine> = Box::new(gdo2);
    let radio = Cc1101::open(bus, gdo2, settings.radio_config()).context("CC1101 startup failed")?;
    Ok((Arc::new(radio), Box::new(gdo0)))
}

#[cfg(not(feature = "raspberry-pi"))]
fn open_radio(_settings: &RadioSettings) -> Result<(Arc<Radio>, Box<dyn InputLine>)> {
    anyhow::bail!("radio hardware support not compiled in; rebuild with --features raspberry-pi")
}

async fn run(config: Config, dry_run: bool) -> Result<()> {
    let (radiators, radio): (Arc<dyn RadiatorController>, Option<Arc<Radio>>) = if dry_run {
        info!("Dry run, radiator commands will only be logged");
        (Arc::new(LoggingRadiatorController) as Arc<dyn RadiatorController>, None)
    } else {
        let (radio, _gdo0) = open_radio(&config.radio)?;
        let settings = CommandSettings::from(&config.controller);
        (
            Arc::new(RadioRadiatorController::new(Arc::clone(&radio), settings))
                as Arc<dyn RadiatorController>,
            Some(radio),
        )
    };

    let feed = Arc::new(JsonFileFeed::new(&config.temperature_feed.path));
    let calendar = config
        .calendar
        .as_ref()
        .map(|c| Arc::new(JsonFileCalendar::new(&c.path)) as Arc<dyn CalendarSource>);

    let controller = Arc::new(
        HeatingController::new(
            config.zones.clone(),
            &config.controller,
            radiators,
            feed,
            calendar,
        )
        .context("Failed to set up heating controller")?,
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;
    let _ = shutdown_tx.send(());
    task.await.context("Controller task failed")?;

    if let Some(radio) = radio {
        radio.close().context("Failed to shut down radio")?;
    }
    Ok(())
}

async fn listen(settings: &RadioSettings) -> Result<()> {
    let (radio, gdo0) = open_radio(settings)?;
    let (packets_tx, mut packets_rx) = mpsc::channel(16);
    let receiver = radio
        .spawn_receiver(gdo0, packets_tx)
        .context("Failed to start receiver")?;

    loop {
        tokio::select! {
            packet = packets_rx.recv() => match packet {
                Some(packet) => report_packet(&packet),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    receiver.stop();
    let stats = radio.stats();
    info!(
        "Received {} packets, {} FIFO overflows",
        stats.packets_received, stats.fifo_overflows
    );
    radio.close().context("Failed to shut down radio")?;
    Ok(())
}

fn report_packet(packet: &ReceivedPacket) {
    info!("Packet: {}", hex::encode(&packet.payload));
    if let Some(quality) = packet.quality {
        info!(
            "RSSI: {} dBm, LQI: {}, CRC OK: {}",
            quality.rssi_dbm, quality.lqi, quality.crc_ok
        );
    }
    if let Some((command, pairing)) = RadiatorCommand::parse(&packet.payload) {
        info!(
            "{} {} {:?} day {:.1} night {:.1} cold {:.1}",
            if pairing { "Pairing" } else { "Control" },
            command.address,
            command.mode,
            command.day_temperature,
            command.night_temperature,
            command.cold_temperature
        );
    } else if let Ok(report) = SensorReport::parse(&packet.payload) {
        info!(
            "Temperature: {:.2} Humidity: {:.2}",
            report.temperature, report.humidity
        );
    }
}
