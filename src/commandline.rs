use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use rd6006_lib::{protocol as proto, tokio_common};
use std::time::Duration;

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1") // Common default for Windows, though may vary.
    } else {
        String::from("/dev/ttyUSB0") // Common default for USB-to-serial adapters on Linux.
    }
}

fn parse_address(s: &str) -> Result<u8, String> {
    let address = clap_num::maybe_hex::<u8>(s).map_err(|e| format!("Invalid address format: {e}"))?;
    // 1-247 is the valid Modbus RTU unicast range.
    if (1..=247).contains(&address) {
        Ok(address)
    } else {
        Err(format!("Address {address} out of range (1 to 247)"))
    }
}

fn parse_voltage(s: &str) -> Result<proto::Voltage, String> {
    let volts = s
        .parse::<f64>()
        .map_err(|e| format!("Invalid voltage format: {e}"))?;
    proto::Voltage::try_from(volts).map_err(|e| e.to_string())
}

fn parse_current(s: &str) -> Result<proto::Current, String> {
    let amps = s
        .parse::<f64>()
        .map_err(|e| format!("Invalid current format: {e}"))?;
    proto::Current::try_from(amps).map_err(|e| e.to_string())
}

fn parse_backlight(s: &str) -> Result<proto::Backlight, String> {
    let level =
        clap_num::maybe_hex::<u16>(s).map_err(|e| format!("Invalid backlight format: {e}"))?;
    proto::Backlight::try_from(level).map_err(|e| e.to_string())
}

fn parse_memory_slot(s: &str) -> Result<proto::MemorySlot, String> {
    let slot = clap_num::maybe_hex::<u8>(s).map_err(|e| format!("Invalid slot format: {e}"))?;
    proto::MemorySlot::try_from(slot).map_err(|e| e.to_string())
}

fn parse_output_state(s: &str) -> Result<proto::OutputState, String> {
    match s {
        "on" | "1" => Ok(proto::OutputState::On),
        "off" | "0" => Ok(proto::OutputState::Off),
        other => Err(format!("Invalid output state '{other}', expected 'on' or 'off'")),
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Read and display the complete device state.
    /// Everything (identity, measurements, settings, protection, battery,
    /// clock and all ten memory presets) comes from one register snapshot.
    #[clap(verbatim_doc_comment)]
    Status,

    /// Read and display the live output measurements.
    Read,

    /// Read and display the voltage and current setpoints.
    ReadSetpoints,

    /// Read and display the protection thresholds and the trip state.
    ReadProtection,

    /// Read and display the accumulated charge and energy counters.
    ReadEnergy,

    /// Read and display the internal and probe temperatures.
    ReadTemperature,

    /// Read and display the device date and time.
    ReadClock,

    /// Read and display one memory preset, or all ten when no slot is given.
    /// Reading all slots uses a single bulk transfer.
    #[clap(verbatim_doc_comment)]
    ReadMemory {
        /// Memory slot, 0 to 9.
        #[arg(value_parser = parse_memory_slot)]
        slot: Option<proto::MemorySlot>,
    },

    /// Set the output voltage setpoint.
    SetVoltage {
        /// Voltage in volts, e.g. "12.5". Resolution is 0.01 V; finer digits
        /// are truncated, not rounded.
        #[arg(value_parser = parse_voltage, verbatim_doc_comment)]
        voltage: proto::Voltage,
    },

    /// Set the output current limit.
    SetCurrent {
        /// Current in amps, e.g. "1.250". Resolution is 0.001 A; finer
        /// digits are truncated, not rounded.
        #[arg(value_parser = parse_current, verbatim_doc_comment)]
        current: proto::Current,
    },

    /// Set the over-voltage protection threshold.
    SetVoltageProtection {
        /// Threshold in volts.
        #[arg(value_parser = parse_voltage)]
        voltage: proto::Voltage,
    },

    /// Set the over-current protection threshold.
    SetCurrentProtection {
        /// Threshold in amps.
        #[arg(value_parser = parse_current)]
        current: proto::Current,
    },

    /// Switch the output stage on or off.
    SetOutput {
        /// "on" or "off".
        #[arg(value_parser = parse_output_state)]
        state: proto::OutputState,
    },

    /// Set the display backlight brightness.
    SetBacklight {
        /// Brightness level, 0 (off) to 5 (full).
        #[arg(value_parser = parse_backlight)]
        level: proto::Backlight,
    },

    /// Set the device date.
    SetDate {
        year: u16,
        /// Month, 1 to 12.
        month: u16,
        /// Day of month, 1 to 31.
        day: u16,
    },

    /// Set the device time of day.
    SetTime {
        /// Hour, 0 to 23.
        hour: u16,
        /// Minute, 0 to 59.
        minute: u16,
        /// Second, 0 to 59.
        second: u16,
    },

    /// Synchronize the device clock to this machine's local clock.
    SyncClock,

    /// Store a preset (setpoints plus protection thresholds) into a memory
    /// slot. **Warning:** slot 0 holds the ACTIVE settings; writing it
    /// immediately changes the running output configuration.
    #[clap(verbatim_doc_comment)]
    SetMemory {
        /// Memory slot, 0 to 9.
        #[arg(value_parser = parse_memory_slot)]
        slot: proto::MemorySlot,
        /// Preset voltage setpoint in volts.
        #[arg(value_parser = parse_voltage)]
        voltage: proto::Voltage,
        /// Preset current limit in amps.
        #[arg(value_parser = parse_current)]
        current: proto::Current,
        /// Preset over-voltage protection threshold in volts.
        #[arg(value_parser = parse_voltage)]
        over_voltage_protection: proto::Voltage,
        /// Preset over-current protection threshold in amps.
        #[arg(value_parser = parse_current)]
        over_current_protection: proto::Current,
    },

    /// Run in daemon mode: continuously poll the output measurements at a
    /// fixed interval and print them to stdout.
    #[clap(verbatim_doc_comment)]
    Daemon {
        /// Interval between polls (e.g. "2s", "500ms").
        #[arg(value_parser = humantime::parse_duration, short, long, default_value = "2sec")]
        poll_interval: Duration,
    },

    /// Scan the serial ports of this machine for a connected RD6006.
    /// USB serial adapters are probed first (the stock Riden cable shows up
    /// as a CH340); the first port that answers an identity read wins.
    #[clap(verbatim_doc_comment)]
    Scan,
}

const fn about_text() -> &'static str {
    "RD6006 power supply CLI - read and control a Riden RD6006 via Modbus RTU."
}

#[derive(Parser, Debug)]
#[command(name="psuctl", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is off.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    /// Serial port device name.
    /// Examples: "/dev/ttyUSB0" (Linux), "COM3" (Windows).
    #[arg(short, long, default_value_t = default_device_name(), verbatim_doc_comment)]
    pub device: String,

    /// The Modbus RTU slave address of the power supply (1 to 247).
    #[arg(short, long, default_value_t = tokio_common::DEFAULT_SLAVE_ADDRESS, value_parser = parse_address)]
    pub address: u8,

    /// Baud rate for serial communication.
    /// Must match the rate configured on the device (factory setting 115200).
    #[arg(long, default_value_t = tokio_common::DEFAULT_BAUD_RATE, verbatim_doc_comment)]
    pub baud_rate: u32,

    /// Modbus response timeout for a single request.
    /// Examples: "500ms", "1s".
    #[arg(global = true, long, default_value = "500ms", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub timeout: Duration,

    /// How many times a dropped or mangled response is retried before the
    /// operation fails.
    #[arg(global = true, long, default_value_t = 5, verbatim_doc_comment)]
    pub retries: u32,

    /// Pause before the first retry; it doubles on every further retry.
    /// Examples: "50ms", "200ms".
    #[arg(global = true, long, default_value = "50ms", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub backoff: Duration,

    /// The command to execute against the device.
    #[command(subcommand)]
    pub command: CliCommands,
}
