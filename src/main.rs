//! RD6006 Power Supply CLI
//!
//! A command-line interface (CLI) application for controlling Riden RD6006
//! programmable DC power supplies over Modbus RTU (serial).
//!
//! This tool allows users to:
//! - Dump the complete device state in one register snapshot.
//! - Read live output measurements, setpoints, protection thresholds,
//!   temperatures and the charge/energy counters.
//! - Set the voltage/current setpoints, protection thresholds, output state
//!   and backlight.
//! - Read and set the device clock, or synchronize it to the host clock.
//! - Read and store the ten memory presets.
//! - Run in a continuous daemon mode polling measurements to the console.
//! - Scan the serial ports of this machine for a connected device.
//!
//! The CLI leverages the `rd6006_lib` crate for protocol definitions and
//! client operations.

use anyhow::{bail, Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use rd6006_lib::{protocol as proto, tokio_common, tokio_sync_client::RD6006};
use std::io::{stdout, Write};
use std::panic;

mod commandline;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0)); // Provide defaults

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

macro_rules! print_measurements {
    ($device:expr) => {
        let voltage = $device
            .read_output_voltage()
            .with_context(|| "Cannot read output voltage")?;
        let current = $device
            .read_output_current()
            .with_context(|| "Cannot read output current")?;
        let power = $device
            .read_output_power()
            .with_context(|| "Cannot read output power")?;
        let input = $device
            .read_input_voltage()
            .with_context(|| "Cannot read input voltage")?;
        println!("Output : {voltage} V, {current} A, {power} W");
        println!("Input  : {input} V");
    };
}

fn retry_policy(args: &commandline::CliArgs) -> tokio_common::RetryPolicy {
    tokio_common::RetryPolicy {
        max_retries: args.retries,
        first_backoff: args.backoff,
        ..Default::default()
    }
}

/// Opens the serial port and connects, reading the device identity.
fn create_client(
    args: &commandline::CliArgs,
) -> Result<RD6006<tokio_modbus::client::sync::Context>> {
    info!(
        "Connecting via RTU to {} (address {}, baud {})...",
        args.device, args.address, args.baud_rate
    );
    let builder = tokio_common::serial_port_builder(&args.device, args.baud_rate);
    let mut ctx =
        tokio_modbus::client::sync::rtu::connect_slave(&builder, tokio_modbus::Slave(args.address))
            .with_context(|| format!("Cannot open serial port {}", args.device))?;
    ctx.set_timeout(args.timeout);
    let client = RD6006::connect_with_retry(ctx, retry_policy(args))
        .with_context(|| format!("Cannot read device identity on {}", args.device))?;
    debug!("Connected: {}", client.identity());
    Ok(client)
}

/// USB adapters first; the stock Riden cable enumerates as a CH340.
fn scan_rank(port: &tokio_serial::SerialPortInfo) -> usize {
    match &port.port_type {
        tokio_serial::SerialPortType::UsbPort(usb) => {
            if usb.product.as_deref().is_some_and(|p| p.contains("CH340")) {
                0
            } else {
                1
            }
        }
        _ => 2,
    }
}

fn probe_port(device: &str, args: &commandline::CliArgs) -> Result<proto::Identity> {
    let builder = tokio_common::serial_port_builder(device, args.baud_rate);
    let mut ctx =
        tokio_modbus::client::sync::rtu::connect_slave(&builder, tokio_modbus::Slave(args.address))?;
    ctx.set_timeout(args.timeout);
    // One shot per port; a silent port is not worth a retry schedule.
    let client = RD6006::connect_with_retry(ctx, tokio_common::RetryPolicy::none())?;
    Ok(*client.identity())
}

/// Handles the scan command: probe every serial port until one answers an
/// identity read.
fn handle_scan(args: &commandline::CliArgs) -> Result<()> {
    let mut ports = tokio_serial::available_ports().context("Cannot enumerate serial ports")?;
    if ports.is_empty() {
        bail!("No serial ports found, is the USB cable plugged in?");
    }
    ports.sort_by_key(scan_rank);
    info!("Scanning {} serial port(s) at baud {}", ports.len(), args.baud_rate);

    for port in ports {
        print!("Probing {} ... ", port.port_name);
        stdout().flush().context("Failed to flush stdout")?;

        match probe_port(&port.port_name, args) {
            Ok(identity) => {
                println!("SUCCESS!");
                println!("  Found {} on {}", identity, port.port_name);
                return Ok(());
            }
            Err(error) => {
                println!("nothing.");
                debug!("Probe error on {}: {error:?}", port.port_name);
            }
        }
    }
    bail!("No RD6006 device found on any serial port.");
}

/// Handles the set-memory command.
///
/// Memory writes are the one destructive surface of this tool (slot 0 is the
/// live configuration), so the user confirms before anything is sent.
fn handle_set_memory(
    client: &mut RD6006<tokio_modbus::client::sync::Context>,
    slot: proto::MemorySlot,
    preset: proto::MemoryPreset,
) -> Result<()> {
    info!("Executing: Set Memory {slot}");
    if *slot == 0 {
        println!(
            "WARNING: M0 holds the active settings; writing it immediately changes\n\
             the running output configuration, including the protection thresholds."
        );
    }
    println!("About to write {slot}: {preset}");

    if !Confirm::new()
        .with_prompt(format!("Store this preset into {slot}?"))
        .default(false)
        .show_default(true)
        .interact()?
    {
        info!("Set memory aborted by user.");
        return Ok(());
    }

    client
        .set_memory(slot, preset)
        .with_context(|| format!("Failed to write memory slot {slot}"))?;
    println!("Memory slot {slot} written successfully.");
    Ok(())
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    // 1. Initialize logging as early as possible
    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "RD6006 CLI started. Log level: {}",
        args.verbose.log_level_filter()
    );

    // 2. The scan command has its own workflow without a fixed device
    if args.command == commandline::CliCommands::Scan {
        return handle_scan(&args);
    }

    // 3. Connect and execute the command
    let mut client = create_client(&args)?;

    match &args.command {
        commandline::CliCommands::Status => {
            info!("Executing: Status Snapshot");
            let status = client
                .read_status()
                .with_context(|| "Cannot read status snapshot")?;
            print!("{status}");
        }
        commandline::CliCommands::Read => {
            info!("Executing: Read Measurements");
            print_measurements!(&mut client);
        }
        commandline::CliCommands::ReadSetpoints => {
            info!("Executing: Read Setpoints");
            let voltage = client
                .read_voltage()
                .with_context(|| "Cannot read voltage setpoint")?;
            let current = client
                .read_current()
                .with_context(|| "Cannot read current setpoint")?;
            println!("Voltage setpoint: {voltage} V");
            println!("Current setpoint: {current} A");
        }
        commandline::CliCommands::ReadProtection => {
            info!("Executing: Read Protection");
            let ovp = client
                .read_voltage_protection()
                .with_context(|| "Cannot read over-voltage protection")?;
            let ocp = client
                .read_current_protection()
                .with_context(|| "Cannot read over-current protection")?;
            let state = client
                .read_protection_state()
                .with_context(|| "Cannot read protection state")?;
            println!("OVP  : {ovp} V");
            println!("OCP  : {ocp} A");
            println!("State: {state}");
        }
        commandline::CliCommands::ReadEnergy => {
            info!("Executing: Read Energy Counters");
            let charge = client.read_charge().with_context(|| "Cannot read charge")?;
            let energy = client.read_energy().with_context(|| "Cannot read energy")?;
            println!("Charge: {charge} Ah");
            println!("Energy: {energy} Wh");
        }
        commandline::CliCommands::ReadTemperature => {
            info!("Executing: Read Temperatures");
            let internal = client
                .read_temperature()
                .with_context(|| "Cannot read internal temperature")?;
            let fahrenheit = client
                .read_fahrenheit_temperature()
                .with_context(|| "Cannot read internal temperature (°F)")?;
            let probe = client
                .read_probe_temperature()
                .with_context(|| "Cannot read probe temperature")?;
            println!("Internal: {internal} °C ({fahrenheit} °F)");
            println!("Probe   : {probe} °C");
        }
        commandline::CliCommands::ReadClock => {
            info!("Executing: Read Clock");
            let date = client.read_date().with_context(|| "Cannot read date")?;
            let time = client.read_time().with_context(|| "Cannot read time")?;
            println!("Device clock: {date} {time}");
        }
        commandline::CliCommands::ReadMemory { slot } => {
            info!("Executing: Read Memory");
            match slot {
                Some(slot) => {
                    let preset = client
                        .read_memory(*slot)
                        .with_context(|| format!("Cannot read memory slot {slot}"))?;
                    println!("{slot}: {preset}");
                }
                None => {
                    let presets = client
                        .read_memories()
                        .with_context(|| "Cannot read memory presets")?;
                    for (slot, preset) in proto::MemorySlot::all().zip(presets.iter()) {
                        println!("{slot}: {preset}");
                    }
                }
            }
        }
        commandline::CliCommands::SetVoltage { voltage } => {
            info!("Executing: Set Voltage to {voltage} V");
            client
                .set_voltage(*voltage)
                .with_context(|| format!("Failed to set voltage to {voltage} V"))?;
            println!("Voltage setpoint set to {voltage} V successfully.");
        }
        commandline::CliCommands::SetCurrent { current } => {
            info!("Executing: Set Current to {current} A");
            client
                .set_current(*current)
                .with_context(|| format!("Failed to set current to {current} A"))?;
            println!("Current setpoint set to {current} A successfully.");
        }
        commandline::CliCommands::SetVoltageProtection { voltage } => {
            info!("Executing: Set Over-Voltage Protection to {voltage} V");
            client
                .set_voltage_protection(*voltage)
                .with_context(|| format!("Failed to set over-voltage protection to {voltage} V"))?;
            println!("Over-voltage protection set to {voltage} V successfully.");
        }
        commandline::CliCommands::SetCurrentProtection { current } => {
            info!("Executing: Set Over-Current Protection to {current} A");
            client
                .set_current_protection(*current)
                .with_context(|| format!("Failed to set over-current protection to {current} A"))?;
            println!("Over-current protection set to {current} A successfully.");
        }
        commandline::CliCommands::SetOutput { state } => {
            info!("Executing: Set Output {state}");
            client
                .set_output_state(*state)
                .with_context(|| format!("Failed to switch output {state}"))?;
            println!("Output switched {state} successfully.");
        }
        commandline::CliCommands::SetBacklight { level } => {
            info!("Executing: Set Backlight to {level}");
            client
                .set_backlight(*level)
                .with_context(|| format!("Failed to set backlight to {level}"))?;
            println!("Backlight set to {level} successfully.");
        }
        commandline::CliCommands::SetDate { year, month, day } => {
            info!("Executing: Set Date to {year:04}-{month:02}-{day:02}");
            let date = proto::Date::new(*year, *month, *day)?;
            client
                .set_date(date)
                .with_context(|| format!("Failed to set date to {date}"))?;
            println!("Device date set to {date} successfully.");
        }
        commandline::CliCommands::SetTime {
            hour,
            minute,
            second,
        } => {
            info!("Executing: Set Time to {hour:02}:{minute:02}:{second:02}");
            let time = proto::Time::new(*hour, *minute, *second)?;
            client
                .set_time(time)
                .with_context(|| format!("Failed to set time to {time}"))?;
            println!("Device time set to {time} successfully.");
        }
        commandline::CliCommands::SyncClock => {
            info!("Executing: Sync Clock");
            client
                .sync_clock()
                .with_context(|| "Failed to synchronize the device clock")?;
            println!("Device clock synchronized to the host clock.");
        }
        commandline::CliCommands::SetMemory {
            slot,
            voltage,
            current,
            over_voltage_protection,
            over_current_protection,
        } => {
            let preset = proto::MemoryPreset {
                voltage: *voltage,
                current: *current,
                over_voltage_protection: *over_voltage_protection,
                over_current_protection: *over_current_protection,
            };
            handle_set_memory(&mut client, *slot, preset)?;
        }
        commandline::CliCommands::Daemon { poll_interval } => {
            info!("Starting daemon mode: interval={poll_interval:?}");
            loop {
                debug!("Daemon: reading status snapshot...");
                let status = client
                    .read_status()
                    .with_context(|| "Cannot read status snapshot")?;
                println!(
                    "{} V  {} A  {} W  output {} ({})",
                    status.output_voltage,
                    status.output_current,
                    status.output_power,
                    status.output,
                    status.regulation
                );
                std::thread::sleep(*poll_interval);
            }
        }
        commandline::CliCommands::Scan => {
            unreachable!("Scan is handled earlier.")
        }
    }

    Ok(())
}
