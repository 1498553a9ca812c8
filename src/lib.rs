//! A library for controlling the Riden RD6006 programmable DC power supply
//! via Modbus RTU.
//!
//! The crate is split in two layers:
//!
//! 1.  **Protocol**: the register map of the device and the conversions
//!     between raw holding registers and typed values (volts, amps, signed
//!     temperatures, the clock, memory presets). Pure code, no I/O. See
//!     [`protocol`].
//!
//! 2.  **Client**: a synchronous, single-owner client that drives the
//!     registers over a `tokio-modbus` serial connection, with bounded
//!     retries for the transient faults of an RS485 link. See
//!     [`tokio_sync_client::RD6006`].
//!
//! ## Features
//!
//! - **Typed register access**: setpoints, measurements, protection
//!   thresholds, clock and presets as validated Rust types.
//! - **One-snapshot status**: the full device state is read in a single
//!   120-register transfer instead of dozens of round-trips.
//! - **Bounded retries**: dropped and mangled responses are retried with
//!   backoff up to a configurable budget, then surfaced as an error.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rd6006_lib::{protocol as proto, tokio_common, tokio_sync_client::RD6006};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let builder = tokio_common::serial_port_builder(
//!         "/dev/ttyUSB0",
//!         tokio_common::DEFAULT_BAUD_RATE,
//!     );
//!     let slave = tokio_modbus::Slave(tokio_common::DEFAULT_SLAVE_ADDRESS);
//!     let mut ctx = tokio_modbus::client::sync::rtu::connect_slave(&builder, slave)?;
//!     ctx.set_timeout(tokio_common::DEFAULT_TIMEOUT);
//!
//!     let mut psu = RD6006::connect(ctx)?;
//!     println!("Connected to {}", psu.identity());
//!
//!     psu.set_voltage(proto::Voltage::try_from(5.0)?)?;
//!     psu.set_output_state(proto::OutputState::On)?;
//!
//!     let status = psu.read_status()?;
//!     print!("{status}");
//!     Ok(())
//! }
//! ```

pub mod protocol;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-rtu-sync")))]
#[cfg(feature = "tokio-rtu-sync")]
pub mod tokio_common;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-rtu-sync")))]
#[cfg(feature = "tokio-rtu-sync")]
pub mod tokio_sync_client;
