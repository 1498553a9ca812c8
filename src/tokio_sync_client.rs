//! Synchronous client for the RD6006 power supply over Modbus RTU.
//!
//! The [`RD6006`] struct owns a Modbus transport, reads the device identity
//! once when it connects, and exposes every register of interest as an
//! explicit `read_*`/`set_*` method. Each method is one blocking round-trip
//! over the serial link, wrapped in a bounded retry schedule for the faults a
//! noisy RS485 bus produces (see [`RetryPolicy`]).
//!
//! The client is single-owner and not reentrant; callers that share one
//! device across threads must serialize access themselves.
//!
//! # Examples
//!
//! ```no_run
//! use rd6006_lib::tokio_sync_client::RD6006;
//! use rd6006_lib::{protocol as proto, tokio_common};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let builder = tokio_common::serial_port_builder(
//!         "/dev/ttyUSB0", // Or "COM3" on Windows, etc.
//!         tokio_common::DEFAULT_BAUD_RATE,
//!     );
//!     let slave = tokio_modbus::Slave(tokio_common::DEFAULT_SLAVE_ADDRESS);
//!     let mut ctx = tokio_modbus::client::sync::rtu::connect_slave(&builder, slave)?;
//!     ctx.set_timeout(tokio_common::DEFAULT_TIMEOUT);
//!
//!     let mut psu = RD6006::connect(ctx)?;
//!     println!("Connected to {}", psu.identity());
//!
//!     psu.set_voltage(proto::Voltage::try_from(12.0)?)?;
//!     psu.set_output_state(proto::OutputState::On)?;
//!     println!("Output: {} V", psu.read_output_voltage()?);
//!     Ok(())
//! }
//! ```

use crate::protocol as proto;
use crate::tokio_common::{Error, Result, RetryPolicy, TransientFault};
use chrono::{Datelike, Timelike};
use log::debug;
use tokio_modbus::prelude::{SyncReader, SyncWriter};

/// The seam to the Modbus transport.
///
/// The RD6006 only ever touches holding registers, so three operations
/// suffice. Implemented for the `tokio-modbus` synchronous context; tests
/// substitute a scripted mock.
pub trait Transport {
    /// Reads `quantity` contiguous holding registers starting at `address`.
    fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>>;
    /// Writes one holding register.
    fn write_register(&mut self, address: u16, value: u16) -> Result<()>;
    /// Writes contiguous holding registers starting at `address`.
    fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()>;
}

/// Helper function to map the nested tokio result to our result.
fn map_tokio_result<T>(result: tokio_modbus::Result<T>) -> Result<T> {
    match result {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(err.into()), // Modbus exception
        Err(err) => Err(err.into()),     // IO error
    }
}

impl Transport for tokio_modbus::client::sync::Context {
    fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        map_tokio_result(self.read_holding_registers(address, quantity))
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        map_tokio_result(self.write_single_register(address, value))
    }

    fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        map_tokio_result(self.write_multiple_registers(address, values))
    }
}

/// Access direction of a register operation. A mangled response proves
/// nothing about whether a write was applied, so invalid responses are only
/// retried for reads; timeouts are retried for both (register writes are
/// idempotent by value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

fn call_with_retry<T>(
    policy: &RetryPolicy,
    access: Access,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempts = 0u32;
    let mut backoff = policy.first_backoff;
    loop {
        attempts += 1;
        let err = match op() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let retriable = match err.transient_fault() {
            Some(TransientFault::NoResponse) => true,
            Some(TransientFault::InvalidResponse) => access == Access::Read,
            None => false,
        };
        if !retriable {
            return Err(err);
        }
        if attempts > policy.max_retries {
            return Err(Error::RetriesExhausted {
                attempts,
                source: Box::new(err),
            });
        }
        debug!("Transient fault on attempt {attempts} ({err}), retrying in {backoff:?}");
        std::thread::sleep(backoff);
        backoff = (backoff * 2).min(policy.max_backoff);
    }
}

/// Synchronous client for the RD6006 power supply.
///
/// Generic over the [`Transport`]; in production that is a
/// `tokio_modbus::client::sync::Context` connected to the device's serial
/// port. The identity block is read once at connect time and cached; every
/// other accessor is a fresh round-trip.
pub struct RD6006<T> {
    transport: T,
    retry: RetryPolicy,
    identity: proto::Identity,
}

impl<T: Transport> RD6006<T> {
    /// Connects with the default retry policy.
    ///
    /// Reads registers 0 to 3 to establish the model, serial number and
    /// firmware version. If the device never answers within the retry
    /// budget, the error propagates and no client is constructed.
    pub fn connect(transport: T) -> Result<Self> {
        Self::connect_with_retry(transport, RetryPolicy::default())
    }

    /// Connects with an explicit retry policy.
    pub fn connect_with_retry(mut transport: T, retry: RetryPolicy) -> Result<Self> {
        let registers = call_with_retry(&retry, Access::Read, || {
            transport.read_registers(proto::Identity::ADDRESS, proto::Identity::QUANTITY)
        })?;
        let identity = proto::Identity::decode_from_holding_registers(&registers)?;
        Ok(Self {
            transport,
            retry,
            identity,
        })
    }

    /// The identity block read at connect time.
    pub fn identity(&self) -> &proto::Identity {
        &self.identity
    }

    pub fn model(&self) -> proto::Model {
        self.identity.model
    }

    pub fn serial_number(&self) -> proto::SerialNumber {
        self.identity.serial_number
    }

    pub fn firmware_version(&self) -> proto::FirmwareVersion {
        self.identity.firmware_version
    }

    /// Reads one holding register, retried per policy.
    pub fn read_register(&mut self, address: u16) -> Result<u16> {
        let registers = self.read_registers(address, 1)?;
        registers.first().copied().ok_or_else(|| {
            proto::Error::UnexpectedRegisterCount {
                expected: 1,
                actual: 0,
            }
            .into()
        })
    }

    /// Reads a contiguous register range, retried per policy.
    pub fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        let retry = self.retry;
        let transport = &mut self.transport;
        call_with_retry(&retry, Access::Read, || {
            transport.read_registers(address, quantity)
        })
    }

    /// Writes one holding register, retried per policy.
    pub fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        let retry = self.retry;
        let transport = &mut self.transport;
        call_with_retry(&retry, Access::Write, || {
            transport.write_register(address, value)
        })
    }

    /// Writes a contiguous register range, retried per policy.
    pub fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        let retry = self.retry;
        let transport = &mut self.transport;
        call_with_retry(&retry, Access::Write, || {
            transport.write_registers(address, values)
        })
    }

    fn read_decoded<V>(
        &mut self,
        address: u16,
        quantity: u16,
        decode: impl FnOnce(&[u16]) -> std::result::Result<V, proto::Error>,
    ) -> Result<V> {
        let registers = self.read_registers(address, quantity)?;
        Ok(decode(&registers)?)
    }

    /// Reads the supply input voltage.
    pub fn read_input_voltage(&mut self) -> Result<proto::Voltage> {
        self.read_decoded(
            proto::INPUT_VOLTAGE_REG_ADDR,
            proto::Voltage::QUANTITY,
            proto::Voltage::decode_from_holding_registers,
        )
    }

    /// Reads the output voltage setpoint.
    pub fn read_voltage(&mut self) -> Result<proto::Voltage> {
        self.read_decoded(
            proto::VOLTAGE_SET_REG_ADDR,
            proto::Voltage::QUANTITY,
            proto::Voltage::decode_from_holding_registers,
        )
    }

    /// Sets the output voltage setpoint.
    ///
    /// The encoding truncates to the device's centivolt resolution:
    /// 5.009 V is written as 5.00 V.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use rd6006_lib::tokio_sync_client::RD6006;
    /// use rd6006_lib::protocol::Voltage;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let builder = rd6006_lib::tokio_common::serial_port_builder("/dev/ttyUSB0", 115200);
    /// # let ctx = tokio_modbus::client::sync::rtu::connect_slave(&builder, tokio_modbus::Slave(1))?;
    /// # let mut psu = RD6006::connect(ctx)?;
    /// psu.set_voltage(Voltage::try_from(3.3)?)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_voltage(&mut self, voltage: proto::Voltage) -> Result<()> {
        self.write_register(
            proto::VOLTAGE_SET_REG_ADDR,
            voltage.encode_for_write_register(),
        )
    }

    /// Reads the output current limit setpoint.
    pub fn read_current(&mut self) -> Result<proto::Current> {
        self.read_decoded(
            proto::CURRENT_SET_REG_ADDR,
            proto::Current::QUANTITY,
            proto::Current::decode_from_holding_registers,
        )
    }

    /// Sets the output current limit setpoint.
    pub fn set_current(&mut self, current: proto::Current) -> Result<()> {
        self.write_register(
            proto::CURRENT_SET_REG_ADDR,
            current.encode_for_write_register(),
        )
    }

    /// Reads the measured output voltage.
    pub fn read_output_voltage(&mut self) -> Result<proto::Voltage> {
        self.read_decoded(
            proto::OUTPUT_VOLTAGE_REG_ADDR,
            proto::Voltage::QUANTITY,
            proto::Voltage::decode_from_holding_registers,
        )
    }

    /// Reads the measured output current.
    pub fn read_output_current(&mut self) -> Result<proto::Current> {
        self.read_decoded(
            proto::OUTPUT_CURRENT_REG_ADDR,
            proto::Current::QUANTITY,
            proto::Current::decode_from_holding_registers,
        )
    }

    /// Reads the measured output power.
    pub fn read_output_power(&mut self) -> Result<proto::Power> {
        self.read_decoded(
            proto::OUTPUT_POWER_REG_ADDR,
            proto::Power::QUANTITY,
            proto::Power::decode_from_holding_registers,
        )
    }

    /// Reads the charge delivered since the output was last switched on.
    pub fn read_output_charge(&mut self) -> Result<proto::Charge> {
        let raw = self.read_register(proto::OUTPUT_CHARGE_REG_ADDR)?;
        Ok(proto::Charge::decode_from_holding_registers(&[0, raw])?)
    }

    /// Reads the over-voltage protection threshold.
    pub fn read_voltage_protection(&mut self) -> Result<proto::Voltage> {
        self.read_decoded(
            proto::OVER_VOLTAGE_PROTECTION_REG_ADDR,
            proto::Voltage::QUANTITY,
            proto::Voltage::decode_from_holding_registers,
        )
    }

    /// Sets the over-voltage protection threshold.
    pub fn set_voltage_protection(&mut self, voltage: proto::Voltage) -> Result<()> {
        self.write_register(
            proto::OVER_VOLTAGE_PROTECTION_REG_ADDR,
            voltage.encode_for_write_register(),
        )
    }

    /// Reads the over-current protection threshold.
    pub fn read_current_protection(&mut self) -> Result<proto::Current> {
        self.read_decoded(
            proto::OVER_CURRENT_PROTECTION_REG_ADDR,
            proto::Current::QUANTITY,
            proto::Current::decode_from_holding_registers,
        )
    }

    /// Sets the over-current protection threshold.
    pub fn set_current_protection(&mut self, current: proto::Current) -> Result<()> {
        self.write_register(
            proto::OVER_CURRENT_PROTECTION_REG_ADDR,
            current.encode_for_write_register(),
        )
    }

    /// Reads whether the output stage is on.
    pub fn read_output_state(&mut self) -> Result<proto::OutputState> {
        self.read_decoded(
            proto::OUTPUT_STATE_REG_ADDR,
            proto::OutputState::QUANTITY,
            proto::OutputState::decode_from_holding_registers,
        )
    }

    /// Switches the output stage on or off.
    pub fn set_output_state(&mut self, state: proto::OutputState) -> Result<()> {
        self.write_register(proto::OUTPUT_STATE_REG_ADDR, state.encode_for_write_register())
    }

    /// Reads which protection has tripped, if any.
    pub fn read_protection_state(&mut self) -> Result<proto::ProtectionState> {
        self.read_decoded(
            proto::PROTECTION_STATE_REG_ADDR,
            proto::ProtectionState::QUANTITY,
            proto::ProtectionState::decode_from_holding_registers,
        )
    }

    /// Reads whether the supply is regulating voltage (CV) or current (CC).
    pub fn read_regulation_mode(&mut self) -> Result<proto::RegulationMode> {
        self.read_decoded(
            proto::REGULATION_MODE_REG_ADDR,
            proto::RegulationMode::QUANTITY,
            proto::RegulationMode::decode_from_holding_registers,
        )
    }

    /// Reads the display backlight brightness.
    pub fn read_backlight(&mut self) -> Result<proto::Backlight> {
        self.read_decoded(
            proto::BACKLIGHT_REG_ADDR,
            proto::Backlight::QUANTITY,
            proto::Backlight::decode_from_holding_registers,
        )
    }

    /// Sets the display backlight brightness.
    pub fn set_backlight(&mut self, level: proto::Backlight) -> Result<()> {
        self.write_register(proto::BACKLIGHT_REG_ADDR, level.encode_for_write_register())
    }

    /// Reads the accumulated charge counter.
    pub fn read_charge(&mut self) -> Result<proto::Charge> {
        self.read_decoded(
            proto::CHARGE_REG_ADDR,
            proto::Charge::QUANTITY,
            proto::Charge::decode_from_holding_registers,
        )
    }

    /// Reads the accumulated energy counter.
    pub fn read_energy(&mut self) -> Result<proto::Energy> {
        self.read_decoded(
            proto::ENERGY_REG_ADDR,
            proto::Energy::QUANTITY,
            proto::Energy::decode_from_holding_registers,
        )
    }

    /// Reads the internal temperature in °C.
    pub fn read_temperature(&mut self) -> Result<proto::Temperature> {
        self.read_decoded(
            proto::TEMPERATURE_REG_ADDR,
            proto::Temperature::QUANTITY,
            proto::Temperature::decode_from_holding_registers,
        )
    }

    /// Reads the external probe temperature in °C.
    pub fn read_probe_temperature(&mut self) -> Result<proto::Temperature> {
        self.read_decoded(
            proto::PROBE_TEMPERATURE_REG_ADDR,
            proto::Temperature::QUANTITY,
            proto::Temperature::decode_from_holding_registers,
        )
    }

    /// Reads the internal temperature in °F.
    pub fn read_fahrenheit_temperature(&mut self) -> Result<proto::Temperature> {
        self.read_decoded(
            proto::FAHRENHEIT_TEMPERATURE_REG_ADDR,
            proto::Temperature::QUANTITY,
            proto::Temperature::decode_from_holding_registers,
        )
    }

    /// Reads whether the battery charging mode is active.
    pub fn read_battery_mode(&mut self) -> Result<bool> {
        Ok(self.read_register(proto::BATTERY_MODE_REG_ADDR)? != 0)
    }

    /// Reads the battery terminal voltage.
    pub fn read_battery_voltage(&mut self) -> Result<proto::Voltage> {
        self.read_decoded(
            proto::BATTERY_VOLTAGE_REG_ADDR,
            proto::Voltage::QUANTITY,
            proto::Voltage::decode_from_holding_registers,
        )
    }

    /// Reads the device date.
    pub fn read_date(&mut self) -> Result<proto::Date> {
        self.read_decoded(
            proto::DATE_REG_ADDR,
            proto::Date::QUANTITY,
            proto::Date::decode_from_holding_registers,
        )
    }

    /// Sets the device date.
    pub fn set_date(&mut self, date: proto::Date) -> Result<()> {
        self.write_registers(proto::DATE_REG_ADDR, &date.encode_for_write_registers())
    }

    /// Reads the device time of day.
    pub fn read_time(&mut self) -> Result<proto::Time> {
        self.read_decoded(
            proto::TIME_REG_ADDR,
            proto::Time::QUANTITY,
            proto::Time::decode_from_holding_registers,
        )
    }

    /// Sets the device time of day.
    pub fn set_time(&mut self, time: proto::Time) -> Result<()> {
        self.write_registers(proto::TIME_REG_ADDR, &time.encode_for_write_registers())
    }

    /// Sets the device clock to the host's local date and time.
    pub fn sync_clock(&mut self) -> Result<()> {
        let now = chrono::Local::now();
        let date = proto::Date::new(now.year() as u16, now.month() as u16, now.day() as u16)?;
        let time = proto::Time::new(now.hour() as u16, now.minute() as u16, now.second() as u16)?;
        self.set_date(date)?;
        self.set_time(time)
    }

    /// Reads one memory preset.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use rd6006_lib::tokio_sync_client::RD6006;
    /// use rd6006_lib::protocol::MemorySlot;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let builder = rd6006_lib::tokio_common::serial_port_builder("/dev/ttyUSB0", 115200);
    /// # let ctx = tokio_modbus::client::sync::rtu::connect_slave(&builder, tokio_modbus::Slave(1))?;
    /// # let mut psu = RD6006::connect(ctx)?;
    /// let preset = psu.read_memory(MemorySlot::try_from(2)?)?;
    /// println!("M2: {preset}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_memory(&mut self, slot: proto::MemorySlot) -> Result<proto::MemoryPreset> {
        self.read_decoded(
            slot.address(),
            proto::MemoryPreset::QUANTITY,
            proto::MemoryPreset::decode_from_holding_registers,
        )
    }

    /// Reads all ten memory presets in one forty-register transfer, which is
    /// much faster than reading the slots one by one.
    pub fn read_memories(
        &mut self,
    ) -> Result<[proto::MemoryPreset; proto::MemorySlot::COUNT as usize]> {
        self.read_decoded(
            proto::MEMORY_REG_ADDR,
            proto::MemoryPreset::BANK_QUANTITY,
            proto::MemoryPreset::decode_bank_from_holding_registers,
        )
    }

    /// Stores a preset into a memory slot.
    ///
    /// Writing `M0` changes the active setpoints and protection thresholds.
    pub fn set_memory(
        &mut self,
        slot: proto::MemorySlot,
        preset: proto::MemoryPreset,
    ) -> Result<()> {
        self.write_registers(slot.address(), &preset.encode_for_write_registers())
    }

    /// Reads the full device state in a single 120-register transfer.
    ///
    /// Round-trip latency dominates on the serial link, so a status report is
    /// taken as one snapshot instead of dozens of per-field reads.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use rd6006_lib::tokio_sync_client::RD6006;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let builder = rd6006_lib::tokio_common::serial_port_builder("/dev/ttyUSB0", 115200);
    /// # let ctx = tokio_modbus::client::sync::rtu::connect_slave(&builder, tokio_modbus::Slave(1))?;
    /// # let mut psu = RD6006::connect(ctx)?;
    /// let status = psu.read_status()?;
    /// print!("{status}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_status(&mut self) -> Result<proto::Status> {
        self.read_decoded(
            proto::Status::ADDRESS,
            proto::Status::QUANTITY,
            proto::Status::decode_from_holding_registers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Fault a [`MockTransport`] serves instead of executing the next
    /// operation.
    #[derive(Debug, Clone, Copy)]
    enum ScriptedFault {
        NoResponse,
        InvalidResponse,
        Permanent,
    }

    impl ScriptedFault {
        fn into_error(self) -> Error {
            let err = match self {
                ScriptedFault::NoResponse => {
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "no response")
                }
                ScriptedFault::InvalidResponse => {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "bad frame")
                }
                ScriptedFault::Permanent => {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "port gone")
                }
            };
            tokio_modbus::Error::Transport(err).into()
        }
    }

    /// In-memory register file with a scripted fault queue. Every attempted
    /// operation is recorded, including the failed ones.
    struct MockTransport {
        registers: Vec<u16>,
        faults: VecDeque<ScriptedFault>,
        reads: Vec<(u16, u16)>,
        writes: Vec<(u16, Vec<u16>)>,
    }

    impl MockTransport {
        fn new() -> Self {
            let mut registers = vec![0u16; proto::Status::QUANTITY as usize];
            registers[0] = 60062;
            registers[1] = 0x0001;
            registers[2] = 0x86A0;
            registers[3] = 128;
            MockTransport {
                registers,
                faults: VecDeque::new(),
                reads: Vec::new(),
                writes: Vec::new(),
            }
        }

        fn script(&mut self, faults: &[ScriptedFault]) {
            self.faults.extend(faults.iter().copied());
        }
    }

    impl Transport for MockTransport {
        fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
            self.reads.push((address, quantity));
            if let Some(fault) = self.faults.pop_front() {
                return Err(fault.into_error());
            }
            Ok(self.registers[address as usize..(address + quantity) as usize].to_vec())
        }

        fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
            self.writes.push((address, vec![value]));
            if let Some(fault) = self.faults.pop_front() {
                return Err(fault.into_error());
            }
            self.registers[address as usize] = value;
            Ok(())
        }

        fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
            self.writes.push((address, values.to_vec()));
            if let Some(fault) = self.faults.pop_front() {
                return Err(fault.into_error());
            }
            self.registers[address as usize..address as usize + values.len()]
                .copy_from_slice(values);
            Ok(())
        }
    }

    /// Generous retry budget with no pauses, so tests run instantly.
    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            first_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    fn connect() -> RD6006<MockTransport> {
        RD6006::connect_with_retry(MockTransport::new(), test_policy()).unwrap()
    }

    #[test]
    fn connect_reads_identity_once() {
        let psu = connect();
        assert_eq!(psu.transport.reads, vec![(0, 4)]);
        assert_eq!(*psu.model(), 60062);
        assert_eq!(*psu.serial_number(), 100_000);
        assert_eq!(*psu.firmware_version(), 1.28);
        assert_eq!(psu.identity().to_string(), "RD60062 SN:00100000 FW:1.28");
    }

    #[test]
    fn read_retries_through_dropped_responses() {
        // N transient faults then success completes on attempt N + 1.
        for n in 0..=3usize {
            let mut psu = connect();
            psu.transport.script(&vec![ScriptedFault::NoResponse; n]);
            psu.transport.registers[proto::OUTPUT_VOLTAGE_REG_ADDR as usize] = 1234;
            let voltage = psu.read_output_voltage().unwrap();
            assert_eq!(*voltage, 12.34);
            // One identity read plus n failed and one successful attempt.
            assert_eq!(psu.transport.reads.len(), 1 + n + 1);
        }
    }

    #[test]
    fn read_retries_invalid_responses() {
        let mut psu = connect();
        psu.transport.script(&[
            ScriptedFault::InvalidResponse,
            ScriptedFault::NoResponse,
            ScriptedFault::InvalidResponse,
        ]);
        psu.transport.registers[proto::CURRENT_SET_REG_ADDR as usize] = 2500;
        assert_eq!(*psu.read_current().unwrap(), 2.5);
        assert_eq!(psu.transport.reads.len(), 1 + 4);
    }

    #[test]
    fn write_retries_dropped_responses_only() {
        let mut psu = connect();
        psu.transport.script(&[ScriptedFault::NoResponse, ScriptedFault::NoResponse]);
        psu.set_voltage(proto::Voltage::try_from(5.0).unwrap()).unwrap();
        assert_eq!(psu.transport.writes.len(), 3);
        assert_eq!(psu.transport.registers[proto::VOLTAGE_SET_REG_ADDR as usize], 500);

        // A mangled confirmation is not retried for writes.
        psu.transport.script(&[ScriptedFault::InvalidResponse]);
        let err = psu
            .set_voltage(proto::Voltage::try_from(5.0).unwrap())
            .unwrap_err();
        assert_matches!(err, Error::TokioError(..));
        assert_eq!(psu.transport.writes.len(), 4);
    }

    #[test]
    fn permanent_faults_propagate_immediately() {
        let mut psu = connect();
        psu.transport.script(&[ScriptedFault::Permanent]);
        let err = psu.read_output_voltage().unwrap_err();
        assert_matches!(err, Error::TokioError(..));
        // One identity read, one failed attempt, no retries.
        assert_eq!(psu.transport.reads.len(), 2);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let mut psu = connect();
        // One more fault than the budget of 5 retries allows.
        psu.transport.script(&[ScriptedFault::NoResponse; 7]);
        let err = psu.read_output_voltage().unwrap_err();
        assert_matches!(err, Error::RetriesExhausted { attempts: 6, .. });
        assert_eq!(psu.transport.reads.len(), 1 + 6);
    }

    #[test]
    fn connect_fails_when_identity_never_answers() {
        let mut transport = MockTransport::new();
        transport.script(&[ScriptedFault::NoResponse; 10]);
        let err = RD6006::connect_with_retry(transport, test_policy()).unwrap_err();
        assert_matches!(err, Error::RetriesExhausted { .. });
    }

    #[test]
    fn status_is_a_single_bulk_read() {
        let mut psu = connect();
        psu.transport.registers[proto::VOLTAGE_SET_REG_ADDR as usize] = 1250;
        psu.transport.registers[proto::DATE_REG_ADDR as usize] = 2024;
        psu.transport.registers[proto::DATE_REG_ADDR as usize + 1] = 6;
        psu.transport.registers[proto::DATE_REG_ADDR as usize + 2] = 1;
        let status = psu.read_status().unwrap();
        assert_eq!(psu.transport.reads, vec![(0, 4), (0, 120)]);
        assert_eq!(*status.voltage_setpoint, 12.5);
        assert_eq!(status.date, proto::Date::new(2024, 6, 1).unwrap());
        assert_eq!(*status.identity.serial_number, 100_000);
    }

    #[test]
    fn memory_bank_is_a_single_bulk_read() {
        let mut psu = connect();
        for slot in 0..10 {
            psu.transport.registers[80 + slot * 4] = 100 * (slot as u16 + 1);
        }
        let presets = psu.read_memories().unwrap();
        assert_eq!(psu.transport.reads, vec![(0, 4), (80, 40)]);
        assert_eq!(*presets[0].voltage, 1.0);
        assert_eq!(*presets[9].voltage, 10.0);
    }

    #[test]
    fn memory_slot_maps_to_its_register_block() {
        let mut psu = connect();
        psu.transport.registers[92..96].copy_from_slice(&[500, 1000, 6200, 6200]);
        let preset = psu.read_memory(proto::MemorySlot::try_from(3).unwrap()).unwrap();
        assert_eq!(psu.transport.reads, vec![(0, 4), (92, 4)]);
        assert_eq!(*preset.voltage, 5.0);
        assert_eq!(*preset.current, 1.0);
        assert_eq!(*preset.over_voltage_protection, 62.0);
        assert_eq!(*preset.over_current_protection, 6.2);
    }

    #[test]
    fn memory_write_is_a_single_bulk_write() {
        let mut psu = connect();
        let preset = proto::MemoryPreset {
            voltage: proto::Voltage::try_from(5.0).unwrap(),
            current: proto::Current::try_from(1.0).unwrap(),
            over_voltage_protection: proto::Voltage::try_from(62.0).unwrap(),
            over_current_protection: proto::Current::try_from(6.2).unwrap(),
        };
        psu.set_memory(proto::MemorySlot::try_from(7).unwrap(), preset)
            .unwrap();
        assert_eq!(psu.transport.writes, vec![(108, vec![500, 1000, 6200, 6200])]);
    }

    #[test]
    fn date_and_time_round_trip() {
        let mut psu = connect();
        psu.set_date(proto::Date::new(2024, 1, 15).unwrap()).unwrap();
        psu.set_time(proto::Time::new(13, 37, 42).unwrap()).unwrap();
        assert_eq!(
            psu.transport.writes,
            vec![(48, vec![2024, 1, 15]), (51, vec![13, 37, 42])]
        );
        assert_eq!(psu.read_date().unwrap(), proto::Date::new(2024, 1, 15).unwrap());
        assert_eq!(psu.read_time().unwrap(), proto::Time::new(13, 37, 42).unwrap());
    }

    #[test]
    fn invalid_clock_components_never_reach_the_transport() {
        // Construction is the validation seam; a bad tuple has no way in.
        assert_matches!(
            proto::Date::new(2024, 13, 1),
            Err(proto::Error::InvalidDate { .. })
        );
        assert_matches!(proto::Time::new(25, 0, 0), Err(proto::Error::InvalidTime { .. }));
    }

    #[test]
    fn sync_clock_writes_date_then_time() {
        let mut psu = connect();
        psu.sync_clock().unwrap();
        assert_eq!(psu.transport.writes.len(), 2);
        assert_eq!(psu.transport.writes[0].0, proto::DATE_REG_ADDR);
        assert_eq!(psu.transport.writes[1].0, proto::TIME_REG_ADDR);
        let date = psu.read_date().unwrap();
        assert!(date.year() >= 2024);
    }

    #[test]
    fn setpoint_writes_truncate() {
        let mut psu = connect();
        psu.set_voltage(proto::Voltage::try_from(5.009).unwrap()).unwrap();
        assert_eq!(psu.transport.registers[proto::VOLTAGE_SET_REG_ADDR as usize], 500);

        psu.set_current(proto::Current::try_from(1.2349).unwrap()).unwrap();
        assert_eq!(psu.transport.registers[proto::CURRENT_SET_REG_ADDR as usize], 1234);
    }

    #[test]
    fn output_and_protection_accessors() {
        let mut psu = connect();
        psu.set_output_state(proto::OutputState::On).unwrap();
        assert_eq!(psu.transport.registers[proto::OUTPUT_STATE_REG_ADDR as usize], 1);
        assert_eq!(psu.read_output_state().unwrap(), proto::OutputState::On);

        psu.set_voltage_protection(proto::Voltage::try_from(13.5).unwrap())
            .unwrap();
        psu.set_current_protection(proto::Current::try_from(2.0).unwrap())
            .unwrap();
        assert_eq!(*psu.read_voltage_protection().unwrap(), 13.5);
        assert_eq!(*psu.read_current_protection().unwrap(), 2.0);
    }

    #[test]
    fn temperature_accessors_decode_sign_pairs() {
        let mut psu = connect();
        psu.transport.registers[proto::TEMPERATURE_REG_ADDR as usize] = 1;
        psu.transport.registers[proto::TEMPERATURE_REG_ADDR as usize + 1] = 7;
        psu.transport.registers[proto::PROBE_TEMPERATURE_REG_ADDR as usize + 1] = 21;
        assert_eq!(*psu.read_temperature().unwrap(), -7);
        assert_eq!(*psu.read_probe_temperature().unwrap(), 21);

        psu.transport.registers[proto::PROBE_TEMPERATURE_REG_ADDR as usize] = 9;
        let err = psu.read_probe_temperature().unwrap_err();
        assert_matches!(
            err,
            Error::ProtocolError(proto::Error::InvalidSignRegister(9))
        );
    }

    #[test]
    fn accumulator_accessors() {
        let mut psu = connect();
        psu.transport.registers[proto::CHARGE_REG_ADDR as usize] = 1;
        psu.transport.registers[proto::CHARGE_REG_ADDR as usize + 1] = 0;
        psu.transport.registers[proto::ENERGY_REG_ADDR as usize + 1] = 1500;
        assert_eq!(*psu.read_charge().unwrap(), 65.536);
        assert_eq!(*psu.read_energy().unwrap(), 1.5);
    }
}
