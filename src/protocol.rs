//! Register map and value encodings of the RD6006 power supply.
//!
//! The device exposes everything through Modbus holding registers. Most
//! values are plain fixed-point integers (volts times 100, amps times 1000),
//! a few span more than one register: temperatures are a `[sign, magnitude]`
//! pair, the charge/energy accumulators are a high/low pair, and the clock is
//! two three-register tuples. This module owns all of those conversions; it
//! performs no I/O.

use std::fmt;
use std::ops::Deref;

/// Errors for values that cannot be encoded to or decoded from registers.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A sign register must hold 0 (positive) or 1 (negative).
    #[error("invalid sign register value {0}, expected 0 or 1")]
    InvalidSignRegister(u16),
    /// The device answered with a different register count than requested.
    #[error("expected {expected} register(s), got {actual}")]
    UnexpectedRegisterCount { expected: u16, actual: usize },
    #[error("voltage {0} V out of range (0 to {max} V)", max = Voltage::MAX)]
    VoltageOutOfRange(f64),
    #[error("current {0} A out of range (0 to {max} A)", max = Current::MAX)]
    CurrentOutOfRange(f64),
    #[error("backlight level {0} out of range (0 to {max})", max = Backlight::MAX)]
    BacklightOutOfRange(u16),
    #[error("memory slot {0} out of range (0 to {max})", max = MemorySlot::COUNT - 1)]
    MemorySlotOutOfRange(u8),
    #[error("unknown protection state code {0}")]
    UnknownProtectionState(u16),
    #[error("unknown regulation mode code {0}")]
    UnknownRegulationMode(u16),
    #[error("invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: u16, month: u16, day: u16 },
    #[error("invalid time of day {hour:02}:{minute:02}:{second:02}")]
    InvalidTime { hour: u16, minute: u16, second: u16 },
}

fn expect_register_count(registers: &[u16], expected: u16) -> Result<(), Error> {
    if registers.len() == expected as usize {
        Ok(())
    } else {
        Err(Error::UnexpectedRegisterCount {
            expected,
            actual: registers.len(),
        })
    }
}

// Holding register addresses. The identity block sits at the bottom of the
// map and is read once at connect time; everything else is live state.
pub const TEMPERATURE_REG_ADDR: u16 = 4;
pub const VOLTAGE_SET_REG_ADDR: u16 = 8;
pub const CURRENT_SET_REG_ADDR: u16 = 9;
pub const OUTPUT_VOLTAGE_REG_ADDR: u16 = 10;
pub const OUTPUT_CURRENT_REG_ADDR: u16 = 11;
pub const OUTPUT_CHARGE_REG_ADDR: u16 = 12;
pub const OUTPUT_POWER_REG_ADDR: u16 = 13;
pub const INPUT_VOLTAGE_REG_ADDR: u16 = 14;
pub const PROTECTION_STATE_REG_ADDR: u16 = 16;
pub const REGULATION_MODE_REG_ADDR: u16 = 17;
pub const OUTPUT_STATE_REG_ADDR: u16 = 18;
pub const BATTERY_MODE_REG_ADDR: u16 = 32;
pub const BATTERY_VOLTAGE_REG_ADDR: u16 = 33;
pub const PROBE_TEMPERATURE_REG_ADDR: u16 = 34;
pub const FAHRENHEIT_TEMPERATURE_REG_ADDR: u16 = 36;
pub const CHARGE_REG_ADDR: u16 = 38;
pub const ENERGY_REG_ADDR: u16 = 40;
pub const DATE_REG_ADDR: u16 = 48;
pub const TIME_REG_ADDR: u16 = 51;
pub const BACKLIGHT_REG_ADDR: u16 = 72;
pub const MEMORY_REG_ADDR: u16 = 80;
pub const OVER_VOLTAGE_PROTECTION_REG_ADDR: u16 = 82;
pub const OVER_CURRENT_PROTECTION_REG_ADDR: u16 = 83;

/// Register width of one half of the charge/energy accumulators.
/// Confirmed 16-bit halves against RD6006 firmware 1.28.
pub const ACCUMULATOR_REGISTER_BITS: u32 = 16;

fn accumulator_raw(high: u16, low: u16) -> u32 {
    ((high as u32) << ACCUMULATOR_REGISTER_BITS) | low as u32
}

/// A voltage in volts, stored by the device as centivolts.
///
/// Used for the setpoint, the measured output and input voltages, the
/// over-voltage protection threshold and the preset fields.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Voltage(f64);

impl Voltage {
    pub const SCALE: f64 = 100.0;
    pub const MAX: f64 = u16::MAX as f64 / Self::SCALE;
    pub const QUANTITY: u16 = 1;

    fn from_register(raw: u16) -> Self {
        Voltage(raw as f64 / Self::SCALE)
    }

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(Self::from_register(registers[0]))
    }

    /// Truncates toward zero: 5.009 V encodes as raw 500, never 501.
    pub fn encode_for_write_register(&self) -> u16 {
        (self.0 * Self::SCALE) as u16
    }
}

impl TryFrom<f64> for Voltage {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Error> {
        if value.is_finite() && (0.0..=Self::MAX).contains(&value) {
            Ok(Voltage(value))
        } else {
            Err(Error::VoltageOutOfRange(value))
        }
    }
}

impl Deref for Voltage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A current in amps, stored by the device as milliamps.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Current(f64);

impl Current {
    pub const SCALE: f64 = 1000.0;
    pub const MAX: f64 = u16::MAX as f64 / Self::SCALE;
    pub const QUANTITY: u16 = 1;

    fn from_register(raw: u16) -> Self {
        Current(raw as f64 / Self::SCALE)
    }

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(Self::from_register(registers[0]))
    }

    /// Truncates toward zero, like [`Voltage::encode_for_write_register`].
    pub fn encode_for_write_register(&self) -> u16 {
        (self.0 * Self::SCALE) as u16
    }
}

impl TryFrom<f64> for Current {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Error> {
        if value.is_finite() && (0.0..=Self::MAX).contains(&value) {
            Ok(Current(value))
        } else {
            Err(Error::CurrentOutOfRange(value))
        }
    }
}

impl Deref for Current {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Current {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A power in watts, stored by the device as centiwatts. Read-only.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Power(f64);

impl Power {
    pub const SCALE: f64 = 100.0;
    pub const QUANTITY: u16 = 1;

    fn from_register(raw: u16) -> Self {
        Power(raw as f64 / Self::SCALE)
    }

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(Self::from_register(registers[0]))
    }
}

impl Deref for Power {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Accumulated charge in amp-hours, stored as milliamp-hours.
///
/// Lives in two places: a single register with the charge delivered since the
/// output was switched on, and a two-register accumulator.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Charge(f64);

impl Charge {
    pub const SCALE: f64 = 1000.0;
    pub const QUANTITY: u16 = 2;

    fn from_register(raw: u16) -> Self {
        Charge(raw as f64 / Self::SCALE)
    }

    /// Decodes the `[high, low]` accumulator pair.
    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(Charge(
            accumulator_raw(registers[0], registers[1]) as f64 / Self::SCALE,
        ))
    }
}

impl Deref for Charge {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Charge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Accumulated energy in watt-hours, stored as milliwatt-hours in a
/// two-register accumulator.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Energy(f64);

impl Energy {
    pub const SCALE: f64 = 1000.0;
    pub const QUANTITY: u16 = 2;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(Energy(
            accumulator_raw(registers[0], registers[1]) as f64 / Self::SCALE,
        ))
    }
}

impl Deref for Energy {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A temperature in whole degrees, decoded from a `[sign, magnitude]`
/// register pair. Sign register 0 means positive, 1 means negative; anything
/// else is a device fault surfaced as [`Error::InvalidSignRegister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Temperature(i32);

impl Temperature {
    pub const QUANTITY: u16 = 2;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        let magnitude = registers[1] as i32;
        match registers[0] {
            0 => Ok(Temperature(magnitude)),
            1 => Ok(Temperature(-magnitude)),
            sign => Err(Error::InvalidSignRegister(sign)),
        }
    }
}

impl Deref for Temperature {
    type Target = i32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The raw model code from register 0 (60062 on an RD6006).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model(u16);

impl Deref for Model {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The 32-bit serial number, `(reg1 << 16) | reg2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialNumber(u32);

impl Deref for SerialNumber {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

/// The firmware version, register 3 divided by 100 (128 reads as 1.28).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FirmwareVersion(f64);

impl Deref for FirmwareVersion {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// The identity block at the bottom of the register map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identity {
    pub model: Model,
    pub serial_number: SerialNumber,
    pub firmware_version: FirmwareVersion,
}

impl Identity {
    pub const ADDRESS: u16 = 0;
    pub const QUANTITY: u16 = 4;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(Identity {
            model: Model(registers[0]),
            serial_number: SerialNumber(((registers[1] as u32) << 16) | registers[2] as u32),
            firmware_version: FirmwareVersion(registers[3] as f64 / 100.0),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RD{} SN:{} FW:{}",
            self.model, self.serial_number, self.firmware_version
        )
    }
}

/// Whether the output stage is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Off,
    On,
}

impl OutputState {
    pub const QUANTITY: u16 = 1;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(Self::from(registers[0] != 0))
    }

    pub fn encode_for_write_register(&self) -> u16 {
        match self {
            OutputState::Off => 0,
            OutputState::On => 1,
        }
    }
}

impl From<bool> for OutputState {
    fn from(on: bool) -> Self {
        if on {
            OutputState::On
        } else {
            OutputState::Off
        }
    }
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputState::Off => write!(f, "off"),
            OutputState::On => write!(f, "on"),
        }
    }
}

/// Which protection, if any, has tripped and latched the output off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionState {
    Normal,
    OverVoltage,
    OverCurrent,
    OverTemperature,
}

impl ProtectionState {
    pub const QUANTITY: u16 = 1;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        match registers[0] {
            0 => Ok(ProtectionState::Normal),
            1 => Ok(ProtectionState::OverVoltage),
            2 => Ok(ProtectionState::OverCurrent),
            3 => Ok(ProtectionState::OverTemperature),
            code => Err(Error::UnknownProtectionState(code)),
        }
    }
}

impl fmt::Display for ProtectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtectionState::Normal => write!(f, "normal"),
            ProtectionState::OverVoltage => write!(f, "over-voltage"),
            ProtectionState::OverCurrent => write!(f, "over-current"),
            ProtectionState::OverTemperature => write!(f, "over-temperature"),
        }
    }
}

/// Constant-voltage or constant-current regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationMode {
    ConstantVoltage,
    ConstantCurrent,
}

impl RegulationMode {
    pub const QUANTITY: u16 = 1;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        match registers[0] {
            0 => Ok(RegulationMode::ConstantVoltage),
            1 => Ok(RegulationMode::ConstantCurrent),
            code => Err(Error::UnknownRegulationMode(code)),
        }
    }
}

impl fmt::Display for RegulationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegulationMode::ConstantVoltage => write!(f, "CV"),
            RegulationMode::ConstantCurrent => write!(f, "CC"),
        }
    }
}

/// Display backlight brightness, 0 (off) to 5 (full).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Backlight(u16);

impl Backlight {
    pub const MAX: u16 = 5;
    pub const QUANTITY: u16 = 1;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Self::try_from(registers[0])
    }

    pub fn encode_for_write_register(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Backlight {
    type Error = Error;

    fn try_from(level: u16) -> Result<Self, Error> {
        if level <= Self::MAX {
            Ok(Backlight(level))
        } else {
            Err(Error::BacklightOutOfRange(level))
        }
    }
}

impl Deref for Backlight {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Backlight {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar date as held in registers 48 to 50.
///
/// Components are validated on construction, so an instance always encodes
/// to exactly three well-formed registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    year: u16,
    month: u16,
    day: u16,
}

impl Date {
    pub const QUANTITY: u16 = 3;

    pub fn new(year: u16, month: u16, day: u16) -> Result<Self, Error> {
        if (1..=12).contains(&month) && (1..=31).contains(&day) {
            Ok(Date { year, month, day })
        } else {
            Err(Error::InvalidDate { year, month, day })
        }
    }

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Self::new(registers[0], registers[1], registers[2])
    }

    pub fn encode_for_write_registers(&self) -> [u16; 3] {
        [self.year, self.month, self.day]
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u16 {
        self.month
    }

    pub fn day(&self) -> u16 {
        self.day
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// A time of day as held in registers 51 to 53.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    hour: u16,
    minute: u16,
    second: u16,
}

impl Time {
    pub const QUANTITY: u16 = 3;

    pub fn new(hour: u16, minute: u16, second: u16) -> Result<Self, Error> {
        if hour < 24 && minute < 60 && second < 60 {
            Ok(Time {
                hour,
                minute,
                second,
            })
        } else {
            Err(Error::InvalidTime {
                hour,
                minute,
                second,
            })
        }
    }

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Self::new(registers[0], registers[1], registers[2])
    }

    pub fn encode_for_write_registers(&self) -> [u16; 3] {
        [self.hour, self.minute, self.second]
    }

    pub fn hour(&self) -> u16 {
        self.hour
    }

    pub fn minute(&self) -> u16 {
        self.minute
    }

    pub fn second(&self) -> u16 {
        self.second
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// A validated memory slot index, `M0` to `M9`.
///
/// Note that `M0` holds the active settings: registers 82/83 (the protection
/// thresholds) are `M0`'s OVP/OCP fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemorySlot(u8);

impl MemorySlot {
    pub const COUNT: u8 = 10;

    /// First register of this slot's four-register block.
    pub fn address(&self) -> u16 {
        MEMORY_REG_ADDR + self.0 as u16 * MemoryPreset::QUANTITY
    }

    pub fn all() -> impl Iterator<Item = MemorySlot> {
        (0..Self::COUNT).map(MemorySlot)
    }
}

impl TryFrom<u8> for MemorySlot {
    type Error = Error;

    fn try_from(slot: u8) -> Result<Self, Error> {
        if slot < Self::COUNT {
            Ok(MemorySlot(slot))
        } else {
            Err(Error::MemorySlotOutOfRange(slot))
        }
    }
}

impl Deref for MemorySlot {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for MemorySlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// One memory preset: setpoints plus protection thresholds, four registers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemoryPreset {
    pub voltage: Voltage,
    pub current: Current,
    pub over_voltage_protection: Voltage,
    pub over_current_protection: Current,
}

impl MemoryPreset {
    pub const QUANTITY: u16 = 4;
    /// Register count of the whole ten-slot bank.
    pub const BANK_QUANTITY: u16 = Self::QUANTITY * MemorySlot::COUNT as u16;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        Ok(MemoryPreset {
            voltage: Voltage::from_register(registers[0]),
            current: Current::from_register(registers[1]),
            over_voltage_protection: Voltage::from_register(registers[2]),
            over_current_protection: Current::from_register(registers[3]),
        })
    }

    /// Decodes the whole bank from one forty-register read.
    pub fn decode_bank_from_holding_registers(
        registers: &[u16],
    ) -> Result<[Self; MemorySlot::COUNT as usize], Error> {
        expect_register_count(registers, Self::BANK_QUANTITY)?;
        let mut presets = [MemoryPreset::default(); MemorySlot::COUNT as usize];
        for (preset, chunk) in presets
            .iter_mut()
            .zip(registers.chunks(Self::QUANTITY as usize))
        {
            *preset = Self::decode_from_holding_registers(chunk)?;
        }
        Ok(presets)
    }

    pub fn encode_for_write_registers(&self) -> [u16; 4] {
        [
            self.voltage.encode_for_write_register(),
            self.current.encode_for_write_register(),
            self.over_voltage_protection.encode_for_write_register(),
            self.over_current_protection.encode_for_write_register(),
        ]
    }
}

impl fmt::Display for MemoryPreset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} V, {} A, OVP: {} V, OCP: {} A",
            self.voltage, self.current, self.over_voltage_protection, self.over_current_protection
        )
    }
}

/// Full device state, decoded from one contiguous snapshot of registers
/// 0 to 119.
///
/// The serial link is slow and per-register round-trips dominate any status
/// report, so the whole block (identity, measurements, settings, battery
/// state, clock and the ten presets) is fetched in a single read and decoded
/// field by field from the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub identity: Identity,
    pub temperature: Temperature,
    pub probe_temperature: Temperature,
    pub fahrenheit_temperature: Temperature,
    pub voltage_setpoint: Voltage,
    pub current_setpoint: Current,
    pub output_voltage: Voltage,
    pub output_current: Current,
    pub output_charge: Charge,
    pub output_power: Power,
    pub input_voltage: Voltage,
    pub protection: ProtectionState,
    pub regulation: RegulationMode,
    pub output: OutputState,
    pub battery_mode: bool,
    pub battery_voltage: Voltage,
    pub charge: Charge,
    pub energy: Energy,
    pub date: Date,
    pub time: Time,
    pub backlight: Backlight,
    pub over_voltage_protection: Voltage,
    pub over_current_protection: Current,
    pub memories: [MemoryPreset; MemorySlot::COUNT as usize],
}

impl Status {
    pub const ADDRESS: u16 = 0;
    pub const QUANTITY: u16 = MEMORY_REG_ADDR + MemoryPreset::BANK_QUANTITY;

    pub fn decode_from_holding_registers(registers: &[u16]) -> Result<Self, Error> {
        expect_register_count(registers, Self::QUANTITY)?;
        let single = |addr: u16| &registers[addr as usize..addr as usize + 1];
        let pair = |addr: u16| &registers[addr as usize..addr as usize + 2];
        let triple = |addr: u16| &registers[addr as usize..addr as usize + 3];
        Ok(Status {
            identity: Identity::decode_from_holding_registers(
                &registers[..Identity::QUANTITY as usize],
            )?,
            temperature: Temperature::decode_from_holding_registers(pair(TEMPERATURE_REG_ADDR))?,
            probe_temperature: Temperature::decode_from_holding_registers(pair(
                PROBE_TEMPERATURE_REG_ADDR,
            ))?,
            fahrenheit_temperature: Temperature::decode_from_holding_registers(pair(
                FAHRENHEIT_TEMPERATURE_REG_ADDR,
            ))?,
            voltage_setpoint: Voltage::from_register(registers[VOLTAGE_SET_REG_ADDR as usize]),
            current_setpoint: Current::from_register(registers[CURRENT_SET_REG_ADDR as usize]),
            output_voltage: Voltage::from_register(registers[OUTPUT_VOLTAGE_REG_ADDR as usize]),
            output_current: Current::from_register(registers[OUTPUT_CURRENT_REG_ADDR as usize]),
            output_charge: Charge::from_register(registers[OUTPUT_CHARGE_REG_ADDR as usize]),
            output_power: Power::from_register(registers[OUTPUT_POWER_REG_ADDR as usize]),
            input_voltage: Voltage::from_register(registers[INPUT_VOLTAGE_REG_ADDR as usize]),
            protection: ProtectionState::decode_from_holding_registers(single(
                PROTECTION_STATE_REG_ADDR,
            ))?,
            regulation: RegulationMode::decode_from_holding_registers(single(
                REGULATION_MODE_REG_ADDR,
            ))?,
            output: OutputState::decode_from_holding_registers(single(OUTPUT_STATE_REG_ADDR))?,
            battery_mode: registers[BATTERY_MODE_REG_ADDR as usize] != 0,
            battery_voltage: Voltage::from_register(registers[BATTERY_VOLTAGE_REG_ADDR as usize]),
            charge: Charge::decode_from_holding_registers(pair(CHARGE_REG_ADDR))?,
            energy: Energy::decode_from_holding_registers(pair(ENERGY_REG_ADDR))?,
            date: Date::decode_from_holding_registers(triple(DATE_REG_ADDR))?,
            time: Time::decode_from_holding_registers(triple(TIME_REG_ADDR))?,
            backlight: Backlight::decode_from_holding_registers(single(BACKLIGHT_REG_ADDR))?,
            over_voltage_protection: Voltage::from_register(
                registers[OVER_VOLTAGE_PROTECTION_REG_ADDR as usize],
            ),
            over_current_protection: Current::from_register(
                registers[OVER_CURRENT_PROTECTION_REG_ADDR as usize],
            ),
            memories: MemoryPreset::decode_bank_from_holding_registers(
                &registers[MEMORY_REG_ADDR as usize..],
            )?,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "== Device")?;
        writeln!(f, "Model   : {}", self.identity.model)?;
        writeln!(f, "SN      : {}", self.identity.serial_number)?;
        writeln!(f, "Firmware: {}", self.identity.firmware_version)?;
        writeln!(f, "Input   : {} V", self.input_voltage)?;
        writeln!(f, "Temp    : {} °C", self.temperature)?;
        writeln!(f, "TempProb: {} °C", self.probe_temperature)?;
        writeln!(f, "== Output ({}, {})", self.output, self.regulation)?;
        writeln!(f, "Voltage : {} V", self.output_voltage)?;
        writeln!(f, "Current : {} A", self.output_current)?;
        writeln!(f, "Charge  : {} Ah", self.output_charge)?;
        writeln!(f, "Power   : {} W", self.output_power)?;
        writeln!(f, "== Settings")?;
        writeln!(f, "Voltage : {} V", self.voltage_setpoint)?;
        writeln!(f, "Current : {} A", self.current_setpoint)?;
        writeln!(f, "Backlight: {}", self.backlight)?;
        writeln!(f, "Clock   : {} {}", self.date, self.time)?;
        writeln!(f, "== Protection ({})", self.protection)?;
        writeln!(f, "Voltage : {} V", self.over_voltage_protection)?;
        writeln!(f, "Current : {} A", self.over_current_protection)?;
        writeln!(f, "== Battery")?;
        if self.battery_mode {
            writeln!(f, "Active")?;
            writeln!(f, "Voltage : {} V", self.battery_voltage)?;
        }
        writeln!(f, "Capacity: {} Ah", self.charge)?;
        writeln!(f, "Energy  : {} Wh", self.energy)?;
        writeln!(f, "== Memories")?;
        for (slot, preset) in MemorySlot::all().zip(self.memories.iter()) {
            writeln!(f, "{}: {}", slot, preset)?;
        }
        Ok(())
    }
}
