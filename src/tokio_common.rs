//! Common data structures for the `tokio-modbus` based client: the error
//! type, the transient-fault classification the retry wrapper relies on, the
//! retry schedule, and the serial port settings of the RD6006.

use crate::protocol as proto;
use std::time::Duration;

/// Represents all possible errors that can occur during Modbus communication.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Wraps `proto::Error`.
    #[error(transparent)]
    ProtocolError(#[from] proto::Error),

    /// Wraps `tokio_modbus::ExceptionCode`.
    #[error(transparent)]
    TokioExceptionError(#[from] tokio_modbus::ExceptionCode),

    /// Wraps `tokio_modbus::Error`.
    #[error(transparent)]
    TokioError(#[from] tokio_modbus::Error),

    /// The retry budget for a transient fault ran out.
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

/// Transport faults the retry wrapper may absorb.
///
/// Everything else (port gone, Modbus exception, decode fault) is permanent
/// and propagates on the first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientFault {
    /// The device did not answer within the transport timeout.
    NoResponse,
    /// The answer arrived mangled (bad CRC, truncated frame).
    InvalidResponse,
}

impl Error {
    /// Classifies this error as a transient transport fault, if it is one.
    pub fn transient_fault(&self) -> Option<TransientFault> {
        match self {
            Error::TokioError(tokio_modbus::Error::Transport(err)) => match err.kind() {
                std::io::ErrorKind::TimedOut => Some(TransientFault::NoResponse),
                std::io::ErrorKind::InvalidData => Some(TransientFault::InvalidResponse),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The result type for tokio operations.
pub(crate) type Result<T> = std::result::Result<T, crate::tokio_common::Error>;

/// Bounded retry schedule for transient transport faults.
///
/// The RS485 link drops the occasional response, so every register operation
/// runs under this schedule: up to `max_retries` additional attempts, with a
/// pause that starts at `first_backoff` and doubles up to `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub first_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            first_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that fails on the first fault. Useful for probing.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// The parity used for serial communication.
pub const PARITY: &tokio_serial::Parity = &tokio_serial::Parity::None;
/// The number of stop bits used for serial communication.
pub const STOP_BITS: &tokio_serial::StopBits = &tokio_serial::StopBits::One;
/// The number of data bits used for serial communication.
pub const DATA_BITS: &tokio_serial::DataBits = &tokio_serial::DataBits::Eight;

/// The factory serial speed of the RD6006.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// The factory Modbus slave address.
pub const DEFAULT_SLAVE_ADDRESS: u8 = 1;
/// Per-call response timeout matching the stock USB adapter's behavior.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Creates a `tokio_serial::SerialPortBuilder` with the specified settings.
///
/// # Arguments
///
/// * `device` - The path to the serial port device (e.g., `/dev/ttyUSB0`).
/// * `baud_rate` - The baud rate for the serial communication.
pub fn serial_port_builder(device: &str, baud_rate: u32) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(device, baud_rate)
        .parity(*PARITY)
        .stop_bits(*STOP_BITS)
        .data_bits(*DATA_BITS)
        .flow_control(tokio_serial::FlowControl::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_error(kind: std::io::ErrorKind) -> Error {
        Error::from(tokio_modbus::Error::Transport(std::io::Error::new(
            kind, "test",
        )))
    }

    #[test]
    fn transient_fault_classification() {
        assert_eq!(
            transport_error(std::io::ErrorKind::TimedOut).transient_fault(),
            Some(TransientFault::NoResponse)
        );
        assert_eq!(
            transport_error(std::io::ErrorKind::InvalidData).transient_fault(),
            Some(TransientFault::InvalidResponse)
        );
        assert_eq!(
            transport_error(std::io::ErrorKind::NotFound).transient_fault(),
            None
        );
        assert_eq!(
            Error::from(proto::Error::InvalidSignRegister(2)).transient_fault(),
            None
        );
        assert_eq!(
            Error::from(tokio_modbus::ExceptionCode::IllegalDataAddress).transient_fault(),
            None
        );
    }

    #[test]
    fn exhausted_retries_keep_the_last_fault() {
        let exhausted = Error::RetriesExhausted {
            attempts: 6,
            source: Box::new(transport_error(std::io::ErrorKind::TimedOut)),
        };
        // The wrapper itself is not transient; the retry loop must not recurse on it.
        assert_eq!(exhausted.transient_fault(), None);
        assert!(exhausted.to_string().contains("6 attempts"));
    }
}
