// libuart/src/error.rs
//
// Error taxonomy for device lifecycle, configuration, transfer and pin control.
// Every failure is a value; nothing in the library prints or exits.

use std::io;

use crate::uart::options::OptionError;
use crate::uart::types::Pin;

/// Result type returned by every fallible libuart operation.
pub type Result<T> = std::result::Result<T, UartError>;

/// Errors that can occur while opening, configuring or using a UART device.
#[derive(Debug, thiserror::Error)]
pub enum UartError {
    /// The device has been closed; its handle is gone.
    #[error("invalid UART device (already closed)")]
    InvalidDevice,

    /// An argument was rejected before any OS call was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Device path does not fit the bounded path buffer.
    #[error("UART device name too long ({len} bytes, limit {max})")]
    PathTooLong { len: usize, max: usize },

    #[error("invalid baud rate: {0}")]
    InvalidBaud(u32),

    #[error("invalid data bits: {0}")]
    InvalidDataBits(u8),

    #[error("invalid parity code: {0}")]
    InvalidParity(u8),

    #[error("invalid stop bits: {0}")]
    InvalidStopBits(u8),

    #[error("invalid flow control code: {0}")]
    InvalidFlowControl(u8),

    /// Pin cannot be used for the requested operation (e.g. driving an input).
    #[error("invalid pin for this operation: {0:?}")]
    InvalidPin(Pin),

    #[error("invalid option string: {0}")]
    InvalidOption(#[from] OptionError),

    /// A rate passed validation but the backend has no native token for it.
    /// Indicates the validator set and the backend table have drifted apart.
    #[error("baud rate {0} is legal but has no backend mapping")]
    UnmappedBaud(u32),

    /// A native call failed. `op` names the call (e.g. "tcsetattr").
    #[error("{op}() failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Configuration file or profile could not be read or decoded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl UartError {
    /// Wrap an OS error with the name of the native call that produced it.
    pub fn os(op: &'static str, source: io::Error) -> Self {
        UartError::Os { op, source }
    }

    /// Capture `errno` / `GetLastError()` for the call that just failed.
    pub fn last_os(op: &'static str) -> Self {
        UartError::Os {
            op,
            source: io::Error::last_os_error(),
        }
    }

    /// True for errors raised before the backend was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UartError::InvalidArgument(_)
                | UartError::PathTooLong { .. }
                | UartError::InvalidBaud(_)
                | UartError::InvalidDataBits(_)
                | UartError::InvalidParity(_)
                | UartError::InvalidStopBits(_)
                | UartError::InvalidFlowControl(_)
                | UartError::InvalidPin(_)
                | UartError::InvalidOption(_)
        )
    }

    pub fn is_os(&self) -> bool {
        matches!(self, UartError::Os { .. })
    }

    /// The underlying OS error code, when this is an OS failure that carries one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            UartError::Os { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(UartError::InvalidBaud(12345).is_validation());
        assert!(UartError::InvalidPin(Pin::Cts).is_validation());
        assert!(UartError::InvalidOption(OptionError::Parity).is_validation());
        assert!(!UartError::InvalidDevice.is_validation());
        assert!(!UartError::UnmappedBaud(9600).is_validation());
    }

    #[test]
    fn test_os_error_keeps_code() {
        let err = UartError::os("read", io::Error::from_raw_os_error(5));
        assert!(err.is_os());
        assert_eq!(err.raw_os_error(), Some(5));
        assert!(err.to_string().starts_with("read() failed"));
    }

    #[test]
    fn test_option_error_converts() {
        let err: UartError = OptionError::StopBits.into();
        assert!(matches!(err, UartError::InvalidOption(OptionError::StopBits)));
        assert_eq!(err.to_string(), "invalid option string: invalid stop bits");
    }

    #[test]
    fn test_path_too_long_message() {
        let err = UartError::PathTooLong { len: 300, max: 256 };
        assert_eq!(err.to_string(), "UART device name too long (300 bytes, limit 256)");
    }
}
