// libuart/src/uart/types.rs
//
// Semantic line-setting, pin and transfer types shared by every backend.
// These are the single source of truth for device state; backends only
// translate them into termios flags or DCB fields.

use serde::{Deserialize, Serialize};

use crate::error::UartError;

use super::validate;

// ============================================================================
// Line Settings
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

impl Parity {
    /// Numeric code used by the C API (0 = none, 1 = odd, 2 = even).
    pub fn code(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
        }
    }

    /// Option-string letter: 'N', 'O' or 'E'.
    pub fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

impl TryFrom<u8> for Parity {
    type Error = UartError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        validate::parity_from_code(code).ok_or(UartError::InvalidParity(code))
    }
}

/// Flow control setting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    /// In-band XON/XOFF
    Software,
    /// RTS/CTS
    Hardware,
}

impl Default for FlowControl {
    fn default() -> Self {
        FlowControl::None
    }
}

impl FlowControl {
    /// Numeric code used by the C API (0 = none, 1 = software, 2 = hardware).
    pub fn code(self) -> u8 {
        match self {
            FlowControl::None => 0,
            FlowControl::Software => 1,
            FlowControl::Hardware => 2,
        }
    }

    /// Option-string letter: 'N', 'S' or 'H'.
    pub fn letter(self) -> char {
        match self {
            FlowControl::None => 'N',
            FlowControl::Software => 'S',
            FlowControl::Hardware => 'H',
        }
    }
}

impl TryFrom<u8> for FlowControl {
    type Error = UartError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        validate::flow_control_from_code(code).ok_or(UartError::InvalidFlowControl(code))
    }
}

/// The four framing parameters carried by an option string.
///
/// Baud rate is kept separately on the device because it is supplied as its
/// own argument to `open` and validated against a backend-specific table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSettings {
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: FlowControl,
}

impl Default for LineSettings {
    /// 8N1, no flow control.
    fn default() -> Self {
        LineSettings {
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
        }
    }
}

impl LineSettings {
    /// Render as a single option-string group, e.g. `"8N1N"`.
    pub fn to_option_string(&self) -> String {
        format!(
            "{}{}{}{}",
            self.data_bits,
            self.parity.letter(),
            self.stop_bits,
            self.flow_control.letter()
        )
    }
}

// ============================================================================
// Modem Pins
// ============================================================================

/// Modem-control line identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pin {
    /// Request to Send (out)
    Rts,
    /// Clear to Send (in)
    Cts,
    /// Data Set Ready (in)
    Dsr,
    /// Data Carrier Detect (in)
    Dcd,
    /// Data Terminal Ready (out)
    Dtr,
    /// Ring Indicator (in)
    Ri,
}

impl Pin {
    pub const ALL: [Pin; 6] = [Pin::Rts, Pin::Cts, Pin::Dsr, Pin::Dcd, Pin::Dtr, Pin::Ri];

    /// Only RTS and DTR can be driven by the host.
    pub fn is_output(self) -> bool {
        matches!(self, Pin::Rts | Pin::Dtr)
    }

    /// Map the C API's pin index (RTS, CTS, DSR, DCD, DTR, RI order).
    pub fn from_index(index: u8) -> Option<Pin> {
        Pin::ALL.get(index as usize).copied()
    }
}

/// Logical level of a modem-control line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinState {
    Low,
    High,
}

impl PinState {
    pub fn is_high(self) -> bool {
        self == PinState::High
    }
}

impl From<bool> for PinState {
    fn from(high: bool) -> Self {
        if high {
            PinState::High
        } else {
            PinState::Low
        }
    }
}

// ============================================================================
// Transfers
// ============================================================================

/// Outcome of a send or receive that reached the OS without error.
///
/// A short transfer is not an error, but callers must be able to tell it
/// apart from a full one without comparing lengths themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    /// Every requested byte was moved.
    Complete(usize),
    /// Fewer bytes than requested were moved (possibly zero).
    Partial { transferred: usize, requested: usize },
}

impl Transfer {
    pub(crate) fn classify(transferred: usize, requested: usize) -> Self {
        if transferred >= requested {
            Transfer::Complete(transferred)
        } else {
            Transfer::Partial { transferred, requested }
        }
    }

    /// Number of bytes actually moved.
    pub fn count(&self) -> usize {
        match *self {
            Transfer::Complete(n) => n,
            Transfer::Partial { transferred, .. } => transferred,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Transfer::Complete(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
