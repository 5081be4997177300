// libuart/src/uart/options.rs
//
// Option-string parser: "8N1N" style shorthand for data bits, parity,
// stop bits and flow control.
//
// Format, repeated in 4-character groups:
//   [5|6|7|8] [N|O|E] [1|2] [N|S|H]
//
// Characters are decoded left to right and written into the target as they
// are consumed, so a failure leaves earlier fields applied. Later groups
// override earlier ones.

use super::types::{FlowControl, LineSettings, Parity};

/// Sub-field of an option group that failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("invalid data bits")]
    DataBits,
    #[error("invalid parity")]
    Parity,
    #[error("invalid stop bits")]
    StopBits,
    #[error("invalid flow control")]
    FlowControl,
    /// Fewer than four characters left over after a complete group.
    #[error("trailing characters after last option group")]
    TrailingGarbage,
}

const GROUP_LEN: usize = 4;

/// Decode `opt` into `settings`, one character at a time.
///
/// An empty string is a successful no-op.
pub fn parse_into(settings: &mut LineSettings, opt: &str) -> Result<(), OptionError> {
    let bytes = opt.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if i > 0 && bytes.len() - i < GROUP_LEN {
            return Err(OptionError::TrailingGarbage);
        }

        settings.data_bits = match bytes.get(i) {
            Some(b'5') => 5,
            Some(b'6') => 6,
            Some(b'7') => 7,
            Some(b'8') => 8,
            _ => return Err(OptionError::DataBits),
        };
        i += 1;

        settings.parity = match bytes.get(i) {
            Some(b'N') => Parity::None,
            Some(b'O') => Parity::Odd,
            Some(b'E') => Parity::Even,
            _ => return Err(OptionError::Parity),
        };
        i += 1;

        settings.stop_bits = match bytes.get(i) {
            Some(b'1') => 1,
            Some(b'2') => 2,
            _ => return Err(OptionError::StopBits),
        };
        i += 1;

        settings.flow_control = match bytes.get(i) {
            Some(b'N') => FlowControl::None,
            Some(b'S') => FlowControl::Software,
            Some(b'H') => FlowControl::Hardware,
            _ => return Err(OptionError::FlowControl),
        };
        i += 1;
    }

    Ok(())
}

/// Parse a complete option string on top of the 8N1N defaults.
pub fn parse(opt: &str) -> Result<LineSettings, OptionError> {
    let mut settings = LineSettings::default();
    parse_into(&mut settings, opt)?;
    Ok(settings)
}

// ============================================================================
// Tests
// ============================================================================
