// libuart/src/uart/backend/mod.rs
//
// OS backends for the device layer.
//
// Each backend owns one native handle and knows how to translate semantic
// line parameters into its own configuration model:
// - posix.rs   - termios flags via tcgetattr/tcsetattr (Linux, macOS, BSD)
// - windows.rs - DCB fields via GetCommState/SetCommState
//
// Exactly one backend is compiled in and exposed as `NativeBackend`.

use crate::error::Result;

use super::types::{FlowControl, Parity, Pin, PinState};

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::PosixBackend as NativeBackend;
#[cfg(windows)]
pub use windows::WindowsBackend as NativeBackend;

#[cfg(test)]
use mockall::automock;

// ============================================================================
// Backend Trait
// ============================================================================

/// Capability contract every OS backend satisfies.
///
/// Values passed in have already been validated by the device layer. Each
/// `apply_*` call reads the native configuration, changes only the fields for
/// that parameter, and writes it back.
#[cfg_attr(test, automock)]
pub trait Backend {
    /// One-time bring-up before line parameters are applied.
    fn prepare(&mut self) -> Result<()>;

    fn apply_baud(&mut self, baud: u32) -> Result<()>;

    fn apply_data_bits(&mut self, data_bits: u8) -> Result<()>;

    fn apply_parity(&mut self, parity: Parity) -> Result<()>;

    fn apply_stop_bits(&mut self, stop_bits: u8) -> Result<()>;

    fn apply_flow_control(&mut self, flow_control: FlowControl) -> Result<()>;

    /// One-time bring-up after all line parameters are applied.
    fn finish(&mut self) -> Result<()>;

    /// Single write; may move fewer bytes than offered.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Single read; 0 means nothing is queued.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Drive an output pin. Only called with RTS or DTR.
    fn set_pin(&mut self, pin: Pin, state: PinState) -> Result<()>;

    fn get_pin(&mut self, pin: Pin) -> Result<PinState>;

    /// Bytes waiting in the input queue, without consuming them.
    fn bytes_available(&mut self) -> Result<usize>;
}

/// Last driven levels of RTS and DTR, for backends whose OS only reports
/// the input pins.
#[cfg_attr(not(windows), allow(dead_code))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OutputLevels {
    pub rts: PinState,
    pub dtr: PinState,
}

#[cfg_attr(not(windows), allow(dead_code))]
impl OutputLevels {
    /// Levels the driver holds RTS and DTR at once `flow_control` is applied.
    /// Hardware flow enables both lines; otherwise both are disabled.
    pub fn for_flow_control(flow_control: FlowControl) -> Self {
        let level = PinState::from(flow_control == FlowControl::Hardware);
        OutputLevels { rts: level, dtr: level }
    }

    /// Levels after `pin` was driven to `state`. Input pins change nothing.
    pub fn with_pin(self, pin: Pin, state: PinState) -> Self {
        match pin {
            Pin::Rts => OutputLevels { rts: state, ..self },
            Pin::Dtr => OutputLevels { dtr: state, ..self },
            _ => self,
        }
    }

    /// Shadowed level of an output pin, `None` for inputs.
    pub fn level(&self, pin: Pin) -> Option<PinState> {
        match pin {
            Pin::Rts => Some(self.rts),
            Pin::Dtr => Some(self.dtr),
            _ => None,
        }
    }
}

/// Look up the native token for `baud` in a backend table.
pub(crate) fn lookup_baud<T: Copy>(table: &[(u32, T)], baud: u32) -> Option<T> {
    table
        .iter()
        .find(|(rate, _)| *rate == baud)
        .map(|(_, token)| *token)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uart::validate::BAUD_RATES;

    #[cfg(unix)]
    use posix::BAUD_TABLE;
    #[cfg(windows)]
    use windows::BAUD_TABLE;

    #[test]
    fn test_every_legal_rate_has_a_native_token() {
        for &baud in BAUD_RATES {
            assert!(
                lookup_baud(BAUD_TABLE, baud).is_some(),
                "legal rate {} missing from backend table",
                baud
            );
        }
    }

    #[test]
    fn test_backend_table_has_no_extra_rates() {
        assert_eq!(BAUD_TABLE.len(), BAUD_RATES.len());
        for (rate, _) in BAUD_TABLE {
            assert!(BAUD_RATES.contains(rate), "table rate {} is not legal", rate);
        }
    }

    #[test]
    fn test_shadow_rts_read_back() {
        let levels = OutputLevels::for_flow_control(FlowControl::None);
        assert_eq!(levels.level(Pin::Rts), Some(PinState::Low));

        let levels = levels.with_pin(Pin::Rts, PinState::High);
        assert_eq!(levels.level(Pin::Rts), Some(PinState::High));
        assert_eq!(levels.level(Pin::Dtr), Some(PinState::Low));

        let levels = levels.with_pin(Pin::Dtr, PinState::High).with_pin(Pin::Rts, PinState::Low);
        assert_eq!(levels, OutputLevels { rts: PinState::Low, dtr: PinState::High });
    }

    #[test]
    fn test_shadow_ignores_inputs() {
        let levels = OutputLevels::for_flow_control(FlowControl::Hardware);
        assert_eq!(levels.with_pin(Pin::Cts, PinState::Low), levels);
        for pin in [Pin::Cts, Pin::Dsr, Pin::Dcd, Pin::Ri] {
            assert_eq!(levels.level(pin), None);
        }
    }

    #[test]
    fn test_flow_change_overrides_manual_levels() {
        let manual = OutputLevels::for_flow_control(FlowControl::None)
            .with_pin(Pin::Rts, PinState::High)
            .with_pin(Pin::Dtr, PinState::High);
        // Re-applying flow control resets the control fields and the shadow.
        let after = OutputLevels::for_flow_control(FlowControl::Software);
        assert_ne!(after, manual);
        assert_eq!(after, OutputLevels { rts: PinState::Low, dtr: PinState::Low });
        assert_eq!(
            OutputLevels::for_flow_control(FlowControl::Hardware),
            OutputLevels { rts: PinState::High, dtr: PinState::High }
        );
    }

    #[test]
    fn test_lookup_unknown_rate() {
        assert!(lookup_baud(BAUD_TABLE, 12_345).is_none());
        assert_eq!(lookup_baud(&[(9_600u32, 13u8)], 9_600), Some(13));
    }
}
