// libuart/src/lib.rs
//
// Cross-platform UART access. One API for opening a serial device, setting
// its line parameters, moving bytes and reading or driving modem pins.
// The OS backend (POSIX termios or Windows DCB) is picked at build time.

pub mod error;
pub mod logging;
pub mod settings;
pub mod uart;

pub use error::{Result, UartError};
pub use settings::UartConfig;
pub use uart::backend::{Backend, NativeBackend};
pub use uart::options::OptionError;
pub use uart::types::{FlowControl, LineSettings, Parity, Pin, PinState, Transfer};
pub use uart::{Uart, MAX_PATH_LEN};

pub const LIB_NAME: &str = "libuart";
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(LIB_NAME, "libuart");
        assert_eq!(LIB_VERSION.split('.').count(), 3);
    }
}
