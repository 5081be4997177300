// libuart/src/uart/backend/posix.rs
//
// POSIX terminal-driver backend.
//
// Line parameters map onto termios flags; every apply step is a
// tcgetattr / modify / tcsetattr round trip so a change to one parameter
// never disturbs the bits owned by another. Modem pins go through
// TIOCMGET/TIOCMSET and the input queue depth through FIONREAD.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};

use libc::{c_int, speed_t, tcflag_t, termios};

use super::{lookup_baud, Backend};
use crate::error::{Result, UartError};
use crate::uart::types::{FlowControl, Parity, Pin, PinState};

// ============================================================================
// Baud Table
// ============================================================================

// Linux encodes speeds as Bxxx tokens; the BSDs and macOS use the numeric
// rate itself as the speed_t value.
macro_rules! baud_table {
    ($($rate:literal => $token:ident),* $(,)?) => {
        /// Semantic rate to native `speed_t` token.
        #[cfg(any(target_os = "linux", target_os = "android"))]
        pub(crate) const BAUD_TABLE: &[(u32, speed_t)] = &[$(($rate, libc::$token)),*];

        /// Semantic rate to native `speed_t` token.
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        pub(crate) const BAUD_TABLE: &[(u32, speed_t)] = &[$(($rate, $rate as speed_t)),*];
    };
}

baud_table! {
    0 => B0,
    50 => B50,
    75 => B75,
    110 => B110,
    134 => B134,
    150 => B150,
    200 => B200,
    300 => B300,
    600 => B600,
    1_200 => B1200,
    1_800 => B1800,
    2_400 => B2400,
    4_800 => B4800,
    9_600 => B9600,
    19_200 => B19200,
    38_400 => B38400,
    57_600 => B57600,
    115_200 => B115200,
    230_400 => B230400,
    460_800 => B460800,
    500_000 => B500000,
    576_000 => B576000,
    921_600 => B921600,
    1_000_000 => B1000000,
    1_152_000 => B1152000,
    1_500_000 => B1500000,
    2_000_000 => B2000000,
    2_500_000 => B2500000,
    3_000_000 => B3000000,
    3_500_000 => B3500000,
    4_000_000 => B4000000,
}

// ============================================================================
// termios Field Mapping
// ============================================================================

const SOFTWARE_FLOW_FLAGS: tcflag_t = libc::IXON | libc::IXOFF | libc::IXANY;

pub(crate) fn set_speed(options: &mut termios, baud: u32) -> Result<()> {
    let speed = lookup_baud(BAUD_TABLE, baud).ok_or(UartError::UnmappedBaud(baud))?;

    if unsafe { libc::cfsetispeed(options, speed) } == -1 {
        return Err(UartError::last_os("cfsetispeed"));
    }
    if unsafe { libc::cfsetospeed(options, speed) } == -1 {
        return Err(UartError::last_os("cfsetospeed"));
    }
    Ok(())
}

pub(crate) fn set_data_bits(options: &mut termios, data_bits: u8) -> Result<()> {
    let size = match data_bits {
        5 => libc::CS5,
        6 => libc::CS6,
        7 => libc::CS7,
        8 => libc::CS8,
        other => return Err(UartError::InvalidDataBits(other)),
    };
    options.c_cflag &= !libc::CSIZE;
    options.c_cflag |= size;
    Ok(())
}

pub(crate) fn set_parity(options: &mut termios, parity: Parity) {
    match parity {
        Parity::None => options.c_cflag &= !libc::PARENB,
        Parity::Odd => options.c_cflag |= libc::PARENB | libc::PARODD,
        Parity::Even => {
            options.c_cflag |= libc::PARENB;
            options.c_cflag &= !libc::PARODD;
        }
    }
}

pub(crate) fn set_stop_bits(options: &mut termios, stop_bits: u8) -> Result<()> {
    match stop_bits {
        1 => options.c_cflag &= !libc::CSTOPB,
        2 => options.c_cflag |= libc::CSTOPB,
        other => return Err(UartError::InvalidStopBits(other)),
    }
    Ok(())
}

pub(crate) fn set_flow_control(options: &mut termios, flow_control: FlowControl) {
    match flow_control {
        FlowControl::None => {
            options.c_cflag &= !libc::CRTSCTS;
            options.c_iflag &= !SOFTWARE_FLOW_FLAGS;
        }
        FlowControl::Software => {
            options.c_cflag &= !libc::CRTSCTS;
            options.c_iflag |= SOFTWARE_FLOW_FLAGS;
        }
        FlowControl::Hardware => {
            options.c_cflag |= libc::CRTSCTS;
            options.c_iflag &= !SOFTWARE_FLOW_FLAGS;
        }
    }
}

/// Raw input (no canonical processing, echo or signals), receiver enabled,
/// modem control lines ignored.
///
/// Output post-processing (OPOST/ONLCR) and input CR translation (ICRNL) are
/// left as the driver had them, so `\n` and `\r` may still be rewritten in
/// transit.
pub(crate) fn set_raw_mode(options: &mut termios) {
    options.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ECHOE | libc::ISIG);
    options.c_cflag |= libc::CLOCAL | libc::CREAD;
}

// ============================================================================
// Modem Status Bits
// ============================================================================

pub(crate) fn pin_mask(pin: Pin) -> c_int {
    match pin {
        Pin::Rts => libc::TIOCM_RTS,
        Pin::Cts => libc::TIOCM_CTS,
        Pin::Dsr => libc::TIOCM_DSR,
        Pin::Dcd => libc::TIOCM_CAR,
        Pin::Dtr => libc::TIOCM_DTR,
        Pin::Ri => libc::TIOCM_RI,
    }
}

/// Status word with only `pin`'s bit changed.
pub(crate) fn with_pin(status: c_int, pin: Pin, state: PinState) -> c_int {
    match state {
        PinState::High => status | pin_mask(pin),
        PinState::Low => status & !pin_mask(pin),
    }
}

// ============================================================================
// Backend
// ============================================================================

/// termios backed serial device. The descriptor closes when this drops.
#[derive(Debug)]
pub struct PosixBackend {
    device: File,
}

impl PosixBackend {
    /// Open `path` read/write without making it the controlling terminal.
    pub fn open(path: &str) -> Result<Self> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| UartError::os("open", e))?;

        log::debug!("opened {} (fd {})", path, device.as_raw_fd());
        Ok(PosixBackend { device })
    }

    fn fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }

    fn termios(&self) -> Result<termios> {
        let mut options = MaybeUninit::<termios>::uninit();
        if unsafe { libc::tcgetattr(self.fd(), options.as_mut_ptr()) } == -1 {
            return Err(UartError::last_os("tcgetattr"));
        }
        Ok(unsafe { options.assume_init() })
    }

    fn set_termios(&self, options: &termios) -> Result<()> {
        if unsafe { libc::tcsetattr(self.fd(), libc::TCSANOW, options) } == -1 {
            return Err(UartError::last_os("tcsetattr"));
        }
        Ok(())
    }

    /// Read-modify-write of the terminal attributes.
    fn update<F>(&mut self, modify: F) -> Result<()>
    where
        F: FnOnce(&mut termios) -> Result<()>,
    {
        let mut options = self.termios()?;
        modify(&mut options)?;
        self.set_termios(&options)
    }

    fn modem_status(&self) -> Result<c_int> {
        let mut status: c_int = 0;
        if unsafe { libc::ioctl(self.fd(), libc::TIOCMGET, &mut status as *mut c_int) } == -1 {
            return Err(UartError::last_os("ioctl(TIOCMGET)"));
        }
        Ok(status)
    }
}

impl AsRawFd for PosixBackend {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}

impl Backend for PosixBackend {
    fn prepare(&mut self) -> Result<()> {
        let flags = unsafe { libc::fcntl(self.fd(), libc::F_GETFL) };
        if flags == -1 {
            return Err(UartError::last_os("fcntl"));
        }
        if unsafe { libc::fcntl(self.fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
            return Err(UartError::last_os("fcntl"));
        }
        Ok(())
    }

    fn apply_baud(&mut self, baud: u32) -> Result<()> {
        self.update(|options| set_speed(options, baud))
    }

    fn apply_data_bits(&mut self, data_bits: u8) -> Result<()> {
        self.update(|options| set_data_bits(options, data_bits))
    }

    fn apply_parity(&mut self, parity: Parity) -> Result<()> {
        self.update(|options| {
            set_parity(options, parity);
            Ok(())
        })
    }

    fn apply_stop_bits(&mut self, stop_bits: u8) -> Result<()> {
        self.update(|options| set_stop_bits(options, stop_bits))
    }

    fn apply_flow_control(&mut self, flow_control: FlowControl) -> Result<()> {
        self.update(|options| {
            set_flow_control(options, flow_control);
            Ok(())
        })
    }

    fn finish(&mut self) -> Result<()> {
        self.update(|options| {
            set_raw_mode(options);
            Ok(())
        })
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self.device.write(data) {
            Ok(n) => Ok(n),
            // Output queue full: nothing was accepted this time.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(UartError::os("write", e)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.device.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(UartError::os("read", e)),
        }
    }

    fn set_pin(&mut self, pin: Pin, state: PinState) -> Result<()> {
        if !pin.is_output() {
            return Err(UartError::InvalidPin(pin));
        }

        let status = with_pin(self.modem_status()?, pin, state);
        if unsafe { libc::ioctl(self.fd(), libc::TIOCMSET, &status as *const c_int) } == -1 {
            return Err(UartError::last_os("ioctl(TIOCMSET)"));
        }
        Ok(())
    }

    fn get_pin(&mut self, pin: Pin) -> Result<PinState> {
        let status = self.modem_status()?;
        Ok(PinState::from(status & pin_mask(pin) != 0))
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let mut queued: c_int = 0;
        if unsafe { libc::ioctl(self.fd(), libc::FIONREAD, &mut queued as *mut c_int) } == -1 {
            return Err(UartError::last_os("ioctl(FIONREAD)"));
        }
        Ok(queued.max(0) as usize)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> termios {
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn test_data_bits_only_touch_csize() {
        let mut options = blank();
        options.c_cflag = libc::PARENB | libc::CSTOPB;
        set_data_bits(&mut options, 7).unwrap();
        assert_eq!(options.c_cflag & libc::CSIZE, libc::CS7);
        assert_ne!(options.c_cflag & libc::PARENB, 0);
        assert_ne!(options.c_cflag & libc::CSTOPB, 0);

        set_data_bits(&mut options, 5).unwrap();
        assert_eq!(options.c_cflag & libc::CSIZE, libc::CS5);
        assert!(matches!(
            set_data_bits(&mut options, 9),
            Err(UartError::InvalidDataBits(9))
        ));
    }

    #[test]
    fn test_parity_flags() {
        let mut options = blank();
        options.c_cflag = libc::CS8 | libc::CSTOPB;

        set_parity(&mut options, Parity::Odd);
        assert_ne!(options.c_cflag & libc::PARENB, 0);
        assert_ne!(options.c_cflag & libc::PARODD, 0);

        set_parity(&mut options, Parity::Even);
        assert_ne!(options.c_cflag & libc::PARENB, 0);
        assert_eq!(options.c_cflag & libc::PARODD, 0);

        set_parity(&mut options, Parity::None);
        assert_eq!(options.c_cflag & libc::PARENB, 0);

        // Byte size and stop bits untouched throughout.
        assert_eq!(options.c_cflag & libc::CSIZE, libc::CS8);
        assert_ne!(options.c_cflag & libc::CSTOPB, 0);
    }

    #[test]
    fn test_stop_bits_flag() {
        let mut options = blank();
        set_stop_bits(&mut options, 2).unwrap();
        assert_ne!(options.c_cflag & libc::CSTOPB, 0);
        set_stop_bits(&mut options, 1).unwrap();
        assert_eq!(options.c_cflag & libc::CSTOPB, 0);
        assert!(set_stop_bits(&mut options, 3).is_err());
    }

    #[test]
    fn test_flow_control_flags() {
        let mut options = blank();

        set_flow_control(&mut options, FlowControl::Hardware);
        assert_ne!(options.c_cflag & libc::CRTSCTS, 0);
        assert_eq!(options.c_iflag & SOFTWARE_FLOW_FLAGS, 0);

        set_flow_control(&mut options, FlowControl::Software);
        assert_eq!(options.c_cflag & libc::CRTSCTS, 0);
        assert_eq!(options.c_iflag & SOFTWARE_FLOW_FLAGS, SOFTWARE_FLOW_FLAGS);

        set_flow_control(&mut options, FlowControl::None);
        assert_eq!(options.c_cflag & libc::CRTSCTS, 0);
        assert_eq!(options.c_iflag & SOFTWARE_FLOW_FLAGS, 0);
    }

    #[test]
    fn test_raw_mode_flags() {
        let mut options = blank();
        options.c_lflag = libc::ICANON | libc::ECHO | libc::ECHOE | libc::ISIG;
        set_raw_mode(&mut options);
        assert_eq!(options.c_lflag & (libc::ICANON | libc::ECHO | libc::ECHOE | libc::ISIG), 0);
        assert_eq!(options.c_cflag & (libc::CLOCAL | libc::CREAD), libc::CLOCAL | libc::CREAD);
    }

    #[test]
    fn test_raw_mode_keeps_newline_translation() {
        let mut options = blank();
        options.c_oflag = libc::OPOST | libc::ONLCR;
        options.c_iflag = libc::ICRNL;
        set_raw_mode(&mut options);
        assert_eq!(options.c_oflag, libc::OPOST | libc::ONLCR);
        assert_eq!(options.c_iflag, libc::ICRNL);
    }

    #[test]
    fn test_set_speed_uses_table() {
        let mut options = blank();
        set_speed(&mut options, 115_200).unwrap();
        let expected = lookup_baud(BAUD_TABLE, 115_200).unwrap();
        assert_eq!(unsafe { libc::cfgetospeed(&options) }, expected);
        assert_eq!(unsafe { libc::cfgetispeed(&options) }, expected);
    }

    #[test]
    fn test_set_speed_unmapped() {
        let mut options = blank();
        assert!(matches!(
            set_speed(&mut options, 14_400),
            Err(UartError::UnmappedBaud(14_400))
        ));
    }

    #[test]
    fn test_with_pin_flips_single_bit() {
        let status = libc::TIOCM_DTR | libc::TIOCM_CTS;
        let raised = with_pin(status, Pin::Rts, PinState::High);
        assert_eq!(raised, status | libc::TIOCM_RTS);
        let lowered = with_pin(raised, Pin::Dtr, PinState::Low);
        assert_eq!(lowered, libc::TIOCM_RTS | libc::TIOCM_CTS);
    }

    #[test]
    fn test_pin_masks_distinct() {
        let masks: Vec<c_int> = Pin::ALL.iter().map(|p| pin_mask(*p)).collect();
        for (i, a) in masks.iter().enumerate() {
            for b in &masks[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }

    #[test]
    fn test_open_missing_device() {
        let err = PosixBackend::open("/dev/libuart-does-not-exist").unwrap_err();
        assert!(err.is_os());
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
