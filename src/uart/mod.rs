// libuart/src/uart/mod.rs
//
// UART device: lifecycle, line configuration, byte transfer and modem pins.
//
// The device record keeps the semantic line parameters as the source of
// truth and drives exactly one OS backend (termios or DCB, chosen at build
// time). Open runs Option Parser -> Validator -> Backend and never hands back
// a partially configured device.

pub mod backend;
pub mod options;
pub mod types;
pub mod validate;

use std::fmt;

use crate::error::{Result, UartError};

use backend::{Backend, NativeBackend};
use types::{FlowControl, LineSettings, Parity, Pin, PinState, Transfer};

/// Device path limit in bytes, counting the C string terminator.
pub const MAX_PATH_LEN: usize = 256;

// ============================================================================
// Argument Checks
// ============================================================================

fn check_path(path: &str) -> Result<()> {
    if path.len() >= MAX_PATH_LEN {
        return Err(UartError::PathTooLong {
            len: path.len(),
            max: MAX_PATH_LEN,
        });
    }
    if path.is_empty() {
        return Err(UartError::InvalidArgument("device path is empty"));
    }
    if path.contains('\0') {
        return Err(UartError::InvalidArgument("device path contains a NUL byte"));
    }
    Ok(())
}

/// Everything `open` can reject without touching the OS.
fn check_open_args(path: &str, baud: u32, options: &str) -> Result<LineSettings> {
    check_path(path)?;
    let settings = options::parse(options)?;
    if !validate::is_baud_valid(baud) {
        return Err(UartError::InvalidBaud(baud));
    }
    Ok(settings)
}

fn logged<T>(path: &str, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        log::error!("{}: {}", path, e);
    }
    result
}

// ============================================================================
// Device
// ============================================================================

/// An open, configured serial device.
///
/// The native handle is owned exclusively. [`Uart::close`] (or dropping the
/// value) releases it; afterwards every operation that needs the handle fails
/// with [`UartError::InvalidDevice`] and closing again does nothing.
///
/// A `Uart` has no internal locking. Share it across threads only behind the
/// caller's own synchronization.
///
/// ```no_run
/// use libuart::{Pin, PinState, Uart};
///
/// let mut uart = Uart::open("/dev/ttyUSB0", 9_600, "8N1N")?;
/// uart.send_str("Hello World!")?;
/// uart.set_pin(Pin::Rts, PinState::High)?;
///
/// let mut buf = [0u8; 64];
/// let n = uart.receive(&mut buf)?.count();
/// println!("RX: {:?}", &buf[..n]);
/// uart.close();
/// # Ok::<(), libuart::UartError>(())
/// ```
pub struct Uart<B: Backend = NativeBackend> {
    backend: Option<B>,
    path: String,
    baud: u32,
    settings: LineSettings,
}

impl Uart<NativeBackend> {
    /// Open and fully configure the device at `path`.
    ///
    /// `options` is one or more `"8N1N"` style groups (data bits, parity,
    /// stop bits, flow control). All arguments are checked before the device
    /// is opened; if any configuration step fails afterwards the handle is
    /// closed again and the error returned.
    pub fn open(path: &str, baud: u32, options: &str) -> Result<Self> {
        let settings = logged(path, check_open_args(path, baud, options))?;
        let backend = logged(path, NativeBackend::open(path))?;
        Uart::configure(backend, path, baud, settings)
    }

    /// Raw descriptor while the device is open.
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.backend.as_ref().map(|b| b.as_raw_fd())
    }

    /// Raw handle while the device is open.
    #[cfg(windows)]
    pub fn raw_handle(&self) -> Option<std::os::windows::io::RawHandle> {
        use std::os::windows::io::AsRawHandle;
        self.backend.as_ref().map(|b| b.as_raw_handle())
    }
}

impl<B: Backend> Uart<B> {
    /// Configure a device over an already opened backend.
    ///
    /// Arguments are checked exactly as in [`Uart::open`] before the backend
    /// is touched. On any failure the backend is dropped.
    pub fn with_backend(backend: B, path: &str, baud: u32, options: &str) -> Result<Self> {
        let settings = logged(path, check_open_args(path, baud, options))?;
        Uart::configure(backend, path, baud, settings)
    }

    /// Take ownership of an opened backend and run the full bring-up.
    pub(crate) fn configure(backend: B, path: &str, baud: u32, settings: LineSettings) -> Result<Self> {
        let mut uart = Uart {
            backend: Some(backend),
            path: path.to_string(),
            baud,
            settings,
        };

        if let Err(e) = uart.initialize() {
            log::error!("{}: initialization failed: {}", path, e);
            uart.close();
            return Err(e);
        }

        log::debug!(
            "{}: configured {} baud {}",
            uart.path,
            uart.baud,
            uart.settings.to_option_string()
        );
        Ok(uart)
    }

    fn initialize(&mut self) -> Result<()> {
        let baud = self.baud;
        let settings = self.settings;
        let backend = self.backend_mut()?;

        backend.prepare()?;
        backend.apply_baud(baud)?;
        backend.apply_data_bits(settings.data_bits)?;
        backend.apply_parity(settings.parity)?;
        backend.apply_stop_bits(settings.stop_bits)?;
        backend.apply_flow_control(settings.flow_control)?;
        backend.finish()
    }

    fn backend_mut(&mut self) -> Result<&mut B> {
        self.backend.as_mut().ok_or(UartError::InvalidDevice)
    }

    /// Release the native handle. Closing a closed device is a no-op.
    pub fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            drop(backend);
            log::debug!("{}: closed", self.path);
        }
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Copy of the device path.
    pub fn path(&self) -> String {
        self.path.clone()
    }

    // ------------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------------

    /// Write `data` with a single native write.
    ///
    /// A short write is returned as [`Transfer::Partial`] and is not retried.
    pub fn send(&mut self, data: &[u8]) -> Result<Transfer> {
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        if data.is_empty() {
            return Err(UartError::InvalidArgument("send buffer is empty"));
        }

        let written = logged(&self.path, backend.write(data))?;
        let transfer = Transfer::classify(written, data.len());
        if !transfer.is_complete() {
            log::warn!(
                "{}: could not send all bytes ({} of {})",
                self.path,
                written,
                data.len()
            );
        }
        Ok(transfer)
    }

    pub fn send_str(&mut self, text: &str) -> Result<Transfer> {
        self.send(text.as_bytes())
    }

    /// Read whatever is queued, up to `buf.len()` bytes. Never waits.
    ///
    /// Zero bytes is a normal result when nothing has arrived.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<Transfer> {
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        if buf.is_empty() {
            return Err(UartError::InvalidArgument("receive buffer is empty"));
        }

        let read = logged(&self.path, backend.read(buf))?;
        Ok(Transfer::classify(read, buf.len()))
    }

    // ------------------------------------------------------------------------
    // Line Settings
    // ------------------------------------------------------------------------
    //
    // Setters validate first and leave everything untouched on rejection.
    // Once valid, the stored value is updated before the backend is asked to
    // apply it, so a failed apply still reports the new value.

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn set_baud(&mut self, baud: u32) -> Result<()> {
        if !validate::is_baud_valid(baud) {
            return Err(UartError::InvalidBaud(baud));
        }
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        self.baud = baud;
        logged(&self.path, backend.apply_baud(baud))
    }

    pub fn data_bits(&self) -> u8 {
        self.settings.data_bits
    }

    pub fn set_data_bits(&mut self, data_bits: u8) -> Result<()> {
        if !validate::is_data_bits_valid(data_bits) {
            return Err(UartError::InvalidDataBits(data_bits));
        }
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        self.settings.data_bits = data_bits;
        logged(&self.path, backend.apply_data_bits(data_bits))
    }

    pub fn parity(&self) -> Parity {
        self.settings.parity
    }

    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        self.settings.parity = parity;
        logged(&self.path, backend.apply_parity(parity))
    }

    pub fn stop_bits(&self) -> u8 {
        self.settings.stop_bits
    }

    pub fn set_stop_bits(&mut self, stop_bits: u8) -> Result<()> {
        if !validate::is_stop_bits_valid(stop_bits) {
            return Err(UartError::InvalidStopBits(stop_bits));
        }
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        self.settings.stop_bits = stop_bits;
        logged(&self.path, backend.apply_stop_bits(stop_bits))
    }

    pub fn flow_control(&self) -> FlowControl {
        self.settings.flow_control
    }

    pub fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<()> {
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        self.settings.flow_control = flow_control;
        logged(&self.path, backend.apply_flow_control(flow_control))
    }

    /// Current data bits, parity, stop bits and flow control together.
    pub fn settings(&self) -> LineSettings {
        self.settings
    }

    // ------------------------------------------------------------------------
    // Modem Pins
    // ------------------------------------------------------------------------

    /// Drive RTS or DTR. Input pins are rejected before any OS call.
    pub fn set_pin(&mut self, pin: Pin, state: PinState) -> Result<()> {
        if !pin.is_output() {
            return Err(UartError::InvalidPin(pin));
        }
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        logged(&self.path, backend.set_pin(pin, state))
    }

    pub fn get_pin(&mut self, pin: Pin) -> Result<PinState> {
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        logged(&self.path, backend.get_pin(pin))
    }

    /// Bytes queued for reading, without consuming them.
    pub fn bytes_available(&mut self) -> Result<usize> {
        let backend = self.backend.as_mut().ok_or(UartError::InvalidDevice)?;
        logged(&self.path, backend.bytes_available())
    }
}

impl<B: Backend> fmt::Debug for Uart<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uart")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("baud", &self.baud)
            .field("settings", &self.settings.to_option_string())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
