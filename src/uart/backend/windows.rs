// libuart/src/uart/backend/windows.rs
//
// Windows communications-API backend.
//
// Line parameters map onto DCB fields; every apply step is a
// GetCommState / modify / SetCommState round trip. The handle is opened
// for exclusive synchronous read/write access, and read timeouts are set so
// ReadFile returns immediately with whatever is queued.

use std::ffi::OsStr;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle, RawHandle};
use std::ptr;

use windows_sys::Win32::Devices::Communication::{
    ClearCommError, EscapeCommFunction, GetCommModemStatus, GetCommState, SetCommState,
    SetCommTimeouts, CBR_110, CBR_115200, CBR_1200, CBR_128000, CBR_14400, CBR_19200,
    CBR_2400, CBR_256000, CBR_300, CBR_38400, CBR_4800, CBR_57600, CBR_600, CBR_9600,
    CLRDTR, CLRRTS, COMMTIMEOUTS, COMSTAT, DCB, EVENPARITY, MS_CTS_ON, MS_DSR_ON, MS_RING_ON,
    MS_RLSD_ON, NOPARITY, ODDPARITY, ONESTOPBIT, SETDTR, SETRTS, TWOSTOPBITS,
};
use windows_sys::Win32::Foundation::{
    GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{CreateFileW, ReadFile, WriteFile, OPEN_EXISTING};

use super::{lookup_baud, Backend, OutputLevels};
use crate::error::{Result, UartError};
use crate::uart::types::{FlowControl, Parity, Pin, PinState};

// ============================================================================
// Baud Table
// ============================================================================

/// Semantic rate to native `CBR_*` token.
pub(crate) const BAUD_TABLE: &[(u32, u32)] = &[
    (110, CBR_110),
    (300, CBR_300),
    (600, CBR_600),
    (1_200, CBR_1200),
    (2_400, CBR_2400),
    (4_800, CBR_4800),
    (9_600, CBR_9600),
    (14_400, CBR_14400),
    (19_200, CBR_19200),
    (38_400, CBR_38400),
    (57_600, CBR_57600),
    (115_200, CBR_115200),
    (128_000, CBR_128000),
    (256_000, CBR_256000),
];

// ============================================================================
// DCB Bitfield
// ============================================================================

// Layout of DCB._bitfield (winbase.h)
const F_PARITY: u32 = 1 << 1;
const F_OUTX_CTS_FLOW: u32 = 1 << 2;
const F_OUTX_DSR_FLOW: u32 = 1 << 3;
const F_DTR_CONTROL_SHIFT: u32 = 4;
const F_OUT_X: u32 = 1 << 8;
const F_IN_X: u32 = 1 << 9;
const F_RTS_CONTROL_SHIFT: u32 = 12;
const TWO_BIT_MASK: u32 = 0b11;

const DTR_CONTROL_DISABLE: u32 = 0x00;
const DTR_CONTROL_ENABLE: u32 = 0x01;
const RTS_CONTROL_DISABLE: u32 = 0x00;
const RTS_CONTROL_ENABLE: u32 = 0x01;

fn set_flag(bits: &mut u32, flag: u32, on: bool) {
    if on {
        *bits |= flag;
    } else {
        *bits &= !flag;
    }
}

fn set_field(bits: &mut u32, shift: u32, value: u32) {
    *bits &= !(TWO_BIT_MASK << shift);
    *bits |= (value & TWO_BIT_MASK) << shift;
}

fn field(bits: u32, shift: u32) -> u32 {
    (bits >> shift) & TWO_BIT_MASK
}

// ============================================================================
// DCB Field Mapping
// ============================================================================

pub(crate) fn set_speed(dcb: &mut DCB, baud: u32) -> Result<()> {
    dcb.BaudRate = lookup_baud(BAUD_TABLE, baud).ok_or(UartError::UnmappedBaud(baud))?;
    Ok(())
}

pub(crate) fn set_data_bits(dcb: &mut DCB, data_bits: u8) -> Result<()> {
    match data_bits {
        5..=8 => dcb.ByteSize = data_bits,
        other => return Err(UartError::InvalidDataBits(other)),
    }
    Ok(())
}

pub(crate) fn set_parity(dcb: &mut DCB, parity: Parity) {
    dcb.Parity = match parity {
        Parity::None => NOPARITY,
        Parity::Odd => ODDPARITY,
        Parity::Even => EVENPARITY,
    };
    set_flag(&mut dcb._bitfield, F_PARITY, parity != Parity::None);
}

pub(crate) fn set_stop_bits(dcb: &mut DCB, stop_bits: u8) -> Result<()> {
    dcb.StopBits = match stop_bits {
        1 => ONESTOPBIT,
        2 => TWOSTOPBITS,
        other => return Err(UartError::InvalidStopBits(other)),
    };
    Ok(())
}

pub(crate) fn set_flow_control(dcb: &mut DCB, flow_control: FlowControl) {
    let hardware = flow_control == FlowControl::Hardware;
    let software = flow_control == FlowControl::Software;
    let bits = &mut dcb._bitfield;

    // RTS/CTS only, matching CRTSCTS on termios
    set_flag(bits, F_OUTX_CTS_FLOW, hardware);
    set_flag(bits, F_OUTX_DSR_FLOW, false);
    set_field(
        bits,
        F_DTR_CONTROL_SHIFT,
        if hardware { DTR_CONTROL_ENABLE } else { DTR_CONTROL_DISABLE },
    );
    set_field(
        bits,
        F_RTS_CONTROL_SHIFT,
        if hardware { RTS_CONTROL_ENABLE } else { RTS_CONTROL_DISABLE },
    );
    set_flag(bits, F_OUT_X, software);
    set_flag(bits, F_IN_X, software);
}

/// Output line levels implied by the DCB's DTR/RTS control fields.
fn output_levels(dcb: &DCB) -> OutputLevels {
    let rts = field(dcb._bitfield, F_RTS_CONTROL_SHIFT) == RTS_CONTROL_ENABLE;
    let dtr = field(dcb._bitfield, F_DTR_CONTROL_SHIFT) == DTR_CONTROL_ENABLE;
    OutputLevels {
        rts: PinState::from(rts),
        dtr: PinState::from(dtr),
    }
}

/// EscapeCommFunction code that drives `pin` to `state`.
fn escape_function(pin: Pin, state: PinState) -> Result<u32> {
    match (pin, state) {
        (Pin::Rts, PinState::High) => Ok(SETRTS),
        (Pin::Rts, PinState::Low) => Ok(CLRRTS),
        (Pin::Dtr, PinState::High) => Ok(SETDTR),
        (Pin::Dtr, PinState::Low) => Ok(CLRDTR),
        (other, _) => Err(UartError::InvalidPin(other)),
    }
}

/// ReadFile returns at once with whatever is buffered.
fn non_blocking_timeouts() -> COMMTIMEOUTS {
    COMMTIMEOUTS {
        ReadIntervalTimeout: u32::MAX,
        ReadTotalTimeoutMultiplier: 0,
        ReadTotalTimeoutConstant: 0,
        WriteTotalTimeoutMultiplier: 0,
        WriteTotalTimeoutConstant: 0,
    }
}

// ============================================================================
// Backend
// ============================================================================

/// DCB backed serial device. The handle closes when this drops.
#[derive(Debug)]
pub struct WindowsBackend {
    handle: OwnedHandle,
    /// GetCommModemStatus only reports inputs, so outputs are tracked here.
    outputs: OutputLevels,
}

impl WindowsBackend {
    /// Open `path` (e.g. `\\.\COM3`) for exclusive synchronous read/write.
    pub fn open(path: &str) -> Result<Self> {
        let wide: Vec<u16> = OsStr::new(path).encode_wide().chain(Some(0)).collect();

        let raw = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if raw == INVALID_HANDLE_VALUE {
            return Err(UartError::last_os("CreateFile"));
        }

        log::debug!("opened {}", path);
        Ok(WindowsBackend {
            handle: unsafe { OwnedHandle::from_raw_handle(raw as RawHandle) },
            outputs: OutputLevels::for_flow_control(FlowControl::None),
        })
    }

    fn raw(&self) -> HANDLE {
        self.handle.as_raw_handle() as HANDLE
    }

    fn comm_state(&self) -> Result<DCB> {
        let mut dcb: DCB = unsafe { mem::zeroed() };
        dcb.DCBlength = mem::size_of::<DCB>() as u32;
        if unsafe { GetCommState(self.raw(), &mut dcb) } == 0 {
            return Err(UartError::last_os("GetCommState"));
        }
        Ok(dcb)
    }

    /// Read-modify-write of the device control block.
    fn update<F>(&mut self, modify: F) -> Result<()>
    where
        F: FnOnce(&mut DCB) -> Result<()>,
    {
        let mut dcb = self.comm_state()?;
        modify(&mut dcb)?;
        if unsafe { SetCommState(self.raw(), &dcb) } == 0 {
            return Err(UartError::last_os("SetCommState"));
        }
        Ok(())
    }
}

impl AsRawHandle for WindowsBackend {
    fn as_raw_handle(&self) -> RawHandle {
        self.handle.as_raw_handle()
    }
}

impl Backend for WindowsBackend {
    fn prepare(&mut self) -> Result<()> {
        let timeouts = non_blocking_timeouts();
        if unsafe { SetCommTimeouts(self.raw(), &timeouts) } == 0 {
            return Err(UartError::last_os("SetCommTimeouts"));
        }

        self.outputs = output_levels(&self.comm_state()?);
        Ok(())
    }

    fn apply_baud(&mut self, baud: u32) -> Result<()> {
        self.update(|dcb| set_speed(dcb, baud))
    }

    fn apply_data_bits(&mut self, data_bits: u8) -> Result<()> {
        self.update(|dcb| set_data_bits(dcb, data_bits))
    }

    fn apply_parity(&mut self, parity: Parity) -> Result<()> {
        self.update(|dcb| {
            set_parity(dcb, parity);
            Ok(())
        })
    }

    fn apply_stop_bits(&mut self, stop_bits: u8) -> Result<()> {
        self.update(|dcb| set_stop_bits(dcb, stop_bits))
    }

    fn apply_flow_control(&mut self, flow_control: FlowControl) -> Result<()> {
        self.update(|dcb| {
            set_flow_control(dcb, flow_control);
            Ok(())
        })?;
        self.outputs = OutputLevels::for_flow_control(flow_control);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let len = data.len().min(u32::MAX as usize) as u32;
        let mut written: u32 = 0;
        if unsafe { WriteFile(self.raw(), data.as_ptr(), len, &mut written, ptr::null_mut()) } == 0 {
            return Err(UartError::last_os("WriteFile"));
        }
        Ok(written as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len().min(u32::MAX as usize) as u32;
        let mut read: u32 = 0;
        if unsafe { ReadFile(self.raw(), buf.as_mut_ptr(), len, &mut read, ptr::null_mut()) } == 0 {
            return Err(UartError::last_os("ReadFile"));
        }
        Ok(read as usize)
    }

    fn set_pin(&mut self, pin: Pin, state: PinState) -> Result<()> {
        let function = escape_function(pin, state)?;
        if unsafe { EscapeCommFunction(self.raw(), function) } == 0 {
            return Err(UartError::last_os("EscapeCommFunction"));
        }
        self.outputs = self.outputs.with_pin(pin, state);
        Ok(())
    }

    fn get_pin(&mut self, pin: Pin) -> Result<PinState> {
        if let Some(level) = self.outputs.level(pin) {
            return Ok(level);
        }

        let mask = match pin {
            Pin::Rts | Pin::Dtr => return Err(UartError::InvalidPin(pin)),
            Pin::Cts => MS_CTS_ON,
            Pin::Dsr => MS_DSR_ON,
            Pin::Dcd => MS_RLSD_ON,
            Pin::Ri => MS_RING_ON,
        };

        let mut status = 0;
        if unsafe { GetCommModemStatus(self.raw(), &mut status) } == 0 {
            return Err(UartError::last_os("GetCommModemStatus"));
        }
        Ok(PinState::from(status & mask != 0))
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let mut errors = 0;
        let mut stat: COMSTAT = unsafe { mem::zeroed() };
        if unsafe { ClearCommError(self.raw(), &mut errors, &mut stat) } == 0 {
            return Err(UartError::last_os("ClearCommError"));
        }
        Ok(stat.cbInQue as usize)
    }
}

// ============================================================================
// Tests
// ============================================================================
