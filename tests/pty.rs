// libuart/tests/pty.rs
//
// End-to-end checks of the termios backend against a pseudo-terminal pair.
// The slave side is opened through `Uart`; the test drives the master side
// directly. Pseudo-terminals have no modem lines, so pins are not covered,
// and some kernels only accept CS8 on a pty, so byte size stays at 8.

#![cfg(target_os = "linux")]

use std::ffi::CStr;
use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::io::FromRawFd;
use std::thread;
use std::time::{Duration, Instant};

use libuart::{FlowControl, Parity, Transfer, Uart, UartError};

struct Pty {
    master: File,
    slave_path: String,
}

fn open_pty() -> Pty {
    unsafe {
        let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
        assert!(fd >= 0, "posix_openpt failed");
        assert_eq!(libc::grantpt(fd), 0);
        assert_eq!(libc::unlockpt(fd), 0);

        let mut name = [0 as libc::c_char; 128];
        assert_eq!(libc::ptsname_r(fd, name.as_mut_ptr(), name.len()), 0);
        let slave_path = CStr::from_ptr(name.as_ptr()).to_str().unwrap().to_string();

        Pty {
            master: File::from_raw_fd(fd),
            slave_path,
        }
    }
}

fn termios_of(uart: &Uart) -> libc::termios {
    let fd = uart.raw_fd().unwrap();
    unsafe {
        let mut options: libc::termios = std::mem::zeroed();
        assert_eq!(libc::tcgetattr(fd, &mut options), 0);
        options
    }
}

/// Poll until `want` bytes are queued or a second has passed.
fn wait_for(uart: &mut Uart, want: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        let available = uart.bytes_available().unwrap();
        if available >= want || Instant::now() > deadline {
            return available;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_open_applies_option_string() {
    let pty = open_pty();
    let uart = Uart::open(&pty.slave_path, 115_200, "8E2S").unwrap();

    assert!(uart.is_open());
    assert_eq!(uart.path(), pty.slave_path);
    assert_eq!(uart.baud(), 115_200);
    assert_eq!(uart.data_bits(), 8);
    assert_eq!(uart.parity(), Parity::Even);
    assert_eq!(uart.stop_bits(), 2);
    assert_eq!(uart.flow_control(), FlowControl::Software);

    let options = termios_of(&uart);
    assert_eq!(options.c_cflag & libc::CSIZE, libc::CS8);
    assert_ne!(options.c_cflag & libc::PARENB, 0);
    assert_eq!(options.c_cflag & libc::PARODD, 0);
    assert_ne!(options.c_cflag & libc::CSTOPB, 0);
    assert_ne!(options.c_iflag & libc::IXON, 0);
    assert_eq!(options.c_lflag & (libc::ICANON | libc::ECHO), 0);
}

#[test]
fn test_open_missing_device() {
    let err = Uart::open("/dev/libuart-no-such-tty", 9_600, "8N1N").unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
}

#[test]
fn test_close_releases_handle() {
    let pty = open_pty();
    let mut uart = Uart::open(&pty.slave_path, 9_600, "8N1N").unwrap();
    assert!(uart.raw_fd().is_some());

    uart.close();
    assert!(uart.raw_fd().is_none());
    assert!(matches!(uart.send(b"x"), Err(UartError::InvalidDevice)));
    uart.close();
}

// ============================================================================
// Transfer
// ============================================================================

#[test]
fn test_receive_from_master() {
    let mut pty = open_pty();
    let mut uart = Uart::open(&pty.slave_path, 9_600, "8N1N").unwrap();

    pty.master.write_all(b"ping").unwrap();
    assert_eq!(wait_for(&mut uart, 4), 4);

    let mut buf = [0u8; 4];
    assert_eq!(uart.receive(&mut buf).unwrap(), Transfer::Complete(4));
    assert_eq!(&buf, b"ping");
}

#[test]
fn test_send_to_master() {
    let mut pty = open_pty();
    let mut uart = Uart::open(&pty.slave_path, 9_600, "8N1N").unwrap();

    assert_eq!(uart.send_str("Hello World!").unwrap(), Transfer::Complete(12));

    let mut buf = [0u8; 12];
    pty.master.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"Hello World!");
}

#[test]
fn test_receive_nothing_queued() {
    let pty = open_pty();
    let mut uart = Uart::open(&pty.slave_path, 9_600, "8N1N").unwrap();

    assert_eq!(uart.bytes_available().unwrap(), 0);
    let mut buf = [0u8; 8];
    let transfer = uart.receive(&mut buf).unwrap();
    assert_eq!(transfer, Transfer::Partial { transferred: 0, requested: 8 });
}

#[test]
fn test_receive_larger_buffer_is_partial() {
    let mut pty = open_pty();
    let mut uart = Uart::open(&pty.slave_path, 9_600, "8N1N").unwrap();

    pty.master.write_all(b"ab").unwrap();
    wait_for(&mut uart, 2);

    let mut buf = [0u8; 16];
    let transfer = uart.receive(&mut buf).unwrap();
    assert_eq!(transfer.count(), 2);
    assert!(!transfer.is_complete());
    assert_eq!(&buf[..2], b"ab");
}

// ============================================================================
// Setters
// ============================================================================

#[test]
fn test_setters_round_trip() {
    let pty = open_pty();
    let mut uart = Uart::open(&pty.slave_path, 9_600, "8N1N").unwrap();

    uart.set_baud(57_600).unwrap();
    uart.set_data_bits(8).unwrap();
    uart.set_parity(Parity::Odd).unwrap();
    uart.set_stop_bits(2).unwrap();
    uart.set_flow_control(FlowControl::Software).unwrap();

    assert_eq!(uart.baud(), 57_600);
    assert_eq!(uart.settings().to_option_string(), "8O2S");

    let options = termios_of(&uart);
    assert_eq!(options.c_cflag & libc::CSIZE, libc::CS8);
    assert_ne!(options.c_cflag & libc::PARODD, 0);
    assert_ne!(options.c_cflag & libc::CSTOPB, 0);

    uart.set_flow_control(FlowControl::None).unwrap();
    let options = termios_of(&uart);
    assert_eq!(options.c_iflag & (libc::IXON | libc::IXOFF | libc::IXANY), 0);
}

#[test]
fn test_rejected_setter_leaves_device_alone() {
    let pty = open_pty();
    let mut uart = Uart::open(&pty.slave_path, 9_600, "8N1N").unwrap();
    let before = termios_of(&uart);

    assert!(matches!(uart.set_data_bits(9), Err(UartError::InvalidDataBits(9))));
    assert!(matches!(uart.set_baud(12_345), Err(UartError::InvalidBaud(12_345))));

    let after = termios_of(&uart);
    assert_eq!(before.c_cflag, after.c_cflag);
    assert_eq!(uart.data_bits(), 8);
    assert_eq!(uart.baud(), 9_600);
}
