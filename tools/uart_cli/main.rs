// libuart/tools/uart_cli/main.rs
//
// Small loopback-style diagnostic: open a device, send a message, wait,
// then report and print whatever came back. Optionally drives RTS/DTR and
// dumps every modem pin.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use libuart::{Pin, PinState, Uart, UartConfig, UartError};

#[cfg(unix)]
const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
#[cfg(windows)]
const DEFAULT_DEVICE: &str = r"\\.\COM3";

#[derive(Parser, Debug)]
#[command(name = "uart_cli", version, about = "Send and receive on a serial device")]
struct Args {
    /// Serial device path.
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    device: String,
    /// Baud rate.
    #[arg(short, long, default_value_t = 9_600)]
    baud: u32,
    /// Line settings, e.g. 8N1N or 7E2H.
    #[arg(short, long, default_value = "8N1N")]
    options: String,
    /// Load device, baud and options from a .toml or .json file instead.
    #[arg(short, long, conflicts_with_all = ["device", "baud", "options"])]
    config: Option<PathBuf>,
    /// Message to transmit.
    #[arg(short, long, default_value = "Hello World!")]
    message: String,
    /// Milliseconds to wait before reading.
    #[arg(short, long, default_value_t = 1_000)]
    wait_ms: u64,
    /// Drive RTS to this level (0 or 1) after opening.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    rts: Option<u8>,
    /// Drive DTR to this level (0 or 1) after opening.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    dtr: Option<u8>,
    /// Print the state of every modem pin.
    #[arg(long, default_value_t = false)]
    pins: bool,
    /// Log library activity to stderr.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn open(args: &Args) -> Result<Uart, UartError> {
    match args.config {
        Some(ref path) => UartConfig::load(path)?.open(),
        None => Uart::open(&args.device, args.baud, &args.options),
    }
}

fn run(args: &Args) -> Result<(), UartError> {
    let mut uart = open(args)?;
    println!(
        "{}: {} baud {}",
        uart.path(),
        uart.baud(),
        uart.settings().to_option_string()
    );

    if let Some(level) = args.rts {
        uart.set_pin(Pin::Rts, PinState::from(level == 1))?;
    }
    if let Some(level) = args.dtr {
        uart.set_pin(Pin::Dtr, PinState::from(level == 1))?;
    }

    let sent = uart.send_str(&args.message)?;
    println!("TX: {} byte(s)", sent.count());

    thread::sleep(Duration::from_millis(args.wait_ms));

    let available = uart.bytes_available()?;
    println!("RX: {} byte(s) available", available);
    if available > 0 {
        let mut buf = vec![0u8; available];
        let n = uart.receive(&mut buf)?.count();
        buf.truncate(n);
        println!("RX: {}", String::from_utf8_lossy(&buf));
        println!("RX hex: {}", hex::encode(&buf));
    }

    if args.pins {
        for pin in Pin::ALL {
            match uart.get_pin(pin) {
                Ok(state) => println!("{:?}: {}", pin, if state.is_high() { 1 } else { 0 }),
                Err(e) => println!("{:?}: unavailable ({})", pin, e),
            }
        }
    }

    uart.close();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        if let Err(e) = libuart::logging::init_logging(log::LevelFilter::Debug) {
            eprintln!("Failed to install logger: {}", e);
        }
    }

    println!("{} {}", libuart::LIB_NAME, libuart::LIB_VERSION);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
