// libuart/src/uart/validate.rs
//
// Pure predicates for semantic line parameters. Nothing here touches the OS;
// callers reject invalid values before any backend call.

use super::types::{FlowControl, Parity};

/// Legal baud rates for the POSIX termios backend.
#[cfg(unix)]
pub const BAUD_RATES: &[u32] = &[
    0, 50, 75, 110, 134, 150, 200, 300, 600, 1_200, 1_800, 2_400, 4_800, 9_600, 19_200, 38_400,
    57_600, 115_200, 230_400, 460_800, 500_000, 576_000, 921_600, 1_000_000, 1_152_000,
    1_500_000, 2_000_000, 2_500_000, 3_000_000, 3_500_000, 4_000_000,
];

/// Legal baud rates for the Windows DCB backend.
#[cfg(windows)]
pub const BAUD_RATES: &[u32] = &[
    110, 300, 600, 1_200, 2_400, 4_800, 9_600, 14_400, 19_200, 38_400, 57_600, 115_200, 128_000,
    256_000,
];

/// Exact membership in the backend's enumerated rate set. No range check.
pub fn is_baud_valid(baud: u32) -> bool {
    BAUD_RATES.contains(&baud)
}

pub fn is_data_bits_valid(data_bits: u8) -> bool {
    (5..=8).contains(&data_bits)
}

pub fn is_stop_bits_valid(stop_bits: u8) -> bool {
    stop_bits == 1 || stop_bits == 2
}

/// Decode the C API parity code. `None` for anything outside {0, 1, 2}.
pub fn parity_from_code(code: u8) -> Option<Parity> {
    match code {
        0 => Some(Parity::None),
        1 => Some(Parity::Odd),
        2 => Some(Parity::Even),
        _ => None,
    }
}

pub fn is_parity_valid(code: u8) -> bool {
    parity_from_code(code).is_some()
}

/// Decode the C API flow-control code. `None` for anything outside {0, 1, 2}.
pub fn flow_control_from_code(code: u8) -> Option<FlowControl> {
    match code {
        0 => Some(FlowControl::None),
        1 => Some(FlowControl::Software),
        2 => Some(FlowControl::Hardware),
        _ => None,
    }
}

pub fn is_flow_control_valid(code: u8) -> bool {
    flow_control_from_code(code).is_some()
}

// ============================================================================
// Tests
// ============================================================================
