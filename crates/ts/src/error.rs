use thiserror::Error;

/// Errors produced while parsing Transport Stream data.
#[derive(Debug, Error)]
pub enum TsError {
    #[error("invalid packet size: {0} (expected 188)")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte: {0:#04x} (expected 0x47)")]
    InvalidSyncByte(u8),

    #[error("insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
}
