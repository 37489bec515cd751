//! Transport Stream (TS) parsing for MPEG-2 Transport Stream data
//!
//! This crate provides packet-level parsing of 188-byte MPEG-TS units,
//! adaptation field and discontinuity-indicator handling, PID
//! classification, continuity-counter validation, and frame-boundary
//! tagging for live segment processing.

pub mod adaptation_field;
pub mod error;
pub mod packet;
pub mod pid;
pub mod processor;

pub use adaptation_field::{AdaptationField, Pcr};
pub use error::TsError;
pub use packet::{
    ContinuityStatus, PACKET_SIZE, PID_CAT, PID_EIT, PID_NIT, PID_NULL, PID_PAT, PID_SDT, PID_TDT,
    TsPacket,
};
pub use pid::PidCategory;
pub use processor::{FrameTag, PidCounters, ProcessorStats, SegmentProcessor, TaggedPacket};

/// Result type for TS parsing operations
pub type Result<T> = std::result::Result<T, TsError>;
