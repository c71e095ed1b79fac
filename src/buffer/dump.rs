//! Diagnostic dump of frame occupancy.

use std::fmt;

use crate::common::{FileId, FrameId, PageId};

use super::frame::FrameDescriptor;

/// State of one frame at the time of the dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub frame_id: FrameId,
    pub file: Option<FileId>,
    pub page: Option<PageId>,
    pub pin_count: u32,
    pub dirty: bool,
    pub referenced: bool,
    pub valid: bool,
}

impl From<&FrameDescriptor> for FrameSnapshot {
    fn from(desc: &FrameDescriptor) -> Self {
        Self {
            frame_id: desc.frame_id(),
            file: desc.file_id(),
            page: desc.page_id(),
            pin_count: desc.pin_count(),
            dirty: desc.is_dirty(),
            referenced: desc.is_referenced(),
            valid: desc.is_valid(),
        }
    }
}

/// Every frame of a pool plus the clock hand, for debugging.
///
/// The `Display` output is meant for humans; its format may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDump {
    pub frames: Vec<FrameSnapshot>,
    pub hand: FrameId,
}

impl PoolDump {
    /// Frames currently holding a page.
    pub fn resident(&self) -> impl Iterator<Item = &FrameSnapshot> {
        self.frames.iter().filter(|f| f.valid)
    }
}

impl fmt::Display for PoolDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buffer pool ({} frames, hand at {}):", self.frames.len(), self.hand.0)?;
        for frame in &self.frames {
            write!(f, "{}\t", frame.frame_id.0)?;
            match (frame.file, frame.page) {
                (Some(file), Some(page)) => write!(f, "{} {}", file, page)?,
                _ => write!(f, "-")?,
            }
            write!(f, "\tpin_count: {}", frame.pin_count)?;
            if frame.valid {
                write!(f, "\tvalid")?;
            }
            if frame.dirty {
                write!(f, "\tdirty")?;
            }
            if frame.referenced {
                write!(f, "\tref")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
