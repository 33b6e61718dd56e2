//! Display Module
//!
//! The panel driver seen through a narrow interface, plus panel geometry.
//!
//! Real drivers (SPI, GPIO, waveform tables) live outside this crate and
//! implement [`Display`]. [`FileDisplay`] stands in for a panel on a host by
//! writing every rendered frame to disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Panel resolution and pixel depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
}

impl PanelGeometry {
    /// 4.0" six-colour panel, 400x600 at 4 bits per pixel
    pub const EPD_4IN0E: PanelGeometry = PanelGeometry {
        width: 400,
        height: 600,
        bits_per_pixel: 4,
    };

    /// Bytes in one native frame; each row is padded to a whole byte
    pub const fn frame_bytes(&self) -> usize {
        let row_bits = self.width as usize * self.bits_per_pixel as usize;
        row_bits.div_ceil(8) * self.height as usize
    }
}

/// Panel driver entry points used by the sync loop
pub trait Display {
    /// Power up and initialise the panel
    fn init(&mut self) -> Result<()>;

    /// Push one native frame to the panel
    fn render(&mut self, frame: &[u8]) -> Result<()>;

    /// Put the panel into deep sleep
    fn sleep(&mut self) -> Result<()>;
}

/// Writes frames to `{dir}/frame.bin`, replacing the previous one
pub struct FileDisplay {
    dir: PathBuf,
    renders: u64,
    awake: bool,
}

impl FileDisplay {
    const FRAME_FILENAME: &'static str = "frame.bin";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            renders: 0,
            awake: false,
        }
    }

    /// Path of the most recently rendered frame
    pub fn frame_path(&self) -> PathBuf {
        self.dir.join(Self::FRAME_FILENAME)
    }

    /// Number of frames rendered so far
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Display for FileDisplay {
    fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.awake = true;
        tracing::debug!("File display ready at {}", self.dir.display());
        Ok(())
    }

    fn render(&mut self, frame: &[u8]) -> Result<()> {
        if !self.awake {
            return Err(SyncError::Display("render before init".to_string()));
        }

        // Write then rename so readers never see a half-written frame
        let tmp = self.dir.join(format!("{}.tmp", Self::FRAME_FILENAME));
        fs::write(&tmp, frame)?;
        fs::rename(&tmp, self.frame_path())?;

        self.renders += 1;
        tracing::debug!("Wrote {} byte frame to {}", frame.len(), self.frame_path().display());
        Ok(())
    }

    fn sleep(&mut self) -> Result<()> {
        self.awake = false;
        Ok(())
    }
}
