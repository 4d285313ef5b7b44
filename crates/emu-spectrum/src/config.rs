//! Spectrum model configuration.

use std::fmt;

use sinclair_ula::{TimingError, TimingParams};

use crate::memory::{BANK_SIZE, MemoryLayout};

/// Supported Spectrum models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumModel {
    Spectrum48K,
    Spectrum128K,
    SpectrumPlus3,
    SpectrumNext,
}

impl SpectrumModel {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Spectrum48K => "48K",
            Self::Spectrum128K => "128K",
            Self::SpectrumPlus3 => "+3",
            Self::SpectrumNext => "Next",
        }
    }

    #[must_use]
    pub fn timing(self) -> TimingParams {
        match self {
            Self::Spectrum48K => TimingParams::spectrum_48k(),
            _ => TimingParams::spectrum_128k(),
        }
    }

    #[must_use]
    pub fn memory_layout(self) -> MemoryLayout {
        match self {
            Self::Spectrum48K => MemoryLayout::spectrum_48k(),
            Self::Spectrum128K => MemoryLayout::spectrum_128k(),
            Self::SpectrumPlus3 => MemoryLayout::spectrum_plus3(),
            Self::SpectrumNext => MemoryLayout::spectrum_next(),
        }
    }

    /// Nominal CPU clock in Hz.
    #[must_use]
    pub fn cpu_frequency(self) -> u32 {
        match self {
            Self::Spectrum48K | Self::SpectrumNext => 3_500_000,
            Self::Spectrum128K | Self::SpectrumPlus3 => 3_546_900,
        }
    }
}

/// Which ULA revision drives bit 6 of port $FE when no tape is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UlaIssue {
    /// Echoes EAR or MIC output.
    Two,
    /// Echoes EAR output only.
    #[default]
    Three,
}

/// Configuration for creating a Spectrum instance.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    pub model: SpectrumModel,
    /// One 16,384-byte image per ROM the model has (1, 2, 4, 4).
    pub roms: Vec<Vec<u8>>,
    pub ula_issue: UlaIssue,
    /// CPU clock in Hz; sets the FLASH rate.
    pub cpu_frequency: u32,
    /// Override the model's screen timing.
    pub timing: Option<TimingParams>,
    /// Fit a Kempston joystick interface on port $1F.
    pub kempston: bool,
}

impl SpectrumConfig {
    /// Default settings for `model` with the given ROM images.
    #[must_use]
    pub fn new(model: SpectrumModel, roms: Vec<Vec<u8>>) -> Self {
        Self {
            model,
            roms,
            ula_issue: UlaIssue::default(),
            cpu_frequency: model.cpu_frequency(),
            timing: None,
            kempston: false,
        }
    }

    /// Check ROM images against the model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let expected = self.model.memory_layout().rom_count;
        if self.roms.len() != expected {
            return Err(ConfigError::RomCount {
                model: self.model,
                expected,
                found: self.roms.len(),
            });
        }
        if let Some((index, rom)) = self
            .roms
            .iter()
            .enumerate()
            .find(|(_, rom)| rom.len() != BANK_SIZE)
        {
            return Err(ConfigError::RomSize {
                index,
                found: rom.len(),
            });
        }
        if self.cpu_frequency == 0 {
            return Err(ConfigError::CpuFrequency);
        }
        Ok(())
    }
}

/// Why a machine could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    RomCount {
        model: SpectrumModel,
        expected: usize,
        found: usize,
    },
    RomSize {
        index: usize,
        found: usize,
    },
    CpuFrequency,
    Timing(TimingError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomCount {
                model,
                expected,
                found,
            } => write!(
                f,
                "Spectrum {} needs {expected} ROM images, got {found}",
                model.name()
            ),
            Self::RomSize { index, found } => {
                write!(f, "ROM {index} must be exactly 16384 bytes, got {found}")
            }
            Self::CpuFrequency => write!(f, "CPU frequency must be non-zero"),
            Self::Timing(e) => write!(f, "invalid screen timing: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timing(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TimingError> for ConfigError {
    fn from(e: TimingError) -> Self {
        Self::Timing(e)
    }
}
