//! tracev3 header chunk
//!
//! The first chunk of every tracev3 file (tag 0x1000). Its 208 bytes of data
//! hold the mach timebase, the boot session and a few strings describing the
//! machine, the latter in four tagged sub-structures.

use super::error::{TraceV3Error, TraceV3Result};
use binrw::{BinRead, BinWrite};
use std::borrow::Cow;
use std::io::Cursor;
use uuid::Uuid;

/// Size of the header chunk data
pub const HEADER_CHUNK_SIZE: usize = 208;

/// Continuous time sub-structure tag
pub const CONTINUOUS_TIME_TAG: u32 = 0x6100;
/// System information sub-structure tag
pub const SYSTEM_INFO_TAG: u32 = 0x6101;
/// Generation sub-structure tag
pub const GENERATION_TAG: u32 = 0x6102;
/// Timezone sub-structure tag
pub const TIMEZONE_TAG: u32 = 0x6103;

/// Continuous time at the start of the file (0x6100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct ContinuousTimeInfo {
    /// Sub-structure tag
    pub tag: u32,
    /// Sub-structure data size (8)
    pub data_size: u32,
    /// Continuous time in mach ticks
    pub continuous_time: u64,
}

/// Build and hardware identification (0x6101)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct SystemInfo {
    /// Sub-structure tag
    pub tag: u32,
    /// Sub-structure data size (56)
    pub data_size: u32,
    /// Unknown, preserved verbatim
    pub unknown1: u32,
    /// Unknown, preserved verbatim
    pub unknown2: u32,
    /// OS build version, NUL padded (e.g. `22G90`)
    pub build_version: [u8; 16],
    /// Hardware model, NUL padded (e.g. `Mac14,2`)
    pub hardware_model: [u8; 32],
}

/// Boot session identification (0x6102)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct GenerationInfo {
    /// Sub-structure tag
    pub tag: u32,
    /// Sub-structure data size (24)
    pub data_size: u32,
    /// Boot UUID, big-endian
    #[br(map = Uuid::from_bytes)]
    #[bw(map = |uuid: &Uuid| *uuid.as_bytes())]
    pub boot_uuid: Uuid,
    /// PID of `logd`
    pub logd_pid: u32,
    /// Exit status of the previous `logd`
    pub logd_exit_status: u32,
}

/// Timezone of the machine (0x6103)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct TimezoneInfo {
    /// Sub-structure tag
    pub tag: u32,
    /// Sub-structure data size (48)
    pub data_size: u32,
    /// Timezone file path, NUL padded
    pub timezone_path: [u8; 48],
}

/// Header chunk data (208 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct HeaderChunk {
    /// Mach timebase numerator
    pub mach_time_numerator: u32,
    /// Mach timebase denominator
    pub mach_time_denominator: u32,
    /// Continuous time when the file was started
    pub continuous_time: u64,
    /// Wall clock seconds since the epoch when the file was started
    pub wall_time_seconds: u64,
    /// Unknown, preserved verbatim
    pub unknown1: u32,
    /// Timezone bias in minutes
    pub bias_minutes: u32,
    /// Non-zero when daylight saving time was in effect
    pub daylight_savings: u32,
    /// Header flags
    pub flags: u32,
    /// Continuous time sub-structure
    pub continuous: ContinuousTimeInfo,
    /// System information sub-structure
    pub system: SystemInfo,
    /// Generation sub-structure
    pub generation: GenerationInfo,
    /// Timezone sub-structure
    pub timezone: TimezoneInfo,
}

fn fixed_str(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

fn set_fixed<const N: usize>(field: &'static str, value: &str) -> TraceV3Result<[u8; N]> {
    // Leave room for at least one NUL
    if value.len() >= N {
        return Err(TraceV3Error::FieldOverflow {
            field,
            value: value.len(),
        });
    }
    let mut out = [0u8; N];
    out[..value.len()].copy_from_slice(value.as_bytes());
    Ok(out)
}

impl HeaderChunk {
    /// Create a header for a boot session with empty strings
    pub fn new(boot_uuid: Uuid) -> Self {
        Self {
            mach_time_numerator: 1,
            mach_time_denominator: 1,
            continuous_time: 0,
            wall_time_seconds: 0,
            unknown1: 0,
            bias_minutes: 0,
            daylight_savings: 0,
            flags: 0,
            continuous: ContinuousTimeInfo {
                tag: CONTINUOUS_TIME_TAG,
                data_size: 8,
                continuous_time: 0,
            },
            system: SystemInfo {
                tag: SYSTEM_INFO_TAG,
                data_size: 56,
                unknown1: 0,
                unknown2: 0,
                build_version: [0; 16],
                hardware_model: [0; 32],
            },
            generation: GenerationInfo {
                tag: GENERATION_TAG,
                data_size: 24,
                boot_uuid,
                logd_pid: 0,
                logd_exit_status: 0,
            },
            timezone: TimezoneInfo {
                tag: TIMEZONE_TAG,
                data_size: 48,
                timezone_path: [0; 48],
            },
        }
    }

    /// Set the OS build version string
    pub fn with_build_version(mut self, build_version: &str) -> TraceV3Result<Self> {
        self.system.build_version = set_fixed("build_version", build_version)?;
        Ok(self)
    }

    /// Set the hardware model string
    pub fn with_hardware_model(mut self, hardware_model: &str) -> TraceV3Result<Self> {
        self.system.hardware_model = set_fixed("hardware_model", hardware_model)?;
        Ok(self)
    }

    /// Set the timezone file path
    pub fn with_timezone_path(mut self, timezone_path: &str) -> TraceV3Result<Self> {
        self.timezone.timezone_path = set_fixed("timezone_path", timezone_path)?;
        Ok(self)
    }

    /// Parse header chunk data (without the chunk envelope)
    pub fn parse(data: &[u8]) -> TraceV3Result<Self> {
        if data.len() < HEADER_CHUNK_SIZE {
            return Err(TraceV3Error::DataTooShort {
                structure: "header chunk",
                actual: data.len(),
                minimum: HEADER_CHUNK_SIZE,
            });
        }
        let header = Self::read(&mut Cursor::new(&data[..HEADER_CHUNK_SIZE]))?;
        header.validate()?;
        Ok(header)
    }

    /// Check sub-structure tags and sizes
    pub fn validate(&self) -> TraceV3Result<()> {
        for (field, expected, actual) in [
            ("continuous time tag", CONTINUOUS_TIME_TAG, self.continuous.tag),
            ("continuous time size", 8, self.continuous.data_size),
            ("system info tag", SYSTEM_INFO_TAG, self.system.tag),
            ("system info size", 56, self.system.data_size),
            ("generation tag", GENERATION_TAG, self.generation.tag),
            ("generation size", 24, self.generation.data_size),
            ("timezone tag", TIMEZONE_TAG, self.timezone.tag),
            ("timezone size", 48, self.timezone.data_size),
        ] {
            if expected != actual {
                return Err(TraceV3Error::InvalidHeaderField {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Build header chunk data (without the chunk envelope)
    pub fn build(&self) -> TraceV3Result<Vec<u8>> {
        self.validate()?;
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_CHUNK_SIZE));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// OS build version
    pub fn build_version(&self) -> Cow<'_, str> {
        fixed_str(&self.system.build_version)
    }

    /// Hardware model
    pub fn hardware_model(&self) -> Cow<'_, str> {
        fixed_str(&self.system.hardware_model)
    }

    /// Timezone file path
    pub fn timezone_path(&self) -> Cow<'_, str> {
        fixed_str(&self.timezone.timezone_path)
    }

    /// Timezone name, the path relative to the zoneinfo directory
    pub fn timezone_name(&self) -> String {
        let path = self.timezone_path();
        path.split_once("/zoneinfo/")
            .map_or(&*path, |(_, name)| name)
            .to_string()
    }

    /// Boot UUID of the session that wrote the file
    pub fn boot_uuid(&self) -> Uuid {
        self.generation.boot_uuid
    }
}
