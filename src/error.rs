use std::path::PathBuf;

use thiserror::Error;

use crate::bus::BusKind;

/// Failures reported by the host bus / memory subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("no free {kind} slot for video card")]
    NoFreeSlot { kind: BusKind },

    #[error("aperture 0x{base:x}+0x{size:x} overlaps an existing mapping")]
    ApertureConflict { base: u64, size: u64 },
}

/// Errors returned by device init.
///
/// Missing ROM images, unknown presets and missing wrapper files are recovered locally and never
/// show up here.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("host rejected device: {0}")]
    Host(#[from] HostError),
}

/// Errors reading or writing the persisted configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
