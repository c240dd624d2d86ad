//! Installation of the external DgVoodoo2 wrapper DLLs into the emulator's working directory.
//!
//! The wrapper files are copied at most once per process, on the first device init, and removed
//! again on every device close. Missing source files and failed copies are not errors: whatever
//! could be installed is installed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DeviceConfig;

/// One optional external wrapper component, in installation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperComponent {
    /// Legacy 2D API.
    DDraw,
    /// Immediate-mode 3D API.
    D3DImm,
    D3D8,
    D3D9,
}

impl WrapperComponent {
    pub const ALL: [Self; 4] = [Self::DDraw, Self::D3DImm, Self::D3D8, Self::D3D9];

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::DDraw => "DDraw.dll",
            Self::D3DImm => "D3DImm.dll",
            Self::D3D8 => "D3D8.dll",
            Self::D3D9 => "D3D9.dll",
        }
    }

    pub fn is_enabled(self, config: &DeviceConfig) -> bool {
        match self {
            Self::DDraw => config.ddraw_enabled,
            Self::D3DImm => config.d3dimm_enabled,
            Self::D3D8 => config.d3d8_enabled,
            Self::D3D9 => config.d3d9_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperInstallState {
    NotInstalled,
    Installed,
}

/// Process-lifetime owner of the wrapper files in the working directory.
///
/// Construct one at startup and hand it to every device init/close. The install marker survives
/// device resets; only a fresh manager (i.e. a new process) installs again.
#[derive(Debug)]
pub struct WrapperManager {
    working_dir: PathBuf,
    state: WrapperInstallState,
}

impl WrapperManager {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            state: WrapperInstallState::NotInstalled,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn state(&self) -> WrapperInstallState {
        self.state
    }

    pub fn installed_path(&self, component: WrapperComponent) -> PathBuf {
        self.working_dir.join(component.file_name())
    }

    /// Copies the enabled wrapper files on the first call; later calls do nothing.
    ///
    /// Returns the components copied by this call.
    pub fn install_once(&mut self, config: &DeviceConfig) -> Vec<WrapperComponent> {
        if self.state == WrapperInstallState::Installed {
            return Vec::new();
        }
        self.state = WrapperInstallState::Installed;

        // Drop leftovers from a previous run before copying fresh files.
        self.remove_installed();

        if !config.enabled || config.path.is_empty() {
            return Vec::new();
        }

        let source_dir = Path::new(&config.path);
        let mut installed = Vec::new();
        for component in WrapperComponent::ALL {
            if !component.is_enabled(config) {
                continue;
            }
            let src = source_dir.join(component.file_name());
            if !src.exists() {
                tracing::debug!(src = %src.display(), "wrapper file not found; skipping");
                continue;
            }
            let dst = self.installed_path(component);
            match fs::copy(&src, &dst) {
                Ok(_) => {
                    tracing::info!(file = component.file_name(), "installed wrapper file");
                    installed.push(component);
                }
                Err(err) => {
                    tracing::warn!(
                        src = %src.display(),
                        dst = %dst.display(),
                        "failed to copy wrapper file: {err}"
                    );
                }
            }
        }
        installed
    }

    /// Deletes every wrapper file present in the working directory.
    ///
    /// Returns the components that were removed; absent files are skipped.
    pub fn remove_installed(&self) -> Vec<WrapperComponent> {
        let mut removed = Vec::new();
        for component in WrapperComponent::ALL {
            let path = self.installed_path(component);
            if !path.exists() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed.push(component),
                Err(err) => {
                    tracing::warn!(path = %path.display(), "failed to remove wrapper file: {err}");
                }
            }
        }
        removed
    }
}
