//! Shared runtime state for lom-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. All lab state and all
//! locking live in the [`Laboratory`]; this module only wires it up.

use std::sync::Arc;

use lom_config::LabSettings;
use lom_engine::{LabConfig, Laboratory};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub lab: Arc<Laboratory>,
    pub build: BuildInfo,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(LabConfig::default())
    }
}

impl AppState {
    pub fn new(config: LabConfig) -> Self {
        Self {
            lab: Arc::new(Laboratory::new(config)),
            build: BuildInfo {
                service: "lom-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }

    pub fn from_settings(settings: &LabSettings) -> Self {
        Self::new(lab_config(settings))
    }
}

/// The engine-facing subset of [`LabSettings`].
pub fn lab_config(settings: &LabSettings) -> LabConfig {
    LabConfig {
        page_size: settings.search.page_size,
        require_active_order: settings.transfer.require_active_order,
    }
}
