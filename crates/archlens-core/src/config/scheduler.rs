//! Background scheduler configuration.

use serde::{Deserialize, Serialize};

/// Quota reset and temp-resource cleanup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduled jobs run in this process.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds, UTC) of the daily quota reset.
    #[serde(default = "default_quota_reset_schedule")]
    pub quota_reset_schedule: String,
    /// Cron expression (with seconds, UTC) of the cleanup sweeps.
    #[serde(default = "default_cleanup_schedule")]
    pub cleanup_schedule: String,
    /// Age in hours after which upload and clone temp directories expire.
    #[serde(default = "default_temp_expiry")]
    pub temp_expiry_hours: u64,
    /// Directory holding one subdirectory per upload.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Subdirectory of `upload_dir` that is never swept.
    #[serde(default = "default_reserved_upload_subdir")]
    pub reserved_upload_subdir: String,
    /// Directory in which the worker creates clone directories.
    #[serde(default = "default_clone_dir")]
    pub clone_dir: String,
    /// Name prefix identifying clone directories.
    #[serde(default = "default_clone_prefix")]
    pub clone_prefix: String,
    /// Directory of locally cached diagrams, named `<analysis_id>.<ext>`.
    #[serde(default = "default_diagram_dir")]
    pub diagram_dir: String,
    /// File extensions a cached diagram may have.
    #[serde(default = "default_diagram_extensions")]
    pub diagram_extensions: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quota_reset_schedule: default_quota_reset_schedule(),
            cleanup_schedule: default_cleanup_schedule(),
            temp_expiry_hours: default_temp_expiry(),
            upload_dir: default_upload_dir(),
            reserved_upload_subdir: default_reserved_upload_subdir(),
            clone_dir: default_clone_dir(),
            clone_prefix: default_clone_prefix(),
            diagram_dir: default_diagram_dir(),
            diagram_extensions: default_diagram_extensions(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_quota_reset_schedule() -> String {
    "0 0 0 * * *".to_string()
}

fn default_cleanup_schedule() -> String {
    "0 0 * * * *".to_string()
}

fn default_temp_expiry() -> u64 {
    24
}

fn default_upload_dir() -> String {
    "data/uploads".to_string()
}

fn default_reserved_upload_subdir() -> String {
    "diagrams".to_string()
}

fn default_clone_dir() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

fn default_clone_prefix() -> String {
    "archlens-clone-".to_string()
}

fn default_diagram_dir() -> String {
    "data/uploads/diagrams".to_string()
}

fn default_diagram_extensions() -> Vec<String> {
    vec!["svg".to_string(), "png".to_string()]
}
