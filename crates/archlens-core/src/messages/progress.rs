//! Progress events published by the worker and delivered to browsers.

use serde::{Deserialize, Serialize};

use crate::types::id::{AnalysisId, JobId, UserId};

/// Constant `type` discriminator carried by every progress event.
pub const PROGRESS_MESSAGE_TYPE: &str = "job_progress";

/// Milestones of an analysis job, in execution order.
///
/// Travels as its snake_case name. A name outside the table is kept
/// verbatim in [`Step::Other`] so newer workers can report steps this
/// build does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Step {
    /// Cloning the repository or unpacking the upload.
    Cloning,
    /// Parsing the project structure.
    Parsing,
    /// Running the AI analysis.
    Analyzing,
    /// Uploading result artifacts.
    Uploading,
    /// Finished.
    Done,
    /// A step name with no table entry.
    Other(String),
}

impl Step {
    /// Every known step in execution order.
    pub const ALL: [Step; 5] = [
        Step::Cloning,
        Step::Parsing,
        Step::Analyzing,
        Step::Uploading,
        Step::Done,
    ];

    /// Canonical progress percentage reached at this step.
    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Cloning => Some(20),
            Self::Parsing => Some(40),
            Self::Analyzing => Some(60),
            Self::Uploading => Some(80),
            Self::Done => Some(100),
            Self::Other(_) => None,
        }
    }

    /// Human-readable text shown to the user when none is supplied.
    pub fn default_message(&self) -> Option<&'static str> {
        match self {
            Self::Cloning => Some("正在克隆仓库"),
            Self::Parsing => Some("正在解析项目结构"),
            Self::Analyzing => Some("正在进行 AI 分析"),
            Self::Uploading => Some("正在上传结果"),
            Self::Done => Some("分析完成"),
            Self::Other(_) => None,
        }
    }

    /// Whether the step has a table entry.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Wire representation of the step.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cloning => "cloning",
            Self::Parsing => "parsing",
            Self::Analyzing => "analyzing",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Step {
    fn from(name: String) -> Self {
        match name.as_str() {
            "cloning" => Self::Cloning,
            "parsing" => Self::Parsing,
            "analyzing" => Self::Analyzing,
            "uploading" => Self::Uploading,
            "done" => Self::Done,
            _ => Self::Other(name),
        }
    }
}

impl From<Step> for String {
    fn from(step: Step) -> Self {
        match step {
            Step::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Job status reported alongside a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// The job is still running.
    #[default]
    Processing,
    /// The job finished successfully.
    Completed,
    /// The job failed; `error` carries the reason.
    Failed,
}

/// One progress event for an in-flight job.
///
/// Empty `message` and absent `error` are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// Always [`PROGRESS_MESSAGE_TYPE`].
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    /// Recipient of the event.
    pub user_id: UserId,
    /// Analysis the job belongs to.
    #[serde(default)]
    pub analysis_id: AnalysisId,
    /// Job the event describes.
    #[serde(default)]
    pub job_id: JobId,
    /// Job status.
    #[serde(default)]
    pub status: ProgressStatus,
    /// Milestone reached, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    /// Completion percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    /// Human-readable status line.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Failure reason, present only when `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_kind() -> String {
    PROGRESS_MESSAGE_TYPE.to_string()
}

impl Default for ProgressMessage {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            user_id: UserId::default(),
            analysis_id: AnalysisId::default(),
            job_id: JobId::default(),
            status: ProgressStatus::Processing,
            step: None,
            progress: 0,
            message: String::new(),
            error: None,
        }
    }
}

impl ProgressMessage {
    /// Event announcing that `job_id` reached `step`.
    ///
    /// Reaching [`Step::Done`] marks the job completed.
    pub fn step(user_id: UserId, analysis_id: AnalysisId, job_id: JobId, step: Step) -> Self {
        let status = if step == Step::Done {
            ProgressStatus::Completed
        } else {
            ProgressStatus::Processing
        };
        Self {
            user_id,
            analysis_id,
            job_id,
            status,
            step: Some(step),
            ..Self::default()
        }
    }

    /// Event announcing successful completion.
    pub fn completed(user_id: UserId, analysis_id: AnalysisId, job_id: JobId) -> Self {
        Self::step(user_id, analysis_id, job_id, Step::Done)
    }

    /// Event announcing a failure, keeping the step where it happened.
    pub fn failed(
        user_id: UserId,
        analysis_id: AnalysisId,
        job_id: JobId,
        step: Option<Step>,
        error: impl Into<String>,
    ) -> Self {
        let error = error.into();
        Self {
            user_id,
            analysis_id,
            job_id,
            status: ProgressStatus::Failed,
            progress: step.as_ref().and_then(Step::progress).unwrap_or(0),
            step,
            message: format!("分析失败: {error}"),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Fill `progress` and `message` from the step table when left unset.
    ///
    /// Explicit values are never overwritten and unknown steps are left
    /// alone. Also forces the `type` discriminator to its constant value.
    pub fn fill_defaults(&mut self) {
        self.kind = default_kind();
        let Some(step) = &self.step else {
            return;
        };
        if self.progress == 0 {
            if let Some(progress) = step.progress() {
                self.progress = progress;
            }
        }
        if self.message.is_empty() {
            if let Some(message) = step.default_message() {
                self.message = message.to_string();
            }
        }
    }
}
