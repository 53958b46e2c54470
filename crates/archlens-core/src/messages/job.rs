//! Work item handed from the API tier to the analysis worker.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::id::{AnalysisId, JobId, UserId};

/// Where the worker fetches the code to analyze from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Clone a public GitHub repository from `repo_url`.
    #[default]
    Github,
    /// Use a previously uploaded archive identified by `upload_id`.
    Upload,
}

impl SourceType {
    /// Wire representation of the source type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Upload => "upload",
        }
    }
}

/// One queued analysis request.
///
/// Created once by the API tier when the analysis job record is committed and
/// never mutated afterwards. Queue position is the only ordering signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Job record identifier.
    pub job_id: JobId,
    /// Analysis record the job belongs to.
    pub analysis_id: AnalysisId,
    /// Owner of the analysis; progress is delivered to this user.
    pub user_id: UserId,
    /// Source kind; selects which of the location fields is populated.
    #[serde(default)]
    pub source_type: SourceType,
    /// Repository URL (GitHub sources).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Upload identifier (upload sources).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    /// File inside the upload where analysis starts (upload sources).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_file: Option<String>,
    /// Fully qualified struct the call graph is rooted at.
    pub start_struct: String,
    /// Traversal depth, already bounded by the user's subscription tier.
    pub depth: i32,
    /// Model used for the AI analysis step.
    pub model_name: String,
}

impl JobMessage {
    /// Check that the populated location fields match the source type.
    pub fn validate(&self) -> AppResult<()> {
        let has = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());

        match self.source_type {
            SourceType::Github => {
                if !has(&self.repo_url) {
                    return Err(AppError::validation("github job requires repo_url"));
                }
                if self.upload_id.is_some() || self.start_file.is_some() {
                    return Err(AppError::validation(
                        "github job must not carry upload_id or start_file",
                    ));
                }
            }
            SourceType::Upload => {
                if !has(&self.upload_id) {
                    return Err(AppError::validation("upload job requires upload_id"));
                }
                if self.repo_url.is_some() {
                    return Err(AppError::validation("upload job must not carry repo_url"));
                }
            }
        }

        if self.start_struct.trim().is_empty() {
            return Err(AppError::validation("start_struct must not be empty"));
        }
        if self.depth < 1 {
            return Err(AppError::validation(format!(
                "depth must be positive, got {}",
                self.depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_job() -> JobMessage {
        JobMessage {
            job_id: JobId(42),
            analysis_id: AnalysisId(200),
            user_id: UserId(20),
            source_type: SourceType::Github,
            repo_url: Some("https://github.com/test/repo".to_string()),
            upload_id: None,
            start_file: None,
            start_struct: "pkg.Struct".to_string(),
            depth: 5,
            model_name: "claude-3".to_string(),
        }
    }

    #[test]
    fn test_roundtrip_preserves_every_field() {
        let upload = JobMessage {
            source_type: SourceType::Upload,
            repo_url: None,
            upload_id: Some("u-123".to_string()),
            start_file: Some("cmd/main.go".to_string()),
            ..github_job()
        };

        for job in [github_job(), upload] {
            let json = serde_json::to_string(&job).unwrap();
            let parsed: JobMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, job);
        }
    }

    #[test]
    fn test_wire_format_is_snake_case_and_omits_unused_location() {
        let value = serde_json::to_value(github_job()).unwrap();
        assert_eq!(value["job_id"], 42);
        assert_eq!(value["analysis_id"], 200);
        assert_eq!(value["user_id"], 20);
        assert_eq!(value["source_type"], "github");
        assert!(value.get("upload_id").is_none());
        assert!(value.get("start_file").is_none());
    }

    #[test]
    fn test_missing_source_type_defaults_to_github() {
        let json = r#"{"job_id":1,"analysis_id":2,"user_id":3,
            "repo_url":"https://github.com/a/b","start_struct":"main.App",
            "depth":3,"model_name":"m"}"#;
        let job: JobMessage = serde_json::from_str(json).unwrap();
        assert_eq!(job.source_type, SourceType::Github);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_source() {
        let mut job = github_job();
        job.repo_url = None;
        assert!(job.validate().is_err());

        let mut job = github_job();
        job.source_type = SourceType::Upload;
        assert!(job.validate().is_err());

        let mut job = github_job();
        job.depth = 0;
        assert!(job.validate().is_err());
    }
}
