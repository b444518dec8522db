use agentpool_shared::types::{TaskClaims, TaskId};
use std::path::PathBuf;
use std::time::Duration;

/// Per-check and overall timeouts (spec §5: 120s per check, 300s total).
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub run_tests: bool,
    pub run_type_check: bool,
    pub check_timeout: Duration,
    pub total_timeout: Duration,
    /// Explicit override for test/type-check detection (spec §9 open
    /// question: detection is project-specific, implementers may need to
    /// supply an explicit command).
    pub test_command: Option<String>,
    pub type_check_command: Option<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            run_tests: false,
            run_type_check: false,
            check_timeout: Duration::from_secs(120),
            total_timeout: Duration::from_secs(300),
            test_command: None,
            type_check_command: None,
        }
    }
}

/// A `VerifyRequest` bundling the agent's claims, the working directory,
/// and the commit count observed before the task began (spec §4.D
/// "Input").
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub task_id: TaskId,
    pub working_dir: PathBuf,
    pub claims: TaskClaims,
    pub commit_count_before: u64,
    pub config: VerifyConfig,
}

pub struct VerifyRequestBuilder {
    task_id: TaskId,
    working_dir: PathBuf,
    claims: TaskClaims,
    commit_count_before: u64,
    config: VerifyConfig,
}

impl VerifyRequestBuilder {
    pub fn new(task_id: TaskId, working_dir: PathBuf, claims: TaskClaims) -> Self {
        Self {
            task_id,
            working_dir,
            claims,
            commit_count_before: 0,
            config: VerifyConfig::default(),
        }
    }

    pub fn commit_count_before(mut self, count: u64) -> Self {
        self.commit_count_before = count;
        self
    }

    pub fn config(mut self, config: VerifyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> VerifyRequest {
        VerifyRequest {
            task_id: self.task_id,
            working_dir: self.working_dir,
            claims: self.claims,
            commit_count_before: self.commit_count_before,
            config: self.config,
        }
    }
}
