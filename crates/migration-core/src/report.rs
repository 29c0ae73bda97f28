//! 迁移结果与状态

use chrono::{DateTime, Utc};
use nobal_errors::ErrorReport;
use nobal_ports::AppliedMigration;
use serde::Serialize;

/// 单个步骤的执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// 已执行
    Applied { rows_affected: u64 },
    /// 目标状态已满足，无需执行
    AlreadyPresent,
    /// 部分执行（外键因父表缺失被跳过）
    Degraded { reason: String },
}

impl StepOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::AlreadyPresent => "already present",
            Self::Degraded { .. } => "degraded",
        }
    }
}

/// 试运行时对单个步骤的判断
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    WillApply,
    AlreadyPresent,
    WillDegrade { reason: String },
    WillFail { reason: String },
}

impl PlannedAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WillApply => "will apply",
            Self::AlreadyPresent => "already present",
            Self::WillDegrade { .. } => "will degrade",
            Self::WillFail { .. } => "will fail",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub description: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// 一个已成功应用的迁移
#[derive(Debug, Clone, Serialize)]
pub struct AppliedReport {
    pub version: i64,
    pub name: String,
    pub steps: Vec<StepReport>,
    pub execution_ms: i64,
}

impl AppliedReport {
    pub fn degraded_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Degraded { .. }))
            .count()
    }
}

/// 迁移失败详情
#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    pub version: i64,
    pub name: String,
    /// 失败步骤的下标；None 表示步骤全部成功但登记台账失败
    pub step_index: Option<usize>,
    pub step: Option<String>,
    pub error: ErrorReport,
    /// 失败前已完成的步骤
    pub completed_steps: Vec<StepReport>,
}

/// 一次 migrate 的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub applied: Vec<AppliedReport>,
    /// 之前已应用、本次跳过的版本
    pub skipped: Vec<i64>,
    pub failure: Option<MigrationFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// 迁移状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    Applied {
        applied_at: DateTime<Utc>,
        baseline: bool,
    },
    Pending,
    Drifted {
        recorded: String,
        expected: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: String,
    #[serde(flatten)]
    pub state: MigrationState,
}

/// status 命令结果
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub ledger_exists: bool,
    pub migrations: Vec<MigrationStatus>,
    /// 台账中存在、目录中没有的版本
    pub unknown: Vec<AppliedMigration>,
}

impl StatusReport {
    pub fn pending_count(&self) -> usize {
        self.migrations
            .iter()
            .filter(|m| m.state == MigrationState::Pending)
            .count()
    }
}

/// 台账与目录不一致的情况
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drift {
    /// 已应用的迁移被修改过
    ChecksumMismatch {
        version: i64,
        name: String,
        recorded: String,
        expected: String,
    },
    /// 台账中的版本在目录里不存在
    UnknownVersion { version: i64, name: String },
    /// 待执行迁移的版本低于已应用的最高版本
    OutOfOrder {
        version: i64,
        name: String,
        latest_applied: i64,
    },
}

impl Drift {
    pub fn version(&self) -> i64 {
        match self {
            Self::ChecksumMismatch { version, .. }
            | Self::UnknownVersion { version, .. }
            | Self::OutOfOrder { version, .. } => *version,
        }
    }

    /// 是否会阻止 migrate
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub description: String,
    pub statement: String,
    #[serde(flatten)]
    pub action: PlannedAction,
}

/// plan 命令中的一个待执行迁移
#[derive(Debug, Clone, Serialize)]
pub struct PlannedMigration {
    pub version: i64,
    pub name: String,
    pub steps: Vec<PlannedStep>,
}

impl PlannedMigration {
    pub fn will_fail(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.action, PlannedAction::WillFail { .. }))
    }
}
