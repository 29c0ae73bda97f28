//! 迁移与迁移目录

use std::collections::HashSet;

use nobal_errors::{AppError, AppResult};
use sha2::{Digest, Sha256};

use crate::step::Step;

/// 一个版本化的迁移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    /// snake_case 名称
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// 全部步骤 SQL 的 SHA-256
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                hasher.update(b"\n");
            }
            hasher.update(step.statement().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn validate(&self) -> AppResult<()> {
        if self.version <= 0 {
            return Err(AppError::validation(format!(
                "migration `{}` has non-positive version {}",
                self.name, self.version
            )));
        }
        let snake_case = self
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase())
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !snake_case {
            return Err(AppError::validation(format!(
                "migration {} name `{}` is not snake_case",
                self.version, self.name
            )));
        }
        if self.steps.is_empty() {
            return Err(AppError::validation(format!(
                "migration {} `{}` has no steps",
                self.version, self.name
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| {
                AppError::validation(format!(
                    "migration {} `{}` step {}: {}",
                    self.version,
                    self.name,
                    i + 1,
                    e
                ))
            })?;
        }
        Ok(())
    }
}

/// 按版本排序、已校验的迁移集合
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    migrations: Vec<Migration>,
}

impl Catalog {
    pub fn new(mut migrations: Vec<Migration>) -> AppResult<Self> {
        let mut versions = HashSet::new();
        let mut names = HashSet::new();
        for migration in &migrations {
            migration.validate()?;
            if !versions.insert(migration.version) {
                return Err(AppError::validation(format!(
                    "duplicate migration version {}",
                    migration.version
                )));
            }
            if !names.insert(migration.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate migration name `{}`",
                    migration.name
                )));
            }
        }
        migrations.sort_by_key(|m| m.version);
        Ok(Self { migrations })
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    pub fn latest_version(&self) -> Option<i64> {
        self.migrations.last().map(|m| m.version)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// 版本号不超过 target 的迁移，target 必须在目录中
    pub fn up_to(&self, target: Option<i64>) -> AppResult<&[Migration]> {
        match target {
            None => Ok(&self.migrations),
            Some(version) => {
                let idx = self
                    .migrations
                    .binary_search_by_key(&version, |m| m.version)
                    .map_err(|_| {
                        AppError::not_found(format!("migration version {} is not in the catalog", version))
                    })?;
                Ok(&self.migrations[..=idx])
            }
        }
    }
}
