use crate::agents::AgentBaseline;
use crate::error::*;
use crate::leaderboard::ScoreEntry;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// 用户名长度上限
pub const USERNAME_MAX_LEN: usize = 24;

/// 排行榜用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// 排行榜时间范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardScope {
    /// 当天（UTC）
    Today,
    /// 最近 7 天
    Week,
}

impl Default for LeaderboardScope {
    fn default() -> Self {
        Self::Today
    }
}

impl LeaderboardScope {
    pub fn includes(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            LeaderboardScope::Today => at.date_naive() == now.date_naive(),
            LeaderboardScope::Week => at <= now && now - at < Duration::days(7),
        }
    }
}

/// 去掉首尾空白后检查用户名
pub fn validate_username(username: &str, max_len: usize) -> Result<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidUsername("username is empty".to_string()));
    }
    if username.chars().count() > max_len {
        return Err(Error::InvalidUsername(format!(
            "username is longer than {} characters",
            max_len
        )));
    }
    Ok(username.to_string())
}

pub fn validate_score(score_value: i64) -> Result<u8> {
    match u8::try_from(score_value) {
        Ok(score) if score <= 100 => Ok(score),
        _ => Err(Error::InvalidScore(score_value)),
    }
}

/// 内存中的用户与分数
#[derive(Debug, Clone)]
pub struct ScoreStore {
    users: Arc<DashMap<Uuid, User>>,
    usernames: Arc<DashMap<String, Uuid>>,
    // 序号保证读取时按写入顺序返回
    scores: Arc<DashMap<u64, ScoreEntry>>,
    // AI 基准按模型用户保存，不受时间范围限制
    baselines: Arc<DashMap<Uuid, (u64, ScoreEntry)>>,
    sequence: Arc<AtomicU64>,
    username_max_len: usize,
}

impl Default for ScoreStore {
    fn default() -> Self {
        Self::new(USERNAME_MAX_LEN)
    }
}

impl ScoreStore {
    pub fn new(username_max_len: usize) -> Self {
        Self {
            users: Default::default(),
            usernames: Default::default(),
            scores: Default::default(),
            baselines: Default::default(),
            sequence: Default::default(),
            username_max_len,
        }
    }

    /// 创建用户，同名用户已存在时直接返回
    pub fn create_user(&self, username: &str) -> Result<User> {
        let username = validate_username(username, self.username_max_len)?;
        let id = *self
            .usernames
            .entry(username.clone())
            .or_insert_with(|| {
                let user = User {
                    id: Uuid::new_v4(),
                    username: username.clone(),
                    created_at: Utc::now(),
                };
                tracing::info!(user = %user.id, username = %user.username, "user created");
                let id = user.id;
                self.users.insert(id, user);
                id
            });
        self.user(&id)
    }

    pub fn user(&self, id: &Uuid) -> Result<User> {
        self.users
            .get(id)
            .map(|user| user.value().clone())
            .ok_or(Error::UserNotFound)
    }

    pub fn submit_score(&self, user_id: &Uuid, score_value: i64) -> Result<ScoreEntry> {
        self.submit_score_at(user_id, score_value, Utc::now())
    }

    pub fn submit_score_at(
        &self,
        user_id: &Uuid,
        score_value: i64,
        created_at: DateTime<Utc>,
    ) -> Result<ScoreEntry> {
        let score_value = validate_score(score_value)?;
        let user = self.user(user_id)?;
        let entry = ScoreEntry {
            id: Uuid::new_v4(),
            user_id: user.id,
            username: user.username,
            score_value,
            created_at,
        };
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.scores.insert(seq, entry.clone());
        tracing::debug!(score = %entry.id, user = %entry.user_id, score_value, "score stored");
        Ok(entry)
    }

    /// 时间范围内的分数加上所有 AI 基准，按写入顺序
    pub fn scores(&self, scope: LeaderboardScope, now: DateTime<Utc>) -> Vec<ScoreEntry> {
        let mut scores: Vec<(u64, ScoreEntry)> = self
            .scores
            .iter()
            .filter(|item| scope.includes(item.value().created_at, now))
            .map(|item| (*item.key(), item.value().clone()))
            .chain(self.baselines.iter().map(|item| item.value().clone()))
            .collect();
        scores.sort_by_key(|(seq, _)| *seq);
        scores.into_iter().map(|(_, entry)| entry).collect()
    }

    /// 把 AI 基准成绩写成对应模型用户的分数，同一模型再次写入时替换旧的基准
    pub fn seed_agents(&self, baselines: &[AgentBaseline]) -> Result<Vec<ScoreEntry>> {
        let now = Utc::now();
        baselines
            .iter()
            .map(|baseline| {
                let user = self.create_user(&baseline.name)?;
                let entry = ScoreEntry {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    username: user.username,
                    score_value: validate_score(baseline.score_value() as i64)?,
                    created_at: now,
                };
                let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
                self.baselines.insert(entry.user_id, (seq, entry.clone()));
                tracing::debug!(agent = %entry.username, score_value = entry.score_value, "baseline stored");
                Ok(entry)
            })
            .collect()
    }
}
