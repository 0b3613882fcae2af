use crate::leaderboard::AgentRoster;
use crate::store::USERNAME_MAX_LEN;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// 游戏设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 每局最多使用的房源数
    pub max_listings: usize,

    /// AI 模型名单
    pub agents: AgentRoster,

    /// 用户名长度上限
    pub username_max_len: usize,

    /// 排行榜展示的玩家数（AI 模型总是展示）
    pub leaderboard_top_humans: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_listings: 3,
            agents: AgentRoster::default(),
            username_max_len: USERNAME_MAX_LEN,
            leaderboard_top_humans: 10,
        }
    }
}

/// 服务端配置，来自环境变量
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub listings_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub const ADDR: &'static str = "GTR_ADDR";
    pub const LISTINGS: &'static str = "GTR_LISTINGS";
    pub const AI_AGENTS: &'static str = "GTR_AI_AGENTS";
    pub const MAX_LISTINGS: &'static str = "GTR_MAX_LISTINGS";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取，便于测试
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let agents = lookup(Self::AI_AGENTS)
            .map(|names| AgentRoster::new(names.split(',')))
            .unwrap_or(defaults.agents);

        Self {
            addr: parse_or(&lookup, Self::ADDR, SocketAddr::new([0, 0, 0, 0].into(), 8000)),
            listings_path: lookup(Self::LISTINGS)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/listings.json")),
            settings: Settings {
                max_listings: parse_or(&lookup, Self::MAX_LISTINGS, defaults.max_listings),
                agents,
                ..defaults
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "ignoring invalid setting");
                default
            }
        },
    }
}
