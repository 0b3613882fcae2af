use crate::error::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 一套待猜租金的房源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// 房源 ID
    pub id: String,

    /// 展示名称
    pub name: String,

    /// 地址
    #[serde(default)]
    pub address: String,

    /// 卧室数
    #[serde(default)]
    pub bedrooms: u32,

    /// 卫生间数（可以是半间）
    #[serde(default)]
    pub bathrooms: f32,

    /// 描述
    #[serde(default)]
    pub details: String,

    /// 图片地址
    #[serde(default)]
    pub photos: Vec<String>,

    /// 真实月租
    pub rent: f64,

    /// 各个 AI 模型对该房源给出的租金估计，0 表示跳过
    #[serde(default)]
    pub agent_guesses: BTreeMap<String, f64>,
}

impl Listing {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rent: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: String::new(),
            bedrooms: 0,
            bathrooms: 0.0,
            details: String::new(),
            photos: vec![],
            rent,
            agent_guesses: BTreeMap::new(),
        }
    }

    /// 附加一个 AI 模型的估价
    pub fn with_agent_guess(mut self, agent: impl Into<String>, guess: f64) -> Self {
        self.agent_guesses.insert(agent.into(), guess);
        self
    }
}

/// 房源接口返回的文档
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingSet {
    pub listings: Vec<Listing>,
}

/// 房源数据来源
pub trait ListingSource {
    /// 取出本局游戏使用的房源，空列表是合法结果
    fn fetch(&self) -> Result<Vec<Listing>>;
}

/// 固定的房源列表
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    listings: Vec<Listing>,
}

impl StaticSource {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }
}

impl ListingSource for StaticSource {
    fn fetch(&self) -> Result<Vec<Listing>> {
        Ok(self.listings.clone())
    }
}

/// 从 JSON 文件读取房源，最多返回 `limit` 条
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    limit: usize,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>, limit: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            limit,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ListingSource for JsonFileSource {
    fn fetch(&self) -> Result<Vec<Listing>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::DataUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let set: ListingSet =
            serde_json::from_str(&raw).map_err(|e| Error::DataUnavailable(e.to_string()))?;
        let mut listings = set.listings;
        listings.truncate(self.limit);
        tracing::debug!(path = %self.path.display(), count = listings.len(), "listings loaded");
        Ok(listings)
    }
}
