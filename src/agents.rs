use crate::listing::Listing;
use crate::scorer::aggregate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 一个 AI 模型在全部房源上的基准成绩
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBaseline {
    /// 模型名
    pub name: String,

    /// 参与计分的房源数
    pub predictions: usize,

    /// 平均百分比误差（未取整）
    pub mean_error: f64,

    /// 准确率，保留一位小数
    pub score: f64,
}

impl AgentBaseline {
    /// 写入排行榜的整数分数
    pub fn score_value(&self) -> u8 {
        crate::scorer::score_value(self.score)
    }
}

/// 按每个模型对房源的估价计算基准成绩
///
/// 租金或估价缺失、为 0 的房源不计入该模型；没有有效估价的模型不出现在结果中。
pub fn agent_baselines(listings: &[Listing]) -> Vec<AgentBaseline> {
    let mut errors: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for listing in listings {
        for (agent, guess) in &listing.agent_guesses {
            let slot = errors.entry(agent.as_str()).or_default();
            if listing.rent > 0.0 && *guess > 0.0 {
                slot.push((guess - listing.rent).abs() / listing.rent * 100.0);
            }
        }
    }

    errors
        .into_iter()
        .filter_map(|(name, errors)| {
            if errors.is_empty() {
                tracing::debug!(agent = name, "no valid predictions");
                return None;
            }
            let mean_error = errors.iter().sum::<f64>() / errors.len() as f64;
            // 与玩家一样不低于 0
            let score = (aggregate(errors.iter().copied()) * 10.0).round() / 10.0;
            Some(AgentBaseline {
                name: name.to_string(),
                predictions: errors.len(),
                mean_error,
                score,
            })
        })
        .collect()
}
