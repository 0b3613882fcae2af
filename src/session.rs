use crate::error::*;
use crate::evaluator::{evaluate, GuessResult};
use crate::listing::{Listing, ListingSource};
use crate::scorer::aggregate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 游戏阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase")]
pub enum Phase {
    /// 开场介绍，尚未加载房源
    Intro,

    /// 等待房源数据
    Loading,

    /// 等待玩家对当前房源出价
    Playing {
        /// 当前房源序号
        index: usize,
    },

    /// 展示本轮结果
    Reviewing {
        /// 当前房源序号
        index: usize,

        /// 本轮结果
        result: GuessResult,
    },

    /// 所有房源都已猜完
    Complete {
        /// 最终准确率
        accuracy: f64,

        /// 已提交成绩的 ID，每局只能提交一次
        submitted: Option<Uuid>,
    },

    /// 房源加载失败或没有房源
    Failed { cause: Error },
}

impl Default for Phase {
    fn default() -> Self {
        Self::Intro
    }
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Intro => "intro",
            Phase::Loading => "loading",
            Phase::Playing { .. } => "playing",
            Phase::Reviewing { .. } => "reviewing",
            Phase::Complete { .. } => "complete",
            Phase::Failed { .. } => "failed",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Phase::Complete { .. })
    }
}

/// 驱动状态机的外部信号
#[derive(Debug)]
pub enum Signal {
    /// 开场结束，开始加载
    Begin,

    /// 房源请求的结果
    Loaded(Result<Vec<Listing>>),

    /// 玩家出价
    Guess(u32),

    /// 看完结果，进入下一轮
    Continue,

    /// 加载失败后重试
    Retry,

    /// 成绩已写入排行榜
    Submitted(Uuid),

    /// 回到开场，清空所有数据
    Reset,
}

/// 一局猜租金游戏
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    /// 会话 ID
    id: Uuid,

    /// 本局房源，加载后不再变化
    listings: Vec<Listing>,

    /// 每轮的百分比误差，长度等于已出价的轮数
    percentage_diffs: Vec<u32>,

    /// 当前阶段
    phase: Phase,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            listings: vec![],
            percentage_diffs: vec![],
            phase: Phase::default(),
        }
    }

    /// 会话 ID
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    /// 当前阶段
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    /// 每轮误差的快照
    pub fn percentage_diffs(&self) -> &[u32] {
        &self.percentage_diffs
    }

    /// 当前房源序号，结束后停留在最后一个房源
    pub fn current_index(&self) -> usize {
        match self.phase {
            Phase::Playing { index } | Phase::Reviewing { index, .. } => index,
            Phase::Complete { .. } => self.listings.len().saturating_sub(1),
            _ => 0,
        }
    }

    /// 正在猜或正在展示结果的房源
    pub fn current_listing(&self) -> Option<&Listing> {
        match self.phase {
            Phase::Playing { index } | Phase::Reviewing { index, .. } => self.listings.get(index),
            _ => None,
        }
    }

    /// 上一次出价的结果，进入下一轮后清空
    pub fn last_result(&self) -> Option<&GuessResult> {
        match &self.phase {
            Phase::Reviewing { result, .. } => Some(result),
            _ => None,
        }
    }

    /// 最终准确率
    pub fn accuracy(&self) -> Option<f64> {
        match self.phase {
            Phase::Complete { accuracy, .. } => Some(accuracy),
            _ => None,
        }
    }

    /// 已提交成绩的 ID
    pub fn submitted(&self) -> Option<&Uuid> {
        match &self.phase {
            Phase::Complete { submitted, .. } => submitted.as_ref(),
            _ => None,
        }
    }

    /// 状态转移，信号与当前阶段不匹配时返回 `InvalidOperation` 且不改变任何状态
    pub fn apply(&mut self, signal: Signal) -> Result<&Phase> {
        let next = match (&self.phase, signal) {
            (_, Signal::Reset) => {
                // 重新开始的一局使用新的会话 ID
                self.id = Uuid::new_v4();
                self.listings.clear();
                self.percentage_diffs.clear();
                Phase::Intro
            }
            (Phase::Intro, Signal::Begin) | (Phase::Failed { .. }, Signal::Retry) => {
                self.listings.clear();
                Phase::Loading
            }
            (Phase::Loading, Signal::Loaded(Ok(listings))) => match check_listings(&listings) {
                Ok(()) => {
                    self.listings = listings;
                    Phase::Playing { index: 0 }
                }
                Err(cause) => {
                    tracing::warn!(session = %self.id, %cause, "no usable listings");
                    Phase::Failed { cause }
                }
            },
            (Phase::Loading, Signal::Loaded(Err(e))) => {
                let cause = match e {
                    Error::DataUnavailable(_) => e,
                    other => Error::DataUnavailable(other.to_string()),
                };
                tracing::warn!(session = %self.id, %cause, "failed to load listings");
                Phase::Failed { cause }
            }
            (Phase::Playing { index }, Signal::Guess(guess)) => {
                let index = *index;
                let result = evaluate(guess as f64, self.listings[index].rent);
                self.percentage_diffs.push(result.percentage_diff());
                Phase::Reviewing { index, result }
            }
            (Phase::Reviewing { index, .. }, Signal::Continue) => {
                if index + 1 < self.listings.len() {
                    Phase::Playing { index: index + 1 }
                } else {
                    let accuracy = aggregate(self.percentage_diffs.iter().copied());
                    tracing::info!(
                        session = %self.id,
                        rounds = self.percentage_diffs.len(),
                        accuracy,
                        "session complete"
                    );
                    Phase::Complete {
                        accuracy,
                        submitted: None,
                    }
                }
            }
            (
                Phase::Complete {
                    accuracy,
                    submitted: None,
                },
                Signal::Submitted(score),
            ) => Phase::Complete {
                accuracy: *accuracy,
                submitted: Some(score),
            },
            (phase, signal) => {
                tracing::debug!(session = %self.id, phase = phase.name(), ?signal, "signal ignored");
                return Err(Error::InvalidOperation);
            }
        };

        tracing::debug!(
            session = %self.id,
            from = self.phase.name(),
            to = next.name(),
            "transition"
        );
        self.phase = next;
        Ok(&self.phase)
    }

    /// 开场结束，进入加载阶段
    pub fn begin(&mut self) -> Result<()> {
        self.apply(Signal::Begin).map(|_| ())
    }

    /// 交付房源请求的结果
    pub fn load(&mut self, listings: Result<Vec<Listing>>) -> Result<&Phase> {
        self.apply(Signal::Loaded(listings))
    }

    /// 从数据源同步取房源并交付结果
    pub fn load_from<S>(&mut self, source: &S) -> Result<&Phase>
    where
        S: ListingSource + ?Sized,
    {
        if !matches!(self.phase, Phase::Loading) {
            return Err(Error::InvalidOperation);
        }
        self.load(source.fetch())
    }

    /// 玩家对当前房源出价
    pub fn submit_guess(&mut self, guess: u32) -> Result<GuessResult> {
        self.apply(Signal::Guess(guess))?;
        self.last_result().copied().ok_or(Error::InvalidOperation)
    }

    /// 进入下一轮或结束本局
    pub fn proceed(&mut self) -> Result<&Phase> {
        self.apply(Signal::Continue)
    }

    /// 加载失败后重新加载
    pub fn retry(&mut self) -> Result<()> {
        self.apply(Signal::Retry).map(|_| ())
    }

    /// 记录已提交的成绩，重复提交返回 `InvalidOperation`
    pub fn record_submission(&mut self, score: Uuid) -> Result<()> {
        self.apply(Signal::Submitted(score)).map(|_| ())
    }

    /// 回到开场，换一个新的会话 ID
    pub fn reset(&mut self) {
        // Reset 在任何阶段都合法
        let _ = self.apply(Signal::Reset);
    }
}

fn check_listings(listings: &[Listing]) -> Result<()> {
    if listings.is_empty() {
        return Err(Error::DataUnavailable("no listings available".to_string()));
    }
    match listings.iter().find(|l| !l.rent.is_finite() || l.rent <= 0.0) {
        Some(l) => Err(Error::DataUnavailable(format!(
            "listing {} has no positive rent",
            l.id
        ))),
        None => Ok(()),
    }
}
