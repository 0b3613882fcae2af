use crate::error::*;
use serde::{Deserialize, Serialize};

/// 一次猜测的结果
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuessResult {
    /// 玩家猜的租金
    user_guess: f64,

    /// 真实租金
    actual_rent: f64,

    /// 绝对误差
    difference: f64,

    /// 误差占真实租金的百分比（四舍五入取整）
    percentage_diff: u32,

    /// 是否猜中
    is_correct: bool,
}

impl GuessResult {
    /// 玩家猜的租金
    pub fn user_guess(&self) -> f64 {
        self.user_guess
    }

    /// 真实租金
    pub fn actual_rent(&self) -> f64 {
        self.actual_rent
    }

    /// 绝对误差
    pub fn difference(&self) -> f64 {
        self.difference
    }

    /// 百分比误差
    pub fn percentage_diff(&self) -> u32 {
        self.percentage_diff
    }

    /// 是否猜中
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

/// 对比玩家的猜测与真实租金
///
/// 调用方需保证两个参数都为正数，玩家输入应先经过 [`parse_guess`]。
pub fn evaluate(user_guess: f64, actual_rent: f64) -> GuessResult {
    debug_assert!(user_guess > 0.0, "user_guess = {}", user_guess);
    debug_assert!(actual_rent > 0.0, "actual_rent = {}", actual_rent);

    let difference = (user_guess - actual_rent).abs();
    // f64::round 即远离零方向舍入
    let percentage_diff = (difference / actual_rent * 100.0).round() as u32;

    GuessResult {
        user_guess,
        actual_rent,
        difference,
        percentage_diff,
        is_correct: difference == 0.0,
    }
}

/// 解析玩家输入的租金，允许千分位逗号与前缀 `$`
pub fn parse_guess(input: &str) -> Result<u32> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    match cleaned.parse::<u32>() {
        Ok(0) => Err(Error::InvalidInput(format!("{} is not a positive amount", input.trim()))),
        Ok(guess) => Ok(guess),
        Err(_) => Err(Error::InvalidInput(format!("{:?} is not a number", input.trim()))),
    }
}
