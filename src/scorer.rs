/// 把每轮的百分比误差汇总成 0 到 100 的准确率
///
/// 准确率 = max(0, 100 - 平均误差)，空序列的平均误差记为 0。
pub fn aggregate<I>(percentage_diffs: I) -> f64
where
    I: IntoIterator,
    I::Item: Into<f64>,
{
    let (sum, count) = percentage_diffs
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), diff| (sum + diff.into(), count + 1));

    let mean = if count == 0 { 0.0 } else { sum / count as f64 };
    (100.0 - mean).max(0.0)
}

/// 准确率对应的持久化分数（0 到 100 的整数）
pub fn score_value(accuracy: f64) -> u8 {
    accuracy.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_session_is_perfect() {
        assert_eq!(aggregate(Vec::<u32>::new()), 100.0);
    }

    #[test]
    fn clamps_at_zero() {
        assert_eq!(aggregate([150u32]), 0.0);
        assert_eq!(aggregate([90u32, 250, 130]), 0.0);
    }

    #[test]
    fn averages_rounds() {
        assert_eq!(aggregate([10u32, 20, 30]), 80.0);
        assert_eq!(aggregate([0u32, 0, 0]), 100.0);
        assert_eq!(aggregate([5u32, 10]), 92.5);
    }

    #[test]
    fn accepts_unrounded_errors() {
        let accuracy = aggregate([2.5f64, 7.5]);
        assert_eq!(accuracy, 95.0);
    }

    #[test]
    fn score_value_rounds_and_clamps() {
        assert_eq!(score_value(92.5), 93);
        assert_eq!(score_value(92.4), 92);
        assert_eq!(score_value(0.0), 0);
        assert_eq!(score_value(100.0), 100);
    }
}
