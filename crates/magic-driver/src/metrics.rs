//! 交换通道指标
//!
//! 原子计数器，任意线程可读，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 交换通道实时指标
///
/// ```rust
/// use magic_driver::ExchangeMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = ExchangeMetrics::new();
/// metrics.telemetry_reads.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().telemetry_reads, 1);
/// ```
#[derive(Debug, Default)]
pub struct ExchangeMetrics {
    /// 传输端写入的反馈快照数
    pub feedback_updates: AtomicU64,

    /// 控制循环读取遥测的次数
    pub telemetry_reads: AtomicU64,

    /// 读到重复或离线快照的次数
    ///
    /// 主机频率高于 500Hz 时这个值会稳定增长，属于正常现象。
    pub stale_reads: AtomicU64,

    /// 成功交给传输端的命令数
    pub commands_sent: AtomicU64,

    /// 发送失败次数（含校验拒绝）
    pub send_failures: AtomicU64,
}

impl ExchangeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ExchangeMetricsSnapshot {
        ExchangeMetricsSnapshot {
            feedback_updates: self.feedback_updates.load(Ordering::Relaxed),
            telemetry_reads: self.telemetry_reads.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.feedback_updates.store(0, Ordering::Relaxed);
        self.telemetry_reads.store(0, Ordering::Relaxed);
        self.stale_reads.store(0, Ordering::Relaxed);
        self.commands_sent.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeMetricsSnapshot {
    pub feedback_updates: u64,
    pub telemetry_reads: u64,
    pub stale_reads: u64,
    pub commands_sent: u64,
    pub send_failures: u64,
}

impl ExchangeMetricsSnapshot {
    /// 重复快照占比（百分比），无读取时为 0
    pub fn stale_rate(&self) -> f64 {
        if self.telemetry_reads == 0 {
            return 0.0;
        }
        (self.stale_reads as f64 / self.telemetry_reads as f64) * 100.0
    }

    /// 发送失败占比（百分比），无发送时为 0
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.commands_sent + self.send_failures;
        if attempts == 0 {
            return 0.0;
        }
        (self.send_failures as f64 / attempts as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = ExchangeMetrics::new();
        metrics.telemetry_reads.fetch_add(4, Ordering::Relaxed);
        metrics.stale_reads.fetch_add(1, Ordering::Relaxed);
        metrics.commands_sent.fetch_add(3, Ordering::Relaxed);
        metrics.send_failures.fetch_add(1, Ordering::Relaxed);

        let snap = metrics.snapshot();
        assert_eq!(snap.stale_rate(), 25.0);
        assert_eq!(snap.failure_rate(), 25.0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), ExchangeMetricsSnapshot::default());
    }

    #[test]
    fn test_rates_without_traffic() {
        let snap = ExchangeMetricsSnapshot::default();
        assert_eq!(snap.stale_rate(), 0.0);
        assert_eq!(snap.failure_rate(), 0.0);
    }
}
