//! 连接监视器：根据反馈到达时间判断链路是否存活
//!
//! 时间基准为进程启动时刻起的单调微秒数，不受系统时钟调整影响，
//! 可以直接存进 `AtomicU64` 做无锁读写。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

/// 尚未收到任何反馈
const NEVER: u64 = u64::MAX;

fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// 链路健康监视器
///
/// 第一次反馈到达之前一直报告离线。
#[derive(Debug)]
pub struct ConnectionMonitor {
    last_feedback: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_feedback: AtomicU64::new(NEVER),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 超时窗口内是否收到过反馈
    pub fn check_connection(&self) -> bool {
        match self.time_since_last_feedback() {
            Some(elapsed) => elapsed < self.timeout,
            None => false,
        }
    }

    /// 登记一次反馈
    pub fn register_feedback(&self) {
        self.last_feedback.store(monotonic_micros(), Ordering::Relaxed);
    }

    /// 立即标记为离线（链路层明确报告断开时使用）
    pub fn mark_lost(&self) {
        self.last_feedback.store(NEVER, Ordering::Relaxed);
    }

    /// 距上次反馈的时间，从未收到反馈时为 `None`
    pub fn time_since_last_feedback(&self) -> Option<Duration> {
        let last_us = self.last_feedback.load(Ordering::Relaxed);
        if last_us == NEVER {
            return None;
        }
        Some(Duration::from_micros(monotonic_micros().saturating_sub(last_us)))
    }
}
