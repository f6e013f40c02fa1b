//! 固定周期时钟
//!
//! 每个周期的用法：
//!
//! ```rust,no_run
//! use magic_driver::CycleClock;
//! use std::time::Duration;
//!
//! let dt = Duration::from_millis(2);
//! let mut clock = CycleClock::new(dt);
//! for _ in 0..500 {
//!     let start = clock.begin_cycle();
//!     // 读取 -> 计算 -> 发送
//!     let report = clock.wait_until_next(start, dt);
//!     if let Some(late) = report.overrun {
//!         eprintln!("late by {:?}", late);
//!     }
//! }
//! ```
//!
//! 默认策略 [`DriftPolicy::Accumulate`] 以绝对时间为锚（`next = start + dt`），
//! N 个周期总耗时为 N·dt，偶发超时会在后续周期追回。
//! 落后超过 `max_lag_periods` 个周期时放弃追赶，在当前时刻重新定锚，
//! 并在报告中给出跳过的周期数。

use spin_sleep::SpinSleeper;
use std::time::{Duration, Instant};
use tracing::warn;

/// 超时后的锚点策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DriftPolicy {
    /// 保持绝对锚点，超时后追赶
    #[default]
    Accumulate,
    /// 每次醒来后以醒来时刻为新锚点
    Reset,
}

/// 一次等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// 本周期期望的结束时刻（`start + dt`）
    pub deadline: Instant,
    /// 实际醒来时刻
    pub woke_at: Instant,
    /// 调用等待时已经超过截止时刻多久
    pub overrun: Option<Duration>,
    /// 因落后过多而放弃的周期数
    pub skipped_periods: u64,
}

/// 固定周期时钟
#[derive(Debug)]
pub struct CycleClock {
    period: Duration,
    policy: DriftPolicy,
    max_lag_periods: u32,
    next_start: Option<Instant>,
    sleeper: SpinSleeper,
    cycles: u64,
    overruns: u64,
}

impl CycleClock {
    /// 默认最大落后周期数
    pub const DEFAULT_MAX_LAG_PERIODS: u32 = 50;

    pub fn new(period: Duration) -> Self {
        Self {
            period,
            policy: DriftPolicy::default(),
            max_lag_periods: Self::DEFAULT_MAX_LAG_PERIODS,
            next_start: None,
            sleeper: SpinSleeper::default(),
            cycles: 0,
            overruns: 0,
        }
    }

    pub fn with_policy(mut self, policy: DriftPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 设为 0 表示永远追赶
    pub fn with_max_lag_periods(mut self, periods: u32) -> Self {
        self.max_lag_periods = periods;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn policy(&self) -> DriftPolicy {
        self.policy
    }

    /// 已完成的周期数
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// 累计超时次数
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// 本周期的名义起点
    ///
    /// 第一次调用（或 [`reanchor`](Self::reanchor) 之后）以当前时刻为锚。
    pub fn begin_cycle(&mut self) -> Instant {
        match self.next_start {
            Some(start) => start,
            None => {
                let now = Instant::now();
                self.next_start = Some(now);
                now
            },
        }
    }

    /// 丢弃锚点，下一次 `begin_cycle` 从当前时刻重新开始
    pub fn reanchor(&mut self) {
        self.next_start = None;
    }

    /// 睡到 `start + dt`
    ///
    /// 已经过了截止时刻则不睡，并报告超时量。
    pub fn wait_until_next(&mut self, start: Instant, dt: Duration) -> CycleReport {
        let deadline = start + dt;
        let now = Instant::now();
        let overrun = now.checked_duration_since(deadline).filter(|late| !late.is_zero());

        let woke_at = match overrun {
            Some(_) => now,
            None => {
                self.sleep_until(deadline);
                Instant::now()
            },
        };

        self.cycles += 1;
        let mut skipped_periods = 0;

        let next = match (self.policy, overrun) {
            (DriftPolicy::Reset, _) => woke_at,
            (DriftPolicy::Accumulate, None) => deadline,
            (DriftPolicy::Accumulate, Some(late)) => {
                let lag = lag_periods(late, dt);
                if self.max_lag_periods > 0 && lag > u64::from(self.max_lag_periods) {
                    skipped_periods = lag;
                    woke_at
                } else {
                    deadline
                }
            },
        };
        self.next_start = Some(next);

        if let Some(late) = overrun {
            self.overruns += 1;
            if skipped_periods > 0 {
                warn!(
                    "Cycle {} overran by {:?}, re-anchoring and skipping {} periods",
                    self.cycles, late, skipped_periods
                );
            } else {
                warn!("Cycle {} overran by {:?} (period {:?})", self.cycles, late, dt);
            }
        }

        CycleReport {
            deadline,
            woke_at,
            overrun,
            skipped_periods,
        }
    }

    /// 睡到指定时刻（已过去则立即返回）
    pub fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            self.sleeper.sleep(deadline - now);
        }
    }
}

fn lag_periods(late: Duration, dt: Duration) -> u64 {
    if dt.is_zero() {
        return 0;
    }
    (late.as_nanos() / dt.as_nanos()) as u64
}
