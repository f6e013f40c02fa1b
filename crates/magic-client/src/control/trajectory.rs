//! 分段线性关节插值
//!
//! 一条计划由若干段组成，每段占一个计数窗口：
//!
//! ```text
//! t = clamp((cnt - offset) / ramp, 0, 1)
//! q = (1 - t) * from + t * to
//! ```
//!
//! `ramp` 可以短于窗口，剩余的周期保持在终点。
//! 计数走到计划末尾时回到 `repeat_from`（而不是 0），从该处开始循环。
//!
//! ```rust
//! use magic_client::control::{Endpoint, Segment, SegmentPlan, SegmentRunner};
//! use magic_protocol::JointArray;
//!
//! let up = JointArray::from_leg_pattern([0.0, 0.7231, -1.4455]);
//! let down = JointArray::from_leg_pattern([0.0, 1.0477, -2.0944]);
//! let plan = SegmentPlan::new(
//!     vec![
//!         Segment::new(Endpoint::Anchor, Endpoint::Posture(down), 1000, 1000),
//!         Segment::new(Endpoint::Posture(down), Endpoint::Posture(up), 750, 700),
//!     ],
//!     1000,
//! )
//! .unwrap();
//!
//! let mut runner = SegmentRunner::new(plan);
//! runner.set_anchor(JointArray::splat(0.0));
//! let sample = runner.advance().unwrap();
//! assert_eq!(sample.counter, 1);
//! ```

use crate::error::ControlError;
use magic_protocol::JointArray;

/// 线性插值，`t = 0` 精确返回 `a`，`t = 1` 精确返回 `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (1.0 - t) * a + t * b
}

/// 段内插值比例
pub fn ramp_fraction(counter: u64, offset: u64, ramp: u64) -> f32 {
    if ramp == 0 {
        return 1.0;
    }
    let t = counter.saturating_sub(offset) as f64 / ramp as f64;
    t.clamp(0.0, 1.0) as f32
}

/// 段的端点
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Endpoint {
    /// 启动时记录的关节位置
    Anchor,
    /// 固定姿态
    Posture(JointArray<f32>),
}

impl Endpoint {
    fn resolve(&self, anchor: Option<&JointArray<f32>>) -> Result<JointArray<f32>, ControlError> {
        match self {
            Endpoint::Posture(q) => Ok(*q),
            Endpoint::Anchor => anchor
                .copied()
                .ok_or_else(|| ControlError::Controller("anchor posture not captured".to_string())),
        }
    }
}

/// 一段插值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Endpoint,
    pub to: Endpoint,
    /// 本段占用的计数
    pub window: u64,
    /// 插值所用的计数（其余时间保持终点）
    pub ramp: u64,
}

impl Segment {
    pub fn new(from: Endpoint, to: Endpoint, window: u64, ramp: u64) -> Self {
        Segment {
            from,
            to,
            window,
            ramp,
        }
    }
}

/// 分段计划
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    segments: Vec<Segment>,
    /// 每段的起始计数
    offsets: Vec<u64>,
    total: u64,
    repeat_from: u64,
}

impl SegmentPlan {
    /// `repeat_from` 必须落在计划内部
    pub fn new(segments: Vec<Segment>, repeat_from: u64) -> Result<Self, ControlError> {
        if segments.is_empty() {
            return Err(ControlError::InvalidPlan("segment plan is empty".to_string()));
        }

        let mut offsets = Vec::with_capacity(segments.len());
        let mut total = 0u64;
        for (i, segment) in segments.iter().enumerate() {
            if segment.window == 0 {
                return Err(ControlError::InvalidPlan(format!("segment {} has zero window", i)));
            }
            offsets.push(total);
            total += segment.window;
        }

        if repeat_from >= total {
            return Err(ControlError::InvalidPlan(format!(
                "repeat_from {} is outside the plan (total {})",
                repeat_from, total
            )));
        }

        Ok(SegmentPlan {
            segments,
            offsets,
            total,
            repeat_from,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// 计划总计数
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn repeat_from(&self) -> u64 {
        self.repeat_from
    }

    /// 把计数折回计划范围内
    pub fn wrap(&self, counter: u64) -> u64 {
        if counter < self.total {
            return counter;
        }
        let cycle = self.total - self.repeat_from;
        self.repeat_from + (counter - self.total) % cycle
    }

    /// 计数所在的段及其起始计数
    pub fn locate(&self, counter: u64) -> (usize, u64) {
        let counter = self.wrap(counter);
        let index = self.offsets.partition_point(|&offset| offset <= counter) - 1;
        (index, self.offsets[index])
    }

    /// 计数处的关节目标
    pub fn sample(
        &self,
        counter: u64,
        anchor: Option<&JointArray<f32>>,
    ) -> Result<JointArray<f32>, ControlError> {
        let (index, offset) = self.locate(counter);
        let segment = &self.segments[index];
        let from = segment.from.resolve(anchor)?;
        let to = segment.to.resolve(anchor)?;
        let t = ramp_fraction(self.wrap(counter), offset, segment.ramp);
        Ok(from.map_with(to, |a, b| lerp(a, b, t)))
    }
}

/// 一次推进的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSample {
    /// 推进后的计数
    pub counter: u64,
    /// 所在段
    pub segment: usize,
    /// 本次推进发生了回绕
    pub wrapped: bool,
    pub q: JointArray<f32>,
}

/// 按周期推进 [`SegmentPlan`]
#[derive(Debug, Clone)]
pub struct SegmentRunner {
    plan: SegmentPlan,
    counter: u64,
    anchor: Option<JointArray<f32>>,
}

impl SegmentRunner {
    pub fn new(plan: SegmentPlan) -> Self {
        SegmentRunner {
            plan,
            counter: 0,
            anchor: None,
        }
    }

    pub fn plan(&self) -> &SegmentPlan {
        &self.plan
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn anchor(&self) -> Option<&JointArray<f32>> {
        self.anchor.as_ref()
    }

    pub fn set_anchor(&mut self, q: JointArray<f32>) {
        self.anchor = Some(q);
    }

    /// 计数加一（到末尾则回绕）并采样
    pub fn advance(&mut self) -> Result<SegmentSample, ControlError> {
        let next = self.counter + 1;
        let wrapped = next >= self.plan.total();
        self.counter = self.plan.wrap(next);
        self.sample_current(wrapped)
    }

    /// 跳过 `ticks` 个计数（不采样）
    pub fn skip(&mut self, ticks: u64) {
        self.counter = self.plan.wrap(self.counter.saturating_add(ticks));
    }

    /// 清空计数和锚点
    pub fn reset(&mut self) {
        self.counter = 0;
        self.anchor = None;
    }

    fn sample_current(&self, wrapped: bool) -> Result<SegmentSample, ControlError> {
        let (segment, _) = self.plan.locate(self.counter);
        let q = self.plan.sample(self.counter, self.anchor.as_ref())?;
        Ok(SegmentSample {
            counter: self.counter,
            segment,
            wrapped,
            q,
        })
    }
}
