//! 相位表
//!
//! 按计数切分的 FSM 状态序列。第 `i` 个相位覆盖
//! `[phases[i-1].end_tick, phases[i].end_tick)`，超过最后一个相位即结束。
//!
//! 运动意图在相位之间延续：每个相位只改写自己声明的字段，
//! 其余字段保留上一周期的值。

use crate::error::ControlError;
use magic_protocol::{FsmState, MotionCmd};
use std::f32::consts::PI;

/// 单个姿态角的来源
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AngleProfile {
    /// 保留上一周期的值
    #[default]
    Carry,
    /// 固定值（rad）
    Fixed(f32),
    /// `amplitude * sin(harmonic * π * k / span)`，`k` 为相位内计数
    Sine {
        amplitude: f32,
        harmonic: f32,
        span: u64,
    },
}

impl AngleProfile {
    fn apply(&self, slot: &mut f32, k: u64) {
        match *self {
            AngleProfile::Carry => {},
            AngleProfile::Fixed(value) => *slot = value,
            AngleProfile::Sine {
                amplitude,
                harmonic,
                span,
            } => {
                let phase = if span == 0 { 0.0 } else { k as f64 / span as f64 };
                *slot = amplitude * (harmonic * PI * phase as f32).sin();
            },
        }
    }
}

/// 相位内的运动意图
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionProfile {
    /// roll, pitch, yaw
    pub rpy: [AngleProfile; 3],
    /// vx, vy, wz
    pub velocity: Option<[f32; 3]>,
    pub body_height: Option<f32>,
    pub step_height: Option<f32>,
}

impl MotionProfile {
    /// 不改写任何字段
    pub fn carry() -> Self {
        Self::default()
    }

    pub fn with_body_height(mut self, height: f32) -> Self {
        self.body_height = Some(height);
        self
    }

    pub fn with_step_height(mut self, height: f32) -> Self {
        self.step_height = Some(height);
        self
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32, wz: f32) -> Self {
        self.velocity = Some([vx, vy, wz]);
        self
    }

    pub fn with_rpy(mut self, rpy: [AngleProfile; 3]) -> Self {
        self.rpy = rpy;
        self
    }

    /// 把本相位声明的字段写进 `motion`
    pub fn apply(&self, motion: &mut MotionCmd, k: u64) {
        for (profile, slot) in self.rpy.iter().zip(motion.rpy_des.iter_mut()) {
            profile.apply(slot, k);
        }
        if let Some(velocity) = self.velocity {
            motion.v_des = velocity;
        }
        if let Some(height) = self.body_height {
            motion.body_height = height;
        }
        if let Some(height) = self.step_height {
            motion.step_height = height;
        }
    }
}

/// 一个相位
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    /// 相位结束计数（不含）
    pub end_tick: u64,
    pub fsm: FsmState,
    pub motion: MotionProfile,
    /// 进入相位时的日志文字
    pub label: &'static str,
}

impl Phase {
    pub fn new(end_tick: u64, fsm: FsmState, motion: MotionProfile, label: &'static str) -> Self {
        Phase {
            end_tick,
            fsm,
            motion,
            label,
        }
    }
}

/// 查表结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseLookup<'a> {
    pub index: usize,
    pub phase: &'a Phase,
    /// 相位内计数
    pub local_tick: u64,
}

/// 相位表
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTable {
    phases: Vec<Phase>,
}

impl PhaseTable {
    /// `end_tick` 必须严格递增
    pub fn new(phases: Vec<Phase>) -> Result<Self, ControlError> {
        if phases.is_empty() {
            return Err(ControlError::InvalidPlan("phase table is empty".to_string()));
        }
        let mut previous = 0;
        for (i, phase) in phases.iter().enumerate() {
            if phase.end_tick <= previous {
                return Err(ControlError::InvalidPlan(format!(
                    "phase {} ({}) ends at {} which is not after {}",
                    i, phase.label, phase.end_tick, previous
                )));
            }
            previous = phase.end_tick;
        }
        Ok(PhaseTable { phases })
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// 序列结束的计数
    pub fn end_tick(&self) -> u64 {
        self.phases.last().map_or(0, |phase| phase.end_tick)
    }

    /// 计数所在相位，超出表尾返回 `None`
    pub fn lookup(&self, tick: u64) -> Option<PhaseLookup<'_>> {
        let index = self.phases.partition_point(|phase| phase.end_tick <= tick);
        let phase = self.phases.get(index)?;
        let start = if index == 0 { 0 } else { self.phases[index - 1].end_tick };
        Some(PhaseLookup {
            index,
            phase,
            local_tick: tick - start,
        })
    }
}
