//! 运动指令的物理范围
//!
//! | 状态 | 字段 | 范围 |
//! |------|------|------|
//! | BalanceStand | roll | -0.52 ~ +0.52 rad |
//! | BalanceStand | pitch | -0.25 ~ +0.30 rad |
//! | BalanceStand | yaw | -0.65 ~ +0.65 rad |
//! | BalanceStand | body_height | 0.15 ~ 0.35 m |
//! | Trot | vx | -1.2 ~ 1.2 m/s |
//! | Trot | vy | -0.5 ~ 0.5 m/s |
//! | Trot | wz | -2.5 ~ 2.5 rad/s |
//! | Trot | step_height | 0.01 ~ 0.15 m |
//!
//! 其他状态不解释 `MotionCmd`，不做限制。

use crate::data::MotionCmd;
use crate::error::ProtocolError;
use crate::fsm::FsmState;

/// 闭区间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Range { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

pub const ROLL: Range = Range::new(-0.52, 0.52);
pub const PITCH: Range = Range::new(-0.25, 0.30);
pub const YAW: Range = Range::new(-0.65, 0.65);
pub const BODY_HEIGHT: Range = Range::new(0.15, 0.35);
pub const VX: Range = Range::new(-1.2, 1.2);
pub const VY: Range = Range::new(-0.5, 0.5);
pub const WZ: Range = Range::new(-2.5, 2.5);
pub const STEP_HEIGHT: Range = Range::new(0.01, 0.15);

#[derive(Debug, Clone, Copy)]
enum Field {
    Roll,
    Pitch,
    Yaw,
    BodyHeight,
    Vx,
    Vy,
    Wz,
    StepHeight,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Roll => "roll",
            Field::Pitch => "pitch",
            Field::Yaw => "yaw",
            Field::BodyHeight => "body_height",
            Field::Vx => "vx",
            Field::Vy => "vy",
            Field::Wz => "wz",
            Field::StepHeight => "step_height",
        }
    }

    fn range(self) -> Range {
        match self {
            Field::Roll => ROLL,
            Field::Pitch => PITCH,
            Field::Yaw => YAW,
            Field::BodyHeight => BODY_HEIGHT,
            Field::Vx => VX,
            Field::Vy => VY,
            Field::Wz => WZ,
            Field::StepHeight => STEP_HEIGHT,
        }
    }

    fn get(self, cmd: &MotionCmd) -> f32 {
        match self {
            Field::Roll => cmd.rpy_des[0],
            Field::Pitch => cmd.rpy_des[1],
            Field::Yaw => cmd.rpy_des[2],
            Field::BodyHeight => cmd.body_height,
            Field::Vx => cmd.v_des[0],
            Field::Vy => cmd.v_des[1],
            Field::Wz => cmd.v_des[2],
            Field::StepHeight => cmd.step_height,
        }
    }

    fn slot(self, cmd: &mut MotionCmd) -> &mut f32 {
        match self {
            Field::Roll => &mut cmd.rpy_des[0],
            Field::Pitch => &mut cmd.rpy_des[1],
            Field::Yaw => &mut cmd.rpy_des[2],
            Field::BodyHeight => &mut cmd.body_height,
            Field::Vx => &mut cmd.v_des[0],
            Field::Vy => &mut cmd.v_des[1],
            Field::Wz => &mut cmd.v_des[2],
            Field::StepHeight => &mut cmd.step_height,
        }
    }
}

/// 某个 FSM 状态下 `MotionCmd` 的生效字段与范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionLimits {
    state: FsmState,
}

impl MotionLimits {
    pub fn for_state(state: FsmState) -> Self {
        MotionLimits { state }
    }

    fn fields(&self) -> &'static [Field] {
        match self.state {
            FsmState::BalanceStand => &[Field::Roll, Field::Pitch, Field::Yaw, Field::BodyHeight],
            FsmState::Trot => &[Field::Vx, Field::Vy, Field::Wz, Field::StepHeight],
            _ => &[],
        }
    }

    /// 检查生效字段是否都在范围内
    pub fn validate(&self, cmd: &MotionCmd) -> Result<(), ProtocolError> {
        for &field in self.fields() {
            let value = field.get(cmd);
            let range = field.range();
            if !range.contains(value) {
                return Err(ProtocolError::OutOfRange {
                    state: self.state,
                    field: field.name(),
                    value,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }

    /// 把生效字段饱和到范围内，返回是否发生了截断
    ///
    /// NaN 会被替换为区间下界。
    pub fn clamp(&self, cmd: &mut MotionCmd) -> bool {
        let mut clamped = false;
        for &field in self.fields() {
            let range = field.range();
            let slot = field.slot(cmd);
            let value = if slot.is_nan() { range.min } else { range.clamp(*slot) };
            if value != *slot {
                *slot = value;
                clamped = true;
            }
        }
        clamped
    }
}
