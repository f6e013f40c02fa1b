//! 底层关节插值演示
//!
//! 进入 LowLevelControl 后：
//!
//! | 计数 | 动作 |
//! |------|------|
//! | 1 ~ 999 | 从启动姿态插值到低姿态 j1（1000 周期） |
//! | 1000 ~ 1749 | j1 → 高姿态 j2（700 周期插值，50 周期保持） |
//! | 1750 ~ 2499 | j2 → j1（同上） |
//! | 2500 | 回到 1000，循环起伏 |
//!
//! 全部 12 个关节使用相同的 PD 增益 kp = 100，kd = 1.2。

use super::controller::{Step, TickController};
use super::trajectory::{Endpoint, Segment, SegmentPlan, SegmentRunner};
use crate::error::ControlError;
use magic_protocol::{FsmState, InputData, JointArray, MotorCmd, OutputData};
use tracing::info;

/// 低姿态（机身高度约 0.2m）
pub const J1: [f32; 3] = [0.0, 1.0477, -2.0944];
/// 高姿态（机身高度约 0.3m）
pub const J2: [f32; 3] = [0.0, 0.7231, -1.4455];

pub const DEFAULT_KP: f32 = 100.0;
pub const DEFAULT_KD: f32 = 1.2;

/// 起伏循环从这里开始
pub const REPEAT_FROM: u64 = 1000;

/// 启动姿态 → j1 → j2 → j1 → ... 的分段计划
pub fn body_cycle_plan() -> Result<SegmentPlan, ControlError> {
    let j1 = Endpoint::Posture(JointArray::from_leg_pattern(J1));
    let j2 = Endpoint::Posture(JointArray::from_leg_pattern(J2));
    SegmentPlan::new(
        vec![
            Segment::new(Endpoint::Anchor, j1, 1000, 1000),
            Segment::new(j1, j2, 750, 700),
            Segment::new(j2, j1, 750, 700),
        ],
        REPEAT_FROM,
    )
}

/// 关节插值演示控制器
#[derive(Debug, Clone)]
pub struct JointInterpolationDemo {
    runner: SegmentRunner,
    kp: f32,
    kd: f32,
    last_segment: Option<usize>,
}

impl JointInterpolationDemo {
    pub fn new() -> Result<Self, ControlError> {
        Self::with_plan(body_cycle_plan()?, DEFAULT_KP, DEFAULT_KD)
    }

    /// 自定义计划和增益（增益必须非负）
    pub fn with_plan(plan: SegmentPlan, kp: f32, kd: f32) -> Result<Self, ControlError> {
        if !(kp >= 0.0 && kd >= 0.0 && kp.is_finite() && kd.is_finite()) {
            return Err(ControlError::Config(format!(
                "gains must be finite and non-negative (kp={}, kd={})",
                kp, kd
            )));
        }
        Ok(Self {
            runner: SegmentRunner::new(plan),
            kp,
            kd,
            last_segment: None,
        })
    }

    pub fn runner(&self) -> &SegmentRunner {
        &self.runner
    }

    /// 当前计数
    pub fn counter(&self) -> u64 {
        self.runner.counter()
    }
}

impl TickController for JointInterpolationDemo {
    type Error = ControlError;

    fn start(&mut self, input: &InputData) -> Result<(), Self::Error> {
        self.runner.set_anchor(input.motor_data.q);
        info!("Anchor posture captured, interpolating to low stance");
        Ok(())
    }

    fn tick(&mut self, input: &InputData) -> Result<Step, Self::Error> {
        if self.runner.anchor().is_none() {
            self.runner.set_anchor(input.motor_data.q);
        }

        let sample = self.runner.advance()?;
        if self.last_segment != Some(sample.segment) {
            if self.last_segment == Some(0) {
                info!("Body UP and DOWN cycle!");
            }
            self.last_segment = Some(sample.segment);
        }

        let motor = MotorCmd::position(sample.q, self.kp, self.kd);
        Ok(Step::Command(OutputData::fsm(FsmState::LowLevelControl).with_motor(motor)))
    }

    fn on_time_jump(&mut self, skipped_ticks: u64) -> Result<(), Self::Error> {
        self.runner.skip(skipped_ticks);
        Ok(())
    }

    fn reset(&mut self) {
        self.runner.reset();
        self.last_segment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::trajectory::lerp;

    fn input_at(q: JointArray<f32>) -> InputData {
        let mut input = InputData::default();
        input.motor_data.q = q;
        input
    }

    fn command(step: Step) -> OutputData {
        match step {
            Step::Command(cmd) => cmd,
            Step::Finished => panic!("demo never finishes"),
        }
    }

    #[test]
    fn test_plan_shape() {
        let plan = body_cycle_plan().unwrap();
        assert_eq!(plan.total(), 2500);
        assert_eq!(plan.repeat_from(), 1000);
    }

    #[test]
    fn test_first_tick_starts_from_anchor() {
        let anchor = JointArray::splat(0.5);
        let mut demo = JointInterpolationDemo::new().unwrap();
        demo.start(&input_at(anchor)).unwrap();

        let cmd = command(demo.tick(&input_at(anchor)).unwrap());
        assert_eq!(cmd.robot_fsm_cmd, FsmState::LowLevelControl);
        // t = 1/1000
        let expected = lerp(0.5, J1[1], 0.001);
        assert!((cmd.motor_cmd.q_des[1] - expected).abs() < 1e-5);
        assert_eq!(cmd.motor_cmd.kp, JointArray::splat(100.0));
        assert_eq!(cmd.motor_cmd.kd, JointArray::splat(1.2));
    }

    #[test]
    fn test_reaches_j1_at_1000_and_j2_by_1700() {
        let mut demo = JointInterpolationDemo::new().unwrap();
        let input = input_at(JointArray::splat(0.0));
        demo.start(&input).unwrap();

        let mut last = OutputData::default();
        for _ in 0..1000 {
            last = command(demo.tick(&input).unwrap());
        }
        assert_eq!(demo.counter(), 1000);
        assert_eq!(last.motor_cmd.q_des, JointArray::from_leg_pattern(J1));

        for _ in 1000..1700 {
            last = command(demo.tick(&input).unwrap());
        }
        assert_eq!(demo.counter(), 1700);
        assert_eq!(last.motor_cmd.q_des, JointArray::from_leg_pattern(J2));
    }

    #[test]
    fn test_wrap_produces_j1() {
        let mut demo = JointInterpolationDemo::new().unwrap();
        let input = input_at(JointArray::splat(0.0));
        demo.start(&input).unwrap();
        for _ in 0..2499 {
            demo.tick(&input).unwrap();
        }
        assert_eq!(demo.counter(), 2499);

        let cmd = command(demo.tick(&input).unwrap());
        assert_eq!(demo.counter(), 1000);
        assert_eq!(cmd.motor_cmd.q_des, JointArray::from_leg_pattern(J1));
    }

    #[test]
    fn test_time_jump_fast_forwards() {
        let mut demo = JointInterpolationDemo::new().unwrap();
        let input = input_at(JointArray::splat(0.0));
        demo.start(&input).unwrap();
        demo.tick(&input).unwrap();
        demo.on_time_jump(2600).unwrap();
        // 1 + 2600 = 2601 -> 1000 + 101
        assert_eq!(demo.counter(), 1101);
    }

    #[test]
    fn test_reset_clears_anchor() {
        let mut demo = JointInterpolationDemo::new().unwrap();
        demo.start(&input_at(JointArray::splat(0.3))).unwrap();
        demo.tick(&input_at(JointArray::splat(0.3))).unwrap();
        demo.reset();
        assert_eq!(demo.counter(), 0);
        assert!(demo.runner().anchor().is_none());
    }

    #[test]
    fn test_rejects_negative_gain() {
        let plan = body_cycle_plan().unwrap();
        assert!(JointInterpolationDemo::with_plan(plan, -1.0, 1.2).is_err());
    }
}
