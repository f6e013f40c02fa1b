//! 集成步态演示
//!
//! | 计数 | FSM | 运动意图 |
//! |------|-----|----------|
//! | 1 ~ 3999 | RecoveryStand | - |
//! | 4000 ~ 8999 | BalanceStand | 机身 0.28m，roll/pitch/yaw 正弦摆动 |
//! | 9000 ~ 18999 | Trot | vx = 0.2 m/s，抬腿 0.05m，pitch 归零 |
//! | 19000 ~ 19999 | BalanceStand | 机身 0.3m |
//! | 20000 | 结束 | - |
//!
//! 摆动：`k = cnt - 4000`，
//! roll = 0.2·sin(πk/5000)，pitch = 0.15·sin(2πk/5000)，yaw = 0.2·sin(3πk/5000)。

use super::controller::{Step, TickController};
use super::phase::{AngleProfile, MotionProfile, Phase, PhaseTable};
use crate::error::ControlError;
use magic_protocol::{FsmState, InputData, MotionCmd, OutputData};
use tracing::info;

const SWAY_SPAN: u64 = 5000;

fn sway(amplitude: f32, harmonic: f32) -> AngleProfile {
    AngleProfile::Sine {
        amplitude,
        harmonic,
        span: SWAY_SPAN,
    }
}

/// 站立 → 姿态展示 → 小跑 → 站立 的相位表
pub fn locomotion_table() -> Result<PhaseTable, ControlError> {
    PhaseTable::new(vec![
        Phase::new(
            4000,
            FsmState::RecoveryStand,
            MotionProfile::carry(),
            "Enter into RecoveryStand FSM!",
        ),
        Phase::new(
            9000,
            FsmState::BalanceStand,
            MotionProfile::carry()
                .with_body_height(0.28)
                .with_rpy([sway(0.2, 1.0), sway(0.15, 2.0), sway(0.2, 3.0)]),
            "Enter into BalanceStand FSM!",
        ),
        Phase::new(
            19000,
            FsmState::Trot,
            MotionProfile::carry()
                .with_rpy([AngleProfile::Carry, AngleProfile::Fixed(0.0), AngleProfile::Carry])
                .with_velocity(0.2, 0.0, 0.0)
                .with_step_height(0.05),
            "Enter into Trot FSM!",
        ),
        Phase::new(
            20000,
            FsmState::BalanceStand,
            MotionProfile::carry().with_body_height(0.3),
            "Enter into BalanceStand FSM!",
        ),
    ])
}

/// 相位表驱动的步态演示控制器
#[derive(Debug, Clone)]
pub struct LocomotionDemo {
    table: PhaseTable,
    counter: u64,
    motion: MotionCmd,
    current_phase: Option<usize>,
}

impl LocomotionDemo {
    pub fn new() -> Result<Self, ControlError> {
        Ok(Self::with_table(locomotion_table()?))
    }

    pub fn with_table(table: PhaseTable) -> Self {
        Self {
            table,
            counter: 0,
            motion: MotionCmd::default(),
            current_phase: None,
        }
    }

    pub fn table(&self) -> &PhaseTable {
        &self.table
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// 当前相位下标
    pub fn current_phase(&self) -> Option<usize> {
        self.current_phase
    }
}

impl TickController for LocomotionDemo {
    type Error = ControlError;

    fn tick(&mut self, _input: &InputData) -> Result<Step, Self::Error> {
        self.counter += 1;
        let Some(lookup) = self.table.lookup(self.counter) else {
            if self.current_phase.take().is_some() {
                info!("The process is over!");
            }
            return Ok(Step::Finished);
        };

        if self.current_phase != Some(lookup.index) {
            info!("{}", lookup.phase.label);
            self.current_phase = Some(lookup.index);
        }

        lookup.phase.motion.apply(&mut self.motion, lookup.local_tick);
        Ok(Step::Command(
            OutputData::fsm(lookup.phase.fsm).with_motion(self.motion),
        ))
    }

    fn on_time_jump(&mut self, skipped_ticks: u64) -> Result<(), Self::Error> {
        self.counter = self.counter.saturating_add(skipped_ticks);
        Ok(())
    }

    fn reset(&mut self) {
        self.counter = 0;
        self.motion = MotionCmd::default();
        self.current_phase = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to(demo: &mut LocomotionDemo, tick: u64) -> OutputData {
        let input = InputData::default();
        let mut last = None;
        while demo.counter() < tick {
            match demo.tick(&input).unwrap() {
                Step::Command(cmd) => last = Some(cmd),
                Step::Finished => break,
            }
        }
        last.unwrap()
    }

    #[test]
    fn test_phase_boundaries() {
        let mut demo = LocomotionDemo::new().unwrap();
        assert_eq!(run_to(&mut demo, 1).robot_fsm_cmd, FsmState::RecoveryStand);
        assert_eq!(run_to(&mut demo, 3999).robot_fsm_cmd, FsmState::RecoveryStand);
        assert_eq!(run_to(&mut demo, 4000).robot_fsm_cmd, FsmState::BalanceStand);
        assert_eq!(run_to(&mut demo, 9000).robot_fsm_cmd, FsmState::Trot);
        assert_eq!(run_to(&mut demo, 19000).robot_fsm_cmd, FsmState::BalanceStand);
        assert_eq!(run_to(&mut demo, 19999).robot_fsm_cmd, FsmState::BalanceStand);
        assert_eq!(demo.tick(&InputData::default()).unwrap(), Step::Finished);
    }

    #[test]
    fn test_balance_sway() {
        let mut demo = LocomotionDemo::new().unwrap();
        let cmd = run_to(&mut demo, 4000);
        assert_eq!(cmd.motion_cmd.body_height, 0.28);
        assert_eq!(cmd.motion_cmd.rpy_des, [0.0, 0.0, 0.0]);

        // k = 2500: roll 峰值，pitch 过零，yaw 负峰
        let cmd = run_to(&mut demo, 6500);
        assert!((cmd.motion_cmd.rpy_des[0] - 0.2).abs() < 1e-5);
        assert!(cmd.motion_cmd.rpy_des[1].abs() < 1e-5);
        assert!((cmd.motion_cmd.rpy_des[2] + 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_trot_carries_body_height() {
        let mut demo = LocomotionDemo::new().unwrap();
        let cmd = run_to(&mut demo, 9000);
        assert_eq!(cmd.motion_cmd.v_des, [0.2, 0.0, 0.0]);
        assert_eq!(cmd.motion_cmd.step_height, 0.05);
        assert_eq!(cmd.motion_cmd.body_height, 0.28);
        assert_eq!(cmd.motion_cmd.rpy_des[1], 0.0);

        let cmd = run_to(&mut demo, 19000);
        assert_eq!(cmd.motion_cmd.body_height, 0.3);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut demo = LocomotionDemo::new().unwrap();
        run_to(&mut demo, 5000);
        demo.reset();
        assert_eq!(demo.counter(), 0);
        let cmd = run_to(&mut demo, 1);
        assert_eq!(cmd.robot_fsm_cmd, FsmState::RecoveryStand);
        assert_eq!(cmd.motion_cmd, MotionCmd::default());
    }

    #[test]
    fn test_time_jump_advances_counter() {
        let mut demo = LocomotionDemo::new().unwrap();
        run_to(&mut demo, 10);
        demo.on_time_jump(25000).unwrap();
        assert_eq!(demo.tick(&InputData::default()).unwrap(), Step::Finished);
    }
}
