//! 输入输出数据结构
//!
//! 与设备端交换的两类数据：
//!
//! - [`InputData`]：设备 → 主机的遥测（FSM 状态、IMU、关节、状态估计）
//! - [`OutputData`]：主机 → 设备的命令（FSM 请求、关节命令、运动意图）
//!
//! 两者都是单个控制周期内的临时值：每个周期重新构造，发送后丢弃。

use crate::error::ProtocolError;
use crate::fsm::FsmState;
use crate::joint::{JOINT_COUNT, JointArray, JointId};

/// IMU 原始数据
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImuData {
    /// 四元数，顺序 w, x, y, z
    pub quat: [f32; 4],
    /// 角速度 x, y, z（rad/s）
    pub gyro: [f32; 3],
    /// 线加速度 x, y, z（m/s²）
    pub acc: [f32; 3],
}

/// 12 关节反馈
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorData {
    /// 关节位置（rad）
    pub q: JointArray<f32>,
    /// 关节速度（rad/s）
    pub dq: JointArray<f32>,
    /// 估计力矩（N·m）
    pub tau_est: JointArray<f32>,
}

/// 机身状态估计
///
/// 起始位姿为原点、零姿态。进入 LowLevelControl 后接触时序丢失，
/// 估计结果不可用，见 [`InputData::estimate`]。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimateData {
    /// 设备端时间戳（ns）
    pub timestamp: i64,
    /// 机身位置 x, y, z（m）
    pub p: [f32; 3],
    /// 机身系线速度
    pub v_body: [f32; 3],
    /// 世界系线速度
    pub v_world: [f32; 3],
    /// 欧拉角 roll, pitch, yaw（rad）
    pub rpy: [f32; 3],
    /// 四元数，顺序 x, y, z, w（注意与 IMU 不同）
    pub quat: [f32; 4],
    /// 机身系角速度
    pub w_body: [f32; 3],
    /// 世界系角速度
    pub w_world: [f32; 3],
    /// 足端接触状态，仅在 Trot 下赋值
    pub contact: [f32; 4],
}

/// 遥测快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputData {
    /// 当前 FSM 状态码（原始值，可能是未知码）
    pub robot_fsm_data: i8,
    pub imu_data: ImuData,
    pub motor_data: MotorData,
    pub estimate_data: EstimateData,
}

impl InputData {
    /// 解析当前 FSM 状态
    pub fn fsm_state(&self) -> Result<FsmState, ProtocolError> {
        FsmState::from_code(self.robot_fsm_data)
    }

    /// 状态估计（LowLevelControl 下返回 `None`）
    pub fn estimate(&self) -> Option<&EstimateData> {
        match self.fsm_state() {
            Ok(FsmState::LowLevelControl) => None,
            _ => Some(&self.estimate_data),
        }
    }
}

/// 12 关节命令
///
/// 设备端最终下发到电机的力矩为：
///
/// ```text
/// tau_final = tau_des + kp * (q_des - q_cur) + kd * (dq_des - dq_cur)
/// ```
///
/// `kp`、`kd` 必须非负，负增益会让关节发散。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorCmd {
    /// 期望位置（rad）
    pub q_des: JointArray<f32>,
    /// 期望速度（rad/s）
    pub dq_des: JointArray<f32>,
    /// 前馈力矩（N·m）
    pub tau_des: JointArray<f32>,
    /// 位置增益（N·m/rad）
    pub kp: JointArray<f32>,
    /// 速度增益（N·m/(rad/s)）
    pub kd: JointArray<f32>,
}

impl MotorCmd {
    /// 纯 PD 位置保持命令（零速度、零前馈，所有关节同一组增益）
    pub fn position(q_des: JointArray<f32>, kp: f32, kd: f32) -> Self {
        MotorCmd {
            q_des,
            dq_des: JointArray::splat(0.0),
            tau_des: JointArray::splat(0.0),
            kp: JointArray::splat(kp),
            kd: JointArray::splat(kd),
        }
    }

    /// 按混合律计算设备端的最终力矩
    pub fn final_torque(&self, state: &MotorData) -> JointArray<f32> {
        JointArray::new(std::array::from_fn(|i| {
            self.tau_des[i]
                + self.kp[i] * (self.q_des[i] - state.q[i])
                + self.kd[i] * (self.dq_des[i] - state.dq[i])
        }))
    }

    /// 检查增益非负且所有目标值有限
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for i in 0..JOINT_COUNT {
            let joint = joint_at(i);
            for (gain, value) in [("kp", self.kp[i]), ("kd", self.kd[i])] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ProtocolError::InvalidGain { joint, gain, value });
                }
            }
            for (field, value) in [
                ("q_des", self.q_des[i]),
                ("dq_des", self.dq_des[i]),
                ("tau_des", self.tau_des[i]),
            ] {
                if !value.is_finite() {
                    return Err(ProtocolError::NonFiniteTarget { joint, field, value });
                }
            }
        }
        Ok(())
    }
}

fn joint_at(index: usize) -> JointId {
    match JointId::from_index(index) {
        Some(id) => id,
        None => unreachable!("joint index {index} out of range"),
    }
}

/// 集成运动意图（高层步态使用）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionCmd {
    /// 期望姿态 roll, pitch, yaw（rad），BalanceStand 下生效
    pub rpy_des: [f32; 3],
    /// 期望速度 vx（m/s）, vy（m/s）, wz（rad/s），Trot 下生效
    pub v_des: [f32; 3],
    /// 期望机身高度（m）
    pub body_height: f32,
    /// 摆动腿抬腿高度（m）
    pub step_height: f32,
}

/// 命令
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputData {
    /// 请求的 FSM 状态
    pub robot_fsm_cmd: FsmState,
    pub motor_cmd: MotorCmd,
    pub motion_cmd: MotionCmd,
}

impl OutputData {
    /// 只带 FSM 请求的空命令
    pub fn fsm(state: FsmState) -> Self {
        OutputData {
            robot_fsm_cmd: state,
            ..Default::default()
        }
    }

    pub fn with_motor(mut self, motor_cmd: MotorCmd) -> Self {
        self.motor_cmd = motor_cmd;
        self
    }

    pub fn with_motion(mut self, motion_cmd: MotionCmd) -> Self {
        self.motion_cmd = motion_cmd;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::{Leg, LegJoint};

    #[test]
    fn test_final_torque_mixing_law() {
        let mut cmd = MotorCmd::position(JointArray::splat(1.0), 100.0, 1.2);
        cmd.tau_des[3] = 0.5;
        cmd.dq_des[3] = 2.0;

        let mut state = MotorData::default();
        state.q[3] = 0.9;
        state.dq[3] = 1.5;

        let tau = cmd.final_torque(&state);
        // 0.5 + 100 * 0.1 + 1.2 * 0.5
        assert!((tau[3] - 11.1).abs() < 1e-4, "{}", tau[3]);
        // 其余关节 q=0, dq=0
        assert!((tau[0] - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_validate_rejects_negative_gain() {
        let mut cmd = MotorCmd::position(JointArray::splat(0.0), 10.0, 0.5);
        assert!(cmd.validate().is_ok());

        cmd.kd[JointId::new(Leg::RearRight, LegJoint::Hfe)] = -0.1;
        match cmd.validate() {
            Err(ProtocolError::InvalidGain { joint, gain, .. }) => {
                assert_eq!(joint.index(), 7);
                assert_eq!(gain, "kd");
            },
            other => panic!("expected InvalidGain, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_nan_target() {
        let mut cmd = MotorCmd::position(JointArray::splat(0.0), 10.0, 0.5);
        cmd.q_des[0] = f32::NAN;
        assert!(matches!(
            cmd.validate(),
            Err(ProtocolError::NonFiniteTarget { field: "q_des", .. })
        ));
    }

    #[test]
    fn test_estimate_hidden_in_low_level() {
        let mut input = InputData::default();
        assert!(input.estimate().is_some());
        input.robot_fsm_data = FsmState::LowLevelControl.code();
        assert!(input.estimate().is_none());
    }

    #[test]
    fn test_output_builder() {
        let cmd = OutputData::fsm(FsmState::Trot).with_motion(MotionCmd {
            v_des: [0.2, 0.0, 0.0],
            step_height: 0.05,
            ..Default::default()
        });
        assert_eq!(cmd.robot_fsm_cmd, FsmState::Trot);
        assert_eq!(cmd.motion_cmd.v_des[0], 0.2);
        assert_eq!(cmd.motor_cmd, MotorCmd::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_output_serde() {
        let cmd = OutputData::fsm(FsmState::BalanceStand).with_motion(MotionCmd {
            body_height: 0.28,
            ..Default::default()
        });
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"robot_fsm_cmd\":\"BalanceStand\""), "{}", json);
        let back: OutputData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
