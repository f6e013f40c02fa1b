//! 控制层属性测试

use magic_client::FsmGate;
use magic_client::control::{JointInterpolationDemo, Step, TickController, lerp, ramp_fraction};
use magic_protocol::{FsmState, InputData, JointArray, JointId, Leg, LegJoint, attempt_transition};
use proptest::prelude::*;

fn input_at(q: JointArray<f32>) -> InputData {
    let mut input = InputData::default();
    input.motor_data.q = q;
    input
}

fn state(index: usize) -> FsmState {
    FsmState::ALL[index]
}

proptest! {
    /// 经过 FsmGate 的请求相对设备当前状态永远合法
    #[test]
    fn gate_output_is_legal_for_device(
        steps in prop::collection::vec((0usize..6, prop::option::of(0usize..6)), 1..200)
    ) {
        let mut gate = FsmGate::new();
        let mut device = FsmState::Passive;

        for (requested, external) in steps {
            // 外部（遥控器等）改变了设备状态
            if let Some(forced) = external {
                device = state(forced);
            }
            gate.observe(device);

            let sent = gate.filter(state(requested));
            prop_assert!(attempt_transition(device, sent).is_ok(), "{} -> {}", device, sent);

            gate.mark_issued(sent);
            device = sent;
        }
    }

    /// 没有上报时以最后发出的目标为准
    #[test]
    fn gate_without_reports_follows_issued(requests in prop::collection::vec(0usize..6, 1..100)) {
        let mut gate = FsmGate::new();
        let mut current = FsmState::Passive;
        for requested in requests {
            let sent = gate.filter(state(requested));
            prop_assert!(attempt_transition(current, sent).is_ok());
            gate.mark_issued(sent);
            current = sent;
        }
    }

    /// 任意计数下增益都非负，目标有限
    #[test]
    fn joint_demo_gains_non_negative(
        anchor in -2.0f32..2.0,
        ticks in 1usize..3000,
        jump in 0u64..100_000,
    ) {
        let mut demo = JointInterpolationDemo::new().unwrap();
        let input = input_at(JointArray::splat(anchor));
        demo.start(&input).unwrap();

        for i in 0..ticks {
            if i == ticks / 2 {
                demo.on_time_jump(jump).unwrap();
            }
            let Step::Command(cmd) = demo.tick(&input).unwrap() else {
                panic!("joint demo never finishes");
            };
            prop_assert!(cmd.motor_cmd.validate().is_ok());
            prop_assert!(cmd.motor_cmd.kp.iter().all(|&kp| kp >= 0.0));
            prop_assert!(cmd.motor_cmd.kd.iter().all(|&kd| kd >= 0.0));
            prop_assert!(cmd.motor_cmd.q_des.iter().all(|q| q.is_finite()));
            prop_assert!(demo.counter() < 2500);
        }
    }

    /// FR-HAA 起始姿态的差异只出现在索引 0
    #[test]
    fn front_right_haa_stays_on_index_zero(
        marker in -3.0f32..3.0,
        base in -1.0f32..1.0,
        ticks in 1usize..1000,
    ) {
        let mut anchor = JointArray::splat(base);
        anchor[JointId::new(Leg::FrontRight, LegJoint::Haa)] = marker;
        let input = input_at(anchor);

        let mut demo = JointInterpolationDemo::new().unwrap();
        demo.start(&input).unwrap();
        let mut last = None;
        for _ in 0..ticks {
            if let Step::Command(cmd) = demo.tick(&input).unwrap() {
                last = Some(cmd);
            }
        }
        let cmd = last.unwrap();

        // 第一段：t = ticks / 1000
        let t = ticks as f32 / 1000.0;
        let expected_other = lerp(base, 0.0, t);
        for leg in [Leg::FrontLeft, Leg::RearRight, Leg::RearLeft] {
            let q = cmd.motor_cmd.q_des[JointId::new(leg, LegJoint::Haa)];
            prop_assert!((q - expected_other).abs() < 1e-4, "{:?} HAA = {}", leg, q);
        }
        let q0 = cmd.motor_cmd.q_des[0];
        prop_assert!((q0 - lerp(marker, 0.0, t)).abs() < 1e-4);
    }

    /// 插值端点精确，中间值不越界
    #[test]
    fn lerp_stays_between_endpoints(a in -4.0f32..4.0, b in -4.0f32..4.0, t in 0.0f32..=1.0) {
        prop_assert_eq!(lerp(a, b, 0.0), a);
        prop_assert_eq!(lerp(a, b, 1.0), b);
        let v = lerp(a, b, t);
        prop_assert!(v >= a.min(b) - 1e-5 && v <= a.max(b) + 1e-5, "lerp({}, {}, {}) = {}", a, b, t, v);
    }

    /// 插值比例落在 [0, 1] 且随计数单调
    #[test]
    fn ramp_fraction_is_clamped_and_monotonic(
        counter in 0u64..5000,
        offset in 0u64..3000,
        ramp in 0u64..2000,
    ) {
        let t = ramp_fraction(counter, offset, ramp);
        prop_assert!((0.0..=1.0).contains(&t));
        prop_assert!(ramp_fraction(counter + 1, offset, ramp) >= t);
    }
}

#[test]
fn wrap_at_2500_lands_on_j1() {
    let mut demo = JointInterpolationDemo::new().unwrap();
    let input = input_at(JointArray::splat(0.1));
    demo.start(&input).unwrap();

    let mut commands = Vec::new();
    for _ in 0..2500 {
        if let Step::Command(cmd) = demo.tick(&input).unwrap() {
            commands.push(cmd);
        }
    }
    assert_eq!(demo.counter(), 1000);

    let j1 = JointArray::from_leg_pattern(magic_client::control::low_level::J1);
    assert_eq!(commands[999].motor_cmd.q_des, j1);
    assert_eq!(commands[2499].motor_cmd.q_des, j1);
}
