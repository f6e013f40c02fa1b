//! 底层关节插值演示
//!
//! 进入 LowLevelControl 后，先从当前姿态插值到低姿态，然后在低/高姿态之间循环起伏。
//! 启动时若机器人不在 Passive，会先请求 Passive 并等待 `settle_period_ms`。
//!
//! 使用方式：
//! ```bash
//! cargo run -p magic-sdk --example low_level_joint_interpolation
//!
//! # 模拟机器人上电时处于 RecoveryStand，观察安全检查
//! cargo run -p magic-sdk --example low_level_joint_interpolation -- --initial-state recovery-stand
//!
//! # 从 TOML 加载控制循环配置，运行 10000 个周期后退出
//! cargo run -p magic-sdk --example low_level_joint_interpolation -- --config loop.toml --max-ticks 10000
//! ```

use anyhow::Context;
use clap::Parser;
use magic_sdk::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::info;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "low_level_joint_interpolation")]
#[command(about = "底层关节插值演示（模拟设备）")]
struct Args {
    /// 控制循环配置文件（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 最多运行的周期数
    #[arg(long)]
    max_ticks: Option<u64>,

    /// 模拟机器人上电时的 FSM 状态
    #[arg(long, default_value = "passive", value_parser = parse_state)]
    initial_state: FsmState,

    /// PD 比例增益
    #[arg(long, default_value_t = 100.0)]
    kp: f32,

    /// PD 微分增益
    #[arg(long, default_value_t = 1.2)]
    kd: f32,
}

fn parse_state(value: &str) -> Result<FsmState, String> {
    let wanted = value.replace(['-', '_'], "").to_ascii_lowercase();
    FsmState::ALL
        .into_iter()
        .find(|state| state.name().to_ascii_lowercase() == wanted)
        .ok_or_else(|| format!("unknown FSM state '{}'", value))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    magic_sdk::init_logging();

    let mut config = match &args.config {
        Some(path) => LoopConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => LoopConfig::default(),
    };
    if args.max_ticks.is_some() {
        config.max_ticks = args.max_ticks;
    }

    let robot = SimRobot::new(SimConfig {
        initial_state: args.initial_state,
        connection_timeout: config.connection_timeout(),
        ..SimConfig::default()
    });
    let device = robot.spawn().context("starting simulated robot")?;

    let plan = magic_sdk::client::control::body_cycle_plan()?;
    let demo = JointInterpolationDemo::with_plan(plan, args.kp, args.kd)?;
    let mut control = ExchangeLoop::new(robot.exchange(), demo, config)?;

    let shutdown = control.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
        println!("\n收到退出信号，正在关闭...");
    })?;
    info!("[Ctrl C] to exit...");

    let summary = control.run()?;
    device.stop();

    let metrics = control.channel().metrics().snapshot();
    println!("停止原因: {:?}", summary.reason);
    println!("周期数: {}，已发送命令: {}", summary.stats.cycles, summary.stats.commanded);
    println!(
        "超时周期: {}，被拒绝的转换: {}，陈旧遥测比例: {:.1}%",
        summary.stats.overruns,
        summary.stats.rejected_transitions,
        metrics.stale_rate()
    );
    println!("设备最终状态: {}", robot.fsm_state());
    Ok(())
}
