//! 集成步态演示
//!
//! RecoveryStand 站立 → BalanceStand 姿态展示 → Trot 小跑 → BalanceStand，
//! 共 20000 个周期（500Hz 下 40 秒），之后自动退出。
//!
//! 使用方式：
//! ```bash
//! cargo run -p magic-sdk --example high_level_walk
//!
//! # 转换需要若干设备周期才生效
//! cargo run -p magic-sdk --example high_level_walk -- --transition-steps 50
//! ```

use anyhow::Context;
use clap::Parser;
use magic_sdk::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::info;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "high_level_walk")]
#[command(about = "站立、姿态展示与小跑演示（模拟设备）")]
struct Args {
    /// 控制循环配置文件（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 模拟设备完成一次 FSM 转换所需的周期数
    #[arg(long, default_value_t = 0)]
    transition_steps: u32,

    /// 状态打印间隔（毫秒）
    #[arg(long, default_value_t = 1000)]
    report_interval_ms: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    magic_sdk::init_logging();

    let config = match &args.config {
        Some(path) => LoopConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => LoopConfig::default(),
    };

    let robot = SimRobot::new(SimConfig {
        transition_steps: args.transition_steps,
        connection_timeout: config.connection_timeout(),
        ..SimConfig::default()
    });
    let device = robot.spawn().context("starting simulated robot")?;

    let mut control = ExchangeLoop::new(robot.exchange(), LocomotionDemo::new()?, config)?;
    let shutdown = control.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
        println!("\n收到退出信号，正在关闭...");
    })?;

    let report_interval = Duration::from_millis(args.report_interval_ms.max(1));
    let mut last_report = std::time::Instant::now();
    loop {
        if control.shutdown_handle().load(Ordering::SeqCst) {
            break;
        }
        let event = control.run_once()?;
        if event == LoopEvent::Finished {
            break;
        }
        if last_report.elapsed() >= report_interval {
            last_report = std::time::Instant::now();
            let motion = robot.last_command().map(|cmd| cmd.motion_cmd).unwrap_or_default();
            info!(
                "tick {} fsm={} rpy={:?} v={:?} height={:.2}",
                control.controller().counter(),
                robot.fsm_state(),
                motion.rpy_des,
                motion.v_des,
                motion.body_height
            );
        }
    }
    device.stop();

    let stats = control.stats();
    println!(
        "周期数: {}，已发送命令: {}，被拒绝的转换: {}，设备拒绝: {}",
        stats.cycles,
        stats.commanded,
        stats.rejected_transitions,
        robot.rejected_transitions()
    );
    Ok(())
}
