//! 按键遥控演示
//!
//! 初始化会话、连接、切换到高层控制，然后在后台以 100Hz 发送最新的摇杆值。
//! 终端按行读取按键（每行可以包含多个按键，回车生效）。
//!
//! 按键功能说明：
//!   ESC / quit  退出程序
//!   1           位控站立
//!   2           力控站立
//!   3           执行特技-趴下
//!   w / x       向前 / 向后移动
//!   a / d       向左 / 向右移动
//!   t / g       左转 / 右转
//!   s           停止移动
//!
//! 使用方式：
//! ```bash
//! cargo run -p magic-sdk --example joystick_teleop -- --local-ip 192.168.54.111
//! ```

use anyhow::{Context, bail};
use clap::Parser;
use magic_sdk::client::session::{SimHighLevelMotion, SimSession};
use magic_sdk::client::teleop::{KEY_ESC, KeyOutcome};
use magic_sdk::prelude::*;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "joystick_teleop")]
#[command(about = "按键遥控演示（模拟高层运动服务）")]
struct Args {
    /// 与机器人直连的本机网卡地址
    #[arg(long, default_value = "192.168.54.111")]
    local_ip: String,

    /// 远端调用超时（毫秒）
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// 摇杆命令发送频率（Hz）
    #[arg(long, default_value_t = 100.0)]
    rate_hz: f64,

    /// 模拟步态切换耗时（毫秒）
    #[arg(long, default_value_t = 200)]
    gait_switch_ms: u64,
}

fn print_help() {
    println!("按键功能说明:");
    println!("  ESC/quit 退出程序");
    println!("  1        位控站立");
    println!("  2        力控站立");
    println!("  3        执行特技-趴下");
    println!("  w / x    向前 / 向后移动");
    println!("  a / d    向左 / 向右移动");
    println!("  t / g    左转 / 右转");
    println!("  s        停止移动");
}

fn line_to_keys(line: &str) -> Vec<u8> {
    match line.trim() {
        "esc" | "quit" => vec![KEY_ESC],
        other => other.bytes().filter(|b| !b.is_ascii_whitespace()).collect(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    magic_sdk::init_logging();

    let motion = Arc::new(SimHighLevelMotion::with_gait_switch_delay(Duration::from_millis(
        args.gait_switch_ms,
    )));
    let mut session = SimSession::new(motion);

    if !session.initialize(&args.local_ip) {
        session.shutdown();
        bail!("robot sdk initialize failed ({})", args.local_ip);
    }
    session.set_timeout(args.timeout_ms);

    let status = session.connect();
    if let Err(e) = status.into_result() {
        session.shutdown();
        return Err(e).context("connect robot failed");
    }
    if let Err(e) = session.set_motion_control_level(ControllerLevel::HighLevel).into_result() {
        session.shutdown();
        return Err(e).context("switch robot motion control level failed");
    }

    let mut teleop = TeleopSession::with_rate(session.high_level_motion(), args.rate_hz)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        println!("\n收到退出信号，回车后退出...");
    })?;

    print_help();
    let stdin = std::io::stdin();
    'input: for line in stdin.lock().lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        for key in line_to_keys(&line?) {
            match teleop.handle_key(key) {
                Ok(KeyOutcome::Quit) => break 'input,
                Ok(KeyOutcome::Handled(action)) => info!("key '{}' -> {:?}", key as char, action),
                Ok(KeyOutcome::Ignored) => println!("未绑定的按键: {}", key as char),
                Err(e) => error!("key '{}' failed: {}", key as char, e),
            }
        }
    }

    teleop.stop();
    info!(
        "joystick commands sent: {}, failed: {}",
        teleop.publisher().sent(),
        teleop.publisher().failures()
    );
    if let Err(e) = session.disconnect().into_result() {
        error!("disconnect robot failed: {}", e);
    }
    session.shutdown();
    Ok(())
}
