//! Run the controller against simulated axes, speaking the line protocol on
//! stdin/stdout. Handy for exercising a host without a table on the desk:
//!
//! ```text
//! echo '0.0,0.0;3.14,1.0;' | cargo run --example simulate -- --max-speed 1e6
//! ```

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};

use anyhow::Result;
use clap::Parser;
use log::trace;
use sable_firmware::{Controller, Device, Link, OperatingSystemClock};
use sable_geom::ConfigBuilder;

#[derive(Parser)]
struct Args {
    /// Interpolation resolution in (theta, rho) distance.
    #[arg(long, default_value_t = 0.05)]
    resolution: f32,

    /// Shared maximum axis speed, steps per second. The default is far above
    /// a real table's so scripted runs finish quickly.
    #[arg(long, default_value_t = 100_000.0)]
    max_speed: f32,

    /// Emulate the firmware variant without a SET_SPEED command.
    #[arg(long)]
    no_speed_command: bool,

    /// Emulate the firmware variant whose RESET_THETA zeroes the stored
    /// position.
    #[arg(long)]
    reset_theta_rezeroes: bool,
}

/// Lines arrive from a reader thread; `poll_line` just drains the channel.
struct StdioLink {
    lines: Receiver<String>,
}

impl Link for StdioLink {
    fn poll_line(&mut self) -> Option<String> {
        self.lines.try_recv().ok()
    }

    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }
}

struct SimMotor {
    name: &'static str,
    steps: i64,
}

impl SimMotor {
    fn new(name: &'static str) -> Self {
        SimMotor { name, steps: 0 }
    }
}

impl Device for SimMotor {
    fn forward(&mut self) {
        self.steps += 1;
        trace!("{} -> {}", self.name, self.steps);
    }

    fn backward(&mut self) {
        self.steps -= 1;
        trace!("{} -> {}", self.name, self.steps);
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let config = ConfigBuilder::default()
        .with_interpolation_resolution(args.resolution)
        .with_max_speed(args.max_speed)
        .with_homing_speed(args.max_speed)
        .with_speed_command(!args.no_speed_command)
        .with_reset_theta_rezeroes(args.reset_theta_rezeroes)
        .build();

    let mut controller = Controller::new(
        config,
        StdioLink { lines: rx },
        SimMotor::new("rotation"),
        SimMotor::new("radial"),
        OperatingSystemClock::new(),
    );
    controller.run()
}
