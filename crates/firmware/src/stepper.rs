//! Open-loop stepper axes.
//!
//! An [`Axis`] pairs a step-pulse device with a signed position counter and
//! a constant-speed pacer. There is no feedback: the counter is the number
//! of pulses emitted, and a stalled motor is indistinguishable from one that
//! arrived.

use core::time::Duration;

/// An interface to one stepper motor's pulse generator.
pub trait Device {
    /// Take one step outward / counterclockwise.
    fn forward(&mut self);
    /// Take one step inward / clockwise.
    fn backward(&mut self);
}

/// Something which records the elapsed real time.
pub trait SystemClock {
    /// Time passed since a clock-specific reference point, e.g. startup.
    fn elapsed(&self) -> Duration;
}

impl<F> SystemClock for F
where
    F: Fn() -> Duration,
{
    fn elapsed(&self) -> Duration {
        self()
    }
}

/// A monotonically non-decreasing clock backed by the operating system.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingSystemClock {
    created_at: std::time::Instant,
}

impl OperatingSystemClock {
    pub fn new() -> OperatingSystemClock {
        OperatingSystemClock::default()
    }
}

impl SystemClock for OperatingSystemClock {
    fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Default for OperatingSystemClock {
    fn default() -> OperatingSystemClock {
        OperatingSystemClock {
            created_at: std::time::Instant::now(),
        }
    }
}

/// An optional homing sensor. Axes without one home open loop.
pub trait Endstop {
    /// True while the switch is held.
    fn triggered(&self) -> bool;
}

// Speeds are floored so the step interval stays finite.
const MIN_SPEED: f32 = 1e-3;

/// One axis: a pulse device, a position counter and a constant-speed pacer.
#[derive(Debug)]
pub struct Axis<D> {
    device: D,
    position: i64,
    target: i64,
    speed: f32,
    last_step: Option<Duration>,
}

impl<D> Axis<D> {
    pub fn new(device: D) -> Axis<D> {
        Axis {
            device,
            position: 0,
            target: 0,
            speed: 1.0,
            last_step: None,
        }
    }

    pub fn current_position(&self) -> i64 {
        self.position
    }

    pub fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }

    /// Re-declare where the axis is without moving it. Also retargets, so
    /// the axis holds still until the next `move_to`. Used by homing to
    /// zero the counter and by the seek path to re-base it.
    pub fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.target = position;
    }

    /// Set the constant speed, in steps per second, for subsequent moves.
    pub fn set_speed(&mut self, steps_per_second: f32) {
        self.speed = steps_per_second.max(MIN_SPEED);
    }

    pub fn move_to(&mut self, target: i64) {
        self.target = target;
        self.last_step = None;
    }
}

impl<D: Device> Axis<D> {
    /// Issue at most one step, if one is due at the current speed.
    ///
    /// Returns whether a step was taken. Call as often as possible while a
    /// move is in flight; the pacer turns call frequency into step timing.
    pub fn poll<C: SystemClock>(&mut self, clock: &C) -> bool {
        if self.position == self.target {
            return false;
        }
        let now = clock.elapsed();
        let interval = Duration::from_secs_f32(1.0 / self.speed);
        let due = match self.last_step {
            None => true,
            Some(at) => now.checked_sub(at).is_some_and(|since| since >= interval),
        };
        if !due {
            return false;
        }
        self.last_step = Some(now);
        if self.target > self.position {
            self.position += 1;
            self.device.forward();
        } else {
            self.position -= 1;
            self.device.backward();
        }
        true
    }
}
