//! The motion controller: a four-state machine driving both axes.
//!
//! `Boot → Homing → Ready ⇄ Executing`. Boot runs once and homes
//! unconditionally. Homing and batch execution block the loop, so from the
//! wire's point of view `Executing` is indistinguishable from `Ready`: no
//! partial-completion reply is ever sent mid-batch.

use log::{debug, info, warn};

use crate::link::Link;
use crate::stepper::{Axis, Device, Endstop, SystemClock};
use sable_geom::{CalibrationState, Config, Waypoint};
use sable_protocol::{Batch, Reply, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Transient; the first tick homes and leaves it forever.
    Boot,
    /// Driving the radial carriage to its inward stop.
    Homing,
    /// Idle, accepting the next line.
    Ready,
    /// Draining a batch. Only ever observed from inside the drain.
    Executing,
}

/// The controller owns both axes, the serial link and the calibration
/// state; nothing else touches them.
pub struct Controller<L, R, A, C> {
    config: Config,
    calibration: CalibrationState,
    state: State,
    link: L,
    rotation: Axis<R>,
    radial: Axis<A>,
    clock: C,
    radial_endstop: Option<Box<dyn Endstop>>,
    /// Shared maximum speed of both axes, replaceable at runtime by
    /// `SET_SPEED` on profiles that allow it.
    max_speed: f32,
}

impl<L, R, A, C> Controller<L, R, A, C>
where
    L: Link,
    R: Device,
    A: Device,
    C: SystemClock,
{
    pub fn new(config: Config, link: L, rotation: R, radial: A, clock: C) -> Self {
        Controller {
            max_speed: config.max_speed,
            config,
            calibration: CalibrationState::new(),
            state: State::Boot,
            link,
            rotation: Axis::new(rotation),
            radial: Axis::new(radial),
            clock,
            radial_endstop: None,
        }
    }

    /// Give the radial axis a homing sensor. With one, homing stops at the
    /// trigger; without, it runs the full open-loop travel heuristic.
    pub fn with_radial_endstop(mut self, endstop: Box<dyn Endstop>) -> Self {
        self.radial_endstop = Some(endstop);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    /// (rotation, radial) step counters, as the axes believe them.
    pub fn positions(&self) -> (i64, i64) {
        (
            self.rotation.current_position(),
            self.radial.current_position(),
        )
    }

    /// Drive the control loop forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
        }
    }

    /// One pass of the control loop.
    ///
    /// The first pass emits the ready-marker and homes. Every later pass
    /// reads at most one input line and services it to completion before
    /// returning, so a second line arriving mid-batch waits in the link's
    /// buffer until the next pass.
    pub fn tick(&mut self) {
        if self.state == State::Boot {
            self.link.write_line(Reply::Ready.as_str());
            self.home();
            return;
        }
        let Some(line) = self.link.poll_line() else {
            return;
        };
        // Tolerate hosts that terminate with CRLF.
        let line = line.trim_end_matches('\r');
        match Request::parse(line, self.config.speed_command) {
            Some(Request::Home) => self.home(),
            Some(Request::ResetTheta) => self.reset_theta(),
            Some(Request::SetSpeed(speed)) => self.set_speed(speed),
            Some(Request::Batch(batch)) => self.execute(batch),
            None => {
                debug!("ignoring line {line:?}");
                self.link.write_line(Reply::Ignored.as_str());
            }
        }
    }

    /// Drive the radial carriage inward until it must have reached the hard
    /// stop (or the endstop says so), then declare the origin.
    fn home(&mut self) {
        self.state = State::Homing;
        self.link.write_line(Reply::Homing.as_str());
        let travel = self.config.homing_travel_steps();
        info!("homing: driving radial axis {travel} steps inward");
        self.radial.set_speed(self.config.homing_speed);
        self.radial.move_to(self.radial.current_position() - travel);
        while self.radial.distance_to_go() != 0 {
            if let Some(endstop) = &self.radial_endstop {
                if endstop.triggered() {
                    debug!("endstop triggered, ending homing early");
                    break;
                }
            }
            self.radial.poll(&self.clock);
        }
        self.rotation.set_current_position(0);
        self.radial.set_current_position(0);
        self.calibration.home();
        self.state = State::Ready;
        self.link.write_line(Reply::Homed.as_str());
    }

    /// Arm the seek path for the next waypoint. Whether the stored position
    /// is also zeroed is a machine-profile choice: the variant that
    /// interpolates across pattern boundaries keeps it.
    fn reset_theta(&mut self) {
        self.calibration.first_waypoint = true;
        if self.config.reset_theta_rezeroes {
            self.calibration.current = Waypoint::origin();
        }
        self.link.write_line(Reply::ThetaReset.as_str());
        self.link.write_line(Reply::Ready.as_str());
    }

    fn set_speed(&mut self, steps_per_second: f32) {
        if steps_per_second > 0.0 {
            info!("max speed set to {steps_per_second} steps/s");
            self.max_speed = steps_per_second;
            self.link.write_line(Reply::SpeedSet.as_str());
            self.link.write_line(Reply::Ready.as_str());
        } else {
            self.link.write_line(Reply::InvalidSpeed.as_str());
        }
    }

    /// Drain one batch, blocking until every waypoint is reached, then tell
    /// the host we're idle again.
    fn execute(&mut self, batch: Batch) {
        self.state = State::Executing;
        debug!("executing batch of {} waypoints", batch.len());
        if batch.is_full() {
            // Anything past capacity was dropped at parse time; the wire
            // reply won't say so.
            warn!("batch at capacity; any overflow was silently truncated");
        }
        for waypoint in batch {
            if self.calibration.first_waypoint {
                self.seek(waypoint);
                self.calibration.first_waypoint = false;
            } else {
                let from = self.calibration.current;
                for point in self.config.interpolate(from, waypoint) {
                    self.move_to(point);
                }
            }
        }
        self.state = State::Ready;
        self.link.write_line(Reply::Ready.as_str());
    }

    /// Direct, non-interpolated move to the first waypoint of a pattern.
    ///
    /// Re-bases the radial counter by the drag accumulated under the
    /// previous pattern's net turns, so the fresh pattern starts from an
    /// undragged radial zero, then starts counting revolutions anew.
    fn seek(&mut self, waypoint: Waypoint) {
        let drag = self.config.drag_steps(self.calibration.total_revolutions) as i64;
        debug!(
            "seek to ({}, {}); re-basing radial by {drag} steps",
            waypoint.theta.radians, waypoint.rho
        );
        self.radial
            .set_current_position(self.radial.current_position() + drag);
        self.calibration.total_revolutions = 0.0;
        self.move_to(waypoint);
    }

    /// Blocking synchronized move: the axis with fewer steps to go runs
    /// proportionally slower, so both arrive together. Open loop, so it
    /// cannot fail: a stalled motor looks exactly like an arrived one.
    fn move_to(&mut self, waypoint: Waypoint) {
        let target = self.config.to_steps(&waypoint);
        let rotation_delta = (target.rotation as i64 - self.rotation.current_position()).abs();
        let radial_delta = (target.radial as i64 - self.radial.current_position()).abs();
        let dominant = rotation_delta.max(radial_delta);
        if dominant > 0 {
            self.rotation
                .set_speed(self.max_speed * rotation_delta as f32 / dominant as f32);
            self.radial
                .set_speed(self.max_speed * radial_delta as f32 / dominant as f32);
            self.rotation.move_to(target.rotation as i64);
            self.radial.move_to(target.radial as i64);
            while self.rotation.distance_to_go() != 0 || self.radial.distance_to_go() != 0 {
                self.rotation.poll(&self.clock);
                self.radial.poll(&self.clock);
            }
        }
        self.calibration.commit(waypoint);
    }
}
