//! Kinematics of the sable drawing table: a rotating arm ("rotation" axis)
//! and a radial in/out carriage ("radial" axis) tracing patterns given as
//! normalized polar waypoints.
//!
//! The two axes are mechanically coupled: every full turn of the arm drags
//! the radial carriage by `1/gear_ratio` of a revolution, so the radial step
//! target has to be corrected by the accumulated drag or the drawn radius
//! would drift with the arm's net turn count.
//!
//! This crate supports `no_std` and uses `libm` to allow for running in
//! embedded contexts.

#![cfg_attr(not(feature = "std"), no_std)]

use core::f32::consts::PI;
use libm::{roundf, sqrtf};

pub type Angle = euclid::Angle<f32>;

const TAU: f32 = 2.0 * PI;

/// A single drawing target in normalized polar coordinates.
///
/// `theta` is an unbounded signed angle: a pattern that spirals three times
/// around the table has a final theta near `6π`, not one wrapped to `[0, 2π)`.
/// `rho` is the normalized radius and is clamped to `[0, 1]` before it is
/// turned into steps.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Waypoint {
    pub theta: Angle,
    pub rho: f32,
}

impl Waypoint {
    pub fn new(theta_radians: f32, rho: f32) -> Self {
        Waypoint {
            theta: Angle::radians(theta_radians),
            rho,
        }
    }

    /// The home position: arm at zero, carriage fully inward.
    pub fn origin() -> Self {
        Waypoint::new(0.0, 0.0)
    }

    /// Euclidean distance in the (theta, rho) plane, the metric the
    /// interpolator subdivides by.
    pub fn distance(&self, other: &Waypoint) -> f32 {
        let dt = (other.theta - self.theta).radians;
        let dr = other.rho - self.rho;
        sqrtf(dt * dt + dr * dr)
    }
}

/// Absolute step-count targets for the two axes. Derived fresh for every
/// move, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTarget {
    pub rotation: i32,
    pub radial: i32,
}

/// Everything the controller knows about where the machine is.
///
/// Created once at startup, reset by homing, and committed at the end of
/// every completed move. Owned by the motion controller; nothing else
/// mutates it.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationState {
    /// Last commanded waypoint.
    pub current: Waypoint,
    /// Signed net arm turns since the last homing (or seek re-base),
    /// in revolutions.
    pub total_revolutions: f32,
    /// Routes the next waypoint through the seek path instead of
    /// interpolation. Set by homing and by `RESET_THETA`.
    pub first_waypoint: bool,
    /// True only after a completed homing pass.
    pub homed: bool,
}

impl CalibrationState {
    pub fn new() -> Self {
        CalibrationState {
            current: Waypoint::origin(),
            total_revolutions: 0.0,
            first_waypoint: true,
            homed: false,
        }
    }

    /// Reset to the origin after a completed homing pass.
    pub fn home(&mut self) {
        *self = CalibrationState {
            homed: true,
            ..CalibrationState::new()
        };
    }

    /// Record a completed move.
    pub fn commit(&mut self, wp: Waypoint) {
        self.total_revolutions += (wp.theta - self.current.theta).radians / TAU;
        self.current = wp;
    }
}

impl Default for CalibrationState {
    fn default() -> Self {
        CalibrationState::new()
    }
}

pub struct ConfigBuilder {
    steps_per_revolution_rotation: f32,
    steps_per_revolution_radial: f32,
    gear_ratio: f32,
    interpolation_resolution: f32,
    max_speed: f32,
    homing_speed: f32,
    reset_theta_rezeroes: bool,
    speed_command: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            steps_per_revolution_rotation: 2036.0,
            steps_per_revolution_radial: 4072.0,
            gear_ratio: 10.0,
            interpolation_resolution: 0.05,
            max_speed: 550.0,
            homing_speed: 300.0,
            reset_theta_rezeroes: false,
            speed_command: true,
        }
    }
}

impl ConfigBuilder {
    pub fn build(&self) -> Config {
        Config {
            steps_per_revolution_rotation: self.steps_per_revolution_rotation,
            steps_per_revolution_radial: self.steps_per_revolution_radial,
            gear_ratio: self.gear_ratio,
            interpolation_resolution: self.interpolation_resolution,
            max_speed: self.max_speed,
            homing_speed: self.homing_speed,
            reset_theta_rezeroes: self.reset_theta_rezeroes,
            speed_command: self.speed_command,
        }
    }

    pub fn with_steps_per_revolution_rotation(&mut self, steps: f32) -> &mut Self {
        self.steps_per_revolution_rotation = steps;
        self
    }

    pub fn with_steps_per_revolution_radial(&mut self, steps: f32) -> &mut Self {
        self.steps_per_revolution_radial = steps;
        self
    }

    pub fn with_gear_ratio(&mut self, ratio: f32) -> &mut Self {
        self.gear_ratio = ratio;
        self
    }

    pub fn with_interpolation_resolution(&mut self, resolution: f32) -> &mut Self {
        self.interpolation_resolution = resolution;
        self
    }

    pub fn with_max_speed(&mut self, steps_per_second: f32) -> &mut Self {
        self.max_speed = steps_per_second;
        self
    }

    pub fn with_homing_speed(&mut self, steps_per_second: f32) -> &mut Self {
        self.homing_speed = steps_per_second;
        self
    }

    pub fn with_reset_theta_rezeroes(&mut self, rezeroes: bool) -> &mut Self {
        self.reset_theta_rezeroes = rezeroes;
        self
    }

    pub fn with_speed_command(&mut self, enabled: bool) -> &mut Self {
        self.speed_command = enabled;
        self
    }
}

/// The machine profile of one sable table.
///
/// The two shipped firmware variants disagree on a couple of behaviors, so
/// those live here as knobs instead of being unified by guesswork:
/// `reset_theta_rezeroes` picks what `RESET_THETA` does to the stored
/// position, and `speed_command` picks whether the table accepts a runtime
/// `SET_SPEED` line at all.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Steps of the rotation motor per full turn of the arm.
    pub steps_per_revolution_rotation: f32,
    /// Steps of the radial motor across the full rho range, 0 to 1.
    pub steps_per_revolution_radial: f32,
    /// Mechanical coupling: one arm turn drags the radial carriage by
    /// `1/gear_ratio` of a revolution, whatever rho was commanded.
    pub gear_ratio: f32,
    /// Maximum (theta, rho)-plane distance between interpolated sub-points.
    pub interpolation_resolution: f32,
    /// Shared maximum speed of both axes, steps per second.
    pub max_speed: f32,
    /// Radial speed used while homing, steps per second.
    pub homing_speed: f32,
    /// Whether `RESET_THETA` also zeroes the stored theta/rho. The variant
    /// that interpolates across pattern boundaries keeps them.
    pub reset_theta_rezeroes: bool,
    /// Whether the `SET_SPEED` line is recognized at all.
    pub speed_command: bool,
}

impl Config {
    /// Convert a polar target into absolute step counts for both axes.
    ///
    /// The radial target is corrected by the drag the arm's net turns induce
    /// on the carriage, so the rho that gets drawn matches the rho that was
    /// commanded no matter how many turns theta has accumulated.
    pub fn to_steps(&self, wp: &Waypoint) -> AxisTarget {
        let theta = wp.theta.radians;
        let rotation = roundf(theta * self.steps_per_revolution_rotation / TAU) as i32;
        let rho = wp.rho.clamp(0.0, 1.0);
        let radial =
            roundf(rho * self.steps_per_revolution_radial) as i32 - self.drag_steps(theta / TAU);
        AxisTarget { rotation, radial }
    }

    /// Radial steps of drag induced by `revolutions` net turns of the arm.
    pub fn drag_steps(&self, revolutions: f32) -> i32 {
        roundf(revolutions * self.steps_per_revolution_rotation / self.gear_ratio) as i32
    }

    /// How far the radial axis travels inward while homing open loop: the
    /// full rho range plus 10%, so the carriage reaches the hard stop from
    /// any starting position. There is no sensor to say when it got there.
    pub fn homing_travel_steps(&self) -> i64 {
        (self.steps_per_revolution_radial * 1.1) as i64
    }

    /// Subdivide the segment from `from` to `to` at this profile's
    /// resolution.
    pub fn interpolate(&self, from: Waypoint, to: Waypoint) -> Interpolation {
        interpolate(from, to, self.interpolation_resolution)
    }
}

/// Linear interpolation between two waypoints in the (theta, rho) plane.
///
/// Yields `steps + 1` points for `steps = max(1, round(distance /
/// resolution))`, including both endpoints; the final point is `to` exactly,
/// with no accumulated rounding. Identical endpoints still yield two
/// (identical) points, so consecutive duplicate waypoints never stall the
/// consumer.
pub fn interpolate(from: Waypoint, to: Waypoint, resolution: f32) -> Interpolation {
    let distance = from.distance(&to);
    let steps = (roundf(distance / resolution) as u32).max(1);
    Interpolation {
        from,
        to,
        steps,
        next: 0,
    }
}

#[derive(Debug, Clone)]
pub struct Interpolation {
    from: Waypoint,
    to: Waypoint,
    steps: u32,
    next: u32,
}

impl Iterator for Interpolation {
    type Item = Waypoint;

    fn next(&mut self) -> Option<Waypoint> {
        if self.next > self.steps {
            return None;
        }
        let i = self.next;
        self.next += 1;
        if i == self.steps {
            return Some(self.to);
        }
        let t = i as f32 / self.steps as f32;
        Some(Waypoint {
            theta: Angle::radians(
                self.from.theta.radians + (self.to.theta - self.from.theta).radians * t,
            ),
            rho: self.from.rho + (self.to.rho - self.from.rho) * t,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.steps + 1 - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Interpolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> Config {
        ConfigBuilder::default().build()
    }

    #[test]
    fn rotation_steps_ignore_rho() {
        let cfg = config();
        let a = cfg.to_steps(&Waypoint::new(3.0, 0.0));
        let b = cfg.to_steps(&Waypoint::new(3.0, 0.7));
        assert_eq!(a.rotation, b.rotation);
    }

    #[test]
    fn rho_is_clamped() {
        let cfg = config();
        assert_eq!(
            cfg.to_steps(&Waypoint::new(0.0, 1.5)),
            cfg.to_steps(&Waypoint::new(0.0, 1.0))
        );
        assert_eq!(
            cfg.to_steps(&Waypoint::new(0.0, -0.3)),
            cfg.to_steps(&Waypoint::new(0.0, 0.0))
        );
    }

    #[test]
    fn drag_grows_with_revolutions() {
        let cfg = config();
        // Same rho, one extra full turn: the radial target drops by a full
        // gear-ratio's worth of drag.
        let one = cfg.to_steps(&Waypoint::new(TAU, 0.5));
        let two = cfg.to_steps(&Waypoint::new(2.0 * TAU, 0.5));
        let per_turn = roundf(cfg.steps_per_revolution_rotation / cfg.gear_ratio) as i32;
        assert_eq!(one.radial - two.radial, per_turn);
    }

    #[test]
    fn identical_endpoints_still_interpolate() {
        let wp = Waypoint::new(1.0, 0.5);
        let points: Vec<_> = interpolate(wp, wp, 0.1).collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], wp);
        assert_eq!(points[1], wp);
    }

    #[test]
    fn commit_tracks_revolutions() {
        let mut calib = CalibrationState::new();
        calib.commit(Waypoint::new(TAU, 0.2));
        assert!((calib.total_revolutions - 1.0).abs() < 1e-5);
        calib.commit(Waypoint::new(0.0, 0.2));
        assert!(calib.total_revolutions.abs() < 1e-5);
    }

    #[test]
    fn home_resets_everything() {
        let mut calib = CalibrationState::new();
        calib.commit(Waypoint::new(12.0, 0.9));
        calib.first_waypoint = false;
        calib.home();
        assert_eq!(calib.current, Waypoint::origin());
        assert_eq!(calib.total_revolutions, 0.0);
        assert!(calib.first_waypoint);
        assert!(calib.homed);
    }

    proptest! {
        // The rotation mapping is just a scaling: invertible modulo rounding.
        #[test]
        fn rotation_steps_track_theta(theta in -100.0..100.0f32) {
            let cfg = config();
            let steps = cfg.to_steps(&Waypoint::new(theta, 0.0)).rotation;
            let expected = theta * cfg.steps_per_revolution_rotation / TAU;
            prop_assert!((steps as f32 - expected).abs() <= 0.5);
        }

        #[test]
        fn rotation_steps_monotonic(theta in -100.0..100.0f32, dt in 0.0..10.0f32) {
            let cfg = config();
            let lo = cfg.to_steps(&Waypoint::new(theta, 0.0)).rotation;
            let hi = cfg.to_steps(&Waypoint::new(theta + dt, 0.0)).rotation;
            prop_assert!(hi >= lo);
        }

        // The interpolator always lands on the target exactly, and never
        // takes a stride longer than the resolution (plus rounding slack).
        #[test]
        fn interpolation_reaches_target(
            t0 in -10.0..10.0f32, r0 in 0.0..1.0f32,
            t1 in -10.0..10.0f32, r1 in 0.0..1.0f32,
            res in 0.01..0.5f32,
        ) {
            let from = Waypoint::new(t0, r0);
            let to = Waypoint::new(t1, r1);
            let points: Vec<_> = interpolate(from, to, res).collect();
            prop_assert!(points.len() >= 2);
            prop_assert_eq!(*points.first().unwrap(), from);
            prop_assert_eq!(*points.last().unwrap(), to);
            for pair in points.windows(2) {
                prop_assert!(pair[0].distance(&pair[1]) <= res * 1.5 + 1e-4);
            }
        }
    }
}
