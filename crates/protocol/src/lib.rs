//! The serial line protocol between a host and the sable table.
//!
//! Everything on the wire is newline-terminated ASCII, one command or
//! waypoint batch per line, strictly half duplex: the host must wait for the
//! ready-marker (or `HOMED`) before sending the next line. There is no
//! framing beyond the newline, no checksums and no sequence numbers.

#![cfg_attr(not(feature = "std"), no_std)]

use sable_geom::Waypoint;
use serde::{Deserialize, Serialize};

/// Most waypoints a single batch line may carry. Extra segments on the line
/// are silently dropped, which the host cannot distinguish from a normal
/// batch; hosts must not send longer lines.
pub const MAX_BATCH: usize = 10;

/// One batch of waypoints, in arrival order, bounded at [`MAX_BATCH`].
pub type Batch = heapless::Vec<Waypoint, MAX_BATCH>;

/// A classified input line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Home,
    ResetTheta,
    SetSpeed(f32),
    Batch(Batch),
}

impl Request {
    /// Classify one input line (without its terminator).
    ///
    /// Classification order: `HOME`, `RESET_THETA`, `SET_SPEED ` (only when
    /// the machine profile enables it), then anything ending in `;` is a
    /// batch. Everything else, including empty lines, is unrecognized and
    /// must be answered with [`Reply::Ignored`].
    pub fn parse(line: &str, speed_command: bool) -> Option<Request> {
        if line == "HOME" {
            return Some(Request::Home);
        }
        if line == "RESET_THETA" {
            return Some(Request::ResetTheta);
        }
        if speed_command {
            if let Some(arg) = line.strip_prefix("SET_SPEED ") {
                return Some(Request::SetSpeed(parse_float(arg)));
            }
        }
        if !line.ends_with(';') {
            return None;
        }
        let mut batch = Batch::new();
        for segment in line.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let wp = match segment.split_once(',') {
                Some((theta, rho)) => Waypoint::new(parse_float(theta), parse_float(rho)),
                None => Waypoint::new(parse_float(segment), 0.0),
            };
            if batch.push(wp).is_err() {
                // At capacity: drop the rest of the line.
                break;
            }
        }
        Some(Request::Batch(batch))
    }
}

/// Legacy numeric fallback: text that doesn't parse reads as zero.
fn parse_float(s: &str) -> f32 {
    s.trim().parse().unwrap_or(0.0)
}

/// Reply lines, spelled exactly as they go on the wire.
///
/// [`Reply::Ready`] is the ready-marker: the single line telling the host
/// the firmware is idle and will accept the next input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Homing,
    Homed,
    ThetaReset,
    SpeedSet,
    InvalidSpeed,
    Ready,
    Ignored,
}

impl Reply {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reply::Homing => "HOMING",
            Reply::Homed => "HOMED",
            Reply::ThetaReset => "THETA_RESET",
            Reply::SpeedSet => "SPEED_SET",
            Reply::InvalidSpeed => "INVALID_SPEED",
            Reply::Ready => "ready",
            Reply::Ignored => "IGNORED",
        }
    }
}

impl core::fmt::Display for Reply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<Request> {
        Request::parse(line, true)
    }

    #[test]
    fn commands_are_exact_matches() {
        assert_eq!(parse("HOME"), Some(Request::Home));
        assert_eq!(parse("RESET_THETA"), Some(Request::ResetTheta));
        assert_eq!(parse("HOME "), None);
        assert_eq!(parse("home"), None);
    }

    #[test]
    fn set_speed_carries_its_argument() {
        assert_eq!(parse("SET_SPEED 450.5"), Some(Request::SetSpeed(450.5)));
        // Unparsable argument falls back to zero; the controller rejects it.
        assert_eq!(parse("SET_SPEED fast"), Some(Request::SetSpeed(0.0)));
    }

    #[test]
    fn set_speed_disabled_falls_through_to_ignored() {
        assert_eq!(Request::parse("SET_SPEED 450.5", false), None);
        // But a speed line that happens to end in `;` would still be a batch.
        assert!(matches!(
            Request::parse("SET_SPEED 450.5;", false),
            Some(Request::Batch(_))
        ));
    }

    #[test]
    fn lines_without_trailing_semicolon_are_unrecognized() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("1.0,0.5"), None);
        assert_eq!(parse("hello table"), None);
    }

    #[test]
    fn batches_split_on_semicolons() {
        let Some(Request::Batch(batch)) = parse("0.0,0.0;1.57,0.5;") else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], Waypoint::new(0.0, 0.0));
        assert_eq!(batch[1], Waypoint::new(1.57, 0.5));
    }

    #[test]
    fn unparsable_numbers_read_as_zero() {
        let Some(Request::Batch(batch)) = parse("abc,xyz;") else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0], Waypoint::new(0.0, 0.0));
    }

    #[test]
    fn segment_without_comma_reads_rho_as_zero() {
        let Some(Request::Batch(batch)) = parse("2.5;") else {
            panic!("expected a batch");
        };
        assert_eq!(batch[0], Waypoint::new(2.5, 0.0));
    }

    #[test]
    fn empty_batch_is_a_batch() {
        assert_eq!(parse(";"), Some(Request::Batch(Batch::new())));
    }

    #[test]
    fn overlong_batches_truncate_silently() {
        let mut line = heapless::String::<256>::new();
        for i in 0..11 {
            core::fmt::write(&mut line, format_args!("{}.0,0.5;", i)).unwrap();
        }
        let Some(Request::Batch(batch)) = parse(&line) else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), MAX_BATCH);
        // The leading waypoints survive; the 11th is gone.
        assert_eq!(batch[0], Waypoint::new(0.0, 0.5));
        assert_eq!(batch[9], Waypoint::new(9.0, 0.5));
    }

    #[test]
    fn replies_spell_the_wire_protocol() {
        assert_eq!(Reply::Ready.as_str(), "ready");
        assert_eq!(Reply::Homing.as_str(), "HOMING");
        assert_eq!(Reply::Homed.as_str(), "HOMED");
        assert_eq!(Reply::ThetaReset.as_str(), "THETA_RESET");
        assert_eq!(Reply::Ignored.as_str(), "IGNORED");
    }
}
