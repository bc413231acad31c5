//! The serial front end, reduced to the two operations the controller needs.

/// A line-oriented serial channel.
///
/// Implementations buffer incoming bytes themselves; the controller only
/// ever sees whole lines.
pub trait Link {
    /// Take the next complete input line, without its terminator, if one has
    /// arrived. Never blocks: when no full line is buffered the control loop
    /// proceeds with no input.
    fn poll_line(&mut self) -> Option<String>;

    /// Send one reply line. Fire and forget; delivery is never acknowledged.
    fn write_line(&mut self, line: &str);
}
