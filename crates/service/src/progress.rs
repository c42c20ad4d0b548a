//! Parsing of ffmpeg's stderr stats lines.
//!
//! ffmpeg reports progress as free-form `key=value` tokens, e.g.
//! `frame=  120 fps= 25 q=28.0 size=     256KiB time=00:00:05.00
//! bitrate= 419.4kbits/s speed=1.25x`. Not every field appears on every
//! line. This module is the only place that knows about that format; if it
//! drifts, only this file changes.

/// One parsed stats line. Every field is present only if its marker was
/// found on the line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Elapsed media time in seconds (`time=H:MM:SS.ms`)
    pub out_time_secs: Option<f64>,
    /// Frame counter (`frame=N`)
    pub frame: Option<u64>,
    /// Encoding rate in frames per second (`fps=N`)
    pub fps: Option<f64>,
    /// Playback-speed multiplier (`speed=Nx`)
    pub speed: Option<f64>,
    /// Output bitrate in kbit/s (`bitrate=N.Nkbits/s`)
    pub bitrate_kbps: Option<f64>,
    /// Cumulative output size in KiB (`size=NKiB`)
    pub size_kb: Option<u64>,
}

impl ProgressUpdate {
    /// True when no recognizable marker was found on the line.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extract whatever progress fields are present on one stats line.
///
/// Lines without any recognizable marker yield an empty record, never an
/// error.
pub fn parse_stats_line(line: &str) -> ProgressUpdate {
    ProgressUpdate {
        out_time_secs: field_value(line, "time").and_then(parse_clock),
        frame: field_value(line, "frame").and_then(|v| v.parse().ok()),
        fps: field_value(line, "fps").and_then(|v| v.parse().ok()),
        speed: field_value(line, "speed").and_then(parse_speed),
        bitrate_kbps: field_value(line, "bitrate").and_then(parse_bitrate),
        size_kb: field_value(line, "size").and_then(parse_size_kb),
    }
}

/// Find `key=` on the line (at the start or after whitespace), skip the
/// spaces ffmpeg pads values with, and return the value token.
fn field_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("{}=", key);
    for (idx, _) in line.match_indices(&marker) {
        let at_boundary = idx == 0
            || line[..idx]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_whitespace());
        if !at_boundary {
            continue;
        }
        let rest = line[idx + marker.len()..].trim_start();
        let token = rest.split_whitespace().next()?;
        if token.is_empty() {
            return None;
        }
        return Some(token);
    }
    None
}

/// Convert an `H:MM:SS.ms` clock token to total seconds.
fn parse_clock(token: &str) -> Option<f64> {
    let mut parts = token.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse a `1.25x` speed token.
fn parse_speed(token: &str) -> Option<f64> {
    token.trim_end_matches('x').parse().ok()
}

/// Parse a `419.4kbits/s` bitrate token.
fn parse_bitrate(token: &str) -> Option<f64> {
    token.strip_suffix("kbits/s")?.parse().ok()
}

/// Parse a `256KiB` (or older `256kB`) size token.
fn parse_size_kb(token: &str) -> Option<u64> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
