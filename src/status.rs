//! Status line for the `fv` binary.

use std::io::{self, Write};
use std::time::Duration;

use measuring_ring_buffer::Stats;

const COLUMNS: usize = 6;
const SI_PREFIXES: [&str; 9] = ["", "k", "M", "G", "T", "P", "E", "Z", "Y"];

/// Renders [`Stats`] as a single line of padded columns.
///
/// Column widths only grow, so repeated `\r`-terminated lines overwrite each
/// other without leaving stray characters behind.
#[derive(Debug, Default)]
pub struct StatusLine {
    widths: [usize; COLUMNS],
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, stats: &Stats, line_end: char) -> String {
        let parts = columns(stats);
        let mut line = String::new();
        for (i, part) in parts.iter().enumerate() {
            let len = part.chars().count();
            self.widths[i] = self.widths[i].max(len);
            line.push_str(part);
            if i < COLUMNS - 1 {
                line.extend(std::iter::repeat(' ').take(self.widths[i] + 1 - len));
            }
        }
        line.push(line_end);
        line
    }

    pub fn print<W: Write>(&mut self, out: &mut W, stats: &Stats, line_end: char) -> io::Result<()> {
        let line = self.render(stats, line_end);
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}

fn columns(stats: &Stats) -> [String; COLUMNS] {
    let rate = stats.throughput().unwrap_or(0.0);
    [
        format!(
            "Buffer: {}/{}",
            format_bytes(stats.buffered_bytes as u64),
            format_bytes(stats.buffer_capacity as u64)
        ),
        format_duration(stats.total_time),
        format!("B: {}", format_bytes(stats.bytes_read)),
        format!("S: {}", format_si(rate, 2, "B/s")),
        format!("R: {:>3}%", percent(stats.read_fraction())),
        format!("W: {:>3}%", percent(stats.write_fraction())),
    ]
}

fn percent(fraction: Option<f64>) -> u32 {
    (fraction.unwrap_or(0.0) * 100.0) as u32
}

/// Byte count in SI units, e.g. `8.4 MB`.
pub fn format_bytes(n: u64) -> String {
    if n < 10 {
        return format!("{} B", n);
    }
    let mut exp = 0;
    let mut scale = 1u64;
    while exp < 6 && n / scale >= 1000 {
        scale *= 1000;
        exp += 1;
    }
    let suffix = ["B", "kB", "MB", "GB", "TB", "PB", "EB"][exp];
    let val = ((n as f64 / scale as f64) * 10.0 + 0.5).floor() / 10.0;
    if val < 10.0 {
        format!("{:.1} {}", val, suffix)
    } else {
        format!("{:.0} {}", val, suffix)
    }
}

/// Value with an SI prefix and at most `digits` fraction digits, e.g. `12.5 MB/s`.
///
/// Values below one keep the bare unit.
pub fn format_si(value: f64, digits: usize, unit: &str) -> String {
    if !value.is_finite() || value <= 0.0 {
        return format!("0 {}", unit);
    }
    let mut exp = 0;
    let mut scaled = value;
    while scaled >= 1000.0 && exp < SI_PREFIXES.len() - 1 {
        scaled /= 1000.0;
        exp += 1;
    }
    format!("{} {}{}", trim_float(scaled, digits), SI_PREFIXES[exp], unit)
}

fn trim_float(value: f64, digits: usize) -> String {
    let s = format!("{:.*}", digits, value);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Elapsed time truncated to whole seconds, e.g. `1h2m3s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(9), "9 B");
        assert_eq!(format_bytes(10), "10 B");
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(1000), "1.0 kB");
        assert_eq!(format_bytes(1500), "1.5 kB");
        assert_eq!(format_bytes(82_854_982), "83 MB");
        assert_eq!(format_bytes(8 * 1024 * 1024), "8.4 MB");
        assert_eq!(format_bytes(u64::MAX), "18 EB");
    }

    #[test]
    fn test_format_si() {
        assert_eq!(format_si(0.0, 2, "B/s"), "0 B/s");
        assert_eq!(format_si(f64::NAN, 2, "B/s"), "0 B/s");
        assert_eq!(format_si(0.5, 2, "B/s"), "0.5 B/s");
        assert_eq!(format_si(999.0, 2, "B/s"), "999 B/s");
        assert_eq!(format_si(12_500_000.0, 2, "B/s"), "12.5 MB/s");
        assert_eq!(format_si(1_234_567.0, 2, "B/s"), "1.23 MB/s");
        assert_eq!(format_si(2_000_000_000.0, 2, "B/s"), "2 GB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_millis(5_900)), "5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m5s");
        assert_eq!(format_duration(Duration::from_secs(3600 + 5)), "1h0m5s");
    }

    #[test]
    fn test_render_zero_stats() {
        let stats = Stats { buffer_capacity: 16, ..Stats::default() };
        let line = StatusLine::new().render(&stats, '\r');
        assert_eq!(line, "Buffer: 0 B/16 B 0s B: 0 B S: 0 B/s R:   0% W:   0%\r");
    }

    #[test]
    fn test_render_percentages() {
        let stats = Stats {
            buffer_capacity: 1000,
            buffered_bytes: 500,
            bytes_read: 4000,
            total_time: Duration::from_secs(4),
            time_spent_reading: Duration::from_secs(1),
            time_spent_writing: Duration::from_secs(3),
        };
        let line = StatusLine::new().render(&stats, '\n');
        assert!(line.starts_with("Buffer: 500 B/1.0 kB 4s B: 4.0 kB S: 1 kB/s "));
        assert!(line.contains("R:  25%"));
        assert!(line.ends_with("W:  75%\n"));
    }

    #[test]
    fn test_columns_never_shrink() {
        let mut status = StatusLine::new();
        let wide = Stats {
            buffer_capacity: 16,
            bytes_read: 123_456,
            total_time: Duration::from_secs(3725),
            ..Stats::default()
        };
        status.render(&wide, '\r');
        let second = status.render(&Stats { buffer_capacity: 16, ..Stats::default() }, '\r');
        // Second column keeps the width of "1h2m5s".
        assert!(second.contains("0s     B: 0 B"));
    }

    #[test]
    fn test_print_writes_line() {
        let mut out = Vec::new();
        StatusLine::new()
            .print(&mut out, &Stats { buffer_capacity: 8, ..Stats::default() }, '\n')
            .unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("%\n"));
    }
}
