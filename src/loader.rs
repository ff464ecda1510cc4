//! Task list loader.
//!
//! One task per line: `arrival_time, priority, burst_time`, comma separated with optional spaces.
//! Lines that do not hold three integers, or whose values are out of range (negative arrival,
//! priority outside `0..=max_level`, non-positive burst), are skipped. So are lines that are not
//! valid UTF-8 text. Anything after the third integer is ignored.

use crate::config::SchedulerConfig;
use crate::priority::Level;
use crate::task::{TaskSpec, Tick};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Bounds applied while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadLimits {
    /// Lines past this many accepted tasks are ignored.
    pub max_tasks: usize,
    /// Deepest priority accepted.
    pub max_level: Level,
}

impl Default for LoadLimits {
    fn default() -> Self {
        SchedulerConfig::default().load_limits()
    }
}

/// Parse one input line. Returns `None` for lines that must be skipped.
pub fn parse_line(line: &str, max_level: Level) -> Option<TaskSpec> {
    let mut fields = line.splitn(3, ',');
    let arrival = fields.next()?.trim().parse::<i64>().ok()?;
    let priority = fields.next()?.trim().parse::<i64>().ok()?;
    let burst = leading_int(fields.next()?)?;

    if arrival < 0 || priority < 0 || priority > i64::from(max_level) || burst <= 0 {
        return None;
    }
    Some(TaskSpec::new(
        Tick::try_from(arrival).ok()?,
        Level::try_from(priority).ok()?,
        Tick::try_from(burst).ok()?,
    ))
}

/// Integer at the start of `field` after leading whitespace, ignoring whatever follows.
fn leading_int(field: &str) -> Option<i64> {
    let field = field.trim_start();
    let sign_len = usize::from(field.starts_with(['-', '+']));
    let digits = field[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    field[..sign_len + digits].parse().ok()
}

/// Read task specs from `reader` within `limits`.
///
/// Lines are split on raw `\n` bytes, so an undecodable line is skipped like any other malformed
/// line. Only I/O failures are errors.
pub fn parse_tasks(reader: impl BufRead, limits: LoadLimits) -> Result<Vec<TaskSpec>> {
    let mut specs = Vec::new();
    for (index, raw) in reader.split(b'\n').enumerate() {
        let raw = raw.with_context(|| format!("reading line {}", index + 1))?;
        let Ok(line) = std::str::from_utf8(&raw) else {
            log::debug!("skipping line {}: not valid UTF-8", index + 1);
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(spec) = parse_line(line, limits.max_level) else {
            log::debug!("skipping line {}: {:?}", index + 1, line.trim_end());
            continue;
        };
        if specs.len() == limits.max_tasks {
            log::warn!(
                "task limit {} reached at line {}; ignoring the rest",
                limits.max_tasks,
                index + 1
            );
            break;
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// Load task specs from the file at `path`.
pub fn load_tasks(path: impl AsRef<Path>, limits: LoadLimits) -> Result<Vec<TaskSpec>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let specs = parse_tasks(BufReader::new(file), limits)
        .with_context(|| format!("reading {}", path.display()))?;
    log::info!("loaded {} tasks from {}", specs.len(), path.display());
    Ok(specs)
}
