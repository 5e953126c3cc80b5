use super::stats::{CycleStats, LogStats};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::BufRead;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] utils::fs::Error),

    #[error("line {line_number}: expected a cycle count, got {line:?}")]
    InvalidCount { line_number: usize, line: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Options {
    /// Fail on lines that mention a counter without a parsable value.
    pub strict: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Counter {
    Compute,
    Stall,
}

static COMPUTE_CYCLES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Compute cycles.*?(\S+)\s*$").unwrap());
static STALL_CYCLES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Stall cycles.*?(\S+)\s*$").unwrap());
static MENTIONS_COUNTER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Compute|Stall) cycles").unwrap());

fn match_counter(line: &str) -> Option<(Counter, &str)> {
    let token = |regex: &Regex| {
        regex
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    };
    // a line is only ever counted once, compute first
    if let Some(token) = token(&COMPUTE_CYCLES_REGEX) {
        return Some((Counter::Compute, token));
    }
    token(&STALL_CYCLES_REGEX).map(|token| (Counter::Stall, token))
}

/// Parses the simulator log and extracts per-layer cycle counts.
///
/// The simulator prints cumulative `Compute cycles` and `Stall cycles`
/// counters after every layer. A layer is complete once its stall counter
/// has been printed.
pub fn parse_stats(reader: impl std::io::Read, options: &Options) -> Result<LogStats, Error> {
    let reader = std::io::BufReader::new(reader);

    let mut stats = LogStats::default();
    let mut last_compute = 0;
    let mut last_stall = 0;
    let mut current_compute = 0;

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let Some((counter, token)) = match_counter(&line) else {
            if MENTIONS_COUNTER_REGEX.is_match(&line) {
                if options.strict {
                    return Err(Error::InvalidCount {
                        line_number: line_idx + 1,
                        line,
                    });
                }
                log::warn!("line {}: skipping counter without value", line_idx + 1);
            }
            continue;
        };

        let Ok(cycles) = token.parse::<u64>() else {
            if options.strict {
                return Err(Error::InvalidCount {
                    line_number: line_idx + 1,
                    line,
                });
            }
            log::warn!(
                "line {}: skipping invalid cycle count {:?}",
                line_idx + 1,
                token
            );
            continue;
        };

        match counter {
            Counter::Compute => {
                current_compute = delta(cycles, last_compute, line_idx);
                last_compute = cycles;
            }
            Counter::Stall => {
                let current_stall = delta(cycles, last_stall, line_idx);
                last_stall = cycles;
                stats.per_layer.push(CycleStats {
                    compute: current_compute.saturating_sub(current_stall),
                    stall: current_stall,
                });
            }
        }
    }

    stats.overall = CycleStats {
        compute: last_compute.saturating_sub(last_stall),
        stall: last_stall,
    };
    Ok(stats)
}

fn delta(cycles: u64, last: u64, line_idx: usize) -> u64 {
    if cycles < last {
        log::warn!(
            "line {}: cumulative counter decreased from {} to {}",
            line_idx + 1,
            last,
            cycles
        );
    }
    cycles.saturating_sub(last)
}

/// Parse the simulator log at `path`.
pub fn parse(path: impl AsRef<Path>, options: &Options) -> Result<LogStats, Error> {
    let reader = utils::fs::open_readable(path)?;
    parse_stats(reader, options)
}

#[cfg(test)]
mod tests {
    use super::{parse_stats, Options};
    use crate::stats::{CycleStats, LogStats};
    use similar_asserts as diff;

    const LOG: &str = r"
Running layer Conv1
    Compute cycles: 1200
    Stall cycles: 200
Running layer Conv2
    Compute cycles: 3000
    Stall cycles: 500
";

    #[test]
    fn test_parse_per_layer_deltas() -> Result<(), super::Error> {
        let stats = parse_stats(LOG.as_bytes(), &Options::default())?;
        diff::assert_eq!(
            have: stats,
            want: LogStats {
                per_layer: vec![
                    CycleStats { compute: 1000, stall: 200 },
                    CycleStats { compute: 1500, stall: 300 },
                ],
                overall: CycleStats { compute: 2500, stall: 500 },
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_uses_last_token() -> Result<(), super::Error> {
        let log = "Compute cycles for layer 3 = 42\nStall cycles 7\n";
        let stats = parse_stats(log.as_bytes(), &Options::default())?;
        diff::assert_eq!(have: stats.per_layer, want: vec![CycleStats { compute: 35, stall: 7 }]);
        diff::assert_eq!(have: stats.total_cycles(), want: 42);
        Ok(())
    }

    #[test]
    fn test_parse_empty_log() -> Result<(), super::Error> {
        let stats = parse_stats("no stats here\n".as_bytes(), &Options::default())?;
        diff::assert_eq!(have: stats, want: LogStats::default());
        Ok(())
    }

    #[test]
    fn test_parse_strict_rejects_invalid_count() {
        let log = "Compute cycles: many\n";
        let lenient = parse_stats(log.as_bytes(), &Options::default());
        assert!(lenient.is_ok());
        let strict = parse_stats(log.as_bytes(), &Options { strict: true });
        assert!(matches!(
            strict,
            Err(super::Error::InvalidCount { line_number: 1, .. })
        ));
    }

    #[test]
    fn test_compute_without_stall_is_not_a_layer() -> Result<(), super::Error> {
        let log = "Compute cycles: 10\nStall cycles: 2\nCompute cycles: 30\n";
        let stats = parse_stats(log.as_bytes(), &Options::default())?;
        diff::assert_eq!(have: stats.num_layers(), want: 1);
        diff::assert_eq!(have: stats.overall, want: CycleStats { compute: 28, stall: 2 });
        Ok(())
    }
}
