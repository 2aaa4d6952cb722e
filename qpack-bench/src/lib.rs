use std::fmt::Display;
use std::time::Instant;

/// Statistics from a benchmark run. All durations are in milliseconds.
#[derive(Default)]
pub struct BenchStats {
    /// Duration of longest run.
    pub max: f32,

    /// Mean duration.
    pub mean: f32,

    /// Median duration.
    pub median: f32,

    /// Minimum duration.
    pub min: f32,

    /// Mean absolute deviation of durations.
    pub var: f32,

    /// Bytes processed per second in the median run, if the number of bytes
    /// processed per run is known.
    pub bytes_per_sec: Option<f64>,
}

/// Run a benchmark function `f` for `trials` iterations and print statistics
/// about the run.
///
/// If `bytes` is set, it is the number of bytes processed by each call to `f`
/// and throughput is reported.
pub fn run_bench<F: FnMut(), D: Display>(
    trials: usize,
    bytes: Option<usize>,
    description: D,
    mut f: F,
) -> BenchStats {
    if trials == 0 {
        return BenchStats::default();
    }

    let mut times = Vec::with_capacity(trials);
    for _ in 0..trials {
        let start = Instant::now();

        f();

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        times.push(duration_ms as f32);
    }

    times.sort_by(|a, b| a.total_cmp(b));
    let min = times[0];
    let max = times[times.len() - 1];

    let mid = times.len() / 2;
    let median = if times.len() % 2 == 1 {
        times[mid]
    } else {
        (times[mid - 1] + times[mid]) / 2.
    };
    let mean = times.iter().sum::<f32>() / times.len() as f32;
    let var = times.iter().map(|x| (x - mean).abs()).sum::<f32>() / times.len() as f32;

    let bytes_per_sec = bytes
        .filter(|_| median > 0.)
        .map(|bytes| bytes as f64 / (median as f64 / 1000.0));

    let throughput = bytes_per_sec
        .map(|bps| format!(" {:.2} GB/s", bps / 1e9))
        .unwrap_or_default();
    println!(
        "{}. mean {:.3}ms median {:.3} var {:.3} min {:.3} max {:.3}{}",
        description, mean, median, var, min, max, throughput
    );

    BenchStats {
        max,
        mean,
        median,
        min,
        var,
        bytes_per_sec,
    }
}

#[cfg(test)]
mod tests {
    use super::run_bench;

    #[test]
    fn test_run_bench() {
        let mut calls = 0;
        let stats = run_bench(4, Some(1024), "count calls", || calls += 1);
        assert_eq!(calls, 4);
        assert!(stats.min <= stats.median && stats.median <= stats.max);

        let stats = run_bench(0, None, "no trials", || {});
        assert_eq!(stats.mean, 0.);
        assert!(stats.bytes_per_sec.is_none());
    }
}
