//! Pure validation decisions for the pipeline.

/// Whether parsed subtitles are usable.
///
/// Coverage is the summed segment duration over the media duration. An
/// unknown duration defaults to valid (subtitle-first optimism); a coverage
/// exactly at the threshold is valid, strictly below is not.
pub fn subtitles_are_valid(coverage: Option<f64>, coverage_min: f64) -> bool {
    match coverage {
        None => true,
        Some(c) => c >= coverage_min,
    }
}

/// Whether extracted audio counts as silent.
///
/// Silent when the measured RMS amplitude is under the floor, or when the
/// transcript produced too few tokens for the known duration. Without a
/// known duration only the RMS signal applies.
pub fn is_silent(
    rms: Option<f64>,
    rms_max: f64,
    token_count: usize,
    duration_secs: Option<f64>,
    tokens_per_min_min: f64,
) -> bool {
    if let Some(rms) = rms {
        if rms < rms_max {
            return true;
        }
    }
    if let Some(duration) = duration_secs.filter(|d| *d > 0.0) {
        let tokens_per_min = token_count as f64 / (duration / 60.0);
        if tokens_per_min < tokens_per_min_min {
            return true;
        }
    }
    false
}
