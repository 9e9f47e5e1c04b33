//! Audio extraction and loudness measurement.

use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Extract the audio track to 16 kHz mono PCM wav, the input format the
/// transcribers expect.
pub async fn extract_audio(
    input: impl AsRef<Path>,
    output_wav: impl AsRef<Path>,
    timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output_wav = output_wav.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    info!(
        "Extracting audio: {} -> {}",
        input.display(),
        output_wav.display()
    );

    let cmd = FfmpegCommand::new(input, output_wav)
        .no_video()
        .audio_codec("pcm_s16le")
        .sample_rate(16000)
        .channels(1);

    let mut runner = FfmpegRunner::new().with_timeout(timeout.as_secs());
    if let Some(cancel) = cancel {
        runner = runner.with_cancel(cancel);
    }
    runner.run(&cmd).await?;

    if !output_wav.exists() {
        return Err(MediaError::InvalidMedia(
            "audio extraction produced no output".to_string(),
        ));
    }
    Ok(())
}

/// Measure the mean RMS amplitude of an audio file, normalized to [0, 1].
///
/// Runs ffmpeg's volumedetect filter and converts the reported mean volume
/// from dBFS. Digital silence comes out near zero.
pub async fn measure_rms(
    input: impl AsRef<Path>,
    timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<f64> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    // volumedetect reports through the log output, so run at info level
    let cmd = FfmpegCommand::new(input, "-")
        .audio_filter("volumedetect")
        .no_video()
        .format("null")
        .log_level("info");

    let mut runner = FfmpegRunner::new().with_timeout(timeout.as_secs());
    if let Some(cancel) = cancel {
        runner = runner.with_cancel(cancel);
    }
    let stderr = runner.run(&cmd).await?;

    let rms = parse_mean_volume(&stderr)
        .map(db_to_amplitude)
        .unwrap_or(0.0);
    debug!("Measured RMS {:.6} for {}", rms, input.display());
    Ok(rms)
}

/// Pull `mean_volume: -23.5 dB` out of volumedetect output.
fn parse_mean_volume(stderr: &str) -> Option<f64> {
    for line in stderr.lines() {
        if let Some(idx) = line.find("mean_volume:") {
            let rest = line[idx + "mean_volume:".len()..].trim();
            let value = rest.strip_suffix("dB").unwrap_or(rest).trim();
            if value == "-inf" {
                return Some(f64::NEG_INFINITY);
            }
            if let Ok(db) = value.parse::<f64>() {
                return Some(db);
            }
        }
    }
    None
}

fn db_to_amplitude(db: f64) -> f64 {
    if db == f64::NEG_INFINITY {
        0.0
    } else {
        10f64.powf(db / 20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mean_volume() {
        let stderr = "\
[Parsed_volumedetect_0 @ 0x55] n_samples: 4800000\n\
[Parsed_volumedetect_0 @ 0x55] mean_volume: -23.5 dB\n\
[Parsed_volumedetect_0 @ 0x55] max_volume: -4.0 dB\n";
        assert_eq!(parse_mean_volume(stderr), Some(-23.5));
        assert_eq!(parse_mean_volume("no match"), None);
        assert_eq!(
            parse_mean_volume("[x] mean_volume: -inf dB"),
            Some(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_db_to_amplitude() {
        assert!((db_to_amplitude(0.0) - 1.0).abs() < 1e-9);
        assert!((db_to_amplitude(-20.0) - 0.1).abs() < 1e-9);
        assert_eq!(db_to_amplitude(f64::NEG_INFINITY), 0.0);
    }
}
