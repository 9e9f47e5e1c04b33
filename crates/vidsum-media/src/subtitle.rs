//! Subtitle parsing.
//!
//! Accepts SRT, VTT (including the YouTube flavor with inline word
//! timestamps and rolling duplicate lines), and ASS/SSA. Output is an
//! ordered, non-overlapping sequence of timed segments; consecutive
//! duplicate texts are merged.

use crate::error::{MediaError, MediaResult};

/// One timed subtitle segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Secondary language line for bilingual sources
    pub translated_text: Option<String>,
}

/// Parsed and normalized subtitles.
#[derive(Debug, Clone, Default)]
pub struct ParsedSubtitles {
    pub segments: Vec<SubtitleSegment>,
}

impl ParsedSubtitles {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Summed duration of all segments in milliseconds.
    ///
    /// This is the coverage numerator: summed durations, not the
    /// first-to-last span.
    pub fn total_segment_ms(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| s.end_ms.saturating_sub(s.start_ms))
            .sum()
    }

    /// Fraction of the media duration covered by segments.
    pub fn coverage(&self, duration_secs: f64) -> f64 {
        if duration_secs <= 0.0 {
            return 0.0;
        }
        (self.total_segment_ms() as f64 / 1000.0) / duration_secs
    }

    /// All segment texts joined into one transcript.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parse subtitle file content, detecting the format from its header.
pub fn parse_subtitles(content: &str) -> MediaResult<ParsedSubtitles> {
    let content = content.trim_start_matches('\u{feff}');

    let segments = if content.trim_start().starts_with("WEBVTT") {
        parse_vtt(content)?
    } else if content.contains("[Script Info]") || content.contains("[Events]") {
        parse_ass(content)?
    } else if looks_like_srt(content) {
        parse_srt(content)?
    } else {
        return Err(MediaError::UnsupportedFormat(
            "no recognizable subtitle header".to_string(),
        ));
    };

    Ok(ParsedSubtitles {
        segments: normalize(segments),
    })
}

fn looks_like_srt(content: &str) -> bool {
    content
        .lines()
        .take(20)
        .any(|line| line.contains("-->"))
}

// ============================================================================
// SRT
// ============================================================================

fn parse_srt(content: &str) -> MediaResult<Vec<SubtitleSegment>> {
    let mut segments = Vec::new();
    let mut blocks = 0usize;

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }
        blocks += 1;

        // The numeric index line is optional in the wild
        let timing_idx = match lines.iter().position(|l| l.contains("-->")) {
            Some(idx) => idx,
            None => continue,
        };

        let Some((start_ms, end_ms)) = parse_timing_line(lines[timing_idx]) else {
            continue;
        };

        let text = join_text_lines(&lines[timing_idx + 1..]);
        if !text.is_empty() {
            segments.push(SubtitleSegment {
                text,
                start_ms,
                end_ms,
                translated_text: None,
            });
        }
    }

    if segments.is_empty() && blocks > 0 {
        return Err(MediaError::Malformed(
            "no recoverable SRT cues".to_string(),
        ));
    }
    Ok(segments)
}

// ============================================================================
// VTT
// ============================================================================

fn parse_vtt(content: &str) -> MediaResult<Vec<SubtitleSegment>> {
    // Drop the header block (WEBVTT line plus metadata until a blank line)
    let body = match content.find("\n\n") {
        Some(idx) => &content[idx..],
        None => return Ok(Vec::new()),
    };

    let mut segments = Vec::new();
    let mut cues = 0usize;

    for block in body.split("\n\n") {
        let lines: Vec<&str> = block
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }
        // Skip NOTE/STYLE/REGION blocks
        if matches!(lines[0].split_whitespace().next(), Some("NOTE" | "STYLE" | "REGION")) {
            continue;
        }

        let Some(timing_idx) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        cues += 1;

        let Some((start_ms, end_ms)) = parse_timing_line(lines[timing_idx]) else {
            continue;
        };

        let text = join_text_lines(&lines[timing_idx + 1..]);
        if !text.is_empty() {
            segments.push(SubtitleSegment {
                text,
                start_ms,
                end_ms,
                translated_text: None,
            });
        }
    }

    if segments.is_empty() && cues > 0 {
        return Err(MediaError::Malformed("no recoverable VTT cues".to_string()));
    }
    Ok(segments)
}

// ============================================================================
// ASS / SSA
// ============================================================================

fn parse_ass(content: &str) -> MediaResult<Vec<SubtitleSegment>> {
    let mut in_events = false;
    let mut start_idx = 1usize;
    let mut end_idx = 2usize;
    let mut text_idx = 9usize;
    let mut field_count = 10usize;
    let mut segments = Vec::new();
    let mut dialogues = 0usize;

    for line in content.lines() {
        let line = line.trim_end_matches('\r');

        if line.trim().starts_with('[') {
            in_events = line.trim().eq_ignore_ascii_case("[Events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(format) = line.strip_prefix("Format:") {
            let fields: Vec<&str> = format.split(',').map(|f| f.trim()).collect();
            field_count = fields.len();
            for (idx, field) in fields.iter().enumerate() {
                match *field {
                    "Start" => start_idx = idx,
                    "End" => end_idx = idx,
                    "Text" => text_idx = idx,
                    _ => {}
                }
            }
            continue;
        }

        let Some(dialogue) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        dialogues += 1;

        // The Text field is last and may itself contain commas
        let fields: Vec<&str> = dialogue.splitn(field_count, ',').collect();
        if fields.len() <= text_idx.max(start_idx).max(end_idx) {
            continue;
        }

        let (Some(start_ms), Some(end_ms)) = (
            parse_timestamp(fields[start_idx]),
            parse_timestamp(fields[end_idx]),
        ) else {
            continue;
        };

        let raw = fields[text_idx].replace("\\N", " ").replace("\\n", " ");
        let text = collapse_whitespace(&strip_markup(&raw));
        if !text.is_empty() {
            segments.push(SubtitleSegment {
                text,
                start_ms,
                end_ms,
                translated_text: None,
            });
        }
    }

    if segments.is_empty() && dialogues > 0 {
        return Err(MediaError::Malformed(
            "no recoverable ASS dialogue lines".to_string(),
        ));
    }
    Ok(segments)
}

// ============================================================================
// Shared pieces
// ============================================================================

/// Parse `start --> end` with optional cue settings after the end time.
fn parse_timing_line(line: &str) -> Option<(u64, u64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.trim().split_whitespace().next()?;
    let start_ms = parse_timestamp(start.trim())?;
    let end_ms = parse_timestamp(end)?;
    (end_ms >= start_ms).then_some((start_ms, end_ms))
}

/// Parse `HH:MM:SS.mmm`, `HH:MM:SS,mmm`, `MM:SS.mmm` or ASS `H:MM:SS.cc`.
fn parse_timestamp(s: &str) -> Option<u64> {
    let s = s.trim().replace(',', ".");
    let parts: Vec<&str> = s.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, sec] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, *sec),
        [m, sec] => (0, m.parse::<u64>().ok()?, *sec),
        _ => return None,
    };
    let seconds: f64 = seconds.parse().ok()?;
    if !(0.0..60.0).contains(&seconds) || minutes >= 60 {
        return None;
    }

    Some(hours * 3_600_000 + minutes * 60_000 + (seconds * 1000.0).round() as u64)
}

/// Remove `<...>` tags (VTT voice/class/word-timestamp spans) and `{...}`
/// override blocks.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_angle = false;
    let mut in_brace = false;
    for c in text.chars() {
        match c {
            '<' => in_angle = true,
            '>' if in_angle => in_angle = false,
            '{' => in_brace = true,
            '}' if in_brace => in_brace = false,
            c if !in_angle && !in_brace => out.push(c),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join_text_lines(lines: &[&str]) -> String {
    collapse_whitespace(&strip_markup(&lines.join(" ")))
}

/// Sort, merge consecutive duplicates, and clamp overlaps so timestamps
/// come out monotone and segments non-overlapping.
fn normalize(mut segments: Vec<SubtitleSegment>) -> Vec<SubtitleSegment> {
    segments.sort_by_key(|s| (s.start_ms, s.end_ms));

    let mut out: Vec<SubtitleSegment> = Vec::with_capacity(segments.len());
    for mut seg in segments {
        if let Some(prev) = out.last_mut() {
            if prev.text == seg.text {
                prev.end_ms = prev.end_ms.max(seg.end_ms);
                continue;
            }
            if seg.start_ms < prev.end_ms {
                seg.start_ms = prev.end_ms;
            }
        }
        if seg.end_ms > seg.start_ms {
            out.push(seg);
        }
    }
    out
}
