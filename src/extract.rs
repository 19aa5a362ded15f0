use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::Deserialize;
use tokio::process::Command;
use url::Url;

use crate::models::{StreamVariant, VideoSummary};

// ── Constants ────────────────────────────────────────────────────────────────

const UNTITLED: &str = "Untitled";

/// Locations checked when yt-dlp is not on PATH (Homebrew, system, pip --user).
const FALLBACK_BIN_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("yt-dlp executable not found")]
    ExtractorUnavailable,
    #[error("{0}")]
    Extraction(String),
    #[error("{0}")]
    Unexpected(String),
}

// ── Extractor binary discovery ───────────────────────────────────────────────

static YTDLP_BIN: Lazy<Option<PathBuf>> = Lazy::new(find_ytdlp);

fn find_ytdlp() -> Option<PathBuf> {
    if let Ok(path) = which::which("yt-dlp") {
        return Some(path);
    }

    for dir in FALLBACK_BIN_DIRS {
        let candidate = PathBuf::from(dir).join("yt-dlp");
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(".local").join("bin").join("yt-dlp");
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}

// ── Public API ───────────────────────────────────────────────────────────────

pub async fn extract_info(url: &str) -> Result<VideoSummary, ExtractionError> {
    validate_url(url)?;
    let raw = run_ytdlp(url).await?;
    Ok(summarize(raw))
}

// ── URL validation ───────────────────────────────────────────────────────────

fn validate_url(url: &str) -> Result<(), ExtractionError> {
    let parsed = Url::parse(url)
        .map_err(|_| ExtractionError::InvalidUrl("Invalid URL".to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ExtractionError::InvalidUrl(
            "Only http(s) URLs are allowed".to_string(),
        ));
    }
    if parsed.host_str().unwrap_or("").is_empty() {
        return Err(ExtractionError::InvalidUrl("URL has no host".to_string()));
    }
    Ok(())
}

// ── yt-dlp invocation ────────────────────────────────────────────────────────

async fn run_ytdlp(url: &str) -> Result<RawVideoInfo, ExtractionError> {
    let bin = YTDLP_BIN
        .as_deref()
        .ok_or(ExtractionError::ExtractorUnavailable)?;

    tracing::debug!("invoking {} for {}", bin.display(), url);

    // Metadata only: --no-download keeps yt-dlp from touching media payloads.
    let output = Command::new(bin)
        .arg("--dump-json")
        .arg("--no-download")
        .arg("--no-warnings")
        .arg(url)
        .output()
        .await
        .map_err(|e| ExtractionError::Unexpected(format!("failed to spawn yt-dlp: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("yt-dlp exited with {}: {}", output.status, stderr.trim());
        return Err(ExtractionError::Extraction(failure_reason(&stderr)));
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|_| ExtractionError::Unexpected("yt-dlp produced non-UTF-8 output".to_string()))?;

    parse_dump_json(&stdout)
}

/// yt-dlp prints the actionable line last ("ERROR: ..."); the prefix is
/// log noise for a client-facing message.
fn failure_reason(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp failed")
        .trim();
    line.strip_prefix("ERROR:")
        .map(str::trim_start)
        .unwrap_or(line)
        .to_string()
}

fn parse_dump_json(json: &str) -> Result<RawVideoInfo, ExtractionError> {
    serde_json::from_str(json)
        .map_err(|e| ExtractionError::Unexpected(format!("could not parse yt-dlp output: {}", e)))
}

// ── Raw yt-dlp schema (only the fields the service forwards) ─────────────────

#[derive(Debug, Deserialize)]
struct RawVideoInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    #[serde(default)]
    format_id: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    format_note: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
}

// ── Normalization ────────────────────────────────────────────────────────────

fn summarize(raw: RawVideoInfo) -> VideoSummary {
    let mut formats: Vec<StreamVariant> = Vec::new();
    let mut audios: Vec<StreamVariant> = Vec::new();

    // Single pass keeps the extractor-reported order in both lists.
    for f in raw.formats {
        let url = match f.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => continue,
        };

        let has_video = codec_present(f.vcodec.as_deref());
        let has_audio = codec_present(f.acodec.as_deref());

        let variant = StreamVariant {
            label: variant_label(&f),
            ext: f.ext.clone().unwrap_or_default(),
            url,
        };

        if has_video && has_audio {
            formats.push(variant);
        } else if has_audio {
            audios.push(variant);
        }
    }

    VideoSummary {
        title: raw
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        duration: raw.duration.map(|d| d.round() as u64),
        thumbnail: raw.thumbnail.unwrap_or_default(),
        formats,
        audios,
    }
}

/// yt-dlp reports "none" (the string) for a missing track.
fn codec_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if !c.trim().is_empty() && c != "none")
}

/// Quality label priority: resolution → format_note → format_id.
fn variant_label(f: &RawFormat) -> String {
    [&f.resolution, &f.format_note, &f.format_id]
        .into_iter()
        .find_map(|v| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

// ── Tests ────────────────────────────────────────────────────────────────────
