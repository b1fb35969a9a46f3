//! Run settings
//!
//! [`Settings`] is built once at startup from the command line, the
//! environment and the optional TOML file, then shared read-only by every
//! component.

use clap::Parser;
use narrate_common::config::{self, TomlConfig};
use narrate_common::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_INPUT_FOLDER: &str = "input";
pub const DEFAULT_OUTPUT_FOLDER: &str = "output";
pub const DEFAULT_TEMP_FOLDER: &str = "temp";
pub const DEFAULT_VOICE: &str = "alloy";
pub const DEFAULT_MODEL: &str = "tts-1";
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_RETRY_BASE_MS: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: usize = 120;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Command-line arguments for narrate-batch
///
/// Every value may also come from the environment. Numeric values are kept as
/// strings here so that malformed input is reported as a configuration error
/// alongside the TOML tier.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "narrate-batch")]
#[command(about = "Convert a folder of text documents into one audio file each")]
#[command(version)]
pub struct CliArgs {
    /// Speech service credential
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Folder scanned for *.txt documents
    #[arg(short, long, env = "INPUT_FOLDER")]
    pub input: Option<PathBuf>,

    /// Folder receiving one subfolder per finished document
    #[arg(short, long, env = "OUTPUT_FOLDER")]
    pub output: Option<PathBuf>,

    /// Scratch folder for chunk audio, removed when the run ends
    #[arg(short, long, env = "TEMP_FOLDER")]
    pub temp: Option<PathBuf>,

    /// Voice identifier
    #[arg(long, env = "VOICE_MODEL")]
    pub voice: Option<String>,

    /// Speech model identifier
    #[arg(long, env = "TEXT_TO_SPEECH_MODEL")]
    pub model: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "DEBUG", num_args = 0..=1, default_missing_value = "true")]
    pub debug: Option<String>,

    /// Documents processed concurrently
    #[arg(long, env = "MAX_WORKERS")]
    pub max_workers: Option<String>,

    /// Concurrent synthesis calls per document (defaults to max-workers)
    #[arg(long, env = "CHUNK_WORKERS")]
    pub chunk_workers: Option<String>,

    /// Maximum chunk length in characters
    #[arg(long, env = "MAX_CHUNK_SIZE")]
    pub max_chunk_size: Option<String>,

    /// Synthesis attempts per chunk
    #[arg(long, env = "SYNTHESIS_RETRIES")]
    pub retries: Option<String>,

    /// Backoff unit in milliseconds (wait is unit * 2^attempt)
    #[arg(long, env = "RETRY_BASE_MS")]
    pub retry_base_ms: Option<String>,

    /// Timeout for a single synthesis attempt, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout: Option<String>,

    /// Audio format requested from the service (mp3, opus, aac, flac, wav)
    #[arg(long, env = "AUDIO_FORMAT")]
    pub format: Option<String>,

    /// Speech API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Concatenation binary
    #[arg(long, env = "FFMPEG_PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(short, long, env = "NARRATE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Audio container requested from the speech service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
}

impl AudioFormat {
    /// Wire name, also used as the file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "opus" => Ok(AudioFormat::Opus),
            "aac" => Ok(AudioFormat::Aac),
            "flac" => Ok(AudioFormat::Flac),
            "wav" => Ok(AudioFormat::Wav),
            other => Err(Error::Config(format!(
                "AUDIO_FORMAT must be one of mp3, opus, aac, flac, wav; got {:?}",
                other
            ))),
        }
    }
}

/// Immutable run configuration
#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub temp_folder: PathBuf,
    pub voice: String,
    pub model: String,
    pub debug: bool,
    /// Outer bound: documents in flight
    pub max_workers: usize,
    /// Inner bound: synthesis calls in flight per document
    pub chunk_workers: usize,
    pub max_chunk_size: usize,
    /// Total attempts per chunk, first try included
    pub retries: usize,
    pub retry_base: Duration,
    pub request_timeout: Duration,
    pub audio_format: AudioFormat,
    pub base_url: String,
    pub ffmpeg_path: PathBuf,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("input_folder", &self.input_folder)
            .field("output_folder", &self.output_folder)
            .field("temp_folder", &self.temp_folder)
            .field("voice", &self.voice)
            .field("model", &self.model)
            .field("debug", &self.debug)
            .field("max_workers", &self.max_workers)
            .field("chunk_workers", &self.chunk_workers)
            .field("max_chunk_size", &self.max_chunk_size)
            .field("retries", &self.retries)
            .field("retry_base", &self.retry_base)
            .field("request_timeout", &self.request_timeout)
            .field("audio_format", &self.audio_format)
            .field("base_url", &self.base_url)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .finish()
    }
}

impl Settings {
    /// Resolve settings: CLI/ENV > TOML > compiled defaults
    pub fn resolve(args: &CliArgs, toml: &TomlConfig) -> Result<Self> {
        let api_key = args
            .api_key
            .clone()
            .filter(|k| config::is_valid_key(k))
            .or_else(|| toml.api_key.clone().filter(|k| config::is_valid_key(k)))
            .ok_or_else(|| {
                Error::Config(
                    "Speech API key not configured. Set OPENAI_API_KEY, pass --api-key, \
                     or add api_key to the TOML config"
                        .to_string(),
                )
            })?;

        let max_workers = pick_positive(
            "MAX_WORKERS",
            args.max_workers.as_deref(),
            toml.max_workers,
            DEFAULT_MAX_WORKERS,
        )?;
        // Inner bound follows the outer one unless set explicitly
        let chunk_workers = pick_positive(
            "CHUNK_WORKERS",
            args.chunk_workers.as_deref(),
            toml.chunk_workers,
            max_workers,
        )?;

        let debug = match args.debug.as_deref() {
            Some(raw) => config::parse_flag("DEBUG", raw)?,
            None => toml.debug.unwrap_or(false),
        };

        let audio_format = match args.format.as_deref().or(toml.audio_format.as_deref()) {
            Some(raw) => raw.parse()?,
            None => AudioFormat::Mp3,
        };

        let settings = Self {
            api_key,
            input_folder: pick_path(
                args.input.as_ref(),
                toml.input_folder.as_ref(),
                DEFAULT_INPUT_FOLDER,
            ),
            output_folder: pick_path(
                args.output.as_ref(),
                toml.output_folder.as_ref(),
                DEFAULT_OUTPUT_FOLDER,
            ),
            temp_folder: pick_path(
                args.temp.as_ref(),
                toml.temp_folder.as_ref(),
                DEFAULT_TEMP_FOLDER,
            ),
            voice: pick_string(args.voice.as_ref(), toml.voice.as_ref(), DEFAULT_VOICE),
            model: pick_string(args.model.as_ref(), toml.model.as_ref(), DEFAULT_MODEL),
            debug,
            max_workers,
            chunk_workers,
            max_chunk_size: pick_positive(
                "MAX_CHUNK_SIZE",
                args.max_chunk_size.as_deref(),
                toml.max_chunk_size,
                DEFAULT_MAX_CHUNK_SIZE,
            )?,
            retries: pick_positive(
                "SYNTHESIS_RETRIES",
                args.retries.as_deref(),
                toml.retries,
                DEFAULT_RETRIES,
            )?,
            retry_base: Duration::from_millis(pick_positive(
                "RETRY_BASE_MS",
                args.retry_base_ms.as_deref(),
                toml.retry_base_ms,
                DEFAULT_RETRY_BASE_MS,
            )? as u64),
            request_timeout: Duration::from_secs(pick_positive(
                "REQUEST_TIMEOUT_SECS",
                args.request_timeout.as_deref(),
                toml.request_timeout_secs,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )? as u64),
            audio_format,
            base_url: pick_string(
                args.base_url.as_ref(),
                toml.base_url.as_ref(),
                DEFAULT_BASE_URL,
            )
            .trim_end_matches('/')
            .to_string(),
            ffmpeg_path: pick_path(
                args.ffmpeg.as_ref(),
                toml.ffmpeg_path.as_ref(),
                DEFAULT_FFMPEG,
            ),
        };

        settings.validate_folders()?;
        Ok(settings)
    }

    /// The scratch folder is removed recursively at the end of a run, so it
    /// must neither be nor contain the input or output folder.
    fn validate_folders(&self) -> Result<()> {
        let temp = normalized(&self.temp_folder)?;
        let io_folders = [
            ("INPUT_FOLDER", &self.input_folder),
            ("OUTPUT_FOLDER", &self.output_folder),
        ];
        for (name, other) in io_folders {
            if normalized(other)?.starts_with(&temp) {
                return Err(Error::Config(format!(
                    "TEMP_FOLDER ({}) must not be or contain {} ({})",
                    self.temp_folder.display(),
                    name,
                    other.display()
                )));
            }
        }
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` folded away lexically
fn normalized(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut result = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    Ok(result)
}

fn pick_path(cli: Option<&PathBuf>, toml: Option<&PathBuf>, default: &str) -> PathBuf {
    cli.or(toml).cloned().unwrap_or_else(|| PathBuf::from(default))
}

fn pick_string(cli: Option<&String>, toml: Option<&String>, default: &str) -> String {
    cli.or(toml)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn pick_positive(
    name: &str,
    cli: Option<&str>,
    toml: Option<u64>,
    default: usize,
) -> Result<usize> {
    if let Some(raw) = cli {
        return config::parse_positive(name, raw);
    }
    if let Some(value) = toml {
        return config::positive_from_toml(name, value);
    }
    Ok(default)
}
