//! # FFmpeg Executor Module
//!
//! Questo modulo esegue FFmpeg come processo figlio e ne segue l'avanzamento.
//!
//! ## Responsabilità:
//! - Risoluzione del binario FFmpeg (tramite `ToolPathResolver`)
//! - Spawn del processo con stdout/stderr catturati
//! - Lettura non bloccante di stderr tramite un task dedicato e un canale limitato
//! - Parsing delle righe di progresso (`frame=`, `fps=`, `time=`, ...)
//! - Rendering del progresso al massimo una volta per intervallo
//! - Classificazione successo/fallimento tramite exit code
//!
//! ## Loop di polling:
//! 1. Svuota le righe già disponibili sul canale
//! 2. Controlla se il processo è terminato (`try_wait`)
//! 3. Breve sleep e ripete
//!
//! Alla terminazione il canale viene svuotato fino alla chiusura e l'ultimo
//! stato di progresso viene mostrato un'ultima volta.
//!
//! ## Esempio:
//! ```rust,ignore
//! let executor = FfmpegExecutor::new(None)?;
//! let output = executor
//!     .run_with_progress(&args, Duration::from_secs(5), "clip.mp4")
//!     .await?;
//! ```

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CompressError;
use crate::tool_resolver::ToolPathResolver;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LINE_CHANNEL_CAPACITY: usize = 256;
const READ_CHUNK: usize = 4096;

/// Fields recognised in one FFmpeg status line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderProgress {
    pub frame: Option<String>,
    pub fps: Option<String>,
    pub time: Option<String>,
    pub bitrate: Option<String>,
    pub size: Option<String>,
    pub speed: Option<String>,
}

impl EncoderProgress {
    /// Parse the known `key=value` tokens of a status line.
    ///
    /// Tokens are matched independently, in any order. Returns `None` when
    /// nothing matched.
    pub fn parse(line: &str) -> Option<Self> {
        let progress = Self {
            frame: token(line, "frame=", true, digits),
            fps: token(line, "fps=", true, number),
            time: token(line, "time=", false, clock),
            bitrate: token(line, "bitrate=", true, bitrate),
            size: token(line, "size=", true, size),
            speed: token(line, "speed=", true, speed),
        };

        if progress.is_empty() {
            None
        } else {
            Some(progress)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_none()
            && self.fps.is_none()
            && self.time.is_none()
            && self.bitrate.is_none()
            && self.size.is_none()
            && self.speed.is_none()
    }
}

impl fmt::Display for EncoderProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments = [
            ("Time", &self.time),
            ("Frame", &self.frame),
            ("FPS", &self.fps),
            ("Bitrate", &self.bitrate),
            ("Size", &self.size),
            ("Speed", &self.speed),
        ];

        f.write_str("[Progress]")?;
        let mut first = true;
        for (label, value) in segments {
            if let Some(value) = value {
                let separator = if first { " " } else { " | " };
                write!(f, "{}{}: {}", separator, label, value)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Find the first occurrence of `key` whose value satisfies `matcher`
fn token(line: &str, key: &str, skip_whitespace: bool, matcher: fn(&str) -> Option<usize>) -> Option<String> {
    line.match_indices(key).find_map(|(index, _)| {
        let mut rest = &line[index + key.len()..];
        if skip_whitespace {
            rest = rest.trim_start();
        }
        matcher(rest).map(|len| rest[..len].to_string())
    })
}

fn leading(s: &str, accept: impl Fn(u8) -> bool) -> usize {
    s.bytes().take_while(|b| accept(*b)).count()
}

fn digits(s: &str) -> Option<usize> {
    let n = leading(s, |b| b.is_ascii_digit());
    (n > 0).then_some(n)
}

fn number(s: &str) -> Option<usize> {
    let n = leading(s, |b| b.is_ascii_digit() || b == b'.');
    (n > 0).then_some(n)
}

/// `HH:MM:SS.cc`
fn clock(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.len() < 11 {
        return None;
    }
    let shape_ok = bytes[..11].iter().enumerate().all(|(i, b)| match i {
        2 | 5 => *b == b':',
        8 => *b == b'.',
        _ => b.is_ascii_digit(),
    });
    shape_ok.then_some(11)
}

fn bitrate(s: &str) -> Option<usize> {
    let n = number(s)?;
    let unit = &s[n..];
    (unit.starts_with("kbits/s") || unit.starts_with("Mbits/s")).then_some(n + "kbits/s".len())
}

fn size(s: &str) -> Option<usize> {
    let n = digits(s)?;
    let rest = s[n..].as_bytes();
    match rest {
        [unit, b'B', ..] if b"kKmMgG".contains(unit) => Some(n + 2),
        [b'B', ..] => Some(n + 1),
        _ => None,
    }
}

fn speed(s: &str) -> Option<usize> {
    let n = number(s)?;
    (s.as_bytes().get(n) == Some(&b'x')).then_some(n + 1)
}

/// Destination for rendered progress lines
pub trait ProgressSink: Send + Sync {
    fn report(&self, display_name: &str, progress: &EncoderProgress);
}

/// Writes progress lines to stderr
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn report(&self, display_name: &str, progress: &EncoderProgress) {
        eprintln!("{}", render_line(display_name, progress));
    }
}

pub fn render_line(display_name: &str, progress: &EncoderProgress) -> String {
    if display_name.is_empty() {
        format!("  {}", progress)
    } else {
        format!("  {} {}", display_name, progress)
    }
}

/// Lets a render through at most once per interval.
///
/// The first render is allowed only after a full interval has elapsed.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_render: Instant,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last_render: start,
        }
    }

    pub fn should_render(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_render) >= self.interval {
            self.last_render = now;
            true
        } else {
            false
        }
    }
}

/// Result of a successful encoder run
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs FFmpeg and reports its progress
pub struct FfmpegExecutor {
    ffmpeg_path: PathBuf,
    sink: Arc<dyn ProgressSink>,
}

impl FfmpegExecutor {
    /// Resolve the binary once; `explicit` wins over any lookup
    pub fn new(explicit: Option<&Path>) -> Result<Self, CompressError> {
        let ffmpeg_path = ToolPathResolver::new().resolve_ffmpeg(explicit)?;
        Ok(Self::with_path(ffmpeg_path))
    }

    pub fn with_path(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            sink: Arc::new(ConsoleSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Run FFmpeg with `args`, rendering progress at most once per `interval`.
    ///
    /// A non-zero exit (or death by signal) yields `CompressError::Encoder`
    /// carrying the captured stderr.
    pub async fn run_with_progress(
        &self,
        args: &[String],
        interval: Duration,
        display_name: &str,
    ) -> Result<EncoderOutput> {
        debug!("Running {} {:?}", self.ffmpeg_path.display(), args);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (tx, mut rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(pump_lines(stderr, tx)));
        let stdout_task = child.stdout.take().map(|mut stdout| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stdout.read_to_end(&mut buf).await {
                    warn!("Failed to read encoder stdout: {}", e);
                }
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let mut monitor = ProgressMonitor::new(interval, display_name, self.sink.as_ref());

        let status = loop {
            while let Ok(line) = rx.try_recv() {
                monitor.observe(line, Instant::now());
            }
            if let Some(status) = child.try_wait()? {
                break status;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        // Sender closes once the reader hits EOF
        while let Some(line) = rx.recv().await {
            monitor.record(line);
        }
        if let Some(task) = stderr_task {
            match task.await {
                Ok(Err(e)) => warn!("Failed to read encoder stderr: {}", e),
                Err(e) => warn!("Encoder stderr reader panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        let stdout = match stdout_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        monitor.finish();
        let stderr = monitor.into_stderr();

        if !status.success() {
            return Err(CompressError::Encoder {
                code: status.code(),
                stderr,
            }
            .into());
        }

        Ok(EncoderOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Collects stderr lines and drives throttled rendering
struct ProgressMonitor<'a> {
    throttle: ProgressThrottle,
    display_name: &'a str,
    sink: &'a dyn ProgressSink,
    lines: Vec<String>,
    last_progress: Option<EncoderProgress>,
    last_rendered: Option<EncoderProgress>,
}

impl<'a> ProgressMonitor<'a> {
    fn new(interval: Duration, display_name: &'a str, sink: &'a dyn ProgressSink) -> Self {
        Self {
            throttle: ProgressThrottle::new(interval),
            display_name,
            sink,
            lines: Vec::new(),
            last_progress: None,
            last_rendered: None,
        }
    }

    /// Record a line and render it if the throttle allows
    fn observe(&mut self, line: String, now: Instant) {
        if let Some(progress) = self.record(line) {
            if self.throttle.should_render(now) {
                self.render(progress);
            }
        }
    }

    fn record(&mut self, line: String) -> Option<EncoderProgress> {
        let progress = EncoderProgress::parse(&line);
        self.lines.push(line);
        if let Some(ref progress) = progress {
            self.last_progress = Some(progress.clone());
        }
        progress
    }

    /// Show the final state unless it was the last thing rendered
    fn finish(&mut self) {
        if let Some(progress) = self.last_progress.clone() {
            if self.last_rendered.as_ref() != Some(&progress) {
                self.render(progress);
            }
        }
    }

    fn render(&mut self, progress: EncoderProgress) {
        self.sink.report(self.display_name, &progress);
        self.last_rendered = Some(progress);
    }

    fn into_stderr(self) -> String {
        self.lines.join("\n")
    }
}

/// Split a stream on `\n` and `\r` and forward non-empty lines
async fn pump_lines<R>(mut reader: R, tx: mpsc::Sender<String>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                if !flush_line(&mut pending, &tx).await {
                    return Ok(());
                }
            } else {
                pending.push(byte);
            }
        }
    }

    flush_line(&mut pending, &tx).await;
    Ok(())
}

/// Returns false once the receiver is gone
async fn flush_line(pending: &mut Vec<u8>, tx: &mpsc::Sender<String>) -> bool {
    if pending.is_empty() {
        return true;
    }
    let line = String::from_utf8_lossy(pending).trim_end().to_string();
    pending.clear();
    if line.is_empty() {
        return true;
    }
    tx.send(line).await.is_ok()
}
