//! Rolling Logger
//!
//! File logger for desktop applications:
//! - log files roll over once they reach a size limit, keeping the newest few
//! - the most recent lines stay in a circular buffer for in-app display
//! - `log` records are bridged into the same `tracing` pipeline

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default size at which the active log file is rolled over (1 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;
/// Default number of rolled files kept next to the active one
pub const DEFAULT_MAX_FILES: usize = 5;
/// Default capacity of the in-memory line buffer
pub const DEFAULT_BUFFER_LINES: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("logger already initialized")]
    AlreadyInitialized,
    #[error("logger not initialized")]
    NotInitialized,
    #[error("log io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to install subscriber: {0}")]
    Subscriber(String),
}

/// Size-bounded log file set: `<name>.log`, `<name>.1.log`, ... `<name>.N.log`
pub struct RollingFile {
    dir: PathBuf,
    name: String,
    max_bytes: u64,
    max_files: usize,
    file: File,
    written: u64,
}

impl RollingFile {
    pub fn open(dir: impl AsRef<Path>, name: &str, max_bytes: u64, max_files: usize) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.log", name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            dir,
            name: name.to_string(),
            max_bytes,
            max_files,
            file,
            written,
        })
    }

    /// Path of the active file (index 0) or of a rolled file
    pub fn path_for(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.dir.join(format!("{}.log", self.name))
        } else {
            self.dir.join(format!("{}.{}.log", self.name, index))
        }
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let oldest = self.path_for(self.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (0..self.max_files).rev() {
            let from = self.path_for(index);
            if from.exists() {
                fs::rename(&from, self.path_for(index + 1))?;
            }
        }
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(0))?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.roll()?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Circular buffer of the most recent log lines
#[derive(Debug)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Newest `n` lines, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }
}

struct SinkInner {
    file: Option<RollingFile>,
    buffer: LineBuffer,
}

/// Shared writer handed to `tracing_subscriber`
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<SinkInner>>,
}

impl LogSink {
    pub fn new(file: Option<RollingFile>, buffer_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkInner {
                file,
                buffer: LineBuffer::new(buffer_lines),
            })),
        }
    }

    pub fn recent(&self, n: usize) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.buffer.tail(n)
    }
}

pub struct SinkWriter {
    inner: Arc<Mutex<SinkInner>>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for line in String::from_utf8_lossy(buf).lines() {
            if !line.trim().is_empty() {
                inner.buffer.push(line.to_string());
            }
        }
        if let Some(file) = inner.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            inner: self.inner.clone(),
        }
    }
}

static SINK: OnceLock<LogSink> = OnceLock::new();

/// Initialize the global logger writing to `<log_dir>/<app_name>.log`
///
/// Also echoes to stderr. `log` macros are forwarded to the same output.
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    if SINK.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }

    let file = RollingFile::open(log_dir, app_name, DEFAULT_MAX_BYTES, DEFAULT_MAX_FILES)?;
    let sink = LogSink::new(Some(file), DEFAULT_BUFFER_LINES);

    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(sink.clone()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|e| LoggerError::Subscriber(e.to_string()))?;

    SINK.set(sink).map_err(|_| LoggerError::AlreadyInitialized)?;
    tracing::info!("{} logger started at {}", app_name, chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

fn ensure_initialized() -> Result<(), LoggerError> {
    SINK.get().map(|_| ()).ok_or(LoggerError::NotInitialized)
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::info!("{}", msg);
    Ok(())
}

pub fn warn(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::warn!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::error!("{}", msg);
    Ok(())
}

/// Last `n` lines written since startup (empty before `init_logger`)
pub fn recent_lines(n: usize) -> Vec<String> {
    SINK.get().map(|sink| sink.recent(n)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_file_rolls_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::open(dir.path(), "app", 16, 2).unwrap();

        file.write_all(b"0123456789\n").unwrap();
        file.write_all(b"abcdefghij\n").unwrap();
        file.write_all(b"ABCDEFGHIJ\n").unwrap();
        file.flush().unwrap();

        assert_eq!(fs::read_to_string(file.path_for(0)).unwrap(), "ABCDEFGHIJ\n");
        assert_eq!(fs::read_to_string(file.path_for(1)).unwrap(), "abcdefghij\n");
        assert_eq!(fs::read_to_string(file.path_for(2)).unwrap(), "0123456789\n");
    }

    #[test]
    fn test_rolling_file_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::open(dir.path(), "app", 4, 1).unwrap();

        for chunk in ["aaaa", "bbbb", "cccc"] {
            file.write_all(chunk.as_bytes()).unwrap();
        }
        file.flush().unwrap();

        assert_eq!(fs::read_to_string(file.path_for(0)).unwrap(), "cccc");
        assert_eq!(fs::read_to_string(file.path_for(1)).unwrap(), "bbbb");
        assert!(!file.path_for(2).exists());
    }

    #[test]
    fn test_line_buffer_keeps_newest() {
        let mut buffer = LineBuffer::new(2);
        buffer.push("one".into());
        buffer.push("two".into());
        buffer.push("three".into());

        assert_eq!(buffer.tail(10), vec!["two".to_string(), "three".to_string()]);
        assert_eq!(buffer.tail(1), vec!["three".to_string()]);
    }

    #[test]
    fn test_sink_splits_lines_into_buffer() {
        let sink = LogSink::new(None, 10);
        let mut writer = sink.make_writer();
        writer.write_all(b"first\nsecond\n").unwrap();

        assert_eq!(sink.recent(5), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_info_before_init_fails() {
        if SINK.get().is_none() {
            assert!(matches!(info("hello"), Err(LoggerError::NotInitialized)));
        }
    }
}
