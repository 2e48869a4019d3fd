//! Rolling Logger
//!
//! Writes formatted log records to one file per day (`{app}-{YYYY-MM-DD}.log`),
//! prunes old files, and keeps a circular buffer of the most recent lines so
//! an app can show them without reading the file back.
//!
//! `log` records are bridged into the `tracing` subscriber, so library code can
//! keep using the `log` macros.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Lines kept in memory for `recent_logs`
pub const DEFAULT_BUFFER_LINES: usize = 500;

/// Daily files kept on disk
pub const MAX_LOG_FILES: usize = 7;

static WRITER: OnceLock<RollingWriter> = OnceLock::new();

/// Day-rolling file writer with an in-memory tail
#[derive(Clone)]
pub struct RollingWriter {
    inner: Arc<Inner>,
}

struct Inner {
    dir: PathBuf,
    app_name: String,
    capacity: usize,
    max_files: usize,
    state: Mutex<WriterState>,
}

#[derive(Default)]
struct WriterState {
    recent: VecDeque<String>,
    partial: String,
    current_date: Option<String>,
}

impl RollingWriter {
    pub fn new(dir: impl Into<PathBuf>, app_name: &str, capacity: usize) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                app_name: app_name.to_string(),
                capacity,
                max_files: MAX_LOG_FILES,
                state: Mutex::new(WriterState::default()),
            }),
        })
    }

    /// Override how many daily files survive pruning
    pub fn with_max_files(self, max_files: usize) -> Self {
        let inner = Inner {
            dir: self.inner.dir.clone(),
            app_name: self.inner.app_name.clone(),
            capacity: self.inner.capacity,
            max_files: max_files.max(1),
            state: Mutex::new(WriterState::default()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.inner.dir
    }

    /// File that records written right now end up in
    pub fn current_file(&self) -> PathBuf {
        self.file_for(&today())
    }

    /// Most recent complete lines, oldest first
    pub fn recent(&self) -> Vec<String> {
        match self.inner.state.lock() {
            Ok(state) => state.recent.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn file_for(&self, date: &str) -> PathBuf {
        self.inner
            .dir
            .join(format!("{}-{}.log", self.inner.app_name, date))
    }

    fn append(&self, buf: &[u8]) -> io::Result<()> {
        let mut state = self
            .inner
            .state
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?;

        let date = today();
        if state.current_date.as_deref() != Some(date.as_str()) {
            state.current_date = Some(date.clone());
            self.prune()?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(&date))?;
        file.write_all(buf)?;

        state.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = state.partial.find('\n') {
            let line: String = state.partial.drain(..=pos).collect();
            state.recent.push_back(line.trim_end().to_string());
            while state.recent.len() > self.inner.capacity {
                state.recent.pop_front();
            }
        }
        Ok(())
    }

    /// Delete the oldest daily files beyond `max_files`
    fn prune(&self) -> io::Result<()> {
        let prefix = format!("{}-", self.inner.app_name);
        let mut files: Vec<PathBuf> = fs::read_dir(&self.inner.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Date-stamped names sort chronologically
        files.sort();
        // Leave room for today's file, which may not exist yet
        let keep = self.inner.max_files.saturating_sub(1);
        if files.len() > keep {
            let excess = files.len() - keep;
            for path in files.into_iter().take(excess) {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Per-event handle given to the fmt layer
pub struct RollingHandle {
    writer: RollingWriter,
}

impl Write for RollingHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RollingHandle {
            writer: self.clone(),
        }
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn to_tracing_filter(level: log::LevelFilter) -> LevelFilter {
    match level {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

/// Install the global logger at info level
pub fn init_logger(log_dir: impl Into<PathBuf>, app_name: &str) -> Result<(), String> {
    init_logger_with_level(log_dir, app_name, log::LevelFilter::Info)
}

/// Install the global logger. Fails if a logger is already installed.
pub fn init_logger_with_level(
    log_dir: impl Into<PathBuf>,
    app_name: &str,
    level: log::LevelFilter,
) -> Result<(), String> {
    let writer = RollingWriter::new(log_dir, app_name, DEFAULT_BUFFER_LINES)
        .map_err(|e| format!("Failed to create log dir: {}", e))?;

    WRITER
        .set(writer.clone())
        .map_err(|_| "Logger already initialized".to_string())?;

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(to_tracing_filter(level))
        .try_init()
        .map_err(|e| format!("Failed to install subscriber: {}", e))
}

/// Whether `init_logger` has run in this process
pub fn is_initialized() -> bool {
    WRITER.get().is_some()
}

/// Directory of the installed logger
pub fn log_dir() -> Option<PathBuf> {
    WRITER.get().map(|w| w.dir().clone())
}

/// Recent lines from the installed logger (empty before init)
pub fn recent_logs() -> Vec<String> {
    WRITER.get().map(|w| w.recent()).unwrap_or_default()
}

fn ensure_init() -> Result<(), String> {
    if is_initialized() {
        Ok(())
    } else {
        Err("Logger not initialized".to_string())
    }
}

pub fn info(msg: &str) -> Result<(), String> {
    ensure_init()?;
    tracing::info!("{}", msg);
    Ok(())
}

pub fn warn(msg: &str) -> Result<(), String> {
    ensure_init()?;
    tracing::warn!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), String> {
    ensure_init()?;
    tracing::error!("{}", msg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_lines_to_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RollingWriter::new(dir.path(), "Kanban", 10).unwrap();
        let mut handle = writer.make_writer();
        handle.write_all(b"first line\nsecond line\n").unwrap();

        let content = fs::read_to_string(writer.current_file()).unwrap();
        assert!(content.contains("first line"));
        assert!(content.contains("second line"));
        assert_eq!(writer.recent(), vec!["first line", "second line"]);
    }

    #[test]
    fn test_buffer_is_circular() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RollingWriter::new(dir.path(), "Kanban", 3).unwrap();
        let mut handle = writer.make_writer();
        for i in 0..5 {
            handle.write_all(format!("line {}\n", i).as_bytes()).unwrap();
        }
        assert_eq!(writer.recent(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_partial_lines_wait_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RollingWriter::new(dir.path(), "Kanban", 10).unwrap();
        let mut handle = writer.make_writer();
        handle.write_all(b"half").unwrap();
        assert!(writer.recent().is_empty());
        handle.write_all(b" done\n").unwrap();
        assert_eq!(writer.recent(), vec!["half done"]);
    }

    #[test]
    fn test_prunes_old_files() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=5 {
            fs::write(dir.path().join(format!("Kanban-2020-01-0{}.log", day)), "old\n").unwrap();
        }
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        let writer = RollingWriter::new(dir.path(), "Kanban", 10)
            .unwrap()
            .with_max_files(3);
        writer.make_writer().write_all(b"new\n").unwrap();

        let mut logs: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".log"))
            .collect();
        logs.sort();
        assert_eq!(logs.len(), 3);
        assert!(logs.contains(&"Kanban-2020-01-04.log".to_string()));
        assert!(logs.contains(&"Kanban-2020-01-05.log".to_string()));
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_helpers_require_init() {
        if !is_initialized() {
            assert!(info("not yet").is_err());
        }
    }
}
