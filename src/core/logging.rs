use crate::shared::paths::{ensure_dir, get_log_dir};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Targets that get their own log file. Everything else goes to `system.log`.
const LOG_TARGETS: [&str; 1] = ["capture"];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create logs directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to set global tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Flushes the background writers when dropped. Keep it alive for the
/// lifetime of the process.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

struct TargetWriter {
    writers: HashMap<String, NonBlocking>,
    system_writer: NonBlocking,
}

impl TargetWriter {
    fn writer_for(&self, target: &str) -> &NonBlocking {
        self.writers
            .iter()
            .find(|(name, _)| target == name.as_str() || target.starts_with(&format!("{}::", name)))
            .map(|(_, writer)| writer)
            .unwrap_or(&self.system_writer)
    }
}

impl<'a> MakeWriter<'a> for TargetWriter {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        Box::new(self.system_writer.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        Box::new(self.writer_for(meta.target()).clone())
    }
}

pub fn init_logging() -> Result<LoggingGuards, LoggingError> {
    init_logging_in(&get_log_dir())
}

pub fn init_logging_in(log_dir: &Path) -> Result<LoggingGuards, LoggingError> {
    ensure_dir(log_dir).map_err(|source| LoggingError::Directory {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let mut guards = Vec::new();
    let mut writers = HashMap::new();

    for target in LOG_TARGETS {
        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{}.log", target));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        writers.insert(target.to_string(), non_blocking);
        guards.push(guard);
    }

    let system_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "system.log");
    let (system_writer, system_guard) = tracing_appender::non_blocking(system_appender);
    guards.push(system_guard);

    let writer = TargetWriter {
        writers,
        system_writer,
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(true),
    );

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(target: "system", "Logging initialized at {:?}", log_dir);

    Ok(LoggingGuards { _guards: guards })
}
