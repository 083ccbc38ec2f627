//! Append-only log file writer.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// File writer shared by every event; each write is flushed so concurrent
/// CLI invocations interleave whole lines.
#[derive(Clone)]
pub struct AppendLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl AppendLogWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for AppendLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// `MakeWriter` handing out clones of one [`AppendLogWriter`].
#[derive(Clone)]
pub struct WriterFactory {
    writer: AppendLogWriter,
}

impl WriterFactory {
    pub fn new(writer: AppendLogWriter) -> Self {
        Self { writer }
    }
}

impl<'a> MakeWriter<'a> for WriterFactory {
    type Writer = AppendLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}
