use std::{
    io,
    sync::{
        Arc,
        Mutex,
    },
};

use tracing::{
    subscriber::DefaultGuard,
    Level,
};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Debug, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn drain(&self) -> String {
        match self.0.lock() {
            Ok(mut bytes) => String::from_utf8_lossy(&std::mem::take(&mut *bytes)).into_owned(),
            Err(_) => String::new(),
        }
    }
}

impl io::Write for LogBuffer {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> LogBuffer {
        self.clone()
    }
}

/// Routes events up to `level` into `buffer` until the guard is dropped.
///
/// Timestamps are left out, the wasm target has no system clock.
pub fn capture(
    level: Level,
    buffer: LogBuffer,
) -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_default(subscriber)
}
