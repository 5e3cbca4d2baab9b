use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use crate::drivers::LinkError;
pub type LinkReader = Box<dyn Read + Send>;
pub type LinkWriter = Box<dyn Write + Send>;
/// One bidirectional byte stream bound to one device.
///
/// The reader half is handed to the ingestion worker when a session starts;
/// the writer half stays with the session for outbound commands. Closing
/// drops whatever halves are still held and is safe to repeat.
pub struct DeviceLink {
    label: String,
    reader: Option<LinkReader>,
    writer: Option<LinkWriter>,
}
impl DeviceLink {
    pub fn from_parts(label: impl Into<String>, reader: LinkReader, writer: LinkWriter) -> Self {
        Self {
            label: label.into(),
            reader: Some(reader),
            writer: Some(writer),
        }
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
    pub(crate) fn take_reader(&mut self) -> Option<LinkReader> {
        self.reader.take()
    }
    /// Writes a command token as raw bytes and flushes it.
    pub fn write_token(&mut self, token: &str) -> Result<(), LinkError> {
        let writer = self.writer.as_mut().ok_or(LinkError::NotConnected)?;
        writer
            .write_all(token.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|source| LinkError::Send {
                token: token.to_string(),
                source,
            })
    }
    /// Returns `true` only for the call that actually released the link.
    pub fn close(&mut self) -> bool {
        let had_reader = self.reader.take().is_some();
        let had_writer = self.writer.take().is_some();
        if had_writer {
            log::info!("closed link {}", self.label);
        }
        had_reader || had_writer
    }
}
impl Drop for DeviceLink {
    fn drop(&mut self) {
        self.close();
    }
}
/// Serial port names the OS currently exposes (RFCOMM bindings included).
pub fn list_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}
/// Opens a serial device. The read timeout bounds how long the ingestion
/// worker can go without observing a stop request.
pub fn open_serial(
    port_name: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<DeviceLink, LinkError> {
    let connect_err = |source| LinkError::Connect {
        port: port_name.to_string(),
        source,
    };
    let port = serialport::new(port_name, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(connect_err)?;
    let reader = port.try_clone().map_err(connect_err)?;
    log::info!("opened {port_name} at {baud_rate} baud");
    Ok(DeviceLink::from_parts(port_name, Box::new(reader), Box::new(port)))
}
/// What the reading side of a [`manual_link`] is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    /// Nobody has read yet; pushed data would only pile up.
    Idle,
    Reading,
    /// The reader half has been dropped.
    Gone,
}
enum Chunk {
    Data(Vec<u8>),
    #[cfg(test)]
    Fault(io::ErrorKind),
}
/// In-memory link useful for tests and the built-in signal simulator.
///
/// Each pushed chunk is delivered by exactly one read (if it fits the read
/// buffer). With a read timeout an idle link reports `TimedOut`; dropping
/// every [`ManualFeeder`] ends the stream.
pub fn manual_link(
    label: impl Into<String>,
    read_timeout: Option<Duration>,
) -> (DeviceLink, ManualFeeder) {
    let (tx, rx) = mpsc::channel();
    let written = Arc::new(Mutex::new(Vec::new()));
    let broken = Arc::new(AtomicBool::new(false));
    let reading = Arc::new(AtomicBool::new(false));
    let reader = ChannelReader {
        reading: Arc::clone(&reading),
        rx,
        timeout: read_timeout,
        leftover: Vec::new(),
    };
    let writer = SharedWriter {
        written: Arc::clone(&written),
        broken: Arc::clone(&broken),
    };
    let link = DeviceLink::from_parts(label, Box::new(reader), Box::new(writer));
    let feeder = ManualFeeder {
        tx,
        written,
        reading: Arc::downgrade(&reading),
        #[cfg(test)]
        broken,
    };
    (link, feeder)
}
/// Device side of a [`manual_link`].
#[derive(Clone)]
pub struct ManualFeeder {
    tx: Sender<Chunk>,
    written: Arc<Mutex<Vec<u8>>>,
    reading: Weak<AtomicBool>,
    #[cfg(test)]
    broken: Arc<AtomicBool>,
}
impl ManualFeeder {
    /// Returns `false` once the reading side is gone. Empty chunks are
    /// skipped since a zero-length read means end of stream.
    pub fn push(&self, bytes: impl Into<Vec<u8>>) -> bool {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return true;
        }
        self.tx.send(Chunk::Data(bytes)).is_ok()
    }
    /// Makes the next read fail with the given error kind.
    #[cfg(test)]
    pub fn push_error(&self, kind: io::ErrorKind) -> bool {
        self.tx.send(Chunk::Fault(kind)).is_ok()
    }
    /// Every write from now on fails as if the link had dropped.
    #[cfg(test)]
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::Release);
    }
    #[cfg(test)]
    pub fn written(&self) -> Vec<u8> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    pub fn reader_state(&self) -> ReaderState {
        match self.reading.upgrade() {
            None => ReaderState::Gone,
            Some(flag) if flag.load(Ordering::Acquire) => ReaderState::Reading,
            Some(_) => ReaderState::Idle,
        }
    }
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut *self.written.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
struct ChannelReader {
    reading: Arc<AtomicBool>,
    rx: Receiver<Chunk>,
    timeout: Option<Duration>,
    leftover: Vec<u8>,
}
impl ChannelReader {
    fn deliver(&mut self, mut data: Vec<u8>, buf: &mut [u8]) -> usize {
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        self.leftover = data.split_off(n);
        n
    }
}
impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reading.store(true, Ordering::Release);
        if !self.leftover.is_empty() {
            let data = std::mem::take(&mut self.leftover);
            return Ok(self.deliver(data, buf));
        }
        let chunk = match self.timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => return Err(io::ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            },
            None => match self.rx.recv() {
                Ok(chunk) => chunk,
                Err(_) => return Ok(0),
            },
        };
        match chunk {
            Chunk::Data(data) => Ok(self.deliver(data, buf)),
            #[cfg(test)]
            Chunk::Fault(kind) => Err(kind.into()),
        }
    }
}
struct SharedWriter {
    written: Arc<Mutex<Vec<u8>>>,
    broken: Arc<AtomicBool>,
}
impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken.load(Ordering::Acquire) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
