use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crate::drivers::decode::{FrameDecoder, Framing};
use crate::drivers::display::DisplaySink;
use crate::drivers::export;
use crate::drivers::gain::{Gain, GAIN_SENTINEL};
use crate::drivers::link::{DeviceLink, LinkReader};
use crate::drivers::store::{Sample, SampleStore, SessionAppender};
use crate::drivers::LinkError;
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub read_buffer_bytes: usize,
    pub framing: Framing,
    /// Upper bound on how long `stop` waits for the worker to exit.
    pub stop_timeout: Duration,
    /// Pause after a failed read before the next attempt.
    pub error_backoff: Duration,
}
impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_buffer_bytes: 1024,
            framing: Framing::Read,
            stop_timeout: Duration::from_secs(2),
            error_backoff: Duration::from_millis(50),
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been started yet.
    Idle,
    Active,
    /// Stopped by request or because the device closed the stream.
    Stopped,
}
struct Session {
    id: u64,
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    done: Receiver<()>,
    link: DeviceLink,
}
/// Owns the device link of the current session and turns its byte stream
/// into the sample sequence held by the [`SampleStore`].
pub struct AcquisitionPipeline {
    config: PipelineConfig,
    store: SampleStore,
    last_session: u64,
    session: Option<Session>,
}
impl AcquisitionPipeline {
    pub fn new(
        config: PipelineConfig,
        sink: Option<Arc<dyn DisplaySink>>,
    ) -> Result<Self, LinkError> {
        Ok(Self {
            config,
            store: SampleStore::spawn(sink)?,
            last_session: 0,
            session: None,
        })
    }
    /// Shared handle for readers of the sequence (display, export).
    pub fn store(&self) -> &SampleStore {
        &self.store
    }
    pub fn state(&self) -> SessionState {
        match &self.session {
            None => SessionState::Idle,
            Some(s) if s.active.load(Ordering::Acquire) => SessionState::Active,
            Some(_) => SessionState::Stopped,
        }
    }
    /// Starts a new session on `link` with an empty sample sequence.
    ///
    /// A session still running is stopped first.
    pub fn start(&mut self, mut link: DeviceLink) -> Result<u64, LinkError> {
        self.stop()?;
        let reader = link.take_reader().ok_or(LinkError::NotConnected)?;
        let id = self.last_session + 1;
        self.store.reset(id)?;
        self.last_session = id;
        let active = Arc::new(AtomicBool::new(true));
        let (done_tx, done) = mpsc::channel();
        let worker = IngestWorker {
            label: link.label().to_string(),
            reader,
            decoder: FrameDecoder::new(self.config.framing, self.config.read_buffer_bytes),
            appender: self.store.appender(id),
            active: Arc::clone(&active),
            buffer_bytes: self.config.read_buffer_bytes.max(1),
            error_backoff: self.config.error_backoff,
        };
        let handle = thread::Builder::new()
            .name(format!("ingest-{id}"))
            .spawn(move || {
                worker.run();
                let _ = done_tx.send(());
            })
            .map_err(|e| LinkError::WorkerSpawn("ingestion", e))?;
        log::info!("session {id} started on {}", link.label());
        self.session = Some(Session {
            id,
            active,
            worker: Some(handle),
            done,
            link,
        });
        Ok(id)
    }
    /// Ends the current session. Once this returns no further samples are
    /// appended for it. Without a running session this is a no-op.
    pub fn stop(&mut self) -> Result<(), LinkError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.worker.is_none() && session.link.is_closed() {
            return Ok(());
        }
        session.active.store(false, Ordering::Release);
        if let Some(worker) = session.worker.take() {
            match session.done.recv_timeout(self.config.stop_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.join().is_err() {
                        log::error!("ingestion worker of session {} panicked", session.id);
                    }
                }
                Err(RecvTimeoutError::Timeout) => log::warn!(
                    "ingestion worker of session {} still blocked after {:?}; detaching it",
                    session.id,
                    self.config.stop_timeout
                ),
            }
        }
        session.link.close();
        let kept = self.store.seal(session.id)?;
        log::info!("session {} stopped with {kept} samples", session.id);
        Ok(())
    }
    /// Writes a command token to the device. The gain placeholder is never
    /// sent. Failures leave the session untouched.
    pub fn send(&mut self, command: &str) -> Result<(), LinkError> {
        if command.trim().is_empty() || command.trim() == GAIN_SENTINEL {
            return Err(LinkError::NoGainSelected);
        }
        let session = self.session.as_mut().ok_or(LinkError::NotConnected)?;
        session.link.write_token(command)?;
        log::info!("sent {command:?} to {}", session.link.label());
        Ok(())
    }
    pub fn send_gain(&mut self, gain: Gain) -> Result<(), LinkError> {
        self.send(gain.token())
    }
    /// Current (or last) session's samples in export text format.
    pub fn export(&self) -> Result<String, LinkError> {
        Ok(export::render(&self.store.snapshot()?))
    }
    pub fn snapshot(&self) -> Result<Vec<Sample>, LinkError> {
        self.store.snapshot()
    }
    pub fn sample_count(&self) -> Result<usize, LinkError> {
        self.store.len()
    }
    /// Stops the session and releases the link.
    pub fn dispose(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("failed to stop session cleanly: {e}");
        }
    }
}
impl Drop for AcquisitionPipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}
struct IngestWorker {
    label: String,
    reader: LinkReader,
    decoder: FrameDecoder,
    appender: SessionAppender,
    active: Arc<AtomicBool>,
    buffer_bytes: usize,
    error_backoff: Duration,
}
impl IngestWorker {
    fn run(mut self) {
        let mut buf = vec![0u8; self.buffer_bytes];
        while self.active.load(Ordering::Acquire) {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    log::info!("{}: device closed the stream", self.label);
                    break;
                }
                Ok(n) => {
                    for value in self.decoder.feed(&buf[..n]) {
                        if !self.appender.append(value) {
                            log::warn!("{}: sample store is gone", self.label);
                            self.active.store(false, Ordering::Release);
                            return;
                        }
                    }
                }
                Err(e) if is_idle(e.kind()) => {}
                Err(e) if is_disconnect(e.kind()) => {
                    log::warn!("{}: link lost: {e}", self.label);
                    break;
                }
                Err(e) => {
                    log::warn!("{}: read failed: {e}", self.label);
                    thread::sleep(self.error_backoff);
                }
            }
        }
        self.active.store(false, Ordering::Release);
        log::debug!(
            "{}: ingestion ended, {} fragments dropped",
            self.label,
            self.decoder.dropped()
        );
    }
}
fn is_idle(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}
fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
    )
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::link::{manual_link, ManualFeeder};
    use std::io;
    use std::time::Instant;
    fn quick_config() -> PipelineConfig {
        PipelineConfig {
            stop_timeout: Duration::from_millis(500),
            error_backoff: Duration::from_millis(1),
            ..PipelineConfig::default()
        }
    }
    fn started() -> (AcquisitionPipeline, ManualFeeder) {
        let (pipeline, feeder, _) = started_with_id();
        (pipeline, feeder)
    }
    fn started_with_id() -> (AcquisitionPipeline, ManualFeeder, u64) {
        let mut pipeline = AcquisitionPipeline::new(quick_config(), None).unwrap();
        let (link, feeder) = manual_link("test", Some(Duration::from_millis(5)));
        let id = pipeline.start(link).unwrap();
        (pipeline, feeder, id)
    }
    fn wait_for(pipeline: &AcquisitionPipeline, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while pipeline.sample_count().unwrap() < count {
            assert!(Instant::now() < deadline, "timed out waiting for {count} samples");
            thread::sleep(Duration::from_millis(2));
        }
    }
    fn wait_until_stopped(pipeline: &AcquisitionPipeline) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while pipeline.state() == SessionState::Active {
            assert!(Instant::now() < deadline, "session never stopped");
            thread::sleep(Duration::from_millis(2));
        }
    }
    #[test]
    fn parseable_reads_become_sequential_samples() {
        let (mut pipeline, feeder) = started();
        for line in ["512\r\n", "noise", "  3.5 ", " \r\n", "-1e2\n"] {
            feeder.push(line);
        }
        feeder.push("7");
        wait_for(&pipeline, 4);
        pipeline.stop().unwrap();
        let samples = pipeline.snapshot().unwrap();
        let indices: Vec<u64> = samples.iter().map(|s| s.index).collect();
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(values, vec![512.0, 3.5, -100.0, 7.0]);
    }
    #[test]
    fn non_numeric_read_adds_nothing() {
        let (mut pipeline, feeder) = started();
        feeder.push("1");
        wait_for(&pipeline, 1);
        feeder.push("hello");
        feeder.push("2");
        wait_for(&pipeline, 2);
        pipeline.stop().unwrap();
        assert_eq!(pipeline.sample_count().unwrap(), 2);
    }
    #[test]
    fn export_of_session_matches_text_format() {
        let (mut pipeline, feeder) = started();
        assert_eq!(pipeline.export().unwrap(), "");
        feeder.push("1.5");
        feeder.push("2.25");
        wait_for(&pipeline, 2);
        assert_eq!(pipeline.export().unwrap(), "0,1.5\n1,2.25\n");
        pipeline.stop().unwrap();
        assert_eq!(pipeline.export().unwrap(), "0,1.5\n1,2.25\n");
    }
    #[test]
    fn no_appends_after_stop() {
        let (mut pipeline, feeder) = started();
        feeder.push("1");
        wait_for(&pipeline, 1);
        pipeline.stop().unwrap();
        assert_eq!(pipeline.state(), SessionState::Stopped);
        feeder.push("2");
        feeder.push("3");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(pipeline.sample_count().unwrap(), 1);
    }
    #[test]
    fn stop_is_idempotent() {
        let mut idle = AcquisitionPipeline::new(quick_config(), None).unwrap();
        idle.stop().unwrap();
        assert_eq!(idle.state(), SessionState::Idle);
        let (mut pipeline, _feeder) = started();
        pipeline.stop().unwrap();
        pipeline.stop().unwrap();
        assert_eq!(pipeline.state(), SessionState::Stopped);
    }
    #[test]
    fn failed_send_leaves_session_alone() {
        let (mut pipeline, feeder) = started();
        feeder.push("4");
        wait_for(&pipeline, 1);
        feeder.break_writes();
        assert!(matches!(pipeline.send("1000"), Err(LinkError::Send { .. })));
        assert_eq!(pipeline.state(), SessionState::Active);
        assert_eq!(pipeline.sample_count().unwrap(), 1);
        feeder.push("5");
        wait_for(&pipeline, 2);
        pipeline.stop().unwrap();
        assert!(matches!(pipeline.send("1000"), Err(LinkError::NotConnected)));
        assert_eq!(pipeline.sample_count().unwrap(), 2);
        assert_eq!(pipeline.state(), SessionState::Stopped);
    }
    #[test]
    fn send_writes_tokens_but_never_the_placeholder() {
        let mut idle = AcquisitionPipeline::new(quick_config(), None).unwrap();
        assert!(matches!(idle.send("10"), Err(LinkError::NotConnected)));
        let (mut pipeline, feeder) = started();
        assert!(matches!(pipeline.send("GAIN"), Err(LinkError::NoGainSelected)));
        pipeline.send_gain(Gain::X100).unwrap();
        assert_eq!(feeder.written(), b"100");
    }
    #[test]
    fn read_errors_do_not_end_the_session() {
        let (mut pipeline, feeder) = started();
        feeder.push_error(io::ErrorKind::Other);
        feeder.push_error(io::ErrorKind::InvalidData);
        feeder.push("9");
        wait_for(&pipeline, 1);
        assert_eq!(pipeline.state(), SessionState::Active);
        pipeline.stop().unwrap();
    }
    #[test]
    fn closed_stream_stops_the_session() {
        let (mut pipeline, feeder) = started();
        feeder.push("1");
        drop(feeder);
        wait_until_stopped(&pipeline);
        assert_eq!(pipeline.sample_count().unwrap(), 1);
        pipeline.stop().unwrap();
    }
    #[test]
    fn lost_link_stops_the_session() {
        let (pipeline, feeder) = started();
        feeder.push_error(io::ErrorKind::BrokenPipe);
        wait_until_stopped(&pipeline);
    }
    #[test]
    fn new_session_starts_empty() {
        let (mut pipeline, feeder, first) = started_with_id();
        feeder.push("1");
        feeder.push("2");
        wait_for(&pipeline, 2);
        let (link, feeder2) = manual_link("second", Some(Duration::from_millis(5)));
        let second = pipeline.start(link).unwrap();
        assert!(second > first);
        assert_eq!(pipeline.sample_count().unwrap(), 0);
        feeder2.push("8");
        wait_for(&pipeline, 1);
        assert_eq!(pipeline.export().unwrap(), "0,8\n");
    }
    #[test]
    fn stop_is_bounded_when_the_read_never_returns() {
        let mut pipeline = AcquisitionPipeline::new(
            PipelineConfig {
                stop_timeout: Duration::from_millis(50),
                ..quick_config()
            },
            None,
        )
        .unwrap();
        let (link, feeder) = manual_link("stuck", None);
        pipeline.start(link).unwrap();
        let begun = Instant::now();
        pipeline.stop().unwrap();
        assert!(begun.elapsed() < Duration::from_secs(1));
        feeder.push("42");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(pipeline.sample_count().unwrap(), 0);
    }
    #[test]
    fn line_framing_keeps_split_values() {
        let mut pipeline = AcquisitionPipeline::new(
            PipelineConfig {
                framing: Framing::Line,
                ..quick_config()
            },
            None,
        )
        .unwrap();
        let (link, feeder) = manual_link("lines", Some(Duration::from_millis(5)));
        pipeline.start(link).unwrap();
        feeder.push("10");
        feeder.push("24\n3");
        feeder.push("\n");
        wait_for(&pipeline, 2);
        assert_eq!(pipeline.export().unwrap(), "0,1024\n1,3\n");
        pipeline.stop().unwrap();
    }
}
