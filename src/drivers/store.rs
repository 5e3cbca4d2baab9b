use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use crate::drivers::display::DisplaySink;
use crate::drivers::LinkError;
/// One ADC reading and its position in the session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub index: u64,
    pub value: f64,
}
/// Samples of one session starting at some index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBatch {
    pub session: u64,
    pub samples: Vec<Sample>,
}
enum StoreRequest {
    Reset { session: u64 },
    Append { session: u64, value: f64 },
    Seal { session: u64, reply: Sender<usize> },
    Len { reply: Sender<usize> },
    Since { from: u64, reply: Sender<SampleBatch> },
}
/// Handle to the thread that owns the authoritative sample sequence.
///
/// Requests are served strictly in the order they were sent, so a reply to
/// any query reflects every append issued before it.
#[derive(Clone)]
pub struct SampleStore {
    tx: Sender<StoreRequest>,
}
impl SampleStore {
    /// Starts the owner thread. It runs until every handle is dropped.
    pub fn spawn(sink: Option<Arc<dyn DisplaySink>>) -> Result<Self, LinkError> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("sample-store".into())
            .spawn(move || SequenceOwner::new(sink).run(rx))
            .map_err(|e| LinkError::WorkerSpawn("sample store", e))?;
        Ok(Self { tx })
    }
    /// Discards the current sequence and opens a new, empty one.
    pub fn reset(&self, session: u64) -> Result<(), LinkError> {
        self.request(StoreRequest::Reset { session })
    }
    /// Stops accepting appends for `session` and returns its final length.
    pub fn seal(&self, session: u64) -> Result<usize, LinkError> {
        self.query(|reply| StoreRequest::Seal { session, reply })
    }
    pub fn len(&self) -> Result<usize, LinkError> {
        self.query(|reply| StoreRequest::Len { reply })
    }
    /// Samples with `index >= from` of the current session.
    pub fn since(&self, from: u64) -> Result<SampleBatch, LinkError> {
        self.query(|reply| StoreRequest::Since { from, reply })
    }
    pub fn snapshot(&self) -> Result<Vec<Sample>, LinkError> {
        Ok(self.since(0)?.samples)
    }
    pub(crate) fn appender(&self, session: u64) -> SessionAppender {
        SessionAppender {
            tx: self.tx.clone(),
            session,
        }
    }
    fn request(&self, req: StoreRequest) -> Result<(), LinkError> {
        self.tx.send(req).map_err(|_| LinkError::StoreClosed)
    }
    fn query<T>(&self, make: impl FnOnce(Sender<T>) -> StoreRequest) -> Result<T, LinkError> {
        let (reply, rx) = mpsc::channel();
        self.request(make(reply))?;
        rx.recv().map_err(|_| LinkError::StoreClosed)
    }
}
/// Write side used by an ingestion worker; tagged with its session.
pub(crate) struct SessionAppender {
    tx: Sender<StoreRequest>,
    session: u64,
}
impl SessionAppender {
    /// Returns `false` once the store is gone.
    pub fn append(&self, value: f64) -> bool {
        self.tx
            .send(StoreRequest::Append {
                session: self.session,
                value,
            })
            .is_ok()
    }
}
struct SequenceOwner {
    samples: Vec<Sample>,
    session: u64,
    open: bool,
    sink: Option<Arc<dyn DisplaySink>>,
}
impl SequenceOwner {
    fn new(sink: Option<Arc<dyn DisplaySink>>) -> Self {
        Self {
            samples: Vec::new(),
            session: 0,
            open: false,
            sink,
        }
    }
    fn run(mut self, rx: Receiver<StoreRequest>) {
        for req in rx {
            match req {
                StoreRequest::Reset { session } => {
                    self.samples.clear();
                    self.session = session;
                    self.open = true;
                    if let Some(sink) = &self.sink {
                        sink.session_reset(session);
                    }
                }
                StoreRequest::Append { session, value } => self.append(session, value),
                StoreRequest::Seal { session, reply } => {
                    if session == self.session {
                        self.open = false;
                    }
                    let _ = reply.send(self.samples.len());
                }
                StoreRequest::Len { reply } => {
                    let _ = reply.send(self.samples.len());
                }
                StoreRequest::Since { from, reply } => {
                    let start = usize::try_from(from)
                        .unwrap_or(usize::MAX)
                        .min(self.samples.len());
                    let _ = reply.send(SampleBatch {
                        session: self.session,
                        samples: self.samples[start..].to_vec(),
                    });
                }
            }
        }
        log::debug!("sample store shut down");
    }
    fn append(&mut self, session: u64, value: f64) {
        if !self.open || session != self.session {
            log::trace!("ignoring sample from closed session {session}");
            return;
        }
        let sample = Sample {
            index: self.samples.len() as u64,
            value,
        };
        self.samples.push(sample);
        if let Some(sink) = &self.sink {
            sink.sample_ready(sample);
        }
    }
}
