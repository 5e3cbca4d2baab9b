use serde::Deserialize;
/// How the inbound byte stream is cut into candidate sample values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Every completed read is one candidate. A value split across two reads
    /// fails to parse on both halves and is dropped.
    #[default]
    Read,
    /// Bytes are buffered across reads and split on `\n`.
    Line,
}
/// Decodes one fragment of device text into a sample value.
///
/// The bytes are read as UTF-8 (invalid sequences replaced), trimmed, and
/// parsed as a float. Empty, non-numeric and non-finite text yields `None`.
pub fn parse_value(bytes: &[u8]) -> Option<f64> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: f64 = trimmed.parse().ok()?;
    value.is_finite().then_some(value)
}
/// Stateful decoder turning raw reads into sample values.
pub struct FrameDecoder {
    framing: Framing,
    pending: Vec<u8>,
    max_pending: usize,
    dropped: u64,
}
impl FrameDecoder {
    pub fn new(framing: Framing, max_pending: usize) -> Self {
        Self {
            framing,
            pending: Vec::new(),
            max_pending: max_pending.max(1),
            dropped: 0,
        }
    }
    /// Number of fragments discarded because they did not parse.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
    /// Feeds the bytes of one completed read and returns the values it
    /// produced, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<f64> {
        match self.framing {
            Framing::Read => self.accept(chunk).into_iter().collect(),
            Framing::Line => self.feed_lines(chunk),
        }
    }
    fn feed_lines(&mut self, chunk: &[u8]) -> Vec<f64> {
        self.pending.extend_from_slice(chunk);
        let mut values = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            // Blank lines between values are framing noise, not dropped data.
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if let Some(v) = self.accept(&line) {
                values.push(v);
            }
        }
        if self.pending.len() > self.max_pending {
            log::debug!(
                "discarding {} buffered bytes without a line break",
                self.pending.len()
            );
            self.pending.clear();
            self.dropped += 1;
        }
        values
    }
    fn accept(&mut self, fragment: &[u8]) -> Option<f64> {
        let value = parse_value(fragment);
        if value.is_none() {
            self.dropped += 1;
            log::trace!(
                "dropping unparseable fragment {:?}",
                String::from_utf8_lossy(fragment)
            );
        }
        value
    }
}
