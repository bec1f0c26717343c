/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so frames split across
/// network chunks (or multi-byte characters split across chunks) decode intact.
/// Consecutive `data:` lines of one event are joined with `\n` and the event is
/// dispatched at the blank line that ends it.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub data: String,
}

impl SseFrame {
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }
}

impl SseDecoder {
    /// Cap on a single unterminated line. Complete lines are never dropped.
    const MAX_LINE_SIZE: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            start = end + 1;
            self.line(line.trim_end_matches('\r'), &mut frames);
        }
        self.buffer.drain(..start);

        if self.buffer.len() > Self::MAX_LINE_SIZE {
            log::warn!(
                "SSE line exceeded {}KB without a line break, discarding it",
                Self::MAX_LINE_SIZE / 1024
            );
            self.buffer.clear();
        }
        frames
    }

    fn line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            if let Some(data) = self.data.take() {
                frames.push(SseFrame { data });
            }
            return;
        }

        // Comments, event names and ids carry nothing we use.
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
    }

    /// Dispatches whatever event is still open when the body ends.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            self.line(line.trim_end_matches('\r'), &mut frames);
        }
        self.line("", &mut frames);
        frames.pop()
    }
}
