//! Streaming INDI frame reassembly.
//!
//! An INDI stream is a sequence of top-level XML elements with no
//! document root, chunked arbitrarily by the transport. The [`Framer`]
//! is fed raw bytes and emits complete frames; it never parses XML
//! itself, it only delimits. Data is consumed up to each `>`, leading
//! noise between frames is discarded, and a frame is complete when the
//! buffer ends with `/>` (self-closing first chunk) or with the end tag
//! matching the start tag that opened it.

use bytes::{Bytes, BytesMut};

/// Reads longer than this without a `>` are consumed as one chunk so a
/// huge base64 BLOB body cannot stall the stream.
pub const MAX_CHUNK: usize = 32 * 1024;

/// Frame tags a server (or driver) sends toward clients
const CLIENT_BOUND_TAGS: &[&[u8]] = &[
    b"defTextVector",
    b"defNumberVector",
    b"defSwitchVector",
    b"defLightVector",
    b"defBLOBVector",
    b"setTextVector",
    b"setNumberVector",
    b"setSwitchVector",
    b"setLightVector",
    b"setBLOBVector",
    b"message",
    b"delProperty",
];

/// Frame tags a client sends toward servers
const SERVER_BOUND_TAGS: &[&[u8]] = &[
    b"getProperties",
    b"enableBLOB",
    b"newTextVector",
    b"newNumberVector",
    b"newSwitchVector",
    b"newBLOBVector",
];

/// Which half of the protocol a stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSet {
    /// Frames flowing from a server or driver toward clients
    ClientBound,
    /// Frames flowing from a client toward a server or driver
    ServerBound,
}

impl FrameSet {
    fn tags(self) -> &'static [&'static [u8]] {
        match self {
            FrameSet::ClientBound => CLIENT_BOUND_TAGS,
            FrameSet::ServerBound => SERVER_BOUND_TAGS,
        }
    }
}

/// Incremental frame splitter for one stream
#[derive(Debug)]
pub struct Framer {
    tags: &'static [&'static [u8]],
    /// Unconsumed input
    buf: BytesMut,
    /// Frame under assembly, empty while idle
    frame: BytesMut,
    /// Index into `tags` of the frame under assembly
    tag: Option<usize>,
}

impl Framer {
    /// Framer for a server→client stream (INDI socket, driver stdout)
    pub fn client_bound() -> Self {
        Self::new(FrameSet::ClientBound)
    }

    /// Framer for a client→server stream (listening port inbound)
    pub fn server_bound() -> Self {
        Self::new(FrameSet::ServerBound)
    }

    /// Framer for the given direction
    pub fn new(set: FrameSet) -> Self {
        Self {
            tags: set.tags(),
            buf: BytesMut::new(),
            frame: BytesMut::new(),
            tag: None,
        }
    }

    /// Feed a chunk of received bytes, returning every frame completed
    /// by it. The partition of the stream into chunks never changes the
    /// emitted frames.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();

        loop {
            let chunk = match self.buf.iter().position(|&b| b == b'>') {
                Some(pos) => self.buf.split_to(pos + 1),
                None if self.buf.len() > MAX_CHUNK => self.buf.split(),
                None => break,
            };
            if let Some(frame) = self.consume(&chunk) {
                frames.push(frame);
            }
        }

        frames
    }

    fn consume(&mut self, chunk: &[u8]) -> Option<Bytes> {
        match self.tag {
            None => {
                let trimmed = trim_start(chunk);
                let index = self.match_start_tag(trimmed)?;
                self.tag = Some(index);
                self.frame.extend_from_slice(trimmed);
                if trimmed.ends_with(b"/>") {
                    return Some(self.take_frame());
                }
                None
            }
            Some(index) => {
                self.frame.extend_from_slice(chunk);
                let end: Vec<u8> = [b"</" as &[u8], self.tags[index], b">"].concat();
                if self.frame.ends_with(&end) {
                    return Some(self.take_frame());
                }
                None
            }
        }
    }

    /// Match `<tag` followed by a boundary character; anything else is
    /// noise to be discarded.
    fn match_start_tag(&self, data: &[u8]) -> Option<usize> {
        let rest = data.strip_prefix(b"<")?;
        self.tags.iter().position(|tag| {
            rest.strip_prefix(*tag)
                .and_then(|after| after.first())
                .is_some_and(|&b| b == b' ' || b == b'>' || b == b'/' || b == b'\t' || b == b'\n' || b == b'\r')
        })
    }

    fn take_frame(&mut self) -> Bytes {
        self.tag = None;
        self.frame.split().freeze()
    }
}

fn trim_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &[u8] = b"<getProperties version=\"1.7\"/>\n<newTextVector device=\"Scope\" name=\"PORT\">\n  <oneText name=\"v\">/dev/ttyUSB0</oneText>\n</newTextVector>\n<enableBLOB device=\"CCD\">Also</enableBLOB>";

    fn collect(framer: &mut Framer, data: &[u8], chunk_size: usize) -> Vec<Bytes> {
        let mut frames = Vec::new();
        for chunk in data.chunks(chunk_size) {
            frames.extend(framer.push(chunk));
        }
        frames
    }

    #[test]
    fn test_splits_self_closing_and_nested_frames() {
        let mut framer = Framer::server_bound();
        let frames = framer.push(STREAM);
        assert_eq!(frames.len(), 3);
        assert!(frames[0].starts_with(b"<getProperties"));
        assert!(frames[1].starts_with(b"<newTextVector"));
        assert!(frames[1].ends_with(b"</newTextVector>"));
        assert!(frames[2].starts_with(b"<enableBLOB"));
    }

    #[test]
    fn test_chunk_invariance() {
        let whole = {
            let mut framer = Framer::server_bound();
            framer.push(STREAM)
        };
        for chunk_size in 1..=STREAM.len() {
            let mut framer = Framer::server_bound();
            let frames = collect(&mut framer, STREAM, chunk_size);
            assert_eq!(frames, whole, "chunk size {} differs", chunk_size);
        }
    }

    #[test]
    fn test_noise_between_frames_is_discarded() {
        let mut framer = Framer::client_bound();
        let data = b"<!-- comment --><junkTag attr=\"1\"/><message message=\"hi\"/>";
        let frames = framer.push(data);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with(b"<message"));
    }

    #[test]
    fn test_direction_filters_tags() {
        // a server-bound framer never emits server-to-client frames
        let mut framer = Framer::server_bound();
        let frames = framer.push(b"<setTextVector device=\"S\" name=\"P\"><oneText name=\"v\">x</oneText></setTextVector>");
        assert!(frames.is_empty());

        let mut framer = Framer::client_bound();
        let frames = framer.push(b"<setTextVector device=\"S\" name=\"P\"><oneText name=\"v\">x</oneText></setTextVector>");
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_tag_prefix_does_not_match() {
        let mut framer = Framer::client_bound();
        let frames = framer.push(b"<messageBoard text=\"no\"/><message message=\"yes\"/>");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with(b"<message "));
    }

    #[test]
    fn test_large_delimiterless_run_is_consumed() {
        let body = "A".repeat(MAX_CHUNK * 2);
        let xml = format!(
            "<setBLOBVector device=\"CCD\" name=\"CCD1\"><oneBLOB name=\"image\" size=\"4\" format=\".fits\">{}</oneBLOB></setBLOBVector>",
            body
        );
        let frames = collect(&mut Framer::client_bound(), xml.as_bytes(), 4096);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].ends_with(b"</setBLOBVector>"));
    }

    #[test]
    fn test_incomplete_frame_is_held_back() {
        let mut framer = Framer::client_bound();
        assert!(framer.push(b"<setTextVector device=\"S\" name=\"P\">").is_empty());
        assert!(framer.push(b"<oneText name=\"v\">x</oneText>").is_empty());
        let frames = framer.push(b"</setTextVector>");
        assert_eq!(frames.len(), 1);
    }
}
