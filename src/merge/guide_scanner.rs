//! Incremental extraction of `<channel>` and `<programme>` elements.
//!
//! The scanner never sees the whole guide. Chunks of any size are fed in and
//! every complete element is appended to the caller's output buffer, so the
//! only bytes retained between calls are those of the single element (or
//! partial start tag) still waiting for its closing bytes.

use bytes::{Buf, BytesMut};
use std::collections::HashSet;

use crate::errors::GuideParseError;

/// Size of the reads driving the scanner
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Channel,
    Programme,
}

impl ElementKind {
    const ALL: [ElementKind; 2] = [ElementKind::Channel, ElementKind::Programme];

    pub fn tag(&self) -> &'static str {
        match self {
            ElementKind::Channel => "channel",
            ElementKind::Programme => "programme",
        }
    }

    fn end_tag(&self) -> &'static [u8] {
        match self {
            ElementKind::Channel => b"</channel>",
            ElementKind::Programme => b"</programme>",
        }
    }

    /// Attribute carrying the channel identifier for orphan filtering
    fn id_attribute(&self) -> &'static [u8] {
        match self {
            ElementKind::Channel => b"id",
            ElementKind::Programme => b"channel",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KindCounts {
    pub added: u64,
    pub skipped: u64,
}

/// Tally of one source's scan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanCounts {
    pub channels: KindCounts,
    pub programmes: KindCounts,
    /// Bytes outside any recognised element (prolog, `<tv>`, whitespace)
    pub ignored_bytes: u64,
}

impl ScanCounts {
    fn for_kind(&mut self, kind: ElementKind) -> &mut KindCounts {
        match kind {
            ElementKind::Channel => &mut self.channels,
            ElementKind::Programme => &mut self.programmes,
        }
    }

    /// Run history message body; skipped counts appear only when filtering was active
    pub fn summary(&self, filtered: bool) -> String {
        let added = format!(
            "Added {} channels, {} programmes",
            self.channels.added, self.programmes.added
        );
        if filtered {
            format!(
                "{added} / Skipped {} channels, {} programmes",
                self.channels.skipped, self.programmes.skipped
            )
        } else {
            added
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Looking for the next start tag
    SeekingStart,
    /// Buffer begins with a start tag whose closing tag has not arrived yet
    AwaitingEnd {
        kind: ElementKind,
        /// Byte range of the start tag's attribute text
        attrs_end: usize,
        search_from: usize,
    },
}

enum StartTag {
    Found {
        offset: usize,
        kind: ElementKind,
        attrs_end: usize,
        tag_end: usize,
        self_closing: bool,
    },
    /// A start tag may begin at `offset` but its bytes are incomplete
    Partial { offset: usize },
    NotFound,
}

pub struct GuideScanner<'a> {
    buffer: BytesMut,
    state: ScanState,
    known_ids: Option<&'a HashSet<String>>,
    counts: ScanCounts,
    peak_retained: usize,
}

impl<'a> GuideScanner<'a> {
    /// `known_ids` enables orphan filtering: elements whose identifier is not
    /// in the set are dropped. Elements without an identifier are always kept.
    pub fn new(known_ids: Option<&'a HashSet<String>>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(CHUNK_SIZE),
            state: ScanState::SeekingStart,
            known_ids,
            counts: ScanCounts::default(),
            peak_retained: 0,
        }
    }

    /// Feed the next chunk, appending every completed element to `out`
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        self.buffer.extend_from_slice(chunk);

        loop {
            match self.state {
                ScanState::SeekingStart => match find_start_tag(&self.buffer) {
                    StartTag::Found {
                        offset,
                        kind,
                        attrs_end,
                        tag_end,
                        self_closing,
                    } => {
                        self.discard(offset);
                        let attrs_end = attrs_end - offset;
                        let tag_end = tag_end - offset;
                        if self_closing {
                            self.resolve(kind, attrs_end, tag_end, out);
                        } else {
                            self.state = ScanState::AwaitingEnd {
                                kind,
                                attrs_end,
                                search_from: tag_end,
                            };
                        }
                    }
                    StartTag::Partial { offset } => {
                        self.discard(offset);
                        break;
                    }
                    StartTag::NotFound => {
                        self.discard(self.buffer.len());
                        break;
                    }
                },
                ScanState::AwaitingEnd {
                    kind,
                    attrs_end,
                    search_from,
                } => {
                    let end_tag = kind.end_tag();
                    match find(&self.buffer[search_from..], end_tag) {
                        Some(pos) => {
                            let end = search_from + pos + end_tag.len();
                            self.state = ScanState::SeekingStart;
                            self.resolve(kind, attrs_end, end, out);
                        }
                        None => {
                            // The end tag may straddle this chunk and the next
                            let resume = self.buffer.len().saturating_sub(end_tag.len() - 1);
                            self.state = ScanState::AwaitingEnd {
                                kind,
                                attrs_end,
                                search_from: resume.max(search_from),
                            };
                            break;
                        }
                    }
                }
            }
        }

        self.peak_retained = self.peak_retained.max(self.buffer.len());
    }

    /// Finish the scan. Data ending inside an element is an error.
    pub fn finish(mut self) -> Result<ScanCounts, GuideParseError> {
        match self.state {
            ScanState::AwaitingEnd { kind, .. } => Err(GuideParseError::UnterminatedElement {
                tag: kind.tag(),
                buffered: self.buffer.len(),
            }),
            ScanState::SeekingStart => {
                let rest = self.buffer.len();
                self.discard(rest);
                Ok(self.counts)
            }
        }
    }

    pub fn counts(&self) -> &ScanCounts {
        &self.counts
    }

    /// Largest number of bytes held between two `feed` calls
    pub fn peak_retained(&self) -> usize {
        self.peak_retained
    }

    pub fn is_filtering(&self) -> bool {
        self.known_ids.is_some()
    }

    fn discard(&mut self, len: usize) {
        self.counts.ignored_bytes += len as u64;
        self.buffer.advance(len);
    }

    /// Emit or skip the element occupying `buffer[..end]`
    fn resolve(&mut self, kind: ElementKind, attrs_end: usize, end: usize, out: &mut Vec<u8>) {
        let element = self.buffer.split_to(end);
        let attrs = &element[1 + kind.tag().len()..attrs_end];

        let id = find_attribute(attrs, kind.id_attribute()).filter(|id| !id.is_empty());
        let keep = match (self.known_ids, id) {
            (Some(ids), Some(id)) => ids.contains(String::from_utf8_lossy(id).as_ref()),
            _ => true,
        };

        let counts = self.counts.for_kind(kind);
        if keep {
            counts.added += 1;
            out.extend_from_slice(&element);
        } else {
            counts.skipped += 1;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Locate the first `<channel ...>` or `<programme ...>` start tag.
///
/// The tag name must be followed by whitespace, `>` or `/>`, so that names
/// like `<channels>` are not mistaken for elements.
fn find_start_tag(buf: &[u8]) -> StartTag {
    let mut from = 0;
    while let Some(rel) = buf[from..].iter().position(|&b| b == b'<') {
        let lt = from + rel;
        let rest = &buf[lt + 1..];

        for kind in ElementKind::ALL {
            let name = kind.tag().as_bytes();
            if rest.len() <= name.len() {
                if name.starts_with(rest) || rest.starts_with(name) {
                    return StartTag::Partial { offset: lt };
                }
                continue;
            }
            if !rest.starts_with(name) {
                continue;
            }

            let after = &rest[name.len()..];
            let opens_tag = match after[0] {
                b'>' => true,
                b'/' => match after.get(1) {
                    Some(b'>') => true,
                    Some(_) => false,
                    None => return StartTag::Partial { offset: lt },
                },
                b if b.is_ascii_whitespace() => true,
                _ => false,
            };
            if !opens_tag {
                continue;
            }

            return match after.iter().position(|&b| b == b'>') {
                Some(pos) => {
                    let gt = lt + 1 + name.len() + pos;
                    let self_closing = buf[gt - 1] == b'/';
                    StartTag::Found {
                        offset: lt,
                        kind,
                        attrs_end: if self_closing { gt - 1 } else { gt },
                        tag_end: gt + 1,
                        self_closing,
                    }
                }
                None => StartTag::Partial { offset: lt },
            };
        }

        from = lt + 1;
    }
    StartTag::NotFound
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Value of the last `name="value"` pair in a start tag's attribute text
fn find_attribute<'b>(attrs: &'b [u8], name: &[u8]) -> Option<&'b [u8]> {
    let mut found = None;
    let mut i = 0;

    while i < attrs.len() {
        if !is_word(attrs[i]) {
            i += 1;
            continue;
        }
        let key_start = i;
        while i < attrs.len() && is_word(attrs[i]) {
            i += 1;
        }
        let key = &attrs[key_start..i];

        let mut j = i;
        while j < attrs.len() && attrs[j].is_ascii_whitespace() {
            j += 1;
        }
        if attrs.get(j) != Some(&b'=') {
            continue;
        }
        j += 1;
        while j < attrs.len() && attrs[j].is_ascii_whitespace() {
            j += 1;
        }
        if attrs.get(j) != Some(&b'"') {
            i = j;
            continue;
        }

        let value_start = j + 1;
        match attrs[value_start..].iter().position(|&b| b == b'"') {
            Some(len) => {
                if key == name {
                    found = Some(&attrs[value_start..value_start + len]);
                }
                i = value_start + len + 1;
            }
            None => break,
        }
    }

    found
}
