//! Source locations for circuit declarations and diagnostics.
//!
//! A location is a cheap, copyable handle into a process-wide table of
//! files and byte spans. Files record their line boundaries when they are
//! registered, so resolving a span to a line and column is a binary search
//! instead of a rescan of the source, and a diagnostic can render the
//! offending line with a caret marker under the construct it names.

use std::fmt::Write;
use std::sync::LazyLock;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// Handle to a span registered in the global position table.
pub struct PosIdx(u32);

#[derive(Clone, Copy, PartialEq, Eq)]
/// Handle to a source file registered in the global position table.
pub struct FileIdx(u32);

/// A registered source file. The byte offset of every line start is kept
/// alongside the text so spans resolve to lines without scanning.
struct File {
    name: Box<str>,
    source: Box<str>,
    line_starts: Vec<u32>,
}

impl File {
    fn new(name: String, source: String) -> Self {
        let mut line_starts = vec![0];
        for (at, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(at as u32 + 1);
            }
        }
        Self {
            name: name.into(),
            source: source.into(),
            line_starts,
        }
    }

    /// The 0-based line holding a byte offset.
    fn line_of(&self, offset: u32) -> usize {
        self.line_starts.partition_point(|start| *start <= offset) - 1
    }

    /// The text of a 0-based line, without its newline.
    fn line_text(&self, line: usize) -> &str {
        let start = self.line_starts[line] as usize;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| *next as usize - 1)
            .unwrap_or(self.source.len());
        &self.source[start..end]
    }
}

/// A byte range within a registered file.
#[derive(Clone, Copy)]
struct Span {
    file: FileIdx,
    start: u32,
    end: u32,
}

/// The table behind [GlobalPositionTable]. Append-only, so handles handed
/// out earlier stay valid while new files and spans keep arriving.
struct PositionTable {
    files: boxcar::Vec<File>,
    spans: boxcar::Vec<Span>,
}

impl PositionTable {
    /// The unknown span, pointing into a synthetic empty file.
    const UNKNOWN: PosIdx = PosIdx(0);

    fn new() -> Self {
        let table = PositionTable {
            files: boxcar::Vec::new(),
            spans: boxcar::Vec::new(),
        };
        let file = table.add_file("unknown".to_string(), String::new());
        let pos = table.add_pos(file, 0, 0);
        debug_assert!(pos == Self::UNKNOWN);
        table
    }

    fn add_file(&self, name: String, source: String) -> FileIdx {
        FileIdx(self.files.push(File::new(name, source)) as u32)
    }

    fn add_pos(&self, file: FileIdx, start: usize, end: usize) -> PosIdx {
        let span = Span {
            file,
            start: start as u32,
            end: end as u32,
        };
        PosIdx(self.spans.push(span) as u32)
    }

    fn file(&self, idx: FileIdx) -> &File {
        &self.files[idx.0 as usize]
    }

    fn span(&self, idx: PosIdx) -> Span {
        self.spans[idx.0 as usize]
    }
}

static TABLE: LazyLock<PositionTable> = LazyLock::new(PositionTable::new);

/// Process-wide registry of source files and spans. A compilation reads
/// many files into one circuit; every location attached to the IR goes
/// through here.
pub struct GlobalPositionTable;

impl GlobalPositionTable {
    /// Register a source file.
    pub fn add_file(name: String, source: String) -> FileIdx {
        TABLE.add_file(name, source)
    }

    /// Register a byte span within a registered file.
    pub fn add_pos(file: FileIdx, start: usize, end: usize) -> PosIdx {
        TABLE.add_pos(file, start, end)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// A source location attached to a declaration or operation. The default
/// is [GPosIdx::UNKNOWN], which renders without a source excerpt.
pub struct GPosIdx(pub PosIdx);

impl Default for GPosIdx {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl GPosIdx {
    /// Symbol for the unknown position.
    pub const UNKNOWN: GPosIdx = GPosIdx(PositionTable::UNKNOWN);

    /// Register a span of a file as a new location.
    pub fn new(file: FileIdx, start: usize, end: usize) -> Self {
        GPosIdx(GlobalPositionTable::add_pos(file, start, end))
    }

    /// Convert the position into an optional.
    /// Returns `None` if the position is the unknown position.
    pub fn into_option(self) -> Option<Self> {
        if self == Self::UNKNOWN {
            None
        } else {
            Some(self)
        }
    }

    /// The file name and 1-based line and column of the span's start.
    pub fn line_col(&self) -> (&'static str, usize, usize) {
        let span = TABLE.span(self.0);
        let file = TABLE.file(span.file);
        let line = file.line_of(span.start);
        let col = span.start as usize - file.line_starts[line] as usize;
        (&file.name, line + 1, col + 1)
    }

    /// Render `msg` anchored at this location:
    ///
    /// ```text
    /// top.fir:3:11: some message
    ///   3 | input rst : Reset
    ///     |       ^^^
    /// ```
    ///
    /// A span reaching past its first line is clipped to that line; the
    /// caret still marks where the construct begins.
    pub fn format<S: AsRef<str>>(&self, msg: S) -> String {
        let span = TABLE.span(self.0);
        let file = TABLE.file(span.file);
        let line = file.line_of(span.start);
        let text = file.line_text(line);
        let col = span.start as usize - file.line_starts[line] as usize;
        let marked = (span.end - span.start) as usize;
        let width =
            std::cmp::max(1, std::cmp::min(marked, text.len().saturating_sub(col)));

        let mut out = String::new();
        writeln!(
            out,
            "{}:{}:{}: {}",
            file.name,
            line + 1,
            col + 1,
            msg.as_ref()
        )
        .unwrap();
        let gutter = (line + 1).to_string();
        writeln!(out, "  {} | {}", gutter, text).unwrap();
        write!(
            out,
            "  {} | {}{}",
            " ".repeat(gutter.len()),
            " ".repeat(col),
            "^".repeat(width)
        )
        .unwrap();
        out
    }
}

/// An IR node that may carry position information.
pub trait WithPos {
    /// Copy the location associated with this node.
    fn copy_span(&self) -> GPosIdx;
}

impl WithPos for GPosIdx {
    fn copy_span(&self) -> GPosIdx {
        *self
    }
}
