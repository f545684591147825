/// Identifies one registered source (a loaded script or one REPL entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

impl FileId {
    pub const DUMMY: FileId = FileId(usize::MAX);
}

/// A byte range plus the 1-based source line it starts on.
///
/// The line is carried alongside the byte range (rather than recomputed from
/// it) because the scanner already knows it while it is advancing, and every
/// diagnostic clox emits is line-based, not column-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub file: FileId,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32, file: FileId) -> Self {
        Span { start, end, line, file }
    }

    pub fn point(pos: u32, line: u32, file: FileId) -> Self {
        Span::new(pos, pos, line, file)
    }
}

/// One loaded piece of source text.
pub struct SourceFile {
    pub name: String,
    pub contents: String,
}

/// Registry of every source handed to the interpreter this process.
///
/// A single `fax` invocation only ever compiles one script, but the REPL
/// feeds one line at a time, and each line gets its own entry so error
/// messages stay attributable after the fact.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap { files: Vec::new() }
    }

    pub fn add(&mut self, name: impl Into<String>, contents: impl Into<String>) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(SourceFile { name: name.into(), contents: contents.into() });
        id
    }

    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }
}
