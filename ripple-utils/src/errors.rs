//! Errors generated by the compiler.

use crate::position::{GPosIdx, WithPos};
use itertools::Itertools;

/// Standard error type for Ripple errors.
pub type RippleResult<T> = Result<T, Error>;

/// A note attached to an [Error], pointing at a secondary source location.
/// Notes are rendered after the primary message, in the order they were
/// attached.
#[derive(Clone)]
pub struct Note {
    pub pos: GPosIdx,
    pub message: String,
}

/// An error generated by the compiler.
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    pos: GPosIdx,
    notes: Vec<Note>,
}

/// The different kinds of errors the compiler can generate. Each corresponds
/// to a family of diagnostics; the message carries the specifics.
#[derive(Clone)]
enum ErrorKind {
    /// A reset network could not be assigned a single concrete type.
    ResetTyping(String),
    /// A reset annotation targets the wrong kind of operation, or a module
    /// carries more than one.
    Annotation(String),
    /// A module is instantiated in conflicting reset domains.
    Domain(String),
    /// The IR is malformed in a way the pass cannot recover from.
    MalformedStructure(String),
    /// Miscellaneous error message.
    Misc(String),
}

impl ErrorKind {
    fn message(&self) -> &str {
        match self {
            ErrorKind::ResetTyping(msg)
            | ErrorKind::Annotation(msg)
            | ErrorKind::Domain(msg)
            | ErrorKind::MalformedStructure(msg)
            | ErrorKind::Misc(msg) => msg,
        }
    }
}

impl Error {
    pub fn reset_typing<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::ResetTyping(msg.to_string()))
    }

    pub fn annotation<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Annotation(msg.to_string()))
    }

    pub fn domain<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Domain(msg.to_string()))
    }

    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedStructure(msg.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            pos: GPosIdx::UNKNOWN,
            notes: Vec::new(),
        }
    }

    /// Attach a primary source location to this error.
    pub fn with_pos<T: WithPos>(mut self, pos: &T) -> Self {
        self.pos = pos.copy_span();
        self
    }

    /// Attach a note pointing at a secondary source location.
    pub fn with_note<S: ToString>(mut self, pos: GPosIdx, msg: S) -> Self {
        self.notes.push(Note {
            pos,
            message: msg.to_string(),
        });
        self
    }

    /// The primary message of this error, without location rendering.
    pub fn message(&self) -> &str {
        self.kind.message()
    }

    /// The primary source location of this error.
    pub fn pos(&self) -> GPosIdx {
        self.pos
    }

    /// The notes attached to this error, in attachment order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = self.kind.message();
        match self.pos.into_option() {
            Some(pos) => write!(f, "{}", pos.format(msg))?,
            None => write!(f, "{}", msg)?,
        }
        for note in &self.notes {
            match note.pos.into_option() {
                Some(pos) => {
                    write!(f, "\nnote: {}", pos.format(&note.message))?
                }
                None => write!(f, "\nnote: {}", note.message)?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

/// An error collection to report multiple errors at a time, e.g. when a pass
/// keeps going after a failure to surface everything that is wrong.
#[derive(Clone)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }
}

impl std::fmt::Debug for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.errors.iter().map(|e| format!("{e:?}")).join("\n")
        )
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for MultiError {}

impl From<Error> for MultiError {
    fn from(e: Error) -> Self {
        MultiError { errors: vec![e] }
    }
}

impl From<Vec<Error>> for MultiError {
    fn from(errors: Vec<Error>) -> Self {
        MultiError { errors }
    }
}
