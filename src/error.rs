//! Error kinds raised while turning artwork specs into scene units.
//!
//! None of these are fatal: the factory matches on them and degrades the
//! affected artwork instead of propagating to the frame loop.

use std::fmt;

/// Stage of sketch compilation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePhase {
    /// Source text did not parse.
    Parse,
    /// Parsed, but the program shape is wrong (no `draw()`, has `setup()`).
    Validate,
    /// Top-level statements raised.
    Run,
    /// The initial `draw()` invocation raised.
    Draw,
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::Validate => "validate",
            Self::Run => "run",
            Self::Draw => "draw",
        };
        f.write_str(name)
    }
}

/// A sketch failed to become a valid drawing procedure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{phase}] {message}")]
pub struct CompileError {
    pub phase: CompilePhase,
    pub message: String,
    /// 1-based line of the offending source, when the engine reports one.
    pub line: Option<usize>,
}

impl CompileError {
    pub fn new(phase: CompilePhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }
}

/// Everything that can go wrong while building one artwork.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArtworkError {
    #[error("sketch failed to compile: {0}")]
    Compile(#[from] CompileError),
    #[error("failed to load image {url}: {reason}")]
    ResourceLoad { url: String, reason: String },
    #[error("artwork needs either `code` or `image`")]
    MisconfiguredSpec,
}
