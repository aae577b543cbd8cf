//! Diagnostics for the Lyra compiler core.
//!
//! The semantic pass never unwinds on user errors: every failure path
//! emits a message through [`Diagnostics::emit`] and returns a value the
//! caller recognizes as "not found". The host reads
//! [`Diagnostics::error_count`] at the end of the pass to decide whether
//! code generation may proceed. Only broken internal invariants abort the
//! pass, through the [`FatalError`] channel.
//!
//! Collected messages can be rendered with [`CodeSpanReportGenerator`],
//! which prints rich source snippets through `codespan-reporting`.

use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFiles,
    term::{
        self,
        termcolor::{ColorChoice, StandardStream},
    },
};
use indexmap::IndexMap;
use strum_macros::{AsRefStr, Display};

use crate::position::Position;

/// Severity of an emitted message
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
    Fatal,
}

/// The closed set of error kinds the core can emit
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    InternalError,
    InvalidExpression,
    InvalidType,
    InvalidAttributes,
    InvalidOperator,
    InvalidReturnType,
    InvalidFieldName,
    InvalidTry,
    ImproperStatement,
    InaccessibleStatement,
    LabelNotFound,
    NotFound,
    NeedConst,
    CannotOverload,
    CannotOverwriteConst,
    Duplicates,
    MismatchFuncVar,
    InstanceExpected,
    CannotMatch,
    Static,
    UnknownOperator,
    NotSupported,
}

/// One collected diagnostic record
#[derive(Debug, Clone)]
pub struct Message {
    pub level: MessageLevel,
    pub kind: ErrorKind,
    pub position: Position,
    pub text: String,
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} [{}]: {}",
            self.position,
            self.level,
            self.kind.as_ref(),
            self.text
        )
    }
}

/// The diagnostics sink of a compilation
///
/// Owned by the compiler instance; there is no process wide state. The
/// error counter covers `Error` and `Fatal` messages.
#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<Message>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message; errors and fatals bump the error counter
    pub fn emit(
        &mut self,
        level: MessageLevel,
        kind: ErrorKind,
        position: Position,
        text: impl Into<String>,
    ) {
        let message = Message {
            level,
            kind,
            position,
            text: text.into(),
        };
        simplelog::debug!("diagnostic: {message}");
        if message.level >= MessageLevel::Error {
            self.error_count += 1;
        }
        self.messages.push(message);
    }

    /// Convenience for the common error level
    pub fn error(&mut self, kind: ErrorKind, position: Position, text: impl Into<String>) {
        self.emit(MessageLevel::Error, kind, position, text);
    }

    /// Convenience for warnings
    pub fn warning(&mut self, kind: ErrorKind, position: Position, text: impl Into<String>) {
        self.emit(MessageLevel::Warning, kind, position, text);
    }

    /// Number of error and fatal messages emitted so far
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// All collected messages, in emission order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Internal invariant violations that abort the pass
///
/// These are not user errors; they are the abort channel of the host.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FatalError {
    #[error("{position}: internal error: {message}")]
    Internal { position: Position, message: String },

    #[error("cannot find internal type '{name}'")]
    MissingInternalType { name: String },
}

/// Trait for rendering a collected diagnostic list
pub trait ReportGenerator {
    fn generate(diagnostics: &Diagnostics);
}

/// Report generator using the `codespan-reporting` library for rich output
pub struct CodeSpanReportGenerator;

impl ReportGenerator for CodeSpanReportGenerator {
    fn generate(diagnostics: &Diagnostics) {
        let mut files = SimpleFiles::new();
        let mut file_ids: IndexMap<String, usize> = IndexMap::new();

        let mut rendered = Vec::new();
        for message in diagnostics.messages() {
            let name = message.position.file.name();
            let file_id = *file_ids.entry(name.clone()).or_insert_with(|| {
                files.add(name, message.position.file.code().to_string())
            });

            let diagnostic = match message.level {
                MessageLevel::Info => Diagnostic::note(),
                MessageLevel::Warning => Diagnostic::warning(),
                MessageLevel::Error | MessageLevel::Fatal => Diagnostic::error(),
            };
            let diagnostic = diagnostic
                .with_message(message.text.clone())
                .with_code(message.kind.as_ref())
                .with_labels(vec![Label::primary(
                    file_id,
                    message.position.range.clone(),
                )]);
            rendered.push(diagnostic);
        }

        let writer = StandardStream::stderr(ColorChoice::Auto);
        let config = term::Config::default();
        for diagnostic in rendered.into_iter() {
            term::emit(&mut writer.lock(), &config, &files, &diagnostic).unwrap();
        }
    }
}
