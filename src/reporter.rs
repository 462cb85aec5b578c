//! Diagnostic reporting: a phase-tagged `Report` carrying the offending
//! token, and a `Reporter` trait so tests can capture diagnostics instead
//! of printing them.

use std::fmt;

use colored::Colorize;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Compiling,
    Runtime,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scanning => "scan",
            Self::Compiling => "compile",
            Self::Runtime => "runtime",
        };
        write!(f, "{name}")
    }
}

pub struct Report {
    pub phase: Phase,
    pub msg: String,
    pub token: Option<Token>,
}

impl Report {
    pub fn new(phase: Phase, msg: impl Into<String>, token: Option<Token>) -> Self {
        Self {
            phase,
            msg: msg.into(),
            token,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(tok) => write!(f, "[{}:{}] {}: {}", tok.line, tok.col, self.phase, self.msg),
            None => write!(f, "[{}] {}", self.phase, self.msg),
        }
    }
}

/// Receives diagnostics produced while scanning, compiling, or running.
/// Implemented once for the CLI (prints to stderr/stdout) and once for
/// tests (collects into a vector).
pub trait Reporter {
    fn warning(&mut self, report: Report);
    fn error(&mut self, report: Report);
}

#[derive(Default)]
pub struct CliReporter {
    pub error_count: usize,
    pub warning_count: usize,
}

impl CliReporter {
    pub fn had_error(&self) -> bool {
        self.error_count > 0
    }
}

impl Reporter for CliReporter {
    fn warning(&mut self, report: Report) {
        self.warning_count += 1;
        log::warn!("{report}");
        eprintln!("{} {report}", "warning:".yellow().bold());
    }

    fn error(&mut self, report: Report) {
        self.error_count += 1;
        log::debug!("reporting {} error", report.phase);
        eprintln!("{} {report}", "error:".red().bold());
    }
}

/// Captures diagnostics for tests instead of printing them.
#[derive(Default)]
pub struct CollectingReporter {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CollectingReporter {
    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Reporter for CollectingReporter {
    fn warning(&mut self, report: Report) {
        self.warnings.push(report.to_string());
    }

    fn error(&mut self, report: Report) {
        self.errors.push(report.to_string());
    }
}
