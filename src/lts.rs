//! Labelled transition systems in the Aldebaran (`.aut`) text format.
//!
//! # Format
//!
//! ```text
//! des (<initial>,<transitions>,<states>)
//! (<source>,"<label>",<target>)
//! ...
//! ```
//!
//! Exactly `<transitions>` edge lines follow the header. Edges leaving the
//! same source state must form one contiguous run.
//!
//! Transitions are stored grouped per label, so the modal operators only
//! ever iterate the edges carrying their own label.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::labels::{Label, LabelTable};

/// A single edge, stored under its label.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Transition {
    pub source: usize,
    pub target: usize,
}

/// Error type for reading an LTS.
#[derive(Debug)]
pub enum LtsError {
    /// File I/O error.
    Io(io::Error),
    /// The input ended before a header line was found.
    MissingHeader,
    /// Malformed `des (..)` header.
    Header { line: String },
    /// Malformed edge line.
    Edge { line_no: usize, line: String },
    /// A state id outside `0..num_states`.
    StateOutOfRange { line_no: usize, state: usize },
    /// A source state reappears after its run of edges has ended.
    NonContiguous { line_no: usize, state: usize },
    /// The number of edge lines differs from the header.
    EdgeCount { expected: usize, found: usize },
}

impl From<io::Error> for LtsError {
    fn from(e: io::Error) -> Self {
        LtsError::Io(e)
    }
}

impl Display for LtsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LtsError::Io(e) => write!(f, "I/O error: {}", e),
            LtsError::MissingHeader => write!(f, "missing 'des' header"),
            LtsError::Header { line } => write!(f, "invalid header: {}", line),
            LtsError::Edge { line_no, line } => write!(f, "line {}: invalid transition: {}", line_no, line),
            LtsError::StateOutOfRange { line_no, state } => {
                write!(f, "line {}: state {} out of range", line_no, state)
            }
            LtsError::NonContiguous { line_no, state } => {
                write!(f, "line {}: transitions of state {} are not contiguous", line_no, state)
            }
            LtsError::EdgeCount { expected, found } => {
                write!(f, "expected {} transitions, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for LtsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LtsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Finite labelled transition system with transitions grouped per label.
#[derive(Debug, Clone)]
pub struct Lts {
    initial_state: usize,
    num_states: usize,
    num_transitions: usize,
    /// Indexed by label id.
    transitions: Vec<Vec<Transition>>,
}

impl Lts {
    /// Builds an LTS directly from `(source, label, target)` triples.
    ///
    /// Used by tests and callers that construct systems programmatically.
    ///
    /// # Panics
    ///
    /// Panics if the initial state or an edge endpoint is not below `num_states`.
    pub fn from_edges<'a>(
        initial_state: usize,
        num_states: usize,
        edges: impl IntoIterator<Item = (usize, &'a str, usize)>,
        labels: &mut LabelTable,
    ) -> Self {
        assert!(
            initial_state < num_states,
            "initial state {} out of range for {} states",
            initial_state,
            num_states
        );
        let mut lts = Lts {
            initial_state,
            num_states,
            num_transitions: 0,
            transitions: Vec::new(),
        };
        for (source, label, target) in edges {
            assert!(source < num_states && target < num_states, "edge ({}, {}) out of range", source, target);
            lts.push(labels.intern(label), source, target);
        }
        lts
    }

    /// Reads an LTS from a file.
    pub fn load<P: AsRef<Path>>(path: P, labels: &mut LabelTable) -> Result<Self, LtsError> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file), labels)
    }

    /// Parses an LTS from a string.
    pub fn from_str_with(content: &str, labels: &mut LabelTable) -> Result<Self, LtsError> {
        Self::read(content.as_bytes(), labels)
    }

    /// Reads an LTS in `.aut` format, interning labels into `labels`.
    pub fn read<R: BufRead>(reader: R, labels: &mut LabelTable) -> Result<Self, LtsError> {
        let mut lines = reader.lines().enumerate();

        let (initial_state, expected, num_states) = loop {
            let Some((_, line)) = lines.next() else {
                return Err(LtsError::MissingHeader);
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            break parse_header(&line).ok_or_else(|| LtsError::Header { line: line.clone() })?;
        };
        if initial_state >= num_states {
            return Err(LtsError::Header {
                line: format!("des ({},{},{})", initial_state, expected, num_states),
            });
        }
        debug!(
            "LTS header: initial = {}, transitions = {}, states = {}",
            initial_state, expected, num_states
        );

        let mut lts = Lts {
            initial_state,
            num_states,
            num_transitions: 0,
            transitions: Vec::new(),
        };

        let mut finished: HashSet<usize> = HashSet::new();
        let mut current: Option<usize> = None;
        let mut found = 0;

        for (i, line) in lines {
            let line = line?;
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            found += 1;
            if found > expected {
                continue;
            }

            let (source, label, target) = parse_edge(trimmed).ok_or_else(|| LtsError::Edge {
                line_no,
                line: line.clone(),
            })?;
            for state in [source, target] {
                if state >= num_states {
                    return Err(LtsError::StateOutOfRange { line_no, state });
                }
            }

            if current != Some(source) {
                if finished.contains(&source) {
                    return Err(LtsError::NonContiguous { line_no, state: source });
                }
                if let Some(prev) = current {
                    finished.insert(prev);
                }
                current = Some(source);
            }

            lts.push(labels.intern(label), source, target);
        }

        if found != expected {
            return Err(LtsError::EdgeCount { expected, found });
        }

        debug!("LTS loaded: {} transitions over {} labels", lts.num_transitions, labels.len());
        Ok(lts)
    }

    fn push(&mut self, label: Label, source: usize, target: usize) {
        if self.transitions.len() <= label.index() {
            self.transitions.resize_with(label.index() + 1, Vec::new);
        }
        self.transitions[label.index()].push(Transition { source, target });
        self.num_transitions += 1;
    }

    pub fn initial_state(&self) -> usize {
        self.initial_state
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_transitions(&self) -> usize {
        self.num_transitions
    }

    /// All edges carrying `label`. Empty for labels without edges.
    pub fn transitions_for(&self, label: Label) -> &[Transition] {
        self.transitions.get(label.index()).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parses `des (I,T,S)`.
fn parse_header(line: &str) -> Option<(usize, usize, usize)> {
    let rest = line.trim().strip_prefix("des")?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<usize>());
    let initial = parts.next()?.ok()?;
    let transitions = parts.next()?.ok()?;
    let states = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((initial, transitions, states))
}

/// Parses `(s,"label",t)`. The label is everything between the first and the last quote.
fn parse_edge(line: &str) -> Option<(usize, &str, usize)> {
    let inner = line.strip_prefix('(')?.strip_suffix(')')?;
    let open = inner.find('"')?;
    let close = inner.rfind('"')?;
    if close <= open {
        return None;
    }
    let source = inner[..open].trim().strip_suffix(',')?.trim().parse().ok()?;
    let label = &inner[open + 1..close];
    let target = inner[close + 1..].trim().strip_prefix(',')?.trim().parse().ok()?;
    Some((source, label, target))
}
