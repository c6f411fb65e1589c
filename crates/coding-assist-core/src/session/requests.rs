//! Outstanding external calls and their loading flags.
//!
//! Every call gets a token. Only the most recently issued token of each kind
//! is current; completing with an older one is treated as stale and its
//! response discarded.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The four external calls a session makes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Suggestions,
    Analysis,
    Rationale,
    Submit,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestKind::Suggestions => "suggestions",
            RequestKind::Analysis => "analysis",
            RequestKind::Rationale => "rationale",
            RequestKind::Submit => "submit",
        };
        f.write_str(label)
    }
}

/// Handle for one issued call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RequestToken {
    pub kind: RequestKind,
    pub seq: u64,
}

/// Result of completing a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Response applied to the session
    Applied,
    /// A newer call of the same kind superseded this one; response dropped
    Stale,
}

/// Per-call loading flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadingFlags {
    pub suggestions: bool,
    pub analysis: bool,
    pub rationale: bool,
    pub submit: bool,
}

/// Issues tokens and remembers which one is current per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestTracker {
    next_seq: u64,
    current: BTreeMap<RequestKind, u64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token, superseding any outstanding call of the same kind.
    pub fn issue(&mut self, kind: RequestKind) -> RequestToken {
        self.next_seq += 1;
        self.current.insert(kind, self.next_seq);
        RequestToken {
            kind,
            seq: self.next_seq,
        }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.current.get(&token.kind) == Some(&token.seq)
    }

    /// Retire `token` if it is current. Returns false for stale tokens.
    pub fn finish(&mut self, token: &RequestToken) -> bool {
        if self.is_current(token) {
            self.current.remove(&token.kind);
            true
        } else {
            false
        }
    }

    /// Forget the outstanding call of `kind`; its completion becomes stale.
    pub fn cancel(&mut self, kind: RequestKind) -> bool {
        self.current.remove(&kind).is_some()
    }

    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.current.contains_key(&kind)
    }

    pub fn loading(&self) -> LoadingFlags {
        LoadingFlags {
            suggestions: self.is_pending(RequestKind::Suggestions),
            analysis: self.is_pending(RequestKind::Analysis),
            rationale: self.is_pending(RequestKind::Rationale),
            submit: self.is_pending(RequestKind::Submit),
        }
    }
}
