//! Non-fatal advisories
//!
//! Some configurations are assembled on a best-effort basis. Instead of printing a warning the
//! assembler returns the advisories alongside the result in an [`Outcome`].

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvisoryKind {
    /// Rigid body degrees of freedom combined with a non-unit time scale
    RigidTimeScaling,
    /// The aerodynamic system was read from a file and is assumed to be already projected
    LoadedProjection,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Advisory {
    /// Describes the kind of advisory
    kind: AdvisoryKind,
    /// More explanation about the advisory
    message: String,
}

impl Advisory {
    pub fn new(kind: AdvisoryKind, message: &str) -> Advisory {
        Advisory {
            kind,
            message: message.to_owned(),
        }
    }
    pub fn kind(&self) -> &AdvisoryKind {
        &self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// A result with the advisories raised while computing it
#[derive(Clone, Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub advisories: Vec<Advisory>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, advisories: Vec<Advisory>) -> Self {
        Self { value, advisories }
    }
    /// Returns `true` if an advisory of the given kind was raised
    pub fn has(&self, kind: AdvisoryKind) -> bool {
        self.advisories.iter().any(|a| a.kind == kind)
    }
    pub fn into_value(self) -> T {
        self.value
    }
}
