//! Rule paths through the class graph.

use std::fmt;

use crate::signal::{Class, RuleRef};

/// A non-empty set of parallel rules sharing the same `(start, goal)` pair;
/// one hop of a [`MultiPath`].
#[derive(Clone, Debug, Default)]
pub struct Links(Vec<RuleRef>);

impl Links {
    pub fn new(rules: impl Into<Vec<RuleRef>>) -> Self {
        Links(rules.into())
    }

    pub fn rules(&self) -> &[RuleRef] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Start class shared by the rules, if any.
    pub fn start(&self) -> Option<Class> {
        self.0.first().map(|r| r.start())
    }

    /// Goal class shared by the rules, if any.
    pub fn goal(&self) -> Option<Class> {
        self.0.first().map(|r| r.goal())
    }

    /// Whether every rule shares the first rule's `(start, goal)`.
    pub fn homogeneous(&self) -> bool {
        match self.0.split_first() {
            None => true,
            Some((first, rest)) => rest
                .iter()
                .all(|r| r.start() == first.start() && r.goal() == first.goal()),
        }
    }
}

impl From<RuleRef> for Links {
    fn from(rule: RuleRef) -> Self {
        Links(vec![rule])
    }
}

impl FromIterator<RuleRef> for Links {
    fn from_iter<I: IntoIterator<Item = RuleRef>>(iter: I) -> Self {
        Links(iter.into_iter().collect())
    }
}

impl fmt::Display for Links {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", r.name())?;
        }
        write!(f, ")")
    }
}

/// An ordered sequence of [`Links`]: one hop per position.
///
/// A multipath is *valid* iff it is non-empty, every hop is non-empty and
/// homogeneous, and each hop's goal is the next hop's start.
#[derive(Clone, Debug, Default)]
pub struct MultiPath(Vec<Links>);

impl MultiPath {
    pub fn new(links: impl Into<Vec<Links>>) -> Self {
        MultiPath(links.into())
    }

    pub fn valid(&self) -> bool {
        if self.0.is_empty() {
            return false;
        }
        if self.0.iter().any(|l| l.is_empty() || !l.homogeneous()) {
            return false;
        }
        self.0.windows(2).all(|w| w[0].goal() == w[1].start())
    }

    pub fn links(&self) -> &[Links] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Start class of the first hop.
    pub fn start(&self) -> Option<Class> {
        self.0.first().and_then(Links::start)
    }

    /// Goal class of the last hop.
    pub fn goal(&self) -> Option<Class> {
        self.0.last().and_then(Links::goal)
    }
}

impl FromIterator<Links> for MultiPath {
    fn from_iter<I: IntoIterator<Item = Links>>(iter: I) -> Self {
        MultiPath(iter.into_iter().collect())
    }
}

impl fmt::Display for MultiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, l) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", l)?;
        }
        write!(f, "]")
    }
}
