//! Modal mu-calculus formula trees, as produced by the [parser][crate::parser].

use std::fmt::{Display, Formatter};

/// Operator kind of a formula node.
///
/// The discriminant doubles as the index of the per-kind evaluation counter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Kind {
    False = 0,
    True = 1,
    Var = 2,
    Mu = 3,
    Nu = 4,
    And = 5,
    Or = 6,
    Diamond = 7,
    Box = 8,
}

impl Kind {
    pub const COUNT: usize = 9;

    pub const ALL: [Kind; Kind::COUNT] = [
        Kind::False,
        Kind::True,
        Kind::Var,
        Kind::Mu,
        Kind::Nu,
        Kind::And,
        Kind::Or,
        Kind::Diamond,
        Kind::Box,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::False => "false",
            Kind::True => "true",
            Kind::Var => "var",
            Kind::Mu => "mu",
            Kind::Nu => "nu",
            Kind::And => "and",
            Kind::Or => "or",
            Kind::Diamond => "diamond",
            Kind::Box => "box",
        }
    }

    pub fn is_binder(self) -> bool {
        matches!(self, Kind::Mu | Kind::Nu)
    }

    /// Value a binder of this kind starts its iteration from:
    /// all-false for `Mu`, all-true for `Nu`.
    pub fn identity(self) -> bool {
        self == Kind::Nu
    }

    /// The binder kind of opposite polarity.
    pub fn dual(self) -> Kind {
        match self {
            Kind::Mu => Kind::Nu,
            Kind::Nu => Kind::Mu,
            other => other,
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed formula. Variables and labels are still raw strings here;
/// they are resolved when the tree is flattened into a [`Graph`][crate::graph::Graph].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    False,
    True,
    Var(String),
    Mu(String, Box<Formula>),
    Nu(String, Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Diamond(String, Box<Formula>),
    Box(String, Box<Formula>),
}

impl Formula {
    pub fn var(name: impl Into<String>) -> Self {
        Formula::Var(name.into())
    }

    pub fn mu(name: impl Into<String>, body: Self) -> Self {
        Formula::Mu(name.into(), Box::new(body))
    }

    pub fn nu(name: impl Into<String>, body: Self) -> Self {
        Formula::Nu(name.into(), Box::new(body))
    }

    pub fn and(self, other: Self) -> Self {
        Formula::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Formula::Or(Box::new(self), Box::new(other))
    }

    pub fn diamond(label: impl Into<String>, body: Self) -> Self {
        Formula::Diamond(label.into(), Box::new(body))
    }

    pub fn boxed(label: impl Into<String>, body: Self) -> Self {
        Formula::Box(label.into(), Box::new(body))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Formula::False => Kind::False,
            Formula::True => Kind::True,
            Formula::Var(_) => Kind::Var,
            Formula::Mu(..) => Kind::Mu,
            Formula::Nu(..) => Kind::Nu,
            Formula::And(..) => Kind::And,
            Formula::Or(..) => Kind::Or,
            Formula::Diamond(..) => Kind::Diamond,
            Formula::Box(..) => Kind::Box,
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Formula::False | Formula::True | Formula::Var(_) => 1,
            Formula::Mu(_, f) | Formula::Nu(_, f) | Formula::Diamond(_, f) | Formula::Box(_, f) => 1 + f.size(),
            Formula::And(f, g) | Formula::Or(f, g) => 1 + f.size() + g.size(),
        }
    }

    /// Returns the first variable (in preorder) not bound by an enclosing binder.
    pub fn first_unbound(&self) -> Option<&str> {
        fn go<'a>(f: &'a Formula, scope: &mut Vec<&'a str>) -> Option<&'a str> {
            match f {
                Formula::False | Formula::True => None,
                Formula::Var(x) => (!scope.contains(&x.as_str())).then_some(x.as_str()),
                Formula::Mu(x, body) | Formula::Nu(x, body) => {
                    scope.push(x);
                    let res = go(body, scope);
                    scope.pop();
                    res
                }
                Formula::And(l, r) | Formula::Or(l, r) => go(l, scope).or_else(|| go(r, scope)),
                Formula::Diamond(_, body) | Formula::Box(_, body) => go(body, scope),
            }
        }
        go(self, &mut Vec::new())
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Formula::False => write!(f, "false"),
            Formula::True => write!(f, "true"),
            Formula::Var(x) => write!(f, "{}", x),
            Formula::Mu(x, body) => write!(f, "(mu {}. {})", x, body),
            Formula::Nu(x, body) => write!(f, "(nu {}. {})", x, body),
            Formula::And(l, r) => write!(f, "({} && {})", l, r),
            Formula::Or(l, r) => write!(f, "({} || {})", l, r),
            Formula::Diamond(a, body) => write!(f, "<{}>{}", a, body),
            Formula::Box(a, body) => write!(f, "[{}]{}", a, body),
        }
    }
}
