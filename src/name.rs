//! Qualified names - the lookup key of scope resolution

use crate::binding::{fold, BindingKind};
use std::fmt;

/// `prefix.name` with an optional kind filter.
///
/// Prefix and name are case-folded on construction so equality and lookups
/// are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub prefix: Option<String>,
    pub name: String,
    /// Only bindings of this kind match when set
    pub kind: Option<BindingKind>,
    /// Do not fall back to the external schema
    pub local_only: bool,
}

impl QualifiedName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            prefix: None,
            name: fold(name.as_ref()),
            kind: None,
            local_only: false,
        }
    }

    /// A name that must be declared somewhere in the scope chain.
    pub fn local(name: impl AsRef<str>) -> Self {
        Self::new(name).local_only()
    }

    /// Split `a.b.c` on the last dot: prefix `a.b`, name `c`.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once('.') {
            Some((prefix, name)) => Self::new(name).with_prefix(prefix),
            None => Self::new(text),
        }
    }

    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        let prefix = fold(prefix.as_ref());
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    pub fn of_kind(mut self, kind: BindingKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }

    pub fn accepts(&self, kind: BindingKind) -> bool {
        self.kind.is_none_or(|k| k == kind)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}.{}", prefix, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_last_dot() {
        let q = QualifiedName::parse("Sales.Orders.Total");
        assert_eq!(q.prefix.as_deref(), Some("sales.orders"));
        assert_eq!(q.name, "total");
        assert_eq!(q.to_string(), "sales.orders.total");

        let plain = QualifiedName::parse("X");
        assert!(plain.prefix.is_none());
        assert_eq!(plain.name, "x");
    }

    #[test]
    fn test_case_insensitive_equality() {
        let a = QualifiedName::new("Col").with_prefix("T");
        let b = QualifiedName::new("col").with_prefix("t");
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_filter() {
        let q = QualifiedName::new("f").of_kind(BindingKind::Routine);
        assert!(q.accepts(BindingKind::Routine));
        assert!(!q.accepts(BindingKind::Variable));
        assert!(QualifiedName::new("f").accepts(BindingKind::Variable));
        assert!(QualifiedName::local("f").local_only);
    }
}
