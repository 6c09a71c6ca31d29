//! Statement-label scopes and implicit-typing scopes.

use crate::ids::{ExprId, StmtId};
use crate::types::QualType;
use std::collections::HashMap;

/// The integer value of a statement label.
pub type StmtLabelValue = i64;

/// How a forward statement-label reference is patched once the label is
/// declared. Matched exhaustively at resolution time, so a new referrer
/// kind cannot be forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveKind {
    /// Patch the address of an ASSIGN statement.
    Assign,
    /// Patch the destination of a GOTO statement.
    Goto,
    /// Patch entry `index` of an assigned GOTO's allowed-label list.
    AssignedGoto(usize),
    /// Patch the terminating statement of a DO loop.
    Do,
}

/// A reference to a statement label that was not yet declared.
#[derive(Debug, Clone)]
pub struct ForwardRef {
    /// The unresolved label expression.
    pub label: ExprId,
    /// The statement holding the dangling reference.
    pub stmt: StmtId,
    /// Which field of `stmt` to patch.
    pub kind: ResolveKind,
}

/// Statement labels are program-unit-local: a scope holds the labels
/// declared so far plus the forward references awaiting resolution at
/// end of unit.
#[derive(Debug, Default)]
pub struct StmtLabelScope {
    decls: HashMap<StmtLabelValue, StmtId>,
    forward: Vec<ForwardRef>,
}

impl StmtLabelScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new statement label. The caller has already checked for
    /// redefinition via [`StmtLabelScope::resolve`].
    pub fn declare(&mut self, value: StmtLabelValue, stmt: StmtId) {
        self.decls.insert(value, stmt);
    }

    /// Try to resolve a label value to its statement.
    pub fn resolve(&self, value: StmtLabelValue) -> Option<StmtId> {
        self.decls.get(&value).copied()
    }

    /// Record a forward reference for end-of-unit resolution.
    pub fn declare_forward(&mut self, reference: ForwardRef) {
        self.forward.push(reference);
    }

    /// Take the pending forward references, in insertion order.
    pub fn take_forward(&mut self) -> Vec<ForwardRef> {
        std::mem::take(&mut self.forward)
    }

    pub fn forward_refs(&self) -> &[ForwardRef] {
        &self.forward
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty() && self.forward.is_empty()
    }

    pub fn reset(&mut self) {
        self.decls.clear();
        self.forward.clear();
    }
}

/// Result of an implicit-typing lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitRule {
    /// IMPLICIT NONE is in effect; the reference is an error.
    None,
    /// An IMPLICIT rule maps the letter to this type.
    Type(QualType),
    /// No rule applies; the I-N default decides.
    Default,
}

/// A scope of IMPLICIT rules. Each letter maps at most once per scope;
/// once NONE is set no rule may be added (and vice versa). Parent-linked
/// for host association.
#[derive(Debug, Default)]
pub struct ImplicitTypingScope {
    parent: Option<Box<ImplicitTypingScope>>,
    rules: HashMap<char, QualType>,
    none: bool,
}

impl ImplicitTypingScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: ImplicitTypingScope) -> Self {
        Self {
            parent: Some(Box::new(parent)),
            rules: HashMap::new(),
            none: false,
        }
    }

    pub fn into_parent(self) -> Option<ImplicitTypingScope> {
        self.parent.map(|p| *p)
    }

    /// Apply one letter-range rule. Returns false if NONE is in effect
    /// or any letter in the range is already mapped.
    pub fn apply(&mut self, low: char, high: Option<char>, ty: QualType) -> bool {
        if self.none {
            return false;
        }
        let low = low.to_ascii_uppercase();
        let high = high.map(|h| h.to_ascii_uppercase()).unwrap_or(low);
        for letter in low..=high {
            if self.rules.contains_key(&letter) {
                return false;
            }
        }
        for letter in low..=high {
            self.rules.insert(letter, ty);
        }
        true
    }

    /// Switch the scope to IMPLICIT NONE. Fails if rules already exist.
    pub fn apply_none(&mut self) -> bool {
        if !self.rules.is_empty() {
            return false;
        }
        self.none = true;
        true
    }

    /// Resolve the implicit type for an identifier's first letter.
    pub fn resolve(&self, first_letter: char) -> ImplicitRule {
        if self.none {
            return ImplicitRule::None;
        }
        let letter = first_letter.to_ascii_uppercase();
        if let Some(&ty) = self.rules.get(&letter) {
            return ImplicitRule::Type(ty);
        }
        match &self.parent {
            Some(parent) => parent.resolve(letter),
            None => ImplicitRule::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ExprId, StmtId};
    use crate::types::{QualType, Ty};

    #[test]
    fn test_label_scope_declare_resolve() {
        let mut scope = StmtLabelScope::new();
        assert_eq!(scope.resolve(100), None);

        scope.declare(100, StmtId::new(4));
        assert_eq!(scope.resolve(100), Some(StmtId::new(4)));
        assert_eq!(scope.resolve(200), None);
    }

    #[test]
    fn test_forward_refs_preserve_order() {
        let mut scope = StmtLabelScope::new();
        scope.declare_forward(ForwardRef {
            label: ExprId::new(0),
            stmt: StmtId::new(0),
            kind: ResolveKind::Goto,
        });
        scope.declare_forward(ForwardRef {
            label: ExprId::new(1),
            stmt: StmtId::new(1),
            kind: ResolveKind::Do,
        });

        let taken = scope.take_forward();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].kind, ResolveKind::Goto);
        assert_eq!(taken[1].kind, ResolveKind::Do);
        assert!(scope.forward_refs().is_empty());
    }

    #[test]
    fn test_implicit_rules() {
        let mut scope = ImplicitTypingScope::new();
        assert!(scope.apply('a', Some('c'), QualType::new(Ty::LOGICAL)));

        assert_eq!(
            scope.resolve('B'),
            ImplicitRule::Type(QualType::new(Ty::LOGICAL))
        );
        assert_eq!(scope.resolve('D'), ImplicitRule::Default);

        // Letters are single-assignment.
        assert!(!scope.apply('b', None, QualType::new(Ty::INTEGER)));
        // And NONE is rejected once rules exist.
        assert!(!scope.apply_none());
    }

    #[test]
    fn test_implicit_none() {
        let mut scope = ImplicitTypingScope::new();
        assert!(scope.apply_none());
        assert_eq!(scope.resolve('X'), ImplicitRule::None);
        assert!(!scope.apply('x', None, QualType::new(Ty::REAL)));
    }

    #[test]
    fn test_implicit_parent_chain() {
        let mut outer = ImplicitTypingScope::new();
        outer.apply('q', None, QualType::new(Ty::INTEGER));
        let inner = ImplicitTypingScope::with_parent(outer);

        assert_eq!(
            inner.resolve('Q'),
            ImplicitRule::Type(QualType::new(Ty::INTEGER))
        );
        assert_eq!(inner.resolve('R'), ImplicitRule::Default);
    }
}
