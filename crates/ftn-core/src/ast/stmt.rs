//! Statement nodes.

use crate::ids::{DeclId, ExprId, StmtId};
use crate::interner::Name;
use crate::source::Span;
use crate::types::QualType;
use serde::Serialize;

/// A statement, optionally bearing a numeric statement label.
#[derive(Debug, Clone, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    /// The statement's own label (an IntegerConstant expression).
    pub label: Option<ExprId>,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, label: Option<ExprId>, span: Span) -> Self {
        Self { kind, label, span }
    }
}

/// A reference to a statement label.
///
/// When the label is declared before the referring statement, `target`
/// is filled eagerly; otherwise it is back-patched by forward-reference
/// resolution at end of unit.
#[derive(Debug, Clone, Serialize)]
pub struct LabelRef {
    /// The label expression as written.
    pub label: ExprId,
    /// The resolved target statement.
    pub target: Option<StmtId>,
}

impl LabelRef {
    pub fn unresolved(label: ExprId) -> Self {
        Self {
            label,
            target: None,
        }
    }

    pub fn resolved(label: ExprId, target: StmtId) -> Self {
        Self {
            label,
            target: Some(target),
        }
    }
}

/// A letter or letter range in an IMPLICIT specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LetterSpec {
    pub low: char,
    pub high: Option<char>,
}

/// Marker statements that close a construct part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstructPart {
    EndDo,
    ElseWhere,
    EndWhere,
}

/// The statement variants.
#[derive(Debug, Clone, Serialize)]
pub enum StmtKind {
    Program {
        name: Option<Name>,
    },
    EndProgram {
        name: Option<Name>,
    },
    Use {
        module: Name,
    },
    Import {
        names: Vec<Name>,
    },
    /// `IMPLICIT spec (letters), ...` or `IMPLICIT NONE` (`rules: None`).
    Implicit {
        rules: Option<Vec<(QualType, Vec<LetterSpec>)>>,
    },
    Parameter {
        pairs: Vec<(DeclId, ExprId)>,
    },
    Asynchronous {
        names: Vec<Name>,
    },
    Dimension {
        name: Name,
    },
    External {
        names: Vec<Name>,
    },
    Intrinsic {
        names: Vec<Name>,
    },
    Assignment {
        lhs: ExprId,
        rhs: ExprId,
    },
    /// `ASSIGN label TO var`.
    Assign {
        address: LabelRef,
        var: ExprId,
    },
    Goto {
        destination: LabelRef,
    },
    /// `GOTO var (label, label, ...)`.
    AssignedGoto {
        var: ExprId,
        allowed: Vec<LabelRef>,
    },
    /// Both the logical IF (`then_stmt` holds the single body statement)
    /// and the block IF (`then_stmt` is `None`, body statements follow in
    /// the statement list until the linked ELSE/END IF). `else_stmt` is
    /// back-patched when an ELSE IF or ELSE statement links to this IF.
    If {
        condition: ExprId,
        then_stmt: Option<StmtId>,
        else_stmt: Option<StmtId>,
        /// This IF was written as `ELSE IF (...) THEN`.
        else_if: bool,
    },
    Else,
    EndIf,
    /// `DO label var = init, last [, step]` or the label-less
    /// `DO var = ...` closed by END DO (`terminator: None`).
    Do {
        var: ExprId,
        init: ExprId,
        last: ExprId,
        step: Option<ExprId>,
        terminator: Option<LabelRef>,
    },
    Continue,
    Stop {
        code: Option<ExprId>,
    },
    Return,
    Call {
        subroutine: DeclId,
        args: Vec<ExprId>,
    },
    /// `PRINT *, items`.
    Print {
        items: Vec<ExprId>,
    },
    /// Single-statement or construct WHERE; bodies are Block statements
    /// containing only assignments.
    Where {
        mask: ExprId,
        then_block: StmtId,
        else_block: Option<StmtId>,
    },
    Block {
        body: Vec<StmtId>,
    },
    ConstructPart(ConstructPart),
}

impl StmtKind {
    /// Whether this statement may terminate a labeled DO loop.
    ///
    /// The terminal statement must not be a GOTO, assigned GOTO, block
    /// IF, ELSE IF, ELSE, END IF, RETURN, STOP, END or DO statement. A
    /// logical IF terminator is additionally restricted by
    /// [`StmtKind::valid_do_terminator_logical_if_body`] on its body.
    pub fn valid_do_terminator(&self) -> bool {
        match self {
            StmtKind::Goto { .. }
            | StmtKind::AssignedGoto { .. }
            | StmtKind::Stop { .. }
            | StmtKind::Return
            | StmtKind::Do { .. }
            | StmtKind::Else
            | StmtKind::EndIf
            | StmtKind::EndProgram { .. } => false,
            StmtKind::If { then_stmt, .. } => then_stmt.is_some(),
            _ => true,
        }
    }

    /// Whether a statement may be the body of a logical IF that
    /// terminates a DO loop: any executable statement except a DO, block
    /// IF, ELSE IF, ELSE, END IF, END or another logical IF.
    pub fn valid_do_terminator_logical_if_body(&self) -> bool {
        !matches!(
            self,
            StmtKind::Do { .. }
                | StmtKind::If { .. }
                | StmtKind::Else
                | StmtKind::EndIf
                | StmtKind::EndProgram { .. }
        )
    }
}

/// Invariant guard for the span-bearing nodes; spans stay cheap to copy.
const _: () = {
    assert!(std::mem::size_of::<Span>() <= 24);
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ExprId;

    #[test]
    fn test_do_terminator_validity() {
        assert!(StmtKind::Continue.valid_do_terminator());
        assert!(StmtKind::Assignment {
            lhs: ExprId::new(0),
            rhs: ExprId::new(1)
        }
        .valid_do_terminator());

        assert!(!StmtKind::Return.valid_do_terminator());
        assert!(!StmtKind::Stop { code: None }.valid_do_terminator());
        assert!(!StmtKind::Goto {
            destination: LabelRef::unresolved(ExprId::new(0))
        }
        .valid_do_terminator());

        // Block IF (no then statement) cannot terminate a DO.
        assert!(!StmtKind::If {
            condition: ExprId::new(0),
            then_stmt: None,
            else_stmt: None,
            else_if: false,
        }
        .valid_do_terminator());

        // Logical IF can, subject to its body restriction.
        assert!(StmtKind::If {
            condition: ExprId::new(0),
            then_stmt: Some(StmtId::new(1)),
            else_stmt: None,
            else_if: false,
        }
        .valid_do_terminator());
        assert!(!StmtKind::If {
            condition: ExprId::new(0),
            then_stmt: None,
            else_stmt: None,
            else_if: false,
        }
        .valid_do_terminator_logical_if_body());
    }
}
