//! Unique identifiers for compiler entities.
//!
//! Each id is an index into one arena (see [`crate::arena`]); the
//! defining macro also provides that arena's index impl, so an id type
//! and its storage discipline cannot drift apart.

use serde::Serialize;
use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl crate::arena::ArenaId for $name {
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id! {
    /// A declaration in the AST arena.
    ///
    /// DeclId is the universal identifier for program units, variables,
    /// record fields, named constants and intrinsic functions.
    DeclId, "decl"
}

define_id! {
    /// An expression in the AST arena.
    ExprId, "expr"
}

define_id! {
    /// A statement in the AST arena.
    StmtId, "stmt"
}

define_id! {
    /// A local storage slot within a lowered function.
    LocalId, "local"
}

define_id! {
    /// A lowered function within an IR module.
    FuncId, "func"
}

define_id! {
    /// A basic block within a lowered function.
    BlockId, "block"
}

define_id! {
    /// An instruction result within a lowered function.
    ValueId, "value"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decl_id() {
        let id = DeclId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id.to_string(), "decl#42");
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // Compile-time property: the macro mints distinct newtypes. The
        // runtime check just exercises equality within one type.
        assert_eq!(ExprId::new(3), ExprId::new(3));
        assert_ne!(BlockId::new(0), BlockId::new(1));
    }
}
