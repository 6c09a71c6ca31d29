//! Identifier interning.
//!
//! Fortran names are case-insensitive: `Velocity` and `VELOCITY` denote
//! the same entity. The interner owns that rule — identifier spellings
//! are folded to their canonical upper-case form as they are interned —
//! so exactly one [`Name`] exists per entity and every downstream
//! lookup (declaration payloads, keyword classification, intrinsic
//! resolution) is an integer-keyed map probe. Keyword and intrinsic
//! table entries intern through the same table, which is what makes
//! promoting an identifier token to a keyword a single probe in the
//! parser.
//!
//! The front-end is single-threaded per translation unit, so the table
//! uses plain interior mutability; a second unit gets a fresh context
//! and a fresh interner.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;

/// An interned canonical spelling.
///
/// A lightweight handle; equality of names is equality of entities.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize)]
pub struct Name(pub u32);

impl Name {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Default)]
struct Table {
    names: HashMap<Box<str>, Name>,
    spellings: Vec<Box<str>>,
}

impl Table {
    fn insert(&mut self, spelling: &str) -> Name {
        if let Some(&name) = self.names.get(spelling) {
            return name;
        }
        let name = Name(self.spellings.len() as u32);
        let spelling: Box<str> = spelling.into();
        self.spellings.push(spelling.clone());
        self.names.insert(spelling, name);
        name
    }
}

/// The identifier table of one translation unit.
#[derive(Default)]
pub struct Interner {
    table: RefCell<Table>,
}

impl Interner {
    pub fn new() -> Interner {
        Interner::default()
    }

    /// Intern an identifier, folding it to its canonical upper-case
    /// spelling first. `Velocity`, `velocity` and `VELOCITY` intern to
    /// the same [`Name`].
    pub fn intern_ident(&self, spelling: &str) -> Name {
        if spelling.bytes().any(|b| b.is_ascii_lowercase()) {
            self.table
                .borrow_mut()
                .insert(&spelling.to_ascii_uppercase())
        } else {
            self.table.borrow_mut().insert(spelling)
        }
    }

    /// Intern a spelling exactly as written. Used for strings that are
    /// canonical already (keyword and intrinsic table entries).
    pub fn intern(&self, spelling: &str) -> Name {
        self.table.borrow_mut().insert(spelling)
    }

    /// The canonical spelling of a previously interned [`Name`].
    pub fn str(&self, name: Name) -> String {
        self.table.borrow().spellings[name.index()].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_case_folding() {
        let interner = Interner::new();

        let a = interner.intern_ident("Velocity");
        let b = interner.intern_ident("VELOCITY");
        let c = interner.intern_ident("velocity");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(interner.str(a), "VELOCITY");
    }

    #[test]
    fn test_folded_names_meet_keyword_entries() {
        // The keyword table interns canonical spellings; a lower-case
        // identifier must land on the same name.
        let interner = Interner::new();
        let keyword = interner.intern("PROGRAM");
        assert_eq!(interner.intern_ident("program"), keyword);
    }

    #[test]
    fn test_distinct_names_for_distinct_entities() {
        let interner = Interner::new();
        let x = interner.intern_ident("X");
        let y = interner.intern_ident("Y");
        assert_ne!(x, y);
        assert_eq!(interner.intern_ident("x"), x);
    }

    #[test]
    fn test_exact_interning_preserves_case() {
        // `intern` bypasses the fold, so non-identifier strings keep
        // their spelling.
        let interner = Interner::new();
        let exact = interner.intern("mixedCase");
        assert_ne!(exact, interner.intern_ident("mixedCase"));
        assert_eq!(interner.str(exact), "mixedCase");
    }
}
