//! Keyword and intrinsic-builtin tables.
//!
//! Fortran has no reserved words: the lexer always produces plain
//! identifier tokens and the parser promotes them to keywords by looking
//! up the spelling here (and can demote them back when a keyword appears
//! in identifier position). The tables are keyed by interned [`Name`]s so
//! classification is a single map probe.

use crate::interner::{Interner, Name};
use std::collections::HashMap;

/// Language dialect switches that gate parts of the keyword table.
#[derive(Debug, Clone, Copy)]
pub struct DialectOptions {
    /// Accept Fortran 90 free-form-era keywords (WHERE, SELECT, MODULE...).
    pub fortran90: bool,
}

impl Default for DialectOptions {
    fn default() -> Self {
        Self { fortran90: true }
    }
}

/// Keyword kinds a classified identifier token can take.
///
/// Compound spellings written as one word (ELSEIF, ENDDO, GOTO...) are
/// listed here as well; the two-word forms are merged by the parser's
/// token-merging pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Program,
    Function,
    Subroutine,
    Module,
    Block,
    Data,
    BlockData,
    Use,
    Only,
    Import,
    Implicit,
    None,
    Parameter,
    Asynchronous,
    Dimension,
    External,
    Intrinsic,
    Intent,
    In,
    Out,
    InOut,
    Allocatable,
    Optional,
    Pointer,
    Save,
    Target,
    Value,
    Volatile,
    Contiguous,
    Integer,
    Real,
    Double,
    Precision,
    DoublePrecision,
    Complex,
    Character,
    Logical,
    Kind,
    Len,
    Type,
    If,
    Then,
    Else,
    ElseIf,
    EndIf,
    Do,
    EndDo,
    Continue,
    Stop,
    Return,
    Call,
    Go,
    To,
    Goto,
    Assign,
    Print,
    Where,
    ElseWhere,
    EndWhere,
    Forall,
    EndForall,
    Select,
    Case,
    SelectCase,
    SelectType,
    Enum,
    Associate,
    Interface,
    File,
    End,
    EndProgram,
    EndFunction,
    EndSubroutine,
    EndModule,
    EndBlockData,
    EndType,
    EndSelect,
    EndEnum,
    EndAssociate,
    EndInterface,
    EndFile,
}

/// Intrinsic functions recognized by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Builtin {
    Abs,
    Mod,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Log10,
    Min,
    Max,
    Int,
    Real,
    Dble,
    Cmplx,
    Aimag,
    Conjg,
    Char,
    Ichar,
    Len,
    Nint,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "ABS",
            Builtin::Mod => "MOD",
            Builtin::Sqrt => "SQRT",
            Builtin::Sin => "SIN",
            Builtin::Cos => "COS",
            Builtin::Tan => "TAN",
            Builtin::Exp => "EXP",
            Builtin::Log => "LOG",
            Builtin::Log10 => "LOG10",
            Builtin::Min => "MIN",
            Builtin::Max => "MAX",
            Builtin::Int => "INT",
            Builtin::Real => "REAL",
            Builtin::Dble => "DBLE",
            Builtin::Cmplx => "CMPLX",
            Builtin::Aimag => "AIMAG",
            Builtin::Conjg => "CONJG",
            Builtin::Char => "CHAR",
            Builtin::Ichar => "ICHAR",
            Builtin::Len => "LEN",
            Builtin::Nint => "NINT",
        }
    }
}

/// Keyword and builtin lookup tables keyed by interned names.
#[derive(Debug)]
pub struct WordTable {
    keywords: HashMap<Name, Keyword>,
    builtins: HashMap<Name, Builtin>,
}

impl WordTable {
    /// Build the tables, interning every spelling into `interner`.
    pub fn new(interner: &Interner, dialect: DialectOptions) -> Self {
        use Keyword::*;

        let mut keywords = HashMap::new();
        let mut add = |spelling: &str, kw: Keyword| {
            keywords.insert(interner.intern(spelling), kw);
        };

        add("PROGRAM", Program);
        add("FUNCTION", Function);
        add("SUBROUTINE", Subroutine);
        add("BLOCK", Block);
        add("DATA", Data);
        add("BLOCKDATA", BlockData);
        add("IMPLICIT", Implicit);
        add("NONE", None);
        add("PARAMETER", Parameter);
        add("ASYNCHRONOUS", Asynchronous);
        add("DIMENSION", Dimension);
        add("EXTERNAL", External);
        add("INTRINSIC", Intrinsic);
        add("INTENT", Intent);
        add("IN", In);
        add("OUT", Out);
        add("INOUT", InOut);
        add("SAVE", Save);
        add("INTEGER", Integer);
        add("REAL", Real);
        add("DOUBLE", Double);
        add("PRECISION", Precision);
        add("DOUBLEPRECISION", DoublePrecision);
        add("COMPLEX", Complex);
        add("CHARACTER", Character);
        add("LOGICAL", Logical);
        add("KIND", Kind);
        add("LEN", Len);
        add("IF", If);
        add("THEN", Then);
        add("ELSE", Else);
        add("ELSEIF", ElseIf);
        add("ENDIF", EndIf);
        add("DO", Do);
        add("ENDDO", EndDo);
        add("CONTINUE", Continue);
        add("STOP", Stop);
        add("RETURN", Return);
        add("CALL", Call);
        add("GO", Go);
        add("TO", To);
        add("GOTO", Goto);
        add("ASSIGN", Assign);
        add("PRINT", Print);
        add("END", End);
        add("ENDPROGRAM", EndProgram);
        add("ENDFUNCTION", EndFunction);
        add("ENDSUBROUTINE", EndSubroutine);
        add("ENDBLOCKDATA", EndBlockData);
        add("ENDFILE", EndFile);
        add("FILE", File);

        if dialect.fortran90 {
            add("MODULE", Module);
            add("USE", Use);
            add("ONLY", Only);
            add("IMPORT", Import);
            add("ALLOCATABLE", Allocatable);
            add("OPTIONAL", Optional);
            add("POINTER", Pointer);
            add("TARGET", Target);
            add("VALUE", Value);
            add("VOLATILE", Volatile);
            add("CONTIGUOUS", Contiguous);
            add("TYPE", Type);
            add("WHERE", Where);
            add("ELSEWHERE", ElseWhere);
            add("ENDWHERE", EndWhere);
            add("FORALL", Forall);
            add("ENDFORALL", EndForall);
            add("SELECT", Select);
            add("CASE", Case);
            add("SELECTCASE", SelectCase);
            add("SELECTTYPE", SelectType);
            add("ENUM", Enum);
            add("ASSOCIATE", Associate);
            add("INTERFACE", Interface);
            add("ENDMODULE", EndModule);
            add("ENDTYPE", EndType);
            add("ENDSELECT", EndSelect);
            add("ENDENUM", EndEnum);
            add("ENDASSOCIATE", EndAssociate);
            add("ENDINTERFACE", EndInterface);
        }

        let mut builtins = HashMap::new();
        for builtin in [
            Builtin::Abs,
            Builtin::Mod,
            Builtin::Sqrt,
            Builtin::Sin,
            Builtin::Cos,
            Builtin::Tan,
            Builtin::Exp,
            Builtin::Log,
            Builtin::Log10,
            Builtin::Min,
            Builtin::Max,
            Builtin::Int,
            Builtin::Real,
            Builtin::Dble,
            Builtin::Cmplx,
            Builtin::Aimag,
            Builtin::Conjg,
            Builtin::Char,
            Builtin::Ichar,
            Builtin::Len,
            Builtin::Nint,
        ] {
            builtins.insert(interner.intern(builtin.name()), builtin);
        }

        Self { keywords, builtins }
    }

    /// Look up a keyword by its interned (uppercased) spelling.
    pub fn keyword(&self, name: Name) -> Option<Keyword> {
        self.keywords.get(&name).copied()
    }

    /// Look up an intrinsic builtin by its interned (uppercased) spelling.
    pub fn builtin(&self, name: Name) -> Option<Builtin> {
        self.builtins.get(&name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        let interner = Interner::new();
        let table = WordTable::new(&interner, DialectOptions::default());

        let name = interner.intern("PROGRAM");
        assert_eq!(table.keyword(name), Some(Keyword::Program));

        let not_kw = interner.intern("VELOCITY");
        assert_eq!(table.keyword(not_kw), None);
    }

    #[test]
    fn test_builtin_lookup() {
        let interner = Interner::new();
        let table = WordTable::new(&interner, DialectOptions::default());

        assert_eq!(table.builtin(interner.intern("SQRT")), Some(Builtin::Sqrt));
        assert_eq!(table.builtin(interner.intern("PROGRAM")), None);
    }

    #[test]
    fn test_dialect_gating() {
        let interner = Interner::new();
        let table = WordTable::new(&interner, DialectOptions { fortran90: false });

        assert_eq!(table.keyword(interner.intern("WHERE")), None);
        assert_eq!(table.keyword(interner.intern("DO")), Some(Keyword::Do));
    }
}
