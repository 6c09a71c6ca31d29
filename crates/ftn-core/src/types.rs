//! The Fortran type system: interned types, qualifiers and `QualType`.
//!
//! Types are canonicalized by a [`TypeInterner`]: equal types always
//! intern to the same [`Ty`] handle, so type equality is an integer
//! comparison. A [`QualType`] is an explicit `(Ty, Qualifiers)` pair;
//! the qualifier set is a single bit-packed word laid out as
//! `|A P V|ExtAttr|Intent|AddressSpace|`.

use crate::ids::{DeclId, ExprId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// An interned type reference.
///
/// Equal canonical types always have the same `Ty` value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Ty(pub u32);

impl Ty {
    /// The error type (for recovery).
    pub const ERROR: Ty = Ty(0);
    /// Default INTEGER.
    pub const INTEGER: Ty = Ty(1);
    /// Default REAL.
    pub const REAL: Ty = Ty(2);
    /// DOUBLE PRECISION.
    pub const DOUBLE_PRECISION: Ty = Ty(3);
    /// Default COMPLEX.
    pub const COMPLEX: Ty = Ty(4);
    /// Default CHARACTER (LEN 1).
    pub const CHARACTER: Ty = Ty(5);
    /// Default LOGICAL.
    pub const LOGICAL: Ty = Ty(6);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ty({})", self.0)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ty#{}", self.0)
    }
}

/// The intrinsic type specifications. REAL is the implicit-typing default
/// for non-I..N letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeSpec {
    Integer,
    Real,
    DoublePrecision,
    Complex,
    Character,
    Logical,
}

impl TypeSpec {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeSpec::Integer => "INTEGER",
            TypeSpec::Real => "REAL",
            TypeSpec::DoublePrecision => "DOUBLE PRECISION",
            TypeSpec::Complex => "COMPLEX",
            TypeSpec::Character => "CHARACTER",
            TypeSpec::Logical => "LOGICAL",
        }
    }
}

/// One dimension of an array specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum DimSpec {
    /// `[lower :] upper` with constant-foldable bounds.
    Explicit {
        lower: Option<ExprId>,
        upper: ExprId,
    },
    /// `*`, valid only as the last dimension of a dummy argument.
    AssumedSize,
}

/// Canonical type representation for interning.
///
/// Compound types use `Ty` handles for recursion, enabling structural
/// sharing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    /// Recovery type for invalid constructs.
    Error,
    /// An intrinsic type with optional KIND and (for CHARACTER) LEN
    /// selector expressions.
    Builtin {
        spec: TypeSpec,
        kind: Option<ExprId>,
        len: Option<ExprId>,
    },
    /// An array of `elem` with one entry per dimension.
    Array { elem: Ty, dims: Vec<DimSpec> },
    /// A derived type; fields are Field declarations in order.
    Record { fields: Vec<DeclId> },
    /// A POINTER with the given rank.
    Pointer { pointee: Ty, rank: u8 },
}

/// Single-valued extended attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtAttr {
    None,
    Asynchronous,
    Contiguous,
    Optional,
    Pointer,
    Save,
    Target,
    Value,
}

/// Dummy-argument intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intent {
    None,
    In,
    Out,
    InOut,
}

/// The collection of all type qualifiers, bit-packed into one word.
///
/// Layout: bits 0-2 hold the Allocatable/Parameter/Volatile flags,
/// bits 3-9 the extended attribute, bits 10-11 the intent, and
/// bits 12-31 a 20-bit address space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Qualifiers(u32);

const APV_MASK: u32 = 0b111;
const EXT_SHIFT: u32 = 3;
const EXT_MASK: u32 = 0x7F << EXT_SHIFT;
const INTENT_SHIFT: u32 = 10;
const INTENT_MASK: u32 = 0x3 << INTENT_SHIFT;
const ADDR_SHIFT: u32 = 12;
pub const MAX_ADDRESS_SPACE: u32 = 0xFFFFF;

impl Qualifiers {
    pub const ALLOCATABLE: u32 = 1 << 0;
    pub const PARAMETER: u32 = 1 << 1;
    pub const VOLATILE: u32 = 1 << 2;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_opaque(mask: u32) -> Self {
        Self(mask)
    }

    pub fn as_opaque(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn has_allocatable(self) -> bool {
        self.0 & Self::ALLOCATABLE != 0
    }

    pub fn has_parameter(self) -> bool {
        self.0 & Self::PARAMETER != 0
    }

    pub fn has_volatile(self) -> bool {
        self.0 & Self::VOLATILE != 0
    }

    pub fn add_apv(&mut self, mask: u32) {
        debug_assert_eq!(mask & !APV_MASK, 0, "bitmask contains non-APV bits");
        self.0 |= mask;
    }

    pub fn ext_attr(self) -> ExtAttr {
        match (self.0 & EXT_MASK) >> EXT_SHIFT {
            0 => ExtAttr::None,
            1 => ExtAttr::Asynchronous,
            2 => ExtAttr::Contiguous,
            4 => ExtAttr::Optional,
            8 => ExtAttr::Pointer,
            16 => ExtAttr::Save,
            32 => ExtAttr::Target,
            64 => ExtAttr::Value,
            _ => ExtAttr::None,
        }
    }

    pub fn set_ext_attr(&mut self, attr: ExtAttr) {
        let bits: u32 = match attr {
            ExtAttr::None => 0,
            ExtAttr::Asynchronous => 1,
            ExtAttr::Contiguous => 2,
            ExtAttr::Optional => 4,
            ExtAttr::Pointer => 8,
            ExtAttr::Save => 16,
            ExtAttr::Target => 32,
            ExtAttr::Value => 64,
        };
        self.0 = (self.0 & !EXT_MASK) | (bits << EXT_SHIFT);
    }

    pub fn intent(self) -> Intent {
        match (self.0 & INTENT_MASK) >> INTENT_SHIFT {
            1 => Intent::In,
            2 => Intent::Out,
            3 => Intent::InOut,
            _ => Intent::None,
        }
    }

    pub fn set_intent(&mut self, intent: Intent) {
        let bits: u32 = match intent {
            Intent::None => 0,
            Intent::In => 1,
            Intent::Out => 2,
            Intent::InOut => 3,
        };
        self.0 = (self.0 & !INTENT_MASK) | (bits << INTENT_SHIFT);
    }

    pub fn address_space(self) -> u32 {
        self.0 >> ADDR_SHIFT
    }

    pub fn set_address_space(&mut self, space: u32) {
        debug_assert!(space <= MAX_ADDRESS_SPACE, "address space out of range");
        self.0 = (self.0 & !(MAX_ADDRESS_SPACE << ADDR_SHIFT)) | (space << ADDR_SHIFT);
    }
}

impl fmt::Debug for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qualifiers({:#x})", self.0)
    }
}

/// A type together with its qualifier set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct QualType {
    pub ty: Ty,
    pub quals: Qualifiers,
}

impl QualType {
    pub fn new(ty: Ty) -> Self {
        Self {
            ty,
            quals: Qualifiers::new(),
        }
    }

    pub fn with_quals(ty: Ty, quals: Qualifiers) -> Self {
        Self { ty, quals }
    }

    pub fn is_parameter(self) -> bool {
        self.quals.has_parameter()
    }
}

impl From<Ty> for QualType {
    fn from(ty: Ty) -> Self {
        QualType::new(ty)
    }
}

/// Type interner that deduplicates canonical types.
#[derive(Debug)]
pub struct TypeInterner {
    cache: HashMap<TypeKind, Ty>,
    types: Vec<TypeKind>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    /// Create a new type interner with pre-interned intrinsic types.
    pub fn new() -> Self {
        let mut interner = Self {
            cache: HashMap::new(),
            types: Vec::new(),
        };

        // Pre-intern the defaults at known indices.
        // These MUST match the Ty::* constants.
        assert_eq!(interner.intern(TypeKind::Error), Ty::ERROR);
        assert_eq!(interner.intern_spec(TypeSpec::Integer), Ty::INTEGER);
        assert_eq!(interner.intern_spec(TypeSpec::Real), Ty::REAL);
        assert_eq!(
            interner.intern_spec(TypeSpec::DoublePrecision),
            Ty::DOUBLE_PRECISION
        );
        assert_eq!(interner.intern_spec(TypeSpec::Complex), Ty::COMPLEX);
        assert_eq!(interner.intern_spec(TypeSpec::Character), Ty::CHARACTER);
        assert_eq!(interner.intern_spec(TypeSpec::Logical), Ty::LOGICAL);

        interner
    }

    /// Intern a type, returning its handle.
    pub fn intern(&mut self, kind: TypeKind) -> Ty {
        if let Some(&ty) = self.cache.get(&kind) {
            return ty;
        }

        let ty = Ty(self.types.len() as u32);
        self.types.push(kind.clone());
        self.cache.insert(kind, ty);
        ty
    }

    /// Intern an intrinsic type with no selectors.
    pub fn intern_spec(&mut self, spec: TypeSpec) -> Ty {
        self.intern(TypeKind::Builtin {
            spec,
            kind: None,
            len: None,
        })
    }

    /// Intern an intrinsic type with KIND/LEN selectors.
    pub fn intern_builtin(&mut self, spec: TypeSpec, kind: Option<ExprId>, len: Option<ExprId>) -> Ty {
        self.intern(TypeKind::Builtin { spec, kind, len })
    }

    /// Intern an array type.
    pub fn intern_array(&mut self, elem: Ty, dims: Vec<DimSpec>) -> Ty {
        self.intern(TypeKind::Array { elem, dims })
    }

    /// Intern a pointer type.
    pub fn intern_pointer(&mut self, pointee: Ty, rank: u8) -> Ty {
        self.intern(TypeKind::Pointer { pointee, rank })
    }

    /// Intern a record type.
    pub fn intern_record(&mut self, fields: Vec<DeclId>) -> Ty {
        self.intern(TypeKind::Record { fields })
    }

    /// Get the kind of an interned type.
    pub fn kind(&self, ty: Ty) -> &TypeKind {
        &self.types[ty.index()]
    }

    /// Get the intrinsic spec of a builtin type.
    pub fn spec(&self, ty: Ty) -> Option<TypeSpec> {
        match self.kind(ty) {
            TypeKind::Builtin { spec, .. } => Some(*spec),
            _ => None,
        }
    }

    pub fn is_error(&self, ty: Ty) -> bool {
        matches!(self.kind(ty), TypeKind::Error)
    }

    pub fn is_integer(&self, ty: Ty) -> bool {
        self.spec(ty) == Some(TypeSpec::Integer)
    }

    pub fn is_real(&self, ty: Ty) -> bool {
        self.spec(ty) == Some(TypeSpec::Real)
    }

    pub fn is_double_precision(&self, ty: Ty) -> bool {
        self.spec(ty) == Some(TypeSpec::DoublePrecision)
    }

    pub fn is_complex(&self, ty: Ty) -> bool {
        self.spec(ty) == Some(TypeSpec::Complex)
    }

    pub fn is_character(&self, ty: Ty) -> bool {
        self.spec(ty) == Some(TypeSpec::Character)
    }

    pub fn is_logical(&self, ty: Ty) -> bool {
        self.spec(ty) == Some(TypeSpec::Logical)
    }

    /// INTEGER, REAL, DOUBLE PRECISION or COMPLEX.
    pub fn is_arithmetic(&self, ty: Ty) -> bool {
        matches!(
            self.spec(ty),
            Some(TypeSpec::Integer)
                | Some(TypeSpec::Real)
                | Some(TypeSpec::DoublePrecision)
                | Some(TypeSpec::Complex)
        )
    }

    pub fn is_array(&self, ty: Ty) -> bool {
        matches!(self.kind(ty), TypeKind::Array { .. })
    }

    /// The element type of an array, or the type itself for scalars.
    pub fn self_or_element(&self, ty: Ty) -> Ty {
        match self.kind(ty) {
            TypeKind::Array { elem, .. } => *elem,
            _ => ty,
        }
    }

    /// The dimension specs of an array type.
    pub fn array_dims(&self, ty: Ty) -> Option<&[DimSpec]> {
        match self.kind(ty) {
            TypeKind::Array { dims, .. } => Some(dims),
            _ => None,
        }
    }

    /// Pretty-print a type for diagnostics.
    pub fn to_string(&self, ty: Ty) -> String {
        match self.kind(ty) {
            TypeKind::Error => "<error>".to_string(),
            TypeKind::Builtin { spec, .. } => spec.as_str().to_string(),
            TypeKind::Array { elem, dims } => {
                format!("{}({})", self.to_string(*elem), vec![":"; dims.len()].join(","))
            }
            TypeKind::Record { .. } => "TYPE".to_string(),
            TypeKind::Pointer { pointee, .. } => {
                format!("POINTER TO {}", self.to_string(*pointee))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_interning_deduplication() {
        let mut interner = TypeInterner::new();

        let t1 = interner.intern_spec(TypeSpec::Integer);
        let t2 = interner.intern_spec(TypeSpec::Integer);
        let t3 = interner.intern_spec(TypeSpec::Real);

        assert_eq!(t1, t2);
        assert_eq!(t1, Ty::INTEGER);
        assert_ne!(t1, t3);
    }

    #[test]
    fn test_pre_interned_types() {
        let interner = TypeInterner::new();

        assert!(matches!(interner.kind(Ty::ERROR), TypeKind::Error));
        assert!(interner.is_integer(Ty::INTEGER));
        assert!(interner.is_logical(Ty::LOGICAL));
        assert!(interner.is_arithmetic(Ty::COMPLEX));
        assert!(!interner.is_arithmetic(Ty::CHARACTER));
    }

    #[test]
    fn test_array_interning() {
        let mut interner = TypeInterner::new();
        let dims = vec![DimSpec::Explicit {
            lower: None,
            upper: ExprId::new(0),
        }];

        let a1 = interner.intern_array(Ty::REAL, dims.clone());
        let a2 = interner.intern_array(Ty::REAL, dims);
        assert_eq!(a1, a2);
        assert!(interner.is_array(a1));
        assert_eq!(interner.self_or_element(a1), Ty::REAL);
    }

    #[test]
    fn test_qualifier_packing() {
        let mut quals = Qualifiers::new();
        assert!(quals.is_empty());

        quals.add_apv(Qualifiers::PARAMETER | Qualifiers::VOLATILE);
        quals.set_ext_attr(ExtAttr::Target);
        quals.set_intent(Intent::InOut);
        quals.set_address_space(77);

        assert!(quals.has_parameter());
        assert!(quals.has_volatile());
        assert!(!quals.has_allocatable());
        assert_eq!(quals.ext_attr(), ExtAttr::Target);
        assert_eq!(quals.intent(), Intent::InOut);
        assert_eq!(quals.address_space(), 77);

        // Round-trips through the opaque word.
        let restored = Qualifiers::from_opaque(quals.as_opaque());
        assert_eq!(restored, quals);
    }

    #[test]
    fn test_ext_attr_is_single_valued() {
        let mut quals = Qualifiers::new();
        quals.set_ext_attr(ExtAttr::Save);
        quals.set_ext_attr(ExtAttr::Optional);
        assert_eq!(quals.ext_attr(), ExtAttr::Optional);
    }
}
