//! Info Tables - Closure Dispatch Descriptors
//!
//! Every closure's header points at an info table describing its type.
//! The collector only needs the type; the rest of the table (entry code,
//! layout bitmaps) belongs to the object-layout module.
//!
//! Liveness dispatch collapses the closure types into four kinds:
//!
//! | Kind | Closure types |
//! |------|---------------|
//! | Indirection | `Ind`, `IndStatic`, `IndPerm`, `IndOldGen`, `IndOldGenPerm` |
//! | EvacuatedMarker | `Evacuated` |
//! | Thread | `Tso` |
//! | Other | everything else |

use std::fmt;
use std::sync::Arc;

/// Closure type recorded in an info table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureType {
    /// Data constructor
    Constr,
    /// Function
    Fun,
    /// Heap-allocated thunk
    Thunk,
    /// Unevaluated top-level thunk (CAF)
    ThunkStatic,
    /// Plain indirection left behind by an update
    Ind,
    /// Evaluated CAF
    IndStatic,
    /// Indirection that survives until the next major collection
    IndPerm,
    /// Indirection in an old generation
    IndOldGen,
    /// Permanent indirection in an old generation
    IndOldGenPerm,
    /// Forwarding stub left by evacuation
    Evacuated,
    /// Lightweight thread state object
    Tso,
    /// Array of references
    Array,
    /// Thunk under evaluation
    Blackhole,
}

/// Indirection sub-kinds; all share the single-pointer layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndirectionKind {
    Ind,
    IndStatic,
    IndPerm,
    IndOldGen,
    IndOldGenPerm,
}

/// What the liveness oracle dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureKind {
    Indirection(IndirectionKind),
    EvacuatedMarker,
    Thread,
    Other(ClosureType),
}

impl ClosureType {
    /// Classify for liveness dispatch
    pub fn kind(self) -> ClosureKind {
        match self {
            ClosureType::Ind => ClosureKind::Indirection(IndirectionKind::Ind),
            ClosureType::IndStatic => ClosureKind::Indirection(IndirectionKind::IndStatic),
            ClosureType::IndPerm => ClosureKind::Indirection(IndirectionKind::IndPerm),
            ClosureType::IndOldGen => ClosureKind::Indirection(IndirectionKind::IndOldGen),
            ClosureType::IndOldGenPerm => {
                ClosureKind::Indirection(IndirectionKind::IndOldGenPerm)
            }
            ClosureType::Evacuated => ClosureKind::EvacuatedMarker,
            ClosureType::Tso => ClosureKind::Thread,
            other @ (ClosureType::Constr
            | ClosureType::Fun
            | ClosureType::Thunk
            | ClosureType::ThunkStatic
            | ClosureType::Array
            | ClosureType::Blackhole) => ClosureKind::Other(other),
        }
    }

    /// True for the closure types laid out as a single indirectee
    pub fn is_indirection(self) -> bool {
        matches!(self.kind(), ClosureKind::Indirection(_))
    }
}

impl From<IndirectionKind> for ClosureType {
    fn from(kind: IndirectionKind) -> Self {
        match kind {
            IndirectionKind::Ind => ClosureType::Ind,
            IndirectionKind::IndStatic => ClosureType::IndStatic,
            IndirectionKind::IndPerm => ClosureType::IndPerm,
            IndirectionKind::IndOldGen => ClosureType::IndOldGen,
            IndirectionKind::IndOldGenPerm => ClosureType::IndOldGenPerm,
        }
    }
}

/// Info table contents the collector reads
#[derive(Debug)]
pub struct InfoTable {
    pub name: String,
    pub closure_type: ClosureType,
}

/// InfoPtr - shared handle to an info table
///
/// Two handles are equal only when they point at the same table, the same
/// way two info pointers compare in a closure header.
#[derive(Clone)]
pub struct InfoPtr(Arc<InfoTable>);

impl InfoPtr {
    pub fn new(name: impl Into<String>, closure_type: ClosureType) -> Self {
        InfoPtr(Arc::new(InfoTable {
            name: name.into(),
            closure_type,
        }))
    }

    pub fn closure_type(&self) -> ClosureType {
        self.0.closure_type
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> ClosureKind {
        self.0.closure_type.kind()
    }

    /// Shared table for evaluated CAFs
    pub fn ind_static() -> Self {
        IND_STATIC_INFO.clone()
    }

    /// Shared table for the given indirection sub-kind
    pub fn indirection(kind: IndirectionKind) -> Self {
        match kind {
            IndirectionKind::Ind => IND_INFO.clone(),
            IndirectionKind::IndStatic => IND_STATIC_INFO.clone(),
            IndirectionKind::IndPerm => IND_PERM_INFO.clone(),
            IndirectionKind::IndOldGen => IND_OLDGEN_INFO.clone(),
            IndirectionKind::IndOldGenPerm => IND_OLDGEN_PERM_INFO.clone(),
        }
    }

    /// Shared table for forwarding stubs
    pub fn evacuated() -> Self {
        EVACUATED_INFO.clone()
    }

    /// Shared table for thread objects
    pub fn tso() -> Self {
        TSO_INFO.clone()
    }
}

impl PartialEq for InfoPtr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InfoPtr {}

impl fmt::Debug for InfoPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoPtr({} : {:?})", self.0.name, self.0.closure_type)
    }
}

lazy_static::lazy_static! {
    static ref IND_INFO: InfoPtr = InfoPtr::new("IND", ClosureType::Ind);
    static ref IND_STATIC_INFO: InfoPtr = InfoPtr::new("IND_STATIC", ClosureType::IndStatic);
    static ref IND_PERM_INFO: InfoPtr = InfoPtr::new("IND_PERM", ClosureType::IndPerm);
    static ref IND_OLDGEN_INFO: InfoPtr = InfoPtr::new("IND_OLDGEN", ClosureType::IndOldGen);
    static ref IND_OLDGEN_PERM_INFO: InfoPtr =
        InfoPtr::new("IND_OLDGEN_PERM", ClosureType::IndOldGenPerm);
    static ref EVACUATED_INFO: InfoPtr = InfoPtr::new("EVACUATED", ClosureType::Evacuated);
    static ref TSO_INFO: InfoPtr = InfoPtr::new("TSO", ClosureType::Tso);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indirection_family() {
        for ty in [
            ClosureType::Ind,
            ClosureType::IndStatic,
            ClosureType::IndPerm,
            ClosureType::IndOldGen,
            ClosureType::IndOldGenPerm,
        ] {
            assert!(ty.is_indirection(), "{:?} should be an indirection", ty);
        }
        assert!(!ClosureType::Evacuated.is_indirection());
        assert!(!ClosureType::ThunkStatic.is_indirection());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ClosureType::Evacuated.kind(), ClosureKind::EvacuatedMarker);
        assert_eq!(ClosureType::Tso.kind(), ClosureKind::Thread);
        assert_eq!(
            ClosureType::Constr.kind(),
            ClosureKind::Other(ClosureType::Constr)
        );
    }

    #[test]
    fn test_indirection_kind_round_trip_through_tables() {
        for kind in [
            IndirectionKind::Ind,
            IndirectionKind::IndStatic,
            IndirectionKind::IndPerm,
            IndirectionKind::IndOldGen,
            IndirectionKind::IndOldGenPerm,
        ] {
            let info = InfoPtr::indirection(kind);
            assert_eq!(info.kind(), ClosureKind::Indirection(kind));
            assert_eq!(info.closure_type(), ClosureType::from(kind));
        }
    }

    #[test]
    fn test_info_identity() {
        let a = InfoPtr::new("main_caf", ClosureType::ThunkStatic);
        let b = InfoPtr::new("main_caf", ClosureType::ThunkStatic);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(InfoPtr::ind_static(), InfoPtr::ind_static());
    }
}
