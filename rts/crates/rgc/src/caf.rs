//! CAF Registry - Top-Level Thunk Roots and Reversion
//!
//! A CAF (constant applicative form) is a statically allocated,
//! zero-argument thunk. On first evaluation the evaluator overwrites it in
//! place with an indirection to its value and links it onto one of two
//! lists:
//!
//! - `caf_list`: retained CAFs, whose values are roots forever
//! - `revertible_caf_list`: CAFs that go back to their unevaluated form after
//!   every major collection
//!
//! ```text
//! CAF cell (static, 4 words):
//! ┌──────────────┬────────────┬─────────────┬────────────┐
//! │ info pointer │ indirectee │ static_link │ saved_info │
//! └──────────────┴────────────┴─────────────┴────────────┘
//!
//!   define_caf        new_caf             revert_cafs
//!  ───────────▶ THUNK_STATIC ───────▶ IND_STATIC ──────────▶ THUNK_STATIC
//!                  saved_info = None   saved_info = Some(I0)  saved_info = None
//! ```
//!
//! The lists are intrusive: each CAF's `static_link` names the next CAF.
//! Insertion is at the head. The registry only runs inside the
//! stop-the-world window, so it takes no locks.

use crate::assert_context;
use crate::error::{Result, RgcError};
use crate::heap::{CAF_AREA_BASE, CAF_AREA_LIMIT};
use crate::object::info::{ClosureType, InfoPtr};
use crate::object::reference::{Reference, WORD_SIZE};
use std::fmt;

/// Words in a CAF cell: info, indirectee, static link, saved info
const CAF_WORDS: usize = 4;

/// CAF identifier (index into the registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CafId(pub usize);

impl fmt::Display for CafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "caf#{}", self.0)
    }
}

/// Which list an evaluated CAF joins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CafRetention {
    /// Value stays a root across every collection
    Retained,
    /// Reset to unevaluated after each major collection
    Revertible,
}

/// Caf - one static CAF cell
#[derive(Debug, Clone)]
pub struct Caf {
    address: usize,
    info: InfoPtr,
    indirectee: Reference,
    saved_info: Option<InfoPtr>,
    static_link: Option<CafId>,
}

impl Caf {
    /// Static address of the cell
    pub fn address(&self) -> usize {
        self.address
    }

    /// Current dispatch descriptor
    pub fn info(&self) -> &InfoPtr {
        &self.info
    }

    /// Value the CAF evaluated to; stale once reverted
    pub fn indirectee(&self) -> Reference {
        self.indirectee
    }

    /// Descriptor to restore on revert
    pub fn saved_info(&self) -> Option<&InfoPtr> {
        self.saved_info.as_ref()
    }

    pub fn static_link(&self) -> Option<CafId> {
        self.static_link
    }

    pub fn is_evaluated(&self) -> bool {
        self.info.closure_type() == ClosureType::IndStatic
    }
}

/// Counts returned by [`CafRegistry::mark_cafs`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CafMarkStats {
    /// Entries visited on `caf_list`
    pub retained: usize,
    /// Entries visited on `revertible_caf_list`
    pub revertible: usize,
}

impl CafMarkStats {
    pub fn total(&self) -> usize {
        self.retained + self.revertible
    }
}

/// CafRegistry - the CAF cells and both list heads
///
/// # Examples
///
/// ```rust
/// use rgc::caf::{CafRegistry, CafRetention};
/// use rgc::object::{ClosureType, InfoPtr, Reference};
///
/// let mut cafs = CafRegistry::new();
/// let thunk = InfoPtr::new("main_table", ClosureType::ThunkStatic);
/// let id = cafs.define_caf(thunk.clone())?;
///
/// // First evaluation
/// cafs.new_caf(id, Reference::untagged(0x4000_0000), CafRetention::Revertible)?;
/// assert!(cafs.is_evaluated(id));
///
/// // After a major collection
/// assert_eq!(cafs.revert_cafs(), 1);
/// assert_eq!(cafs.caf(id).map(|c| c.info().clone()), Some(thunk));
/// # Ok::<(), rgc::RgcError>(())
/// ```
#[derive(Debug)]
pub struct CafRegistry {
    cafs: Vec<Caf>,
    caf_list: Option<CafId>,
    revertible_caf_list: Option<CafId>,
    keep_cafs: bool,
    next_address: usize,
}

impl CafRegistry {
    pub fn new() -> Self {
        Self {
            cafs: Vec::new(),
            caf_list: None,
            revertible_caf_list: None,
            keep_cafs: false,
            next_address: CAF_AREA_BASE,
        }
    }

    /// Registry that retains every CAF, revertible or not
    pub fn with_keep_cafs(keep_cafs: bool) -> Self {
        Self {
            keep_cafs,
            ..Self::new()
        }
    }

    pub fn keep_cafs(&self) -> bool {
        self.keep_cafs
    }

    /// Allocate an unevaluated CAF cell at load time
    ///
    /// # Returns
    /// * `Ok(CafId)` - New cell with `info` as its descriptor
    /// * `Err(RgcError::InvalidArgument)` - `info` is not a static thunk
    /// * `Err(RgcError::OutOfMemory)` - CAF area exhausted
    pub fn define_caf(&mut self, info: InfoPtr) -> Result<CafId> {
        if info.closure_type() != ClosureType::ThunkStatic {
            return Err(RgcError::InvalidArgument(format!(
                "CAF {} must have a static thunk descriptor, got {:?}",
                info.name(),
                info.closure_type()
            )));
        }

        let size = CAF_WORDS * WORD_SIZE;
        if self.next_address + size > CAF_AREA_LIMIT {
            return Err(RgcError::OutOfMemory {
                requested: size,
                available: CAF_AREA_LIMIT - self.next_address,
            });
        }

        let id = CafId(self.cafs.len());
        self.cafs.push(Caf {
            address: self.next_address,
            info,
            indirectee: Reference::null(),
            saved_info: None,
            static_link: None,
        });
        self.next_address += size;
        Ok(id)
    }

    /// Record the first evaluation of a CAF
    ///
    /// Called by the evaluator. Stashes the current descriptor, installs the
    /// evaluated-CAF descriptor, stores `value`, and pushes the CAF onto the
    /// list chosen by `retention` (always `caf_list` when `keep_cafs` is set).
    ///
    /// # Returns
    /// * `Err(RgcError::InvalidState)` - CAF already evaluated
    pub fn new_caf(&mut self, id: CafId, value: Reference, retention: CafRetention) -> Result<()> {
        let retention = if self.keep_cafs {
            CafRetention::Retained
        } else {
            retention
        };
        let head = match retention {
            CafRetention::Retained => self.caf_list,
            CafRetention::Revertible => self.revertible_caf_list,
        };

        let caf = self.cafs.get_mut(id.0).ok_or_else(|| {
            RgcError::InvalidArgument(format!("unknown {}", id))
        })?;
        if caf.is_evaluated() || caf.saved_info.is_some() {
            return Err(RgcError::InvalidState {
                expected: "unevaluated CAF".to_string(),
                actual: format!("{} already evaluated", id),
            });
        }

        let original = std::mem::replace(&mut caf.info, InfoPtr::ind_static());
        caf.saved_info = Some(original);
        caf.indirectee = value;
        caf.static_link = head;

        match retention {
            CafRetention::Retained => self.caf_list = Some(id),
            CafRetention::Revertible => self.revertible_caf_list = Some(id),
        }

        log::trace!("{} evaluated to {} ({:?})", id, value, retention);
        Ok(())
    }

    /// Visit the value of every listed CAF as a GC root
    ///
    /// `evac` receives `user` and the current indirectee and returns the
    /// post-collection reference, which replaces the field. Each CAF on
    /// either list is visited exactly once.
    pub fn mark_cafs<U, F>(&mut self, mut evac: F, user: &mut U) -> CafMarkStats
    where
        F: FnMut(&mut U, Reference) -> Reference,
    {
        let retained = self.visit_list(self.caf_list, &mut evac, user);
        let revertible = self.visit_list(self.revertible_caf_list, &mut evac, user);

        log::debug!(
            "marked {} retained and {} revertible CAFs",
            retained,
            revertible
        );
        CafMarkStats {
            retained,
            revertible,
        }
    }

    /// Reset every revertible CAF to its unevaluated form
    ///
    /// Restores each CAF's saved descriptor, clears `saved_info`, and empties
    /// `revertible_caf_list`. The stale indirectee is left in place. The
    /// retained list is not touched. Returns the number reverted.
    pub fn revert_cafs(&mut self) -> usize {
        let mut reverted = 0;
        let mut cursor = self.revertible_caf_list;

        while let Some(id) = cursor {
            self.check_walk(reverted, "revertible_caf_list");
            let caf = &mut self.cafs[id.0];
            let saved = caf.saved_info.take();
            assert_context!(
                saved.is_some(),
                "revertible {} has no saved info (list corrupt)",
                id
            );
            if let Some(info) = saved {
                caf.info = info;
            }
            cursor = caf.static_link;
            reverted += 1;
        }
        self.revertible_caf_list = None;

        log::debug!("reverted {} CAFs", reverted);
        reverted
    }

    pub fn caf(&self, id: CafId) -> Option<&Caf> {
        self.cafs.get(id.0)
    }

    /// Untagged static reference to the CAF cell
    pub fn reference(&self, id: CafId) -> Option<Reference> {
        self.caf(id).map(|caf| Reference::untagged(caf.address))
    }

    pub fn is_evaluated(&self, id: CafId) -> bool {
        self.caf(id).is_some_and(Caf::is_evaluated)
    }

    /// Retained CAFs, most recently registered first
    pub fn caf_list(&self) -> CafIter<'_> {
        CafIter {
            registry: self,
            cursor: self.caf_list,
        }
    }

    /// Revertible CAFs, most recently registered first
    pub fn revertible_caf_list(&self) -> CafIter<'_> {
        CafIter {
            registry: self,
            cursor: self.revertible_caf_list,
        }
    }

    /// Number of defined CAF cells
    pub fn len(&self) -> usize {
        self.cafs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cafs.is_empty()
    }

    fn visit_list<U, F>(&mut self, head: Option<CafId>, evac: &mut F, user: &mut U) -> usize
    where
        F: FnMut(&mut U, Reference) -> Reference,
    {
        let mut visited = 0;
        let mut cursor = head;

        while let Some(id) = cursor {
            self.check_walk(visited, "CAF list");
            let caf = &mut self.cafs[id.0];
            caf.indirectee = evac(user, caf.indirectee);
            cursor = caf.static_link;
            visited += 1;
        }
        visited
    }

    /// A list longer than the number of cells has a cycle
    fn check_walk(&self, visited: usize, list: &str) {
        debug_assert!(
            visited < self.cafs.len(),
            "{} revisits a CAF; static_link chain is cyclic",
            list
        );
    }
}

impl Default for CafRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over one CAF list
pub struct CafIter<'a> {
    registry: &'a CafRegistry,
    cursor: Option<CafId>,
}

impl<'a> Iterator for CafIter<'a> {
    type Item = (CafId, &'a Caf);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let caf = &self.registry.cafs[id.0];
        self.cursor = caf.static_link;
        Some((id, caf))
    }
}
