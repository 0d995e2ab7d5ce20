//! Closure Layout
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────┐
//! │ Info pointer │ Payload                              │
//! │  (1 word)    │  Indirectee | Evacuee | TSO | Fields │
//! └──────────────┴──────────────────────────────────────┘
//! ```
//!
//! The info pointer decides how the payload is read. A CAF that has been
//! reverted keeps its old indirectee in the payload while its info pointer
//! says thunk again; readers must always go through the info pointer.

use super::info::{ClosureKind, ClosureType, IndirectionKind, InfoPtr};
use super::reference::{Reference, WORD_SIZE};

/// Thread state recorded in a thread object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatNext {
    RunGhc,
    RunInterpreted,
    ThreadKilled,
    ThreadComplete,
    /// The thread moved to a new object; `link` points at it
    ThreadRelocated,
}

/// Words following the info pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Single-pointer layout shared by all indirections and CAFs
    Indirectee(Reference),
    /// Where an evacuated object was copied to
    Evacuee(Reference),
    /// Thread object; `link` is the relocation target when relocated
    Thread { what_next: WhatNext, link: Reference },
    /// Ordinary pointer fields
    Fields(Vec<Reference>),
}

/// Closure - a heap or static object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub info: InfoPtr,
    pub payload: Payload,
}

/// Thread objects reserve space for their stack pointer and bookkeeping.
const TSO_WORDS: usize = 6;

impl Closure {
    pub fn indirection(kind: IndirectionKind, indirectee: Reference) -> Self {
        Self {
            info: InfoPtr::indirection(kind),
            payload: Payload::Indirectee(indirectee),
        }
    }

    /// Forwarding stub recording where the object was copied to
    pub fn evacuated(evacuee: Reference) -> Self {
        Self {
            info: InfoPtr::evacuated(),
            payload: Payload::Evacuee(evacuee),
        }
    }

    pub fn thread(what_next: WhatNext, link: Reference) -> Self {
        Self {
            info: InfoPtr::tso(),
            payload: Payload::Thread { what_next, link },
        }
    }

    pub fn data(info: InfoPtr, fields: Vec<Reference>) -> Self {
        Self {
            info,
            payload: Payload::Fields(fields),
        }
    }

    pub fn closure_type(&self) -> ClosureType {
        self.info.closure_type()
    }

    pub fn kind(&self) -> ClosureKind {
        self.info.kind()
    }

    /// Size in bytes including the info pointer
    pub fn size_bytes(&self) -> usize {
        let payload_words = match &self.payload {
            Payload::Indirectee(_) | Payload::Evacuee(_) => 1,
            Payload::Thread { .. } => TSO_WORDS,
            Payload::Fields(fields) => fields.len(),
        };
        (1 + payload_words) * WORD_SIZE
    }

    pub fn indirectee(&self) -> Option<Reference> {
        match self.payload {
            Payload::Indirectee(target) => Some(target),
            _ => None,
        }
    }

    pub fn evacuee(&self) -> Option<Reference> {
        match self.payload {
            Payload::Evacuee(target) => Some(target),
            _ => None,
        }
    }

    /// Relocation target, present only for a relocated thread
    pub fn relocation_link(&self) -> Option<Reference> {
        match self.payload {
            Payload::Thread {
                what_next: WhatNext::ThreadRelocated,
                link,
            } => Some(link),
            _ => None,
        }
    }
}
