//! Namespace entries and namespace sets of the constant pool.
//!
//! Wire layout:
//!
//! ```text
//! namespace     = [kind: u8][name_index: U30]
//! namespace_set = [count: U30][namespace_index: U30]*count
//! ```
//!
//! Namespace decoding fails closed: any kind byte outside the seven wire
//! kinds is rejected. This is the format's error-detection boundary for
//! corrupt input.

use abcedit_core::{ByteReader, ByteWriter, CoreError, CoreResult};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pool::ConstantPool;

/// Kind tag of a namespace entry.
///
/// `Any` is the reserved wildcard used by the sentinel entry at pool index 0
/// and by runtime-qualified matching; it never appears on the wire and is
/// rejected by [`NamespaceKind::from_byte`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NamespaceKind {
    /// Wildcard / sentinel kind (not a wire kind).
    Any,
    /// `namespace` declaration.
    Namespace,
    /// Package-level public visibility.
    Package,
    /// Package-internal visibility.
    PackageInternal,
    /// Instance `protected` visibility.
    Protected,
    /// Explicit namespace.
    Explicit,
    /// Static `protected` visibility.
    StaticProtected,
    /// `private` visibility.
    Private,
}

impl NamespaceKind {
    /// Wire tag byte of this kind.
    pub const fn to_byte(self) -> u8 {
        match self {
            NamespaceKind::Any => 0x00,
            NamespaceKind::Private => 0x05,
            NamespaceKind::Namespace => 0x08,
            NamespaceKind::Package => 0x16,
            NamespaceKind::PackageInternal => 0x17,
            NamespaceKind::Protected => 0x18,
            NamespaceKind::Explicit => 0x19,
            NamespaceKind::StaticProtected => 0x1A,
        }
    }

    /// Decode a wire tag byte, failing closed on anything unrecognized.
    pub fn from_byte(raw: u8) -> CoreResult<Self> {
        match raw {
            0x05 => Ok(NamespaceKind::Private),
            0x08 => Ok(NamespaceKind::Namespace),
            0x16 => Ok(NamespaceKind::Package),
            0x17 => Ok(NamespaceKind::PackageInternal),
            0x18 => Ok(NamespaceKind::Protected),
            0x19 => Ok(NamespaceKind::Explicit),
            0x1A => Ok(NamespaceKind::StaticProtected),
            _ => Err(CoreError::InvalidNamespaceKind { raw }),
        }
    }
}

/// A namespace entry: a kind plus an index into the string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Namespace {
    /// How the loader should interpret this entry.
    pub kind: NamespaceKind,
    /// Index of the namespace name in the pool's string table.
    pub name_index: u32,
}

impl Namespace {
    /// The sentinel wildcard namespace stored at pool index 0.
    pub const ANY: Self = Namespace { kind: NamespaceKind::Any, name_index: 0 };

    /// Decode one entry (`[kind: u8][name_index: U30]`).
    pub fn read_from(r: &mut ByteReader<'_>) -> CoreResult<Self> {
        let kind = NamespaceKind::from_byte(r.read_u8()?)?;
        let name_index = r.read_u30()?;
        trace!(?kind, name_index, "decoded namespace");
        Ok(Self { kind, name_index })
    }

    /// Encode, bit-exact inverse of [`Namespace::read_from`].
    pub fn write_to(&self, w: &mut ByteWriter) {
        w.write_u8(self.kind.to_byte());
        w.write_u30(self.name_index);
    }

    /// Resolve the namespace name through the pool.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> CoreResult<&'a str> {
        pool.string(self.name_index)
    }

    /// Structural equivalence: same kind and same resolved name.
    ///
    /// Two entries with different string indices but equal strings are
    /// equivalent; this is what matching cares about, not index identity.
    pub fn is_equivalent(&self, other: &Namespace, pool: &ConstantPool) -> CoreResult<bool> {
        Ok(self.kind == other.kind && self.name(pool)? == other.name(pool)?)
    }

    /// AS3 visibility modifier implied by the kind (presentation only).
    pub const fn as3_modifiers(&self) -> &'static str {
        match self.kind {
            NamespaceKind::Package => "public",
            NamespaceKind::Private => "private",
            NamespaceKind::Explicit => "explicit",
            NamespaceKind::Protected | NamespaceKind::StaticProtected => "protected",
            NamespaceKind::Any | NamespaceKind::Namespace | NamespaceKind::PackageInternal => "",
        }
    }
}

/// An ordered set of namespace indices.
///
/// Order is significant for wire round-trip; membership tests used by the
/// match algorithm are order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NamespaceSet {
    /// Indices into the pool's namespace table.
    pub namespace_indices: Vec<u32>,
}

impl NamespaceSet {
    /// Decode one set (`[count: U30][namespace_index: U30]*count`).
    pub fn read_from(r: &mut ByteReader<'_>) -> CoreResult<Self> {
        let count = r.read_u30()? as usize;
        // Cap the reservation by the bytes left: each index is ≥ 1 byte, so
        // a corrupt count can at worst reserve `remaining` before the reads
        // report EOF.
        let mut namespace_indices = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            namespace_indices.push(r.read_u30()?);
        }
        Ok(Self { namespace_indices })
    }

    /// Encode, bit-exact inverse of [`NamespaceSet::read_from`].
    pub fn write_to(&self, w: &mut ByteWriter) {
        w.write_u30(self.namespace_indices.len() as u32);
        for &index in &self.namespace_indices {
            w.write_u30(index);
        }
    }

    /// Order-independent membership test by structural equivalence.
    pub fn contains(&self, ns: &Namespace, pool: &ConstantPool) -> CoreResult<bool> {
        for &index in &self.namespace_indices {
            if pool.namespace(index)?.is_equivalent(ns, pool)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
