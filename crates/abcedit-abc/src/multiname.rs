//! Multinames: possibly-partial, possibly-late-bound name references.
//!
//! Wire layout (kind byte, then kind-specific fields):
//!
//! ```text
//! QName/QNameA         = [kind][ns: U30][name: U30]
//! RTQName/RTQNameA     = [kind][name: U30]
//! RTQNameL/RTQNameLA   = [kind]
//! Multiname/MultinameA = [kind][name: U30][ns_set: U30]
//! MultinameL/-LA       = [kind][ns_set: U30]
//! TypeName             = [kind][qname: U30][count: U30][type: U30]*count
//! ```
//!
//! An unrecognized kind byte fails closed, the same boundary Namespace
//! decoding draws.

use abcedit_core::{ByteReader, ByteWriter, CoreError, CoreResult};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::namespace::Namespace;
use crate::pool::ConstantPool;

/// The eleven wire kinds of a multiname entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MultinameKind {
    /// Fully qualified: one namespace, one name.
    QName,
    /// Attribute flavour of [`MultinameKind::QName`].
    QNameA,
    /// Namespace from the operand stack, name in the pool.
    RTQName,
    /// Attribute flavour of [`MultinameKind::RTQName`].
    RTQNameA,
    /// Both namespace and name from the operand stack.
    RTQNameL,
    /// Attribute flavour of [`MultinameKind::RTQNameL`].
    RTQNameLA,
    /// Name in the pool, open namespace set.
    Multiname,
    /// Attribute flavour of [`MultinameKind::Multiname`].
    MultinameA,
    /// Name from the operand stack, open namespace set.
    MultinameL,
    /// Attribute flavour of [`MultinameKind::MultinameL`].
    MultinameLA,
    /// Parameterized type (`Vector.<T>`).
    TypeName,
}

impl MultinameKind {
    /// Wire tag byte of this kind.
    pub const fn to_byte(self) -> u8 {
        match self {
            MultinameKind::QName => 0x07,
            MultinameKind::Multiname => 0x09,
            MultinameKind::QNameA => 0x0D,
            MultinameKind::MultinameA => 0x0E,
            MultinameKind::RTQName => 0x0F,
            MultinameKind::RTQNameA => 0x10,
            MultinameKind::RTQNameL => 0x11,
            MultinameKind::RTQNameLA => 0x12,
            MultinameKind::MultinameL => 0x1B,
            MultinameKind::MultinameLA => 0x1C,
            MultinameKind::TypeName => 0x1D,
        }
    }

    /// Decode a wire tag byte, failing closed on anything unrecognized.
    pub fn from_byte(raw: u8) -> CoreResult<Self> {
        match raw {
            0x07 => Ok(MultinameKind::QName),
            0x09 => Ok(MultinameKind::Multiname),
            0x0D => Ok(MultinameKind::QNameA),
            0x0E => Ok(MultinameKind::MultinameA),
            0x0F => Ok(MultinameKind::RTQName),
            0x10 => Ok(MultinameKind::RTQNameA),
            0x11 => Ok(MultinameKind::RTQNameL),
            0x12 => Ok(MultinameKind::RTQNameLA),
            0x1B => Ok(MultinameKind::MultinameL),
            0x1C => Ok(MultinameKind::MultinameLA),
            0x1D => Ok(MultinameKind::TypeName),
            _ => Err(CoreError::InvalidMultinameKind { raw }),
        }
    }

    /// True when part of the name is supplied from the operand stack.
    pub const fn is_runtime(self) -> bool {
        matches!(
            self,
            MultinameKind::RTQName
                | MultinameKind::RTQNameA
                | MultinameKind::RTQNameL
                | MultinameKind::RTQNameLA
                | MultinameKind::MultinameL
                | MultinameKind::MultinameLA
        )
    }

    /// True for the attribute (`@name`) flavours.
    pub const fn is_attribute(self) -> bool {
        matches!(
            self,
            MultinameKind::QNameA
                | MultinameKind::RTQNameA
                | MultinameKind::RTQNameLA
                | MultinameKind::MultinameA
                | MultinameKind::MultinameLA
        )
    }

    /// True when the name must be popped from the operand stack at use.
    pub const fn is_name_needed(self) -> bool {
        matches!(
            self,
            MultinameKind::RTQNameL
                | MultinameKind::RTQNameLA
                | MultinameKind::MultinameL
                | MultinameKind::MultinameLA
        )
    }

    /// True when the namespace must be popped from the operand stack at use.
    pub const fn is_namespace_needed(self) -> bool {
        matches!(
            self,
            MultinameKind::RTQName
                | MultinameKind::RTQNameA
                | MultinameKind::RTQNameL
                | MultinameKind::RTQNameLA
        )
    }
}

/// A multiname entry.
///
/// Closed tagged union: each variant carries exactly the operands valid for
/// its shape, the attribute flavour is folded into a `bool`, and all
/// cross-references are pool indices resolved lazily at call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Multiname {
    /// `QName` / `QNameA`.
    QName {
        /// Attribute flavour tag.
        attribute: bool,
        /// Index into the namespace table.
        namespace_index: u32,
        /// Index into the string table.
        name_index: u32,
    },
    /// `RTQName` / `RTQNameA`.
    RTQName {
        /// Attribute flavour tag.
        attribute: bool,
        /// Index into the string table.
        name_index: u32,
    },
    /// `RTQNameL` / `RTQNameLA` — no stored operands.
    RTQNameL {
        /// Attribute flavour tag.
        attribute: bool,
    },
    /// `Multiname` / `MultinameA`.
    Multiname {
        /// Attribute flavour tag.
        attribute: bool,
        /// Index into the string table.
        name_index: u32,
        /// Index into the namespace-set table.
        namespace_set_index: u32,
    },
    /// `MultinameL` / `MultinameLA`.
    MultinameL {
        /// Attribute flavour tag.
        attribute: bool,
        /// Index into the namespace-set table.
        namespace_set_index: u32,
    },
    /// `TypeName` — a qname applied to type parameters.
    TypeName {
        /// Index of the base qname in the multiname table.
        qname_index: u32,
        /// Indices of the type parameters in the multiname table.
        type_indices: Vec<u32>,
    },
}

impl Multiname {
    /// The sentinel wildcard name stored at pool index 0.
    pub const ANY: Self =
        Multiname::QName { attribute: false, namespace_index: 0, name_index: 0 };

    /// The wire kind of this entry.
    pub const fn kind(&self) -> MultinameKind {
        match self {
            Multiname::QName { attribute: false, .. } => MultinameKind::QName,
            Multiname::QName { attribute: true, .. } => MultinameKind::QNameA,
            Multiname::RTQName { attribute: false, .. } => MultinameKind::RTQName,
            Multiname::RTQName { attribute: true, .. } => MultinameKind::RTQNameA,
            Multiname::RTQNameL { attribute: false } => MultinameKind::RTQNameL,
            Multiname::RTQNameL { attribute: true } => MultinameKind::RTQNameLA,
            Multiname::Multiname { attribute: false, .. } => MultinameKind::Multiname,
            Multiname::Multiname { attribute: true, .. } => MultinameKind::MultinameA,
            Multiname::MultinameL { attribute: false, .. } => MultinameKind::MultinameL,
            Multiname::MultinameL { attribute: true, .. } => MultinameKind::MultinameLA,
            Multiname::TypeName { .. } => MultinameKind::TypeName,
        }
    }

    /// Decode one entry (kind byte, then kind-specific fields).
    pub fn read_from(r: &mut ByteReader<'_>) -> CoreResult<Self> {
        let kind = MultinameKind::from_byte(r.read_u8()?)?;
        let attribute = kind.is_attribute();
        let mn = match kind {
            MultinameKind::QName | MultinameKind::QNameA => Multiname::QName {
                attribute,
                namespace_index: r.read_u30()?,
                name_index: r.read_u30()?,
            },
            MultinameKind::RTQName | MultinameKind::RTQNameA => {
                Multiname::RTQName { attribute, name_index: r.read_u30()? }
            }
            MultinameKind::RTQNameL | MultinameKind::RTQNameLA => {
                Multiname::RTQNameL { attribute }
            }
            MultinameKind::Multiname | MultinameKind::MultinameA => Multiname::Multiname {
                attribute,
                name_index: r.read_u30()?,
                namespace_set_index: r.read_u30()?,
            },
            MultinameKind::MultinameL | MultinameKind::MultinameLA => {
                Multiname::MultinameL { attribute, namespace_set_index: r.read_u30()? }
            }
            MultinameKind::TypeName => {
                let qname_index = r.read_u30()?;
                let count = r.read_u30()? as usize;
                // Reservation capped by the bytes left; a corrupt count hits
                // EOF on the per-element reads instead of aborting on alloc.
                let mut type_indices = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    type_indices.push(r.read_u30()?);
                }
                Multiname::TypeName { qname_index, type_indices }
            }
        };
        trace!(?kind, "decoded multiname");
        Ok(mn)
    }

    /// Encode, the exact structural inverse of [`Multiname::read_from`],
    /// including the re-emitted type-parameter count for `TypeName`.
    pub fn write_to(&self, w: &mut ByteWriter) {
        w.write_u8(self.kind().to_byte());
        match self {
            Multiname::QName { namespace_index, name_index, .. } => {
                w.write_u30(*namespace_index);
                w.write_u30(*name_index);
            }
            Multiname::RTQName { name_index, .. } => w.write_u30(*name_index),
            Multiname::RTQNameL { .. } => {}
            Multiname::Multiname { name_index, namespace_set_index, .. } => {
                w.write_u30(*name_index);
                w.write_u30(*namespace_set_index);
            }
            Multiname::MultinameL { namespace_set_index, .. } => {
                w.write_u30(*namespace_set_index);
            }
            Multiname::TypeName { qname_index, type_indices } => {
                w.write_u30(*qname_index);
                w.write_u30(type_indices.len() as u32);
                for &index in type_indices {
                    w.write_u30(index);
                }
            }
        }
    }

    /// Resolve the name this entry refers to.
    ///
    /// Late-bound shapes resolve to the sentinel empty string; `TypeName`
    /// resolves through its base qname. TypeName chains are finite in
    /// well-formed pools; the walk is bounded to reject index cycles.
    pub fn resolved_name<'a>(&'a self, pool: &'a ConstantPool) -> CoreResult<&'a str> {
        let mut current = self;
        for _ in 0..=pool.multiname_count() {
            match current {
                Multiname::QName { name_index, .. }
                | Multiname::RTQName { name_index, .. }
                | Multiname::Multiname { name_index, .. } => return pool.string(*name_index),
                Multiname::RTQNameL { .. } | Multiname::MultinameL { .. } => {
                    return pool.string(0);
                }
                Multiname::TypeName { qname_index, .. } => {
                    current = pool.multiname(*qname_index)?;
                }
            }
        }
        Err(CoreError::corrupted("TypeName cycle in constant pool"))
    }

    /// Resolve the declared namespace, if this shape has one.
    ///
    /// Only the qname shapes carry a namespace; `TypeName` inherits its base
    /// qname's namespace.
    pub fn resolved_namespace<'a>(
        &'a self,
        pool: &'a ConstantPool,
    ) -> CoreResult<Option<&'a Namespace>> {
        let mut current = self;
        for _ in 0..=pool.multiname_count() {
            match current {
                Multiname::QName { namespace_index, .. } => {
                    return pool.namespace(*namespace_index).map(Some);
                }
                Multiname::TypeName { qname_index, .. } => {
                    current = pool.multiname(*qname_index)?;
                }
                _ => return Ok(None),
            }
        }
        Err(CoreError::corrupted("TypeName cycle in constant pool"))
    }

    /// Structural equivalence over `(kind, resolved name, resolved namespace)`.
    ///
    /// Namespace-set membership and `TypeName` type parameters are ignored on
    /// purpose: two `TypeName`s with the same base but different parameters
    /// compare equal. The match algorithm depends on this narrowing.
    pub fn is_equivalent(&self, other: &Multiname, pool: &ConstantPool) -> CoreResult<bool> {
        if self.kind() != other.kind() {
            return Ok(false);
        }
        if self.resolved_name(pool)? != other.resolved_name(pool)? {
            return Ok(false);
        }
        match (self.resolved_namespace(pool)?, other.resolved_namespace(pool)?) {
            (None, None) => Ok(true),
            (Some(a), Some(b)) => a.is_equivalent(b, pool),
            _ => Ok(false),
        }
    }

    /// Late-bound reference resolution.
    ///
    /// True when `self` and `other` are structurally equivalent, or when one
    /// side is a `QName` and the other a `Multiname` with the same resolved
    /// name and the qname's namespace a member of the multiname's set. Every
    /// other kind pairing never matches, even with identical names.
    pub fn is_match(&self, other: &Multiname, pool: &ConstantPool) -> CoreResult<bool> {
        if self.is_equivalent(other, pool)? {
            return Ok(true);
        }
        if self.resolved_name(pool)? != other.resolved_name(pool)? {
            return Ok(false);
        }
        match (self, other) {
            (
                Multiname::QName { attribute: false, namespace_index, .. },
                Multiname::Multiname { attribute: false, namespace_set_index, .. },
            )
            | (
                Multiname::Multiname { attribute: false, namespace_set_index, .. },
                Multiname::QName { attribute: false, namespace_index, .. },
            ) => {
                let ns = pool.namespace(*namespace_index)?;
                pool.namespace_set(*namespace_set_index)?.contains(ns, pool)
            }
            _ => Ok(false),
        }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceKind;
    use crate::namespace::NamespaceSet;
    use pretty_assertions::assert_eq;

    fn sample(kind: MultinameKind) -> Multiname {
        let attribute = kind.is_attribute();
        match kind {
            MultinameKind::QName | MultinameKind::QNameA => {
                Multiname::QName { attribute, namespace_index: 1, name_index: 2 }
            }
            MultinameKind::RTQName | MultinameKind::RTQNameA => {
                Multiname::RTQName { attribute, name_index: 2 }
            }
            MultinameKind::RTQNameL | MultinameKind::RTQNameLA => {
                Multiname::RTQNameL { attribute }
            }
            MultinameKind::Multiname | MultinameKind::MultinameA => {
                Multiname::Multiname { attribute, name_index: 2, namespace_set_index: 1 }
            }
            MultinameKind::MultinameL | MultinameKind::MultinameLA => {
                Multiname::MultinameL { attribute, namespace_set_index: 1 }
            }
            MultinameKind::TypeName => {
                Multiname::TypeName { qname_index: 1, type_indices: vec![2, 3] }
            }
        }
    }

    const ALL_KINDS: [MultinameKind; 11] = [
        MultinameKind::QName,
        MultinameKind::QNameA,
        MultinameKind::RTQName,
        MultinameKind::RTQNameA,
        MultinameKind::RTQNameL,
        MultinameKind::RTQNameLA,
        MultinameKind::Multiname,
        MultinameKind::MultinameA,
        MultinameKind::MultinameL,
        MultinameKind::MultinameLA,
        MultinameKind::TypeName,
    ];

    #[test]
    fn roundtrip_all_kinds_byte_exact() -> CoreResult<()> {
        for kind in ALL_KINDS {
            let mn = sample(kind);
            assert_eq!(mn.kind(), kind);

            let mut w = ByteWriter::new();
            mn.write_to(&mut w);
            let first = w.as_slice().to_vec();

            let mut r = ByteReader::new(&first);
            let back = Multiname::read_from(&mut r)?;
            assert_eq!(back, mn);
            assert_eq!(r.remaining(), 0);

            let mut w2 = ByteWriter::new();
            back.write_to(&mut w2);
            assert_eq!(w2.as_slice(), &first[..]);
        }
        Ok(())
    }

    #[test]
    fn unknown_kind_fails_closed() {
        let mut r = ByteReader::new(&[0x55, 0x00, 0x00]);
        assert_eq!(
            Multiname::read_from(&mut r).unwrap_err(),
            CoreError::InvalidMultinameKind { raw: 0x55 }
        );
    }

    #[test]
    fn huge_typename_count_errors_instead_of_allocating() {
        // TypeName with a parameter count near 2^30 and no parameter bytes.
        let mut w = ByteWriter::new();
        w.write_u8(MultinameKind::TypeName.to_byte());
        w.write_u30(1);
        w.write_u30((1 << 30) - 1);
        let mut r = ByteReader::new(w.as_slice());
        assert!(matches!(
            Multiname::read_from(&mut r).unwrap_err(),
            CoreError::UnexpectedEof { .. }
        ));
    }

    #[test]
    fn predicate_table_is_exhaustive() {
        use MultinameKind as K;
        let runtime = [K::RTQName, K::RTQNameA, K::RTQNameL, K::RTQNameLA, K::MultinameL, K::MultinameLA];
        let attribute = [K::QNameA, K::RTQNameA, K::RTQNameLA, K::MultinameA, K::MultinameLA];
        let name_needed = [K::RTQNameL, K::RTQNameLA, K::MultinameL, K::MultinameLA];
        let ns_needed = [K::RTQName, K::RTQNameA, K::RTQNameL, K::RTQNameLA];
        for kind in ALL_KINDS {
            assert_eq!(kind.is_runtime(), runtime.contains(&kind), "{kind:?}");
            assert_eq!(kind.is_attribute(), attribute.contains(&kind), "{kind:?}");
            assert_eq!(kind.is_name_needed(), name_needed.contains(&kind), "{kind:?}");
            assert_eq!(kind.is_namespace_needed(), ns_needed.contains(&kind), "{kind:?}");
        }
    }

    /// Pool with namespaces A/B/C and the sets {A,B} and {B,C}.
    fn match_fixture() -> (ConstantPool, u32, u32, u32, u32, u32) {
        let mut pool = ConstantPool::new();
        let foo = pool.intern_string("foo");
        let a = {
            let idx = pool.intern_string("a");
            pool.add_namespace(Namespace { kind: NamespaceKind::Package, name_index: idx })
        };
        let b = {
            let idx = pool.intern_string("b");
            pool.add_namespace(Namespace { kind: NamespaceKind::Package, name_index: idx })
        };
        let c = {
            let idx = pool.intern_string("c");
            pool.add_namespace(Namespace { kind: NamespaceKind::Package, name_index: idx })
        };
        let ab = pool.add_namespace_set(NamespaceSet { namespace_indices: vec![a, b] });
        let bc = pool.add_namespace_set(NamespaceSet { namespace_indices: vec![b, c] });
        (pool, foo, a, b, ab, bc)
    }

    #[test]
    fn qname_matches_multiname_with_member_namespace() -> CoreResult<()> {
        let (pool, foo, a, _b, ab, bc) = match_fixture();
        let qname = Multiname::QName { attribute: false, namespace_index: a, name_index: foo };
        let open = Multiname::Multiname { attribute: false, name_index: foo, namespace_set_index: ab };

        // Both argument orders.
        assert!(qname.is_match(&open, &pool)?);
        assert!(open.is_match(&qname, &pool)?);

        let disjoint = Multiname::Multiname { attribute: false, name_index: foo, namespace_set_index: bc };
        assert!(!qname.is_match(&disjoint, &pool)?);
        assert!(!disjoint.is_match(&qname, &pool)?);
        Ok(())
    }

    #[test]
    fn different_names_never_match() -> CoreResult<()> {
        let (mut pool, foo, a, b, _ab, _bc) = match_fixture();
        let bar = pool.intern_string("bar");
        let lhs = Multiname::QName { attribute: false, namespace_index: a, name_index: foo };
        let rhs = Multiname::QName { attribute: false, namespace_index: a, name_index: bar };
        assert!(!lhs.is_match(&rhs, &pool)?);
        // Same name, same kind, different namespace: no match either.
        let other_ns = Multiname::QName { attribute: false, namespace_index: b, name_index: foo };
        assert!(!lhs.is_match(&other_ns, &pool)?);
        Ok(())
    }

    #[test]
    fn other_kind_pairings_never_match() -> CoreResult<()> {
        let (pool, foo, a, _b, ab, _bc) = match_fixture();
        let rtq = Multiname::RTQName { attribute: false, name_index: foo };
        let qname = Multiname::QName { attribute: false, namespace_index: a, name_index: foo };
        let open = Multiname::Multiname { attribute: false, name_index: foo, namespace_set_index: ab };
        assert!(!rtq.is_match(&qname, &pool)?);
        assert!(!rtq.is_match(&open, &pool)?);
        // Attribute flavours are distinct kinds and excluded from the bridge.
        let qname_a = Multiname::QName { attribute: true, namespace_index: a, name_index: foo };
        assert!(!qname_a.is_match(&open, &pool)?);
        Ok(())
    }

    #[test]
    fn typename_equality_ignores_parameters() -> CoreResult<()> {
        let (mut pool, foo, a, _b, _ab, _bc) = match_fixture();
        let base = pool.add_multiname(Multiname::QName {
            attribute: false,
            namespace_index: a,
            name_index: foo,
        });
        let int_name = pool.intern_string("int");
        let int_ty = pool.add_multiname(Multiname::QName {
            attribute: false,
            namespace_index: a,
            name_index: int_name,
        });
        let lhs = Multiname::TypeName { qname_index: base, type_indices: vec![int_ty] };
        let rhs = Multiname::TypeName { qname_index: base, type_indices: vec![] };
        assert!(lhs.is_equivalent(&rhs, &pool)?);
        assert!(lhs.is_match(&rhs, &pool)?);
        Ok(())
    }

    #[test]
    fn typename_cycle_is_reported() {
        let mut pool = ConstantPool::new();
        // Entry 1 refers to itself.
        let idx = pool.add_multiname(Multiname::TypeName { qname_index: 1, type_indices: vec![] });
        assert_eq!(idx, 1);
        let err = pool.multiname(idx).unwrap().resolved_name(&pool).unwrap_err();
        assert_eq!(err, CoreError::corrupted("TypeName cycle in constant pool"));
    }
}
