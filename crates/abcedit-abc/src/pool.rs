//! The constant pool: four position-addressed, append-ordered tables.
//!
//! Entry 0 of each table is a reserved sentinel (empty string, wildcard
//! namespace, empty set, wildcard name) that well-formed content never
//! addresses as a real entry. Entries reference each other by index only, so
//! the pool serializes independently of traversal order and appending new
//! entries never invalidates existing indices.

use abcedit_core::{ByteReader, ByteWriter, CoreError, CoreResult};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::multiname::Multiname;
use crate::namespace::{Namespace, NamespaceSet};

/// The interned tables of one program unit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstantPool {
    strings: Vec<String>,
    namespaces: Vec<Namespace>,
    namespace_sets: Vec<NamespaceSet>,
    multinames: Vec<Multiname>,
}

impl Default for ConstantPool {
    fn default() -> Self { Self::new() }
}

impl ConstantPool {
    /// Create a pool holding only the four sentinel entries.
    pub fn new() -> Self {
        Self {
            strings: vec![String::new()],
            namespaces: vec![Namespace::ANY],
            namespace_sets: vec![NamespaceSet::default()],
            multinames: vec![Multiname::ANY],
        }
    }

    /* ───────────── accessors ───────────── */

    /// Look up a string by index.
    pub fn string(&self, index: u32) -> CoreResult<&str> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(CoreError::IndexOutOfRange { index, len: self.strings.len() as u32 })
    }

    /// Look up a namespace by index.
    pub fn namespace(&self, index: u32) -> CoreResult<&Namespace> {
        self.namespaces
            .get(index as usize)
            .ok_or(CoreError::IndexOutOfRange { index, len: self.namespaces.len() as u32 })
    }

    /// Look up a namespace set by index.
    pub fn namespace_set(&self, index: u32) -> CoreResult<&NamespaceSet> {
        self.namespace_sets
            .get(index as usize)
            .ok_or(CoreError::IndexOutOfRange { index, len: self.namespace_sets.len() as u32 })
    }

    /// Look up a multiname by index.
    pub fn multiname(&self, index: u32) -> CoreResult<&Multiname> {
        self.multinames
            .get(index as usize)
            .ok_or(CoreError::IndexOutOfRange { index, len: self.multinames.len() as u32 })
    }

    /// Number of string entries (sentinel included).
    pub fn string_count(&self) -> u32 { self.strings.len() as u32 }
    /// Number of namespace entries (sentinel included).
    pub fn namespace_count(&self) -> u32 { self.namespaces.len() as u32 }
    /// Number of namespace-set entries (sentinel included).
    pub fn namespace_set_count(&self) -> u32 { self.namespace_sets.len() as u32 }
    /// Number of multiname entries (sentinel included).
    pub fn multiname_count(&self) -> u32 { self.multinames.len() as u32 }

    /* ───────────── appenders ─────────────
     *
     * Growth is monotonic within an edit session: nothing is ever removed,
     * so a reassembled unit may carry dead entries. Accepted trade-off —
     * compaction would invalidate every existing index.
     */

    /// Return the index of `value`, appending it only when absent.
    pub fn intern_string(&mut self, value: &str) -> u32 {
        if let Some(pos) = self.strings.iter().position(|s| s == value) {
            return pos as u32;
        }
        self.add_string(value)
    }

    /// Append a string without interning and return its index.
    pub fn add_string(&mut self, value: &str) -> u32 {
        self.strings.push(value.to_owned());
        (self.strings.len() - 1) as u32
    }

    /// Append a namespace and return its index.
    pub fn add_namespace(&mut self, ns: Namespace) -> u32 {
        self.namespaces.push(ns);
        (self.namespaces.len() - 1) as u32
    }

    /// Append a namespace set and return its index.
    pub fn add_namespace_set(&mut self, set: NamespaceSet) -> u32 {
        self.namespace_sets.push(set);
        (self.namespace_sets.len() - 1) as u32
    }

    /// Append a multiname and return its index.
    pub fn add_multiname(&mut self, mn: Multiname) -> u32 {
        self.multinames.push(mn);
        (self.multinames.len() - 1) as u32
    }

    /* ───────────── wire protocol ───────────── */

    /// Decode a pool from its wire form.
    ///
    /// Table order is fixed: strings, namespaces, namespace sets, multinames.
    /// Each table is prefixed by a U30 count; entry 0 is implicit, so counts
    /// `0` and `1` both decode to a sentinel-only table. A multiname may
    /// reference a multiname defined later in the same table (`TypeName`);
    /// such forward references stay indices and resolve lazily.
    pub fn read_from(r: &mut ByteReader<'_>) -> CoreResult<Self> {
        let mut pool = Self::new();

        let count = r.read_u30()?;
        for _ in 1..count {
            let s = r.read_str()?;
            pool.strings.push(s.to_owned());
        }

        let count = r.read_u30()?;
        for _ in 1..count {
            let ns = Namespace::read_from(r)?;
            pool.namespaces.push(ns);
        }

        let count = r.read_u30()?;
        for _ in 1..count {
            let set = NamespaceSet::read_from(r)?;
            pool.namespace_sets.push(set);
        }

        let count = r.read_u30()?;
        for _ in 1..count {
            let mn = Multiname::read_from(r)?;
            pool.multinames.push(mn);
        }

        debug!(
            strings = pool.strings.len(),
            namespaces = pool.namespaces.len(),
            namespace_sets = pool.namespace_sets.len(),
            multinames = pool.multinames.len(),
            "decoded constant pool"
        );
        Ok(pool)
    }

    /// Encode the pool, byte-exact inverse of [`ConstantPool::read_from`]
    /// for compiler-produced input (sentinel-only tables re-encode with
    /// count 0, the form real toolchains emit).
    pub fn write_to(&self, w: &mut ByteWriter) {
        w.write_u30(table_count(self.strings.len()));
        for s in &self.strings[1..] {
            w.write_str(s);
        }

        w.write_u30(table_count(self.namespaces.len()));
        for ns in &self.namespaces[1..] {
            ns.write_to(w);
        }

        w.write_u30(table_count(self.namespace_sets.len()));
        for set in &self.namespace_sets[1..] {
            set.write_to(w);
        }

        w.write_u30(table_count(self.multinames.len()));
        for mn in &self.multinames[1..] {
            mn.write_to(w);
        }
    }

    /// Encode to a fresh byte buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.write_to(&mut w);
        w.into_vec()
    }

    /// Decode from a byte buffer, requiring it to be fully consumed.
    pub fn from_bytes(data: &[u8]) -> CoreResult<Self> {
        let mut r = ByteReader::new(data);
        let pool = Self::read_from(&mut r)?;
        if r.remaining() != 0 {
            return Err(CoreError::corrupted("trailing bytes after constant pool"));
        }
        Ok(pool)
    }
}

fn table_count(len: usize) -> u32 {
    if len <= 1 { 0 } else { len as u32 }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceKind;
    use pretty_assertions::assert_eq;

    fn sample_pool() -> ConstantPool {
        let mut pool = ConstantPool::new();
        let display = pool.intern_string("flash.display");
        let sprite = pool.intern_string("Sprite");
        let ns = pool.add_namespace(Namespace { kind: NamespaceKind::Package, name_index: display });
        let set = pool.add_namespace_set(NamespaceSet { namespace_indices: vec![ns] });
        pool.add_multiname(Multiname::QName {
            attribute: false,
            namespace_index: ns,
            name_index: sprite,
        });
        pool.add_multiname(Multiname::Multiname {
            attribute: false,
            name_index: sprite,
            namespace_set_index: set,
        });
        pool
    }

    #[test]
    fn sentinels_are_always_valid() -> CoreResult<()> {
        let pool = ConstantPool::new();
        assert_eq!(pool.string(0)?, "");
        assert_eq!(pool.namespace(0)?, &Namespace::ANY);
        assert!(pool.namespace_set(0)?.namespace_indices.is_empty());
        assert_eq!(pool.multiname(0)?, &Multiname::ANY);
        Ok(())
    }

    #[test]
    fn out_of_range_lookup_fails() {
        let pool = ConstantPool::new();
        assert_eq!(
            pool.string(7).unwrap_err(),
            CoreError::IndexOutOfRange { index: 7, len: 1 }
        );
        assert_eq!(
            pool.multiname(1).unwrap_err(),
            CoreError::IndexOutOfRange { index: 1, len: 1 }
        );
    }

    #[test]
    fn intern_string_reuses_entries() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_string("toString");
        let b = pool.intern_string("toString");
        assert_eq!(a, b);
        // The sentinel empty string is interned at index 0.
        assert_eq!(pool.intern_string(""), 0);
        // A plain append never dedupes.
        let c = pool.add_string("toString");
        assert_ne!(a, c);
    }

    #[test]
    fn appending_keeps_existing_indices_stable() -> CoreResult<()> {
        let mut pool = sample_pool();
        let before: Vec<String> = (0..pool.multiname_count())
            .map(|i| format!("{:?}", pool.multiname(i).unwrap()))
            .collect();

        let extra = pool.intern_string("Extra");
        pool.add_multiname(Multiname::RTQName { attribute: false, name_index: extra });

        for (i, snapshot) in before.iter().enumerate() {
            assert_eq!(&format!("{:?}", pool.multiname(i as u32)?), snapshot);
        }
        Ok(())
    }

    #[test]
    fn wire_roundtrip_is_byte_exact() -> CoreResult<()> {
        let pool = sample_pool();
        let bytes = pool.to_bytes();
        let back = ConstantPool::from_bytes(&bytes)?;
        assert_eq!(back, pool);
        assert_eq!(back.to_bytes(), bytes);
        Ok(())
    }

    #[test]
    fn empty_pool_roundtrips_with_zero_counts() -> CoreResult<()> {
        let pool = ConstantPool::new();
        let bytes = pool.to_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        let back = ConstantPool::from_bytes(&bytes)?;
        assert_eq!(back, pool);
        // Count 1 is the other legal spelling of a sentinel-only table.
        let alt = ConstantPool::from_bytes(&[1, 1, 1, 1])?;
        assert_eq!(alt, pool);
        Ok(())
    }

    #[test]
    fn forward_typename_reference_resolves_lazily() -> CoreResult<()> {
        let mut pool = ConstantPool::new();
        let vector = pool.intern_string("Vector");
        let ns = pool.add_namespace(Namespace { kind: NamespaceKind::Package, name_index: 0 });
        // TypeName at index 1 referencing the qname at index 2, defined later.
        let tn = pool.add_multiname(Multiname::TypeName { qname_index: 2, type_indices: vec![] });
        pool.add_multiname(Multiname::QName {
            attribute: false,
            namespace_index: ns,
            name_index: vector,
        });

        let bytes = pool.to_bytes();
        let back = ConstantPool::from_bytes(&bytes)?;
        assert_eq!(back.multiname(tn)?.resolved_name(&back)?, "Vector");
        Ok(())
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = ConstantPool::new().to_bytes();
        bytes.push(0xFF);
        assert_eq!(
            ConstantPool::from_bytes(&bytes).unwrap_err(),
            CoreError::corrupted("trailing bytes after constant pool")
        );
    }
}
