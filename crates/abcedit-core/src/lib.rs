//! abcedit-core — primitives partagées (no_std-ready)
//!
//! Fournit :
//! - IO mémoire séquentielle : `ByteWriter`, `ByteReader`
//! - Varint U30 (LEB128-like, 7 bits utiles par octet, ≤ 5 octets)
//! - Offsets de branchement s24 (3 octets signés, little-endian)
//! - Chaînes préfixées U30 (UTF-8)
//! - Erreurs `CoreError` + alias `CoreResult<T>`
//!
//! Features :
//! - `std` (par défaut) : impl `std::error::Error` & tests
//! - `serde` : derive (dé)sérialisation sur les structures utiles

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/* ─────────────────────────── Imports ─────────────────────────── */

use core::fmt;

#[cfg(feature = "std")]
use std::{borrow::Cow, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{borrow::Cow, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au core.
pub type CoreResult<T> = core::result::Result<T, CoreError>;

/* ─────────────────────────── Varint U30 ─────────────────────────── */

/// Nombre maximal d'octets d'un varint U30 (5 × 7 bits ≥ 32 bits utiles).
pub const U30_MAX_BYTES: usize = 5;

/// Encode une valeur en varint U30 minimal (aucun padding).
pub fn encode_u30(value: u32) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u30(value);
    w.into_vec()
}

/// Décode un varint U30 en tête de `data`, renvoie `(valeur, octets consommés)`.
///
/// Accepte les encodages non minimaux (octets de padding à zéro) : seule la
/// propriété `decode(encode(x)) == x` est garantie, pas la bijection.
pub fn decode_u30(data: &[u8]) -> CoreResult<(u32, usize)> {
    let mut r = ByteReader::new(data);
    let value = r.read_u30()?;
    Ok((value, r.offset()))
}

/* ─────────────────────────── Byte Writer ─────────────────────────── */

/// Buffer d'écriture séquentiel (croît automatiquement).
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Crée un writer vide.
    pub fn new() -> Self { Self { buf: Vec::new() } }
    /// Accès en lecture au contenu.
    pub fn as_slice(&self) -> &[u8] { &self.buf }
    /// Récupère le buffer (consomme).
    pub fn into_vec(self) -> Vec<u8> { self.buf }
    /// Ajoute des octets bruts.
    pub fn write_bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }
    /// Écrit un octet.
    pub fn write_u8(&mut self, v: u8) { self.buf.push(v); }

    /// Écrit un varint U30 minimal (groupes de 7 bits, bit 0x80 = continuation).
    pub fn write_u30(&mut self, mut v: u32) {
        loop {
            let group = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(group);
                return;
            }
            self.buf.push(group | 0x80);
        }
    }

    /// Écrit un offset de branchement s24 (3 octets signés, little-endian).
    pub fn write_i24(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes()[..3]);
    }

    /// Écrit une chaîne préfixée par sa longueur en U30.
    pub fn write_str(&mut self, s: &str) {
        self.write_u30(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/* ─────────────────────────── Byte Reader ─────────────────────────── */

/// Lecteur séquentiel sur un slice d'octets.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> ByteReader<'a> {
    /// Construit un lecteur.
    pub fn new(data: &'a [u8]) -> Self { Self { data, off: 0 } }
    /// Offset courant.
    pub fn offset(&self) -> usize { self.off }
    /// Taille restante.
    pub fn remaining(&self) -> usize { self.data.len().saturating_sub(self.off) }

    /// Lit `n` octets (ou erreur si EOF).
    pub fn read_bytes(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CoreError::UnexpectedEof { needed: n as u64, at: self.off as u64 });
        }
        let start = self.off;
        self.off += n;
        Ok(&self.data[start..self.off])
    }

    /// Lit un octet.
    pub fn read_u8(&mut self) -> CoreResult<u8> {
        let b = self.read_bytes(1)?;
        Ok(b[0])
    }

    /// Lit un varint U30.
    ///
    /// Chaque octet contribue ses 7 bits de poids faible au décalage `7*i`,
    /// tant que le bit 0x80 est levé. Les bits du dernier octet dépassant
    /// 32 bits sont ignorés (lecture permissive). Un 6e octet de
    /// continuation échoue avec [`CoreError::MalformedVarint`].
    pub fn read_u30(&mut self) -> CoreResult<u32> {
        let start = self.off;
        let mut value: u32 = 0;
        for i in 0..U30_MAX_BYTES {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << (7 * i as u32);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CoreError::MalformedVarint { at: start as u64 })
    }

    /// Lit un offset de branchement s24 (3 octets, extension de signe).
    pub fn read_i24(&mut self) -> CoreResult<i32> {
        let b = self.read_bytes(3)?;
        let raw = i32::from(b[0]) | i32::from(b[1]) << 8 | i32::from(b[2]) << 16;
        Ok(raw << 8 >> 8)
    }

    /// Lit une chaîne UTF-8 préfixée par sa longueur en U30.
    pub fn read_str(&mut self) -> CoreResult<&'a str> {
        let len = self.read_u30()? as usize;
        let bytes = self.read_bytes(len)?;
        core::str::from_utf8(bytes).map_err(|_| CoreError::InvalidUtf8)
    }
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de bas niveau communes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoreError {
    /// Varint U30 sans terminaison après 5 octets.
    MalformedVarint { /// Offset du premier octet du varint.
        at: u64
    },
    /// Fin de buffer inattendue.
    UnexpectedEof { /// Nombre d'octets manquants.
        needed: u64, /// Offset où l'erreur s'est produite.
        at: u64
    },
    /// UTF-8 invalide.
    InvalidUtf8,
    /// Référence hors des bornes d'une table du pool.
    IndexOutOfRange { /// Index fautif.
        index: u32, /// Taille de la table visée.
        len: u32
    },
    /// Tag de namespace inconnu (décodage fermé).
    InvalidNamespaceKind { /// Valeur brute du tag.
        raw: u8
    },
    /// Tag de multiname inconnu (décodage fermé).
    InvalidMultinameKind { /// Valeur brute du tag.
        raw: u8
    },
    /// Opcode hors catalogue.
    UnknownOpcode { /// Octet d'opcode fautif.
        opcode: u8, /// Offset de l'instruction.
        at: u64
    },
    /// Données corrompues (structure incohérente).
    Corrupted(Cow<'static, str>),
}

impl CoreError {
    /// Construit une erreur « corrompu ».
    pub fn corrupted(msg: impl Into<Cow<'static, str>>) -> Self { CoreError::Corrupted(msg.into()) }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::MalformedVarint { at } => write!(f, "malformed u30 varint at offset {at}"),
            CoreError::UnexpectedEof { needed, at } => write!(f, "unexpected EOF: need {needed} bytes at {at}"),
            CoreError::InvalidUtf8 => write!(f, "invalid utf-8"),
            CoreError::IndexOutOfRange { index, len } => write!(f, "pool index {index} out of range (table len {len})"),
            CoreError::InvalidNamespaceKind { raw } => write!(f, "invalid namespace kind: 0x{raw:02X}"),
            CoreError::InvalidMultinameKind { raw } => write!(f, "invalid multiname kind: 0x{raw:02X}"),
            CoreError::UnknownOpcode { opcode, at } => write!(f, "unknown opcode 0x{opcode:02X} at offset {at}"),
            CoreError::Corrupted(msg) => write!(f, "corrupted: {msg}"),
        }
    }
}

/// Implémente `std::error::Error` uniquement avec la feature `std`.
#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        decode_u30, encode_u30, ByteReader, ByteWriter, CoreError, CoreResult, U30_MAX_BYTES,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn u30_roundtrip_boundaries() -> CoreResult<()> {
        for &x in &[0u32, 1, 127, 128, 16383, 16384, (1 << 28) - 1, u32::MAX] {
            let bytes = encode_u30(x);
            let (back, used) = decode_u30(&bytes)?;
            assert_eq!(back, x);
            assert_eq!(used, bytes.len());
        }
        Ok(())
    }

    #[test]
    fn u30_minimal_lengths() {
        assert_eq!(encode_u30(0), vec![0x00]);
        assert_eq!(encode_u30(127), vec![0x7F]);
        assert_eq!(encode_u30(128), vec![0x81, 0x01]);
        assert_eq!(encode_u30(u32::MAX).len(), 5);
    }

    #[test]
    fn u30_accepts_padded_encoding() -> CoreResult<()> {
        // 1 encodé sur deux octets (continuation + groupe nul)
        let (v, used) = decode_u30(&[0x81, 0x00])?;
        assert_eq!(v, 1);
        assert_eq!(used, 2);
        // 300 = 0b10_0101100, padding d'un groupe nul supplémentaire
        let (v, used) = decode_u30(&[0xAC, 0x82, 0x00])?;
        assert_eq!(v, 300);
        assert_eq!(used, 3);
        Ok(())
    }

    #[test]
    fn u30_rejects_overlong_continuation() {
        let err = decode_u30(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]).unwrap_err();
        assert_eq!(err, CoreError::MalformedVarint { at: 0 });
    }

    #[test]
    fn u30_eof_mid_varint() {
        let err = decode_u30(&[0x80]).unwrap_err();
        assert_eq!(err, CoreError::UnexpectedEof { needed: 1, at: 1 });
    }

    #[test]
    fn i24_roundtrip() -> CoreResult<()> {
        for &x in &[0i32, 1, -1, 0x7F_FFFF, -0x80_0000, 1234, -56789] {
            let mut w = ByteWriter::new();
            w.write_i24(x);
            assert_eq!(w.as_slice().len(), 3);
            let mut r = ByteReader::new(w.as_slice());
            assert_eq!(r.read_i24()?, x);
        }
        Ok(())
    }

    #[test]
    fn str_roundtrip() -> CoreResult<()> {
        let mut w = ByteWriter::new();
        w.write_str("flash.display");
        w.write_str("");
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(r.read_str()?, "flash.display");
        assert_eq!(r.read_str()?, "");
        assert_eq!(r.remaining(), 0);
        Ok(())
    }

    #[test]
    fn str_rejects_invalid_utf8() {
        let mut r = ByteReader::new(&[0x02, 0xFF, 0xFE]);
        assert_eq!(r.read_str().unwrap_err(), CoreError::InvalidUtf8);
    }

    #[cfg(feature = "std")]
    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn u30_roundtrip_all(x in any::<u32>()) {
                let bytes = encode_u30(x);
                prop_assert!(bytes.len() <= U30_MAX_BYTES);
                let (back, used) = decode_u30(&bytes).unwrap();
                prop_assert_eq!(back, x);
                prop_assert_eq!(used, bytes.len());
            }
        }
    }
}
