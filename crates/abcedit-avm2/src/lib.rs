//! abcedit-avm2 — Catalogue d'instructions AVM2 & machine à pile
//!
//! Objectif : offrir une **représentation typée** du flot d'instructions des
//! corps de méthodes, assez fidèle pour réencoder octet pour octet, assez
//! riche pour l'outillage (réécriture, repliage de constantes, listing).
//!
//! - [`Instruction`] : union fermée, un variant par opcode du catalogue
//! - [`instruction::read_code`] / [`instruction::write_code`] : blob ↔ `Vec<Instruction>`
//! - `pop_count` / `push_count` : arités de pile, dérivées des opérandes
//! - [`Machine`] : pile d'opérandes dynamique, exécution du sous-ensemble
//!   outillage (littéraux, arithmétique, comparaisons, conversions)
//! - [`disasm`] : listing textuel avec aperçus résolus via le pool
//!
//! ⚠️ Ce crate **n'interprète pas** un programme complet : pas de scopes, pas
//! d'objets, pas de liaison de propriétés. Les variants hors sous-ensemble
//! refusent l'exécution avec [`MachineError::Unsupported`].

#![deny(missing_docs)]

pub mod disasm;
pub mod instruction;
pub mod machine;

pub use disasm::{disassemble_compact, disassemble_full};
pub use instruction::{read_code, write_code, Instruction};
pub use machine::{Machine, MachineError, Value};
