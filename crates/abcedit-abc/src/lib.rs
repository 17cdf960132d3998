//! abcedit-abc — Pool de constantes ABC & résolution de noms
//!
//! Forme binaire consommée depuis le conteneur englobant :
//!
//! ```text
//! pool = [string_count: U30][string]*        string = [len: U30][utf8]
//!        [ns_count: U30][namespace]*         namespace = [kind: u8][name: U30]
//!        [set_count: U30][namespace_set]*    set = [count: U30][ns: U30]*count
//!        [mn_count: U30][multiname]*         multiname = [kind: u8][champs...]
//! ```
//!
//! L'entrée 0 de chaque table est une sentinelle implicite (chaîne vide,
//! namespace joker, ensemble vide, nom joker) ; les comptes 0 et 1 décodent
//! tous deux vers une table « sentinelle seule ».
//!
//! API :
//! - [`ConstantPool`] : accès indexé, ajout monotone, `read_from`/`write_to`
//! - [`Namespace`], [`NamespaceSet`] : modèle typé + dérivation AS3
//! - [`Multiname`] : union fermée à 11 formes, prédicats dérivés, `is_match`
//!
//! Le réencodage d'un pool non modifié est garanti identique octet pour
//! octet à l'entrée d'origine (exigence dure, pas best-effort).

#![deny(missing_docs)]

pub mod multiname;
pub mod namespace;
pub mod pool;

pub use multiname::{Multiname, MultinameKind};
pub use namespace::{Namespace, NamespaceKind, NamespaceSet};
pub use pool::ConstantPool;
