//! Minimal textual disassembly helpers used by CLI tooling and tests.

use core::fmt::Write;

use abcedit_abc::{ConstantPool, Multiname};

use crate::instruction::Instruction;

/// Produce a multi-line, human readable disassembly with pool metadata.
///
/// Program counters are byte offsets into the encoded form, so branch
/// targets can be chased by eye against the listed offsets.
pub fn disassemble_full(code: &[Instruction], pool: &ConstantPool, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== {title} == (strings={}, namespaces={}, sets={}, multinames={}, ops={})",
        pool.string_count(),
        pool.namespace_count(),
        pool.namespace_set_count(),
        pool.multiname_count(),
        code.len()
    );
    let _ = writeln!(out, ";; ops");
    out.push_str(&disassemble_compact(code, pool));
    out
}

/// One-line-per-op listing, `{pc:04}: {op:?} ;; preview`.
pub fn disassemble_compact(code: &[Instruction], pool: &ConstantPool) -> String {
    let mut out = String::new();
    let mut pc = 0usize;
    for ins in code {
        match preview(ins, pool) {
            Some(p) => {
                let _ = writeln!(out, "{pc:04}: {ins:?} ;; {p}");
            }
            None => {
                let _ = writeln!(out, "{pc:04}: {ins:?}");
            }
        }
        pc += encoded_len(ins);
    }
    out
}

fn encoded_len(ins: &Instruction) -> usize {
    let mut w = abcedit_core::ByteWriter::new();
    ins.write_to(&mut w);
    w.as_slice().len()
}

fn preview(ins: &Instruction, pool: &ConstantPool) -> Option<String> {
    use Instruction as I;
    match ins {
        I::PushString { string_index } | I::DebugFile { string_index } => {
            show_string(pool, *string_index)
        }
        I::IsType { multiname_index }
        | I::AsType { multiname_index }
        | I::Coerce { multiname_index }
        | I::GetProperty { multiname_index }
        | I::SetProperty { multiname_index }
        | I::InitProperty { multiname_index }
        | I::DeleteProperty { multiname_index }
        | I::FindProperty { multiname_index }
        | I::FindPropStrict { multiname_index }
        | I::GetLex { multiname_index }
        | I::GetDescendants { multiname_index }
        | I::GetSuper { multiname_index }
        | I::SetSuper { multiname_index }
        | I::CallProperty { multiname_index, .. }
        | I::CallPropLex { multiname_index, .. }
        | I::CallPropVoid { multiname_index, .. }
        | I::CallSuper { multiname_index, .. }
        | I::CallSuperVoid { multiname_index, .. }
        | I::ConstructProp { multiname_index, .. } => show_multiname(pool, *multiname_index),
        _ => None,
    }
}

fn show_string(pool: &ConstantPool, index: u32) -> Option<String> {
    let s = pool.string(index).ok()?;
    if s.len() <= 64 {
        return Some(format!("\"{s}\""));
    }
    // Back off to a char boundary so the cut never splits a code point.
    let mut cut = 64;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    Some(format!("\"{}…\"", &s[..cut]))
}

fn show_multiname(pool: &ConstantPool, index: u32) -> Option<String> {
    let mn = pool.multiname(index).ok()?;
    let name = mn.resolved_name(pool).ok()?;
    match mn {
        Multiname::QName { namespace_index, .. } => {
            let ns = pool.namespace(*namespace_index).ok()?;
            let ns_name = ns.name(pool).ok()?;
            if ns_name.is_empty() {
                Some(name.to_owned())
            } else {
                Some(format!("{ns_name}::{name}"))
            }
        }
        _ => Some(name.to_owned()),
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
