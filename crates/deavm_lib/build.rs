use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn workspace_root(crate_dir: &Path) -> PathBuf {
    crate_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("crate directory should be <root>/crates/<name>")
        .to_path_buf()
}

fn take_until_paren_close<'a>(s: &'a str) -> Option<&'a str> {
    let s = s.trim();
    let j = s.find(')')?;
    Some(s[..j].trim())
}

fn record_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let root = workspace_root(&manifest_dir);

    let def_path = root.join("avm1").join("avm1-actions.def");

    println!("cargo:rerun-if-changed={}", def_path.display());

    let def_src = fs::read_to_string(&def_path).expect("read avm1-actions.def");

    let mut fmts: Vec<String> = Vec::new();
    let mut ops: Vec<(String, u8, String)> = Vec::new();

    for line in def_src.lines() {
        let l = line.trim();
        if let Some(rest) = l.strip_prefix("FMT(") {
            let name = match take_until_paren_close(rest) {
                Some(v) => v,
                None => continue,
            };
            if !name.is_empty() {
                fmts.push(name.to_string());
            }
            continue;
        }

        let rest = match l.strip_prefix("DEF(") {
            Some(v) => v,
            None => continue,
        };
        let inner = match take_until_paren_close(rest) {
            Some(v) => v,
            None => continue,
        };
        let parts: Vec<&str> = inner.split(',').map(|p| p.trim()).collect();
        if parts.len() != 3 {
            continue;
        }
        let id = parts[0].to_string();
        let code_str = parts[1].strip_prefix("0x").expect("action code must be hex");
        let code = u8::from_str_radix(code_str, 16).expect("action code");
        let fmt = parts[2].to_string();
        if !fmts.contains(&fmt) {
            panic!("action {id} uses undeclared format {fmt}");
        }

        ops.push((id, code, fmt));
    }

    assert!(ops.len() < 0xff, "too many actions for the u8 index table");

    let mut index = [0xffu8; 256];
    for (i, (id, code, _)) in ops.iter().enumerate() {
        if index[*code as usize] != 0xff {
            panic!("duplicate action code 0x{code:02x} ({id})");
        }
        index[*code as usize] = i as u8;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let out_path = out_dir.join("avm1_tables.rs");

    let mut out = String::new();

    out.push_str("#[allow(non_camel_case_types)]\n");
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n");
    out.push_str("pub enum ActionFmt {\n");
    for f in &fmts {
        out.push_str(&format!("    {},\n", f.to_ascii_uppercase()));
    }
    out.push_str("}\n\n");

    out.push_str("#[derive(Debug, Clone, Copy)]\n");
    out.push_str("pub struct ActionInfo {\n");
    out.push_str("    pub name: &'static str,\n");
    out.push_str("    pub record_name: &'static str,\n");
    out.push_str("    pub code: u8,\n");
    out.push_str("    pub fmt: ActionFmt,\n");
    out.push_str("}\n\n");

    out.push_str("pub const ACTION_INFO: &[ActionInfo] = &[\n");
    for (id, code, fmt) in &ops {
        out.push_str(&format!(
            "    ActionInfo {{ name: \"{}\", record_name: \"{}\", code: 0x{:02x}, fmt: ActionFmt::{} }},\n",
            id,
            record_name(id),
            code,
            fmt.to_ascii_uppercase()
        ));
    }
    out.push_str("];\n\n");

    out.push_str("pub const ACTION_INDEX: [u8; 256] = [\n");
    for chunk in index.chunks(16) {
        let row: Vec<String> = chunk.iter().map(|v| format!("0x{v:02x}")).collect();
        out.push_str(&format!("    {},\n", row.join(", ")));
    }
    out.push_str("];\n");

    fs::write(out_path, out).expect("write generated avm1 tables");
}
