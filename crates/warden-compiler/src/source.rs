//! # Rule Source Rewriting
//!
//! All scans run over the code view (strings and comments blanked), so
//! `"data.secret"` inside a message or a commented-out `package` line is
//! never mistaken for code. Functions here report failures as plain reasons;
//! the compiler attaches the template kind and target.

use std::ops::Range;

use warden_driver::rego::{code_view, find_package, is_dotted_path, is_ident_char};
use warden_driver::ModuleId;

/// Root data documents a rule may read.
const INVENTORY: &str = "inventory";
const LIB: &str = "lib";

/// Rewrite a main module: its package becomes `module`, and `data.lib.`
/// references point beneath `module`.
pub fn rewrite_main(source: &str, module: &ModuleId) -> Result<String, String> {
    let (_, span) = declared_package(source)?;
    rewrite(source, span, module.as_str(), module)
}

/// Rewrite a library module. Its package must be `lib.<name>`; it moves to
/// `<module>.lib.<name>`.
pub fn rewrite_lib(source: &str, module: &ModuleId) -> Result<(ModuleId, String), String> {
    let (path, span) = declared_package(source)?;
    let name = path
        .strip_prefix("lib.")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| format!("library package must start with `lib.`, found `{path}`"))?;
    let id = module.lib(name);
    let rewritten = rewrite(source, span, id.as_str(), module)?;
    Ok((id, rewritten))
}

/// Whether `entry_point` is defined as a top-level rule.
///
/// A definition starts a line (after indentation), sits outside any
/// brackets, and is followed by a rule-head continuation: `[`, `{`, `=`,
/// `:` or whitespace (`contains`, `if`).
pub fn defines_rule(source: &str, entry_point: &str) -> bool {
    let view = code_view(source);
    let bytes = view.as_bytes();
    let mut depth: i64 = 0;
    let mut line_start = true;

    for i in 0..bytes.len() {
        let b = bytes[i];
        if line_start && depth == 0 && bytes[i..].starts_with(entry_point.as_bytes()) {
            let next = bytes.get(i + entry_point.len()).copied();
            if matches!(
                next,
                None | Some(b'[' | b'{' | b'=' | b':' | b' ' | b'\t' | b'\r' | b'\n')
            ) {
                return true;
            }
        }
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        line_start = b == b'\n' || (line_start && (b == b' ' || b == b'\t'));
    }
    false
}

fn declared_package(source: &str) -> Result<(String, Range<usize>), String> {
    let decl = find_package(source).ok_or_else(|| "missing package declaration".to_string())?;
    if !is_dotted_path(&decl.path) {
        return Err(format!("package must be a dotted path of identifiers, found `{}`", decl.path));
    }
    Ok((decl.path, decl.span))
}

/// Replace the package path and every `data.lib` reference, rejecting any
/// other data reference.
fn rewrite(
    source: &str,
    package_span: Range<usize>,
    package: &str,
    lib_root: &ModuleId,
) -> Result<String, String> {
    let view = code_view(source);
    let mut edits: Vec<(Range<usize>, String)> = vec![(package_span.clone(), package.to_string())];

    for at in data_references(&view) {
        if package_span.contains(&at) {
            continue;
        }
        let bytes = view.as_bytes();
        let after = at + "data".len();
        if bytes.get(after) != Some(&b'.') {
            return Err("references to the data root are not allowed; use data.inventory or data.lib".to_string());
        }
        let segment_end = bytes[after + 1..]
            .iter()
            .position(|&c| !is_ident_char(c))
            .map_or(bytes.len(), |p| after + 1 + p);
        match &view[after + 1..segment_end] {
            INVENTORY => {}
            LIB => edits.push((at..segment_end, format!("data.{lib_root}.lib"))),
            other => return Err(format!("reference to data.{other} is not allowed")),
        }
    }

    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(source.len() + edits.len() * lib_root.as_str().len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&source[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

/// Offsets of every `data` token in the code view that starts a reference
/// (not preceded by an identifier character or `.`).
fn data_references(view: &str) -> Vec<usize> {
    let bytes = view.as_bytes();
    view.match_indices("data")
        .map(|(at, _)| at)
        .filter(|&at| {
            let before_ok = at == 0 || !(is_ident_char(bytes[at - 1]) || bytes[at - 1] == b'.');
            let after_ok = bytes.get(at + 4).map_or(true, |&c| !is_ident_char(c));
            before_ok && after_ok
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> ModuleId {
        ModuleId::new("templates.t1.K").unwrap()
    }

    #[test]
    fn rewrites_package_and_lib_references() {
        let source = "package k8srequired\nimport rego.v1\nimport data.lib.helpers\n\nviolation contains {\"msg\": \"data.lib.x\"} if {\n  data.lib.helpers.missing(input.review)\n}\n";
        let out = rewrite_main(source, &module()).unwrap();
        assert!(out.starts_with("package templates.t1.K\n"));
        assert!(out.contains("import data.templates.t1.K.lib.helpers\n"));
        assert!(out.contains("  data.templates.t1.K.lib.helpers.missing(input.review)"));
        assert!(out.contains("\"data.lib.x\""), "string literals are untouched");
    }

    #[test]
    fn allows_inventory() {
        let source = "package p\nviolation[{\"msg\": \"x\"}] { data.inventory.namespace[_] }\n";
        assert!(rewrite_main(source, &module()).is_ok());
    }

    #[test]
    fn rejects_foreign_data_references() {
        for source in [
            "package p\nviolation[{\"msg\": \"x\"}] { data.templates.t2.Other.violation[_] }\n",
            "package p\nviolation[{\"msg\": \"x\"}] { x := data; x }\n",
            "package p\nviolation[{\"msg\": \"x\"}] { data[\"templates\"] }\n",
        ] {
            assert!(rewrite_main(source, &module()).is_err(), "accepted {source:?}");
        }
    }

    #[test]
    fn identifiers_containing_data_are_not_references() {
        let source = "package p\nviolation[{\"msg\": \"x\"}] { metadata := input.review.metadata; data_x := 1; metadata; data_x }\n";
        assert!(rewrite_main(source, &module()).is_ok());
    }

    #[test]
    fn missing_or_invalid_package() {
        assert_eq!(
            rewrite_main("violation[x] { x := 1 }", &module()).unwrap_err(),
            "missing package declaration"
        );
        assert!(rewrite_main("package a[\"b\"]\n", &module()).is_err());
    }

    #[test]
    fn lib_packages_move_beneath_module() {
        let (id, out) = rewrite_lib(
            "package lib.helpers\nimport data.lib.strings\nmissing(x) if { not x }\n",
            &module(),
        )
        .unwrap();
        assert_eq!(id.as_str(), "templates.t1.K.lib.helpers");
        assert!(out.starts_with("package templates.t1.K.lib.helpers\n"));
        assert!(out.contains("import data.templates.t1.K.lib.strings\n"));
    }

    #[test]
    fn lib_package_must_start_with_lib() {
        let err = rewrite_lib("package helpers\n", &module()).unwrap_err();
        assert!(err.contains("lib."));
        assert!(rewrite_lib("package lib\n", &module()).is_err());
    }

    #[test]
    fn entry_point_forms() {
        for source in [
            "package p\nviolation[{\"msg\": m}] { m := \"x\" }\n",
            "package p\nimport rego.v1\nviolation contains {\"msg\": \"x\"} if { true }\n",
            "package p\n  violation contains r if { r := {} }\n",
            "package p\nviolation := []\n",
        ] {
            assert!(defines_rule(source, "violation"), "missed entry point in {source:?}");
        }
    }

    #[test]
    fn entry_point_lookalikes() {
        for source in [
            "package p\nviolations[x] { x := 1 }\n",
            "package p\n# violation[x] { x := 1 }\n",
            "package p\nmsg := `\nviolation[x] { x := 1 }`\n",
            "package p\nother[x] {\nviolation[x]\n}\n",
        ] {
            assert!(!defines_rule(source, "violation"), "false entry point in {source:?}");
        }
    }
}
