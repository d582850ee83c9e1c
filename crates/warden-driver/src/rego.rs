//! # Rego Source Utilities
//!
//! Lexical helpers shared by the store and the template compiler. The
//! central tool is the *code view*: a copy of the source with string
//! literals and comments blanked to spaces at the same byte offsets, so
//! structural scans never trip over text inside strings or comments and
//! every offset found in the view applies to the original source.

use std::ops::Range;

use crate::error::describe;

/// Blank string literals and comments, keeping byte offsets and newlines.
pub fn code_view(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out.push(b' ');
                    i += 1;
                }
            }
            b'"' => {
                out.push(b' ');
                i += 1;
                while i < bytes.len() {
                    let b = bytes[i];
                    if b == b'\\' && i + 1 < bytes.len() {
                        out.push(b' ');
                        out.push(blank(bytes[i + 1]));
                        i += 2;
                        continue;
                    }
                    out.push(blank(b));
                    i += 1;
                    if b == b'"' || b == b'\n' {
                        break;
                    }
                }
            }
            b'`' => {
                out.push(b' ');
                i += 1;
                while i < bytes.len() {
                    let b = bytes[i];
                    out.push(blank(b));
                    i += 1;
                    if b == b'`' {
                        break;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Only ASCII spaces replace bytes and code bytes are copied whole, so the
    // output is valid UTF-8 of the same length.
    String::from_utf8_lossy(&out).into_owned()
}

fn blank(b: u8) -> u8 {
    if b == b'\n' {
        b'\n'
    } else {
        b' '
    }
}

/// Whether `c` may appear inside a Rego identifier.
pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Whether `path` is a non-empty dotted path of identifiers (`a.b.c`).
pub fn is_dotted_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            let bytes = segment.as_bytes();
            matches!(bytes.first(), Some(c) if c.is_ascii_alphabetic() || *c == b'_')
                && bytes.iter().all(|&c| is_ident_char(c))
        })
}

/// A `package` declaration found in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    /// The declared path, exactly as written (trimmed).
    pub path: String,
    /// Byte range of the path in the source.
    pub span: Range<usize>,
}

/// Find the first `package` declaration in `source`.
pub fn find_package(source: &str) -> Option<PackageDecl> {
    let view = code_view(source);
    let mut offset = 0;
    for line in view.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        if let Some(after) = rest.strip_prefix("package") {
            if after.starts_with(|c: char| c.is_ascii_whitespace()) {
                let lead = after.len() - after.trim_start().len();
                let path = after.trim();
                if !path.is_empty() {
                    let start = offset + indent + "package".len() + lead;
                    return Some(PackageDecl {
                        path: path.to_string(),
                        span: start..start + path.len(),
                    });
                }
            }
        }
        offset += line.len();
    }
    None
}

/// A source that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// The name the source was registered under.
    pub path: String,
    /// Parser diagnostic.
    pub reason: String,
}

/// Parse `sources` (`(name, text)` pairs) together in a scratch engine.
pub fn check_syntax<'a, I>(sources: I) -> Result<(), SyntaxError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut engine = regorus::Engine::new();
    for (path, text) in sources {
        engine
            .add_policy(path.to_string(), text.to_string())
            .map_err(|err| SyntaxError {
                path: path.to_string(),
                reason: describe(&err),
            })?;
    }
    Ok(())
}
