//! Stub discovery with tree-sitter.
//!
//! Finds functions whose body raises the "not implemented" marker so a
//! completion prompt can name exactly what to fill in. Best effort: an
//! unsupported language or unparsable source yields no sites.

use tree_sitter::{Language, Node, Parser};

/// Error text marker for an unimplemented stub.
pub const STUB_MARKER: &str = "NotImplementedError";

/// A function whose body raises [`STUB_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubSite {
    pub name: String,
    /// 1-based line of the `def`.
    pub line: usize,
}

/// Tree-sitter grammar for a configured language name.
pub fn grammar(language: &str) -> Option<Language> {
    match language {
        "python" | "py" => Some(tree_sitter_python::LANGUAGE.into()),
        _ => None,
    }
}

pub fn find_stubs(language: &str, source: &str) -> Vec<StubSite> {
    let Some(lang) = grammar(language) else {
        return Vec::new();
    };
    let mut parser = Parser::new();
    if parser.set_language(&lang).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(source, None) else {
        return Vec::new();
    };

    let mut sites = Vec::new();
    collect(tree.root_node(), source.as_bytes(), &mut sites);
    sites
}

fn collect(node: Node, src: &[u8], out: &mut Vec<StubSite>) {
    if node.kind() == "function_definition" {
        let name = node.child_by_field_name("name");
        let body = node.child_by_field_name("body");
        if let (Some(name), Some(body)) = (name, body) {
            if raises_marker(body, src) {
                if let Ok(text) = name.utf8_text(src) {
                    out.push(StubSite {
                        name: text.to_string(),
                        line: node.start_position().row + 1,
                    });
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect(child, src, out);
    }
}

/// Does this block raise the marker, not counting nested definitions?
fn raises_marker(node: Node, src: &[u8]) -> bool {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" | "class_definition" => {}
            "raise_statement" => {
                let text = child.utf8_text(src).unwrap_or_default();
                if text.contains(STUB_MARKER) {
                    return true;
                }
            }
            _ => {
                if raises_marker(child, src) {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
def quicksort(arr):
    # Sort ascending, recursively.
    raise NotImplementedError("TODO: implement")

def helper(x):
    return x * 2

class Store:
    def load(self, key):
        if key:
            raise NotImplementedError
        return None

    def save(self, key):
        raise ValueError("nope")

if __name__ == "__main__":
    print(quicksort([3, 1, 2]))
"#;

    #[test]
    fn finds_top_level_and_nested_stubs() {
        let stubs = find_stubs("python", SOURCE);
        let names: Vec<&str> = stubs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["quicksort", "load"]);
        assert_eq!(stubs[0].line, 2);
        assert_eq!(stubs[1].line, 10);
    }

    #[test]
    fn ignores_other_exceptions() {
        let stubs = find_stubs("python", "def f():\n    raise ValueError('x')\n");
        assert!(stubs.is_empty());
    }

    #[test]
    fn nested_def_does_not_mark_outer() {
        let src = "def outer():\n    def inner():\n        raise NotImplementedError\n    return inner\n";
        let stubs = find_stubs("python", src);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].name, "inner");
    }

    #[test]
    fn unsupported_language_is_empty() {
        assert!(find_stubs("cobol", SOURCE).is_empty());
        assert!(grammar("rust").is_none());
    }

    #[test]
    fn broken_source_does_not_panic() {
        let stubs = find_stubs("python", "def f(:\n    raise NotImplementedError\n");
        // Error recovery may or may not keep the def; either way no panic.
        assert!(stubs.len() <= 1);
    }
}
