//! `@symbol` source translator
//!
//! Rewrites the terse symbol notation into explicit [`Symbol`] calls and
//! declares every symbol it meets:
//!
//! ```text
//! @name            s::NAME
//! obj@name         s::NAME.member_access(&obj)
//! obj@name()       s::NAME.method_call(&obj, ())
//! obj@name(a, b)   s::NAME.method_call(&obj, (a, b,))
//! ```
//!
//! Text inside double-quoted string literals and after `//` is left alone.
//! The `@` must touch both the object and the symbol (`x @ pat` bindings
//! are untouched), and a call's argument list must close on its own line.
//!
//! Scanning is line by line. Multi-line string literals (raw strings
//! included) and `/* */` block comments are not tracked, so references on
//! their continuation lines are rewritten like code.

use linq_core::Symbol;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;
use thiserror::Error;

/// First line of every generated file
pub const HEADER: &str = "// Generated by linqc.";

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<obj>[A-Za-z_][A-Za-z0-9_]*(?:(?:\.|::)[A-Za-z_][A-Za-z0-9_]*)*)?@(?P<sym>[A-Za-z0-9_]+)",
    )
    .expect("reference pattern is valid")
});

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"pub const (?P<konst>[A-Z0-9_]+): Symbol = Symbol::from_static\("(?P<sym>[A-Za-z0-9_]+)"\);"#)
        .expect("declaration pattern is valid")
});

/// Translation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// `obj@name(` without a closing parenthesis on the same line
    #[error("line {line}, column {column}: unterminated argument list")]
    UnterminatedCall {
        /// 1-based line
        line: usize,
        /// 1-based column of the opening parenthesis
        column: usize,
    },

    /// Two symbols map to the same constant name
    #[error("symbols '{first}' and '{second}' both map to constant {constant}")]
    SymbolCollision {
        /// Symbol declared first
        first: String,
        /// Symbol that clashed with it
        second: String,
        /// Shared constant name
        constant: String,
    },

    /// Module name or crate path is not a Rust path
    #[error("invalid {what}: '{value}'")]
    InvalidPath {
        /// Which option was invalid
        what: &'static str,
        /// Rejected value
        value: String,
    },
}

/// Result alias for translation
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Constant name for a symbol: uppercased, `_`-prefixed if it starts with a digit
pub fn const_name(symbol: &str) -> String {
    let upper = symbol.to_ascii_uppercase();
    if upper.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", upper)
    } else {
        upper
    }
}

/// Distinct symbols of one or more sources, keyed by constant name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    by_const: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`, returning its constant name
    pub fn insert(&mut self, name: &str) -> Result<String> {
        let konst = const_name(name);
        match self.by_const.get(&konst) {
            Some(existing) if existing != name => Err(TranslateError::SymbolCollision {
                first: existing.to_string(),
                second: name.to_string(),
                constant: konst,
            }),
            Some(_) => Ok(konst),
            None => {
                self.by_const.insert(konst.clone(), Symbol::new(name));
                Ok(konst)
            }
        }
    }

    /// Declare every symbol of `other`
    pub fn merge(&mut self, other: &SymbolTable) -> Result<()> {
        for symbol in other.symbols() {
            self.insert(symbol.as_str())?;
        }
        Ok(())
    }

    /// Whether `name` is declared
    pub fn contains(&self, name: &str) -> bool {
        self.by_const
            .get(&const_name(name))
            .is_some_and(|symbol| symbol == name)
    }

    /// Declared symbols, sorted by constant name
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.by_const.values()
    }

    /// Number of declared symbols
    pub fn len(&self) -> usize {
        self.by_const.len()
    }

    /// True when nothing is declared
    pub fn is_empty(&self) -> bool {
        self.by_const.is_empty()
    }

    /// Collect the declarations already present in generated text
    pub fn parse_declarations(text: &str) -> Result<Self> {
        let mut table = Self::new();
        for caps in DECLARATION.captures_iter(text) {
            if let Some(sym) = caps.name("sym") {
                table.insert(sym.as_str())?;
            }
        }
        Ok(table)
    }

    /// Declarations as the body of a standalone module file
    pub fn render_module(&self, crate_path: &str) -> String {
        let mut out = format!("{}\n\nuse {}::Symbol;\n\n", HEADER, crate_path);
        for (konst, symbol) in &self.by_const {
            let _ = writeln!(
                out,
                "pub const {}: Symbol = Symbol::from_static(\"{}\");",
                konst, symbol
            );
        }
        out
    }

    /// Declarations wrapped in an inline `pub mod`
    pub fn render_inline(&self, module: &str, crate_path: &str) -> String {
        let mut out = format!(
            "{}\n#[allow(dead_code, unused_imports)]\npub mod {} {{\n    use {}::Symbol;\n",
            HEADER, module, crate_path
        );
        if !self.is_empty() {
            out.push('\n');
        }
        for (konst, symbol) in &self.by_const {
            let _ = writeln!(
                out,
                "    pub const {}: Symbol = Symbol::from_static(\"{}\");",
                konst, symbol
            );
        }
        out.push_str("}\n");
        out
    }
}

/// Where translated code finds its symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Module the constants live in (`s` gives `s::NAME`)
    pub module: String,
    /// Path of the crate exporting `Symbol`
    pub crate_path: String,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            module: "s".to_string(),
            crate_path: "linq_core".to_string(),
        }
    }
}

fn is_path(value: &str) -> bool {
    !value.is_empty()
        && value.split("::").all(|segment| {
            segment.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

impl TranslateOptions {
    /// Reject module names and crate paths that are not Rust paths
    pub fn validate(&self) -> Result<()> {
        if !is_path(&self.module) || self.module.contains("::") {
            return Err(TranslateError::InvalidPath {
                what: "module name",
                value: self.module.clone(),
            });
        }
        if !is_path(&self.crate_path) {
            return Err(TranslateError::InvalidPath {
                what: "crate path",
                value: self.crate_path.clone(),
            });
        }
        Ok(())
    }
}

/// Rewritten source plus the symbols it references
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Symbols referenced by the body, including previously generated ones
    pub symbols: SymbolTable,
    /// Rewritten source, without any generated header
    pub body: String,
}

impl Translation {
    /// Complete output with an inline symbol module
    pub fn render(&self, options: &TranslateOptions) -> String {
        let mut out = self.symbols.render_inline(&options.module, &options.crate_path);
        out.push('\n');
        out.push_str(&self.body);
        out
    }

    /// Output for symbols kept in a shared module file
    pub fn render_with_shared(&self) -> String {
        format!("{}\n\n{}", HEADER, self.body)
    }
}

/// Split previously generated output into its declarations and body
///
/// Source that does not start with [`HEADER`] is all body.
pub fn split_generated(source: &str) -> (Option<&str>, &str) {
    if !source.starts_with(HEADER) {
        return (None, source);
    }
    let after_header = HEADER.len();
    let rest = &source[after_header..];

    // inline output ends with the module's closing brace, shared output with the header
    let (end, separator) = if rest.trim_start_matches('\n').starts_with("#[allow(") {
        match rest.find("\n}\n") {
            Some(close) => (after_header + close + 3, "\n"),
            None => return (None, source),
        }
    } else {
        (after_header, "\n\n")
    };
    let tail = &source[end..];
    (Some(&source[..end]), tail.strip_prefix(separator).unwrap_or(tail))
}

/// Translate a whole source file
///
/// Declarations from a previous run are kept, so translating generated
/// output again yields the same text.
pub fn translate(source: &str, options: &TranslateOptions) -> Result<Translation> {
    options.validate()?;
    let (generated, body) = split_generated(source);
    let mut symbols = match generated {
        Some(header) => SymbolTable::parse_declarations(header)?,
        None => SymbolTable::new(),
    };
    let body = translate_body(body, &options.module, &mut symbols)?;
    Ok(Translation { symbols, body })
}

/// Translate source text line by line, declaring symbols into `symbols`
pub fn translate_body(source: &str, module: &str, symbols: &mut SymbolTable) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    for (idx, line) in source.split_inclusive('\n').enumerate() {
        let (text, newline) = match line.strip_suffix('\n') {
            Some(text) => (text, "\n"),
            None => (line, ""),
        };
        out.push_str(&rewrite(text, idx + 1, 0, module, symbols)?);
        out.push_str(newline);
    }
    Ok(out)
}

/// Byte ranges of string literal contents, plus the start of a `//` comment
fn scan_literals(text: &str) -> (Vec<std::ops::Range<usize>>, Option<usize>) {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    let mut escaped = false;
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        match open {
            Some(start) => {
                if byte == b'"' && !escaped {
                    spans.push(start..idx + 1);
                    open = None;
                }
                escaped = byte == b'\\' && !escaped;
            }
            None => {
                // the char literal '"'
                if bytes[idx..].starts_with(b"'\"'") {
                    idx += 3;
                    continue;
                }
                if byte == b'"' {
                    open = Some(idx);
                    escaped = false;
                } else if byte == b'/' && bytes.get(idx + 1) == Some(&b'/') {
                    return (spans, Some(idx));
                }
            }
        }
        idx += 1;
    }
    if let Some(start) = open {
        spans.push(start..bytes.len());
    }
    (spans, None)
}

/// Index of the parenthesis closing the one at `open`, skipping literals
fn matching_paren(text: &str, open: usize, strings: &[std::ops::Range<usize>]) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, byte) in text.bytes().enumerate().skip(open) {
        if strings.iter().any(|span| span.contains(&idx)) {
            continue;
        }
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Rewrite one line (or argument list); `offset` is its column within the line
fn rewrite(
    text: &str,
    line: usize,
    offset: usize,
    module: &str,
    symbols: &mut SymbolTable,
) -> Result<String> {
    let (strings, comment) = scan_literals(text);
    let limit = comment.unwrap_or(text.len());
    let in_string = |pos: usize| strings.iter().any(|span| span.contains(&pos));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while cursor < limit {
        let Some(caps) = REFERENCE.captures_at(&text[..limit], cursor) else {
            break;
        };
        let (Some(whole), Some(sym)) = (caps.get(0), caps.name("sym")) else {
            break;
        };
        if in_string(whole.start()) {
            out.push_str(&text[cursor..whole.end()]);
            cursor = whole.end();
            continue;
        }

        out.push_str(&text[cursor..whole.start()]);
        let path = format!("{}::{}", module, symbols.insert(sym.as_str())?);
        match caps.name("obj") {
            None => {
                out.push_str(&path);
                cursor = whole.end();
            }
            Some(obj) => {
                let rest = &text[whole.end()..limit];
                let trimmed = rest.trim_start_matches([' ', '\t']);
                if trimmed.starts_with('(') {
                    let open = whole.end() + (rest.len() - trimmed.len());
                    let close = matching_paren(&text[..limit], open, &strings).ok_or(
                        TranslateError::UnterminatedCall {
                            line,
                            column: offset + open + 1,
                        },
                    )?;
                    let args = text[open + 1..close].trim();
                    if args.is_empty() {
                        let _ = write!(out, "{}.method_call(&{}, ())", path, obj.as_str());
                    } else {
                        let leading = text[open + 1..close].find(args).unwrap_or(0);
                        let inner =
                            rewrite(args, line, offset + open + 1 + leading, module, symbols)?;
                        let _ = write!(out, "{}.method_call(&{}, ({},))", path, obj.as_str(), inner);
                    }
                    cursor = close + 1;
                } else {
                    let _ = write!(out, "{}.member_access(&{})", path, obj.as_str());
                    cursor = whole.end();
                }
            }
        }
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(source: &str) -> Result<String> {
        Ok(translate(source, &TranslateOptions::default())?.body)
    }

    #[test]
    fn rewrites_every_reference_form() {
        assert_eq!(body("let n = u@name;").unwrap(), "let n = s::NAME.member_access(&u);");
        assert_eq!(body("let k = @age;").unwrap(), "let k = s::AGE;");
        assert_eq!(body("obj@greet()").unwrap(), "s::GREET.method_call(&obj, ())");
        assert_eq!(
            body("obj@add(1, x@v)").unwrap(),
            "s::ADD.method_call(&obj, (1, s::V.member_access(&x),))"
        );
        assert_eq!(
            body("self.user@name").unwrap(),
            "s::NAME.member_access(&self.user)"
        );
    }

    #[test]
    fn strings_comments_and_bindings_are_left_alone() {
        assert_eq!(
            body(r#"println!("mail me@home"); a@b"#).unwrap(),
            r#"println!("mail me@home"); s::B.member_access(&a)"#
        );
        assert_eq!(
            body(r#"let s = "say \"hi@x\""; y@z"#).unwrap(),
            r#"let s = "say \"hi@x\""; s::Z.member_access(&y)"#
        );
        assert_eq!(
            body("x@a // see y@b").unwrap(),
            "s::A.member_access(&x) // see y@b"
        );
        assert_eq!(body("n @ 1..=5 => {}").unwrap(), "n @ 1..=5 => {}");
        assert_eq!(
            body(r#"let q = '"'; u@name"#).unwrap(),
            r#"let q = '"'; s::NAME.member_access(&u)"#
        );
    }

    #[test]
    fn literal_state_does_not_span_lines() {
        assert_eq!(
            body("let s = \"a\nb@c\";").unwrap(),
            "let s = \"a\ns::C.member_access(&b)\";"
        );
        assert_eq!(body("/* x@y */").unwrap(), "/* s::Y.member_access(&x) */");
    }

    #[test]
    fn unterminated_call_reports_position() {
        assert_eq!(
            body("obj@f(1, 2").unwrap_err(),
            TranslateError::UnterminatedCall { line: 1, column: 6 }
        );
        assert_eq!(
            body("ok\n  a@g(").unwrap_err(),
            TranslateError::UnterminatedCall { line: 2, column: 6 }
        );
    }

    #[test]
    fn constant_names() {
        assert_eq!(const_name("user_id"), "USER_ID");
        assert_eq!(const_name("1st"), "_1ST");
        assert_eq!(
            body("@age + @AGE").unwrap_err(),
            TranslateError::SymbolCollision {
                first: "age".to_string(),
                second: "AGE".to_string(),
                constant: "AGE".to_string(),
            }
        );
    }

    #[test]
    fn rendered_output_declares_each_symbol_once() {
        let source = "let a = u@name;\nlet b = @age + v@age;\n";
        let options = TranslateOptions::default();
        let rendered = translate(source, &options).unwrap().render(&options);
        assert_eq!(
            rendered,
            "// Generated by linqc.\n\
             #[allow(dead_code, unused_imports)]\n\
             pub mod s {\n    \
                 use linq_core::Symbol;\n\
             \n    \
                 pub const AGE: Symbol = Symbol::from_static(\"age\");\n    \
                 pub const NAME: Symbol = Symbol::from_static(\"name\");\n\
             }\n\
             \n\
             let a = s::NAME.member_access(&u);\n\
             let b = s::AGE + s::AGE.member_access(&v);\n"
        );
    }

    #[test]
    fn translating_generated_output_is_idempotent() {
        let options = TranslateOptions {
            module: "sym".to_string(),
            crate_path: "linq_core".to_string(),
        };
        let once = translate("a@x(b@y)\n@z\n", &options).unwrap().render(&options);
        let twice = translate(&once, &options).unwrap().render(&options);
        assert_eq!(once, twice);

        let shared = translate("a@x\n", &options).unwrap().render_with_shared();
        assert_eq!(shared, "// Generated by linqc.\n\ns::X.member_access(&a)\n".replace("s::", "sym::"));
        assert_eq!(translate(&shared, &options).unwrap().render_with_shared(), shared);
    }

    #[test]
    fn module_file_declarations_parse_back() {
        let mut table = SymbolTable::new();
        table.insert("name").unwrap();
        table.insert("2nd").unwrap();
        let text = table.render_module("linq_core");
        assert!(text.starts_with(HEADER));
        assert!(text.contains("pub const _2ND: Symbol = Symbol::from_static(\"2nd\");"));
        assert_eq!(SymbolTable::parse_declarations(&text).unwrap(), table);

        let mut merged = SymbolTable::new();
        merged.insert("age").unwrap();
        merged.merge(&table).unwrap();
        assert_eq!(merged.len(), 3);
        assert!(merged.contains("2nd"));
        assert!(!merged.contains("NAME"));
    }

    #[test]
    fn options_must_be_rust_paths() {
        let bad_module = TranslateOptions {
            module: "a::b".to_string(),
            ..TranslateOptions::default()
        };
        assert!(matches!(
            translate("", &bad_module),
            Err(TranslateError::InvalidPath { what: "module name", .. })
        ));
        let bad_crate = TranslateOptions {
            crate_path: "9lives".to_string(),
            ..TranslateOptions::default()
        };
        assert!(bad_crate.validate().is_err());
        let nested = TranslateOptions {
            crate_path: "crate::engine".to_string(),
            ..TranslateOptions::default()
        };
        assert!(nested.validate().is_ok());
    }
}
