// Deck Gate - Declaration Source Parsing
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Fallback for callables registered without a signature (opaque closures
// from externally supplied tool modules). Parses `def name(params):`
// declarations with their docstrings out of the tool's defining source,
// including defs nested inside other defs, and rebuilds the parameter list.
//
// Heuristic by nature: indentation-scoped, no full expression grammar.
// Anything it cannot find yields an empty schema, never an error response.

use super::{describe, ParamSchema, Schema, TypeHint, RECEIVER_NAMES};
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Subdirectory searched last for a tool module's source file
const TOOLS_SUBDIR: &str = "tools";

/// Where a callable's declaring source can be found
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceLocation {
    /// The callable's own source text, when the host can provide it
    #[serde(default)]
    pub text: Option<String>,
    /// Recorded path of the declaring module
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamNode {
    pub name: String,
    pub annotation: Option<String>,
}

/// One parsed `def`, with the defs declared inside its body
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    /// Positional parameters (before any `*` or `*args`)
    pub params: Vec<ParamNode>,
    /// Default expressions, aligned to the *last* positional params
    pub defaults: Vec<String>,
    /// Keyword-only parameters, each with its own default
    pub kwonly: Vec<(ParamNode, Option<String>)>,
    /// Declares `**kwargs`
    pub var_keywords: bool,
    pub docstring: Option<String>,
    pub children: Vec<FunctionDef>,
    /// 0-based line of the `def`
    pub line: usize,
}

impl FunctionDef {
    /// Index of the first parameter that has a default
    fn first_default(&self) -> usize {
        self.params.len().saturating_sub(self.defaults.len())
    }
}

// ============================================================================
// LEXICAL SCANNING
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct ScanState {
    /// Open string: quote char, triple-quoted
    quote: Option<(char, bool)>,
    depth: i32,
    continued: bool,
}

fn scan_line(line: &str, state: &mut ScanState) {
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut i = 0;
    state.continued = false;
    while i < len {
        let c = chars[i];
        match state.quote {
            Some((q, triple)) => {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q {
                    if !triple {
                        state.quote = None;
                    } else if i + 2 < len && chars[i + 1] == q && chars[i + 2] == q {
                        state.quote = None;
                        i += 3;
                        continue;
                    }
                }
                i += 1;
            }
            None => {
                match c {
                    '#' => break,
                    '"' | '\'' => {
                        if i + 2 < len && chars[i + 1] == c && chars[i + 2] == c {
                            state.quote = Some((c, true));
                            i += 3;
                            continue;
                        }
                        state.quote = Some((c, false));
                    }
                    '(' | '[' | '{' => state.depth += 1,
                    ')' | ']' | '}' => state.depth -= 1,
                    '\\' if i + 1 == len => state.continued = true,
                    _ => {}
                }
                i += 1;
            }
        }
    }
    // Single-quoted strings end with the line
    if let Some((_, false)) = state.quote {
        state.quote = None;
    }
}

/// For each line: does a new logical line start here?
fn logical_starts(lines: &[&str]) -> Vec<bool> {
    let mut state = ScanState::default();
    lines
        .iter()
        .map(|line| {
            let starts = state.quote.is_none() && state.depth <= 0 && !state.continued;
            if starts {
                state.depth = 0;
            }
            scan_line(line, &mut state);
            starts
        })
        .collect()
}

/// Byte offsets of `target` outside strings and brackets
fn top_level_positions(text: &str, target: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if c == target && depth == 0 => positions.push(idx),
            _ => {}
        }
    }
    positions
}

fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for pos in top_level_positions(text, sep) {
        parts.push(&text[start..pos]);
        start = pos + sep.len_utf8();
    }
    parts.push(&text[start..]);
    parts
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

// ============================================================================
// DECLARATIONS
// ============================================================================

struct Header {
    name: String,
    params_text: String,
    /// Line holding the header's closing ':'
    end_line: usize,
    /// Text after ':' on that line
    trailing: String,
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_def_line(trimmed: &str) -> bool {
    let rest = trimmed.strip_prefix("async ").map(str::trim_start).unwrap_or(trimmed);
    rest.strip_prefix("def")
        .map(|r| r.starts_with(char::is_whitespace))
        .unwrap_or(false)
}

fn parse_header(lines: &[&str], start: usize) -> Result<Header> {
    let text = lines[start..].join("\n");
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut i = 0;

    let skip_ws = |i: &mut usize| {
        while *i < len && chars[*i].is_whitespace() {
            *i += 1;
        }
    };

    skip_ws(&mut i);
    let word: String = chars[i..].iter().take_while(|c| is_ident(**c)).collect();
    if word == "async" {
        i += word.len();
        skip_ws(&mut i);
    }
    // "def"
    i += 3;
    skip_ws(&mut i);
    let name: String = chars[i..].iter().take_while(|c| is_ident(**c)).collect();
    if name.is_empty() {
        bail!("line {}: def without a name", start + 1);
    }
    i += name.chars().count();
    skip_ws(&mut i);
    if i >= len || chars[i] != '(' {
        bail!("line {}: expected '(' after def {}", start + 1, name);
    }
    i += 1;

    // Parameter list up to the matching ')'
    let params_start = i;
    let mut depth = 1;
    let mut quote: Option<char> = None;
    while i < len {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 1;
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    if i >= len {
        bail!("line {}: unterminated parameter list for {}", start + 1, name);
    }
    let params_text: String = chars[params_start..i].iter().collect();
    i += 1;

    // Return annotation, then ':'
    let mut depth = 0;
    while i < len {
        match chars[i] {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ':' if depth == 0 => break,
            _ => {}
        }
        i += 1;
    }
    if i >= len {
        bail!("line {}: missing ':' after def {}", start + 1, name);
    }
    let end_line = start + chars[..i].iter().filter(|c| **c == '\n').count();
    let trailing: String = chars[i + 1..].iter().take_while(|c| **c != '\n').collect();

    Ok(Header {
        name,
        params_text,
        end_line,
        trailing: trailing.trim().to_string(),
    })
}

#[derive(Debug, Default)]
struct ParamList {
    params: Vec<ParamNode>,
    defaults: Vec<String>,
    kwonly: Vec<(ParamNode, Option<String>)>,
    var_keywords: bool,
}

fn parse_params(text: &str) -> ParamList {
    let mut list = ParamList::default();
    let mut keyword_only = false;
    for raw in split_top_level(text, ',') {
        let raw = raw.trim();
        if raw.is_empty() || raw == "/" {
            continue;
        }
        if raw.starts_with("**") {
            list.var_keywords = true;
            continue;
        }
        if raw.starts_with('*') {
            keyword_only = true;
            continue;
        }
        let (decl, default) = match top_level_positions(raw, '=').first() {
            Some(&eq) => (&raw[..eq], Some(raw[eq + 1..].trim().to_string())),
            None => (raw, None),
        };
        let (name, annotation) = match top_level_positions(decl, ':').first() {
            Some(&colon) => (
                decl[..colon].trim(),
                Some(decl[colon + 1..].trim().to_string()).filter(|a| !a.is_empty()),
            ),
            None => (decl.trim(), None),
        };
        if name.is_empty() || !name.chars().all(is_ident) {
            continue;
        }
        let node = ParamNode {
            name: name.to_string(),
            annotation,
        };
        if keyword_only {
            list.kwonly.push((node, default));
        } else {
            list.params.push(node);
            if let Some(default) = default {
                list.defaults.push(default);
            }
        }
    }
    list
}

/// String literal at the start of `text` (prefix + single or triple quotes)
fn leading_string_literal(text: &str) -> Option<String> {
    let text = text.trim_start();
    let body = text
        .strip_prefix(|c: char| matches!(c, 'r' | 'R' | 'u' | 'U'))
        .filter(|rest| rest.starts_with('"') || rest.starts_with('\''))
        .unwrap_or(text);
    for delim in ["\"\"\"", "'''"] {
        if let Some(rest) = body.strip_prefix(delim) {
            let end = rest.find(delim)?;
            return Some(rest[..end].to_string());
        }
    }
    let quote = body.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &body[1..];
    let line = rest.lines().next().unwrap_or("");
    let end = line.find(quote)?;
    Some(line[..end].to_string())
}

/// Strip the common indentation of continuation lines and blank edges
fn clean_doc(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if idx == 0 {
            cleaned.push(line.trim().to_string());
        } else {
            let cut: String = line.chars().skip(margin).collect();
            cleaned.push(cut.trim_end().to_string());
        }
    }
    while cleaned.first().map(|l| l.is_empty()).unwrap_or(false) {
        cleaned.remove(0);
    }
    while cleaned.last().map(|l| l.is_empty()).unwrap_or(false) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

fn docstring_after(lines: &[&str], header: &Header) -> Option<String> {
    let raw = if !header.trailing.is_empty() {
        let mut text = header.trailing.clone();
        let following = lines.get(header.end_line + 1..).unwrap_or(&[]);
        if !following.is_empty() {
            text.push('\n');
            text.push_str(&following.join("\n"));
        }
        leading_string_literal(&text)?
    } else {
        let next = (header.end_line + 1..lines.len()).find(|&i| !lines[i].trim().is_empty())?;
        leading_string_literal(&lines[next..].join("\n"))?
    };
    let doc = clean_doc(&raw);
    (!doc.is_empty()).then_some(doc)
}

/// Parse every `def` in a source text into a tree by indentation
pub fn parse_module(source: &str) -> Result<Vec<FunctionDef>> {
    let lines: Vec<&str> = source.lines().collect();
    let starts = logical_starts(&lines);
    let mut roots: Vec<FunctionDef> = Vec::new();
    let mut stack: Vec<(usize, FunctionDef)> = Vec::new();

    fn close(stack: &mut Vec<(usize, FunctionDef)>, roots: &mut Vec<FunctionDef>) {
        if let Some((_, done)) = stack.pop() {
            match stack.last_mut() {
                Some((_, parent)) => parent.children.push(done),
                None => roots.push(done),
            }
        }
    }

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if !starts[idx] || trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = indent_of(line);
        while stack.last().map(|(i, _)| *i >= indent).unwrap_or(false) {
            close(&mut stack, &mut roots);
        }
        if !is_def_line(trimmed) {
            continue;
        }
        let header = parse_header(&lines, idx)?;
        let list = parse_params(&header.params_text);
        let docstring = docstring_after(&lines, &header);
        stack.push((
            indent,
            FunctionDef {
                name: header.name,
                params: list.params,
                defaults: list.defaults,
                kwonly: list.kwonly,
                var_keywords: list.var_keywords,
                docstring,
                children: Vec::new(),
                line: idx,
            },
        ));
    }
    while !stack.is_empty() {
        close(&mut stack, &mut roots);
    }
    Ok(roots)
}

// ============================================================================
// ANNOTATIONS
// ============================================================================

/// Map annotation syntax to a TypeHint
pub fn parse_annotation(text: &str) -> TypeHint {
    let t = text.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    let t = t.strip_prefix("typing.").unwrap_or(t);
    if t.is_empty() {
        return TypeHint::Unannotated;
    }

    let members = split_top_level(t, '|');
    if members.len() > 1 {
        return TypeHint::Union(members.into_iter().map(parse_annotation).collect());
    }

    if let (Some(open), Some(close)) = (t.find('['), t.rfind(']')) {
        if open < close {
            let base = t[..open].trim();
            let inner = &t[open + 1..close];
            return match base {
                "Optional" => TypeHint::optional(parse_annotation(inner)),
                "Union" => TypeHint::Union(
                    split_top_level(inner, ',').into_iter().map(parse_annotation).collect(),
                ),
                "List" | "list" | "Sequence" | "Tuple" | "tuple" | "Set" | "set" | "Iterable" => {
                    TypeHint::List
                }
                "Dict" | "dict" | "Mapping" => TypeHint::Dict,
                _ => TypeHint::Other(t.to_string()),
            };
        }
    }

    match t {
        "str" => TypeHint::Str,
        "int" => TypeHint::Int,
        "float" => TypeHint::Float,
        "bool" => TypeHint::Bool,
        "list" | "List" | "tuple" | "Tuple" => TypeHint::List,
        "dict" | "Dict" => TypeHint::Dict,
        "None" => TypeHint::NoneType,
        other => TypeHint::Other(other.to_string()),
    }
}

// ============================================================================
// LOOKUP + SCHEMA
// ============================================================================

fn normalize_doc(doc: &str) -> String {
    doc.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn find_by_name<'a>(defs: &'a [FunctionDef], name: &str) -> Option<&'a FunctionDef> {
    for def in defs {
        if def.name == name {
            return Some(def);
        }
        if let Some(found) = find_by_name(&def.children, name) {
            return Some(found);
        }
    }
    None
}

fn find_by_doc<'a>(defs: &'a [FunctionDef], doc: &str) -> Option<&'a FunctionDef> {
    for def in defs {
        if def.docstring.as_deref().map(normalize_doc).as_deref() == Some(doc) {
            return Some(def);
        }
        if let Some(found) = find_by_doc(&def.children, doc) {
            return Some(found);
        }
    }
    None
}

/// Locate a tool's def: exact name (descending into nested defs), then
/// matching docstring as a last resort
pub fn find_function<'a>(defs: &'a [FunctionDef], name: &str, doc: Option<&str>) -> Option<&'a FunctionDef> {
    find_by_name(defs, name).or_else(|| {
        let doc = normalize_doc(doc?);
        if doc.is_empty() {
            return None;
        }
        find_by_doc(defs, &doc)
    })
}

/// Schema for a parsed def. Positional rule: a positional parameter is
/// required iff it sits before len(params) - len(defaults). A keyword-only
/// parameter is required iff it has no default.
pub fn schema_for(def: &FunctionDef, doc: Option<&str>) -> Schema {
    let first_default = def.first_default();
    let doc = doc.or(def.docstring.as_deref());
    let param = |p: &ParamNode, required: bool| {
        let hint = p
            .annotation
            .as_deref()
            .map(parse_annotation)
            .unwrap_or(TypeHint::Unannotated);
        ParamSchema {
            name: p.name.clone(),
            ty: hint.json_type(),
            description: describe(doc, &p.name),
            required,
        }
    };

    let positional = def
        .params
        .iter()
        .enumerate()
        .filter(|(idx, p)| !(*idx == 0 && RECEIVER_NAMES.contains(&p.name.as_str())))
        .map(|(idx, p)| param(p, idx < first_default));
    let keyword = def.kwonly.iter().map(|(p, default)| param(p, default.is_none()));

    Schema {
        params: positional.chain(keyword).collect(),
        extra_keywords: def.var_keywords,
    }
}

/// Source text for a location.
///
/// Resolution order:
///   1. The callable's own text
///   2. The recorded module path
///   3. That file's name in the working directory
///   4. That file's name under ./tools
pub fn load_source(location: &SourceLocation, cwd: &Path) -> Result<String> {
    if let Some(text) = &location.text {
        return Ok(text.clone());
    }
    let file = location
        .file
        .as_ref()
        .ok_or_else(|| anyhow!("no source text or file recorded"))?;
    let mut candidates = vec![file.clone()];
    if let Some(name) = file.file_name() {
        candidates.push(cwd.join(name));
        candidates.push(cwd.join(TOOLS_SUBDIR).join(name));
    }
    for candidate in &candidates {
        if let Ok(text) = std::fs::read_to_string(candidate) {
            log::debug!("Loaded tool source {:?}", candidate);
            return Ok(text);
        }
    }
    Err(anyhow!("source not found, tried {:?}", candidates))
}

/// Parse the declaring source and rebuild `tool_name`'s schema.
/// Ok(empty) when the def is not in the source.
pub fn infer_from_source(
    tool_name: &str,
    doc: Option<&str>,
    location: &SourceLocation,
    cwd: &Path,
) -> Result<Schema> {
    let text = load_source(location, cwd)?;
    let defs = parse_module(&text)?;
    Ok(find_function(&defs, tool_name, doc)
        .map(|def| schema_for(def, doc))
        .unwrap_or_default())
}

// ============================================================================
// TESTS
// ============================================================================
