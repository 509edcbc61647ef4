//! Route pattern compilation.
//!
//! This module turns a route pattern such as `/blog/{year:year}[/{slug}]`
//! into a [`CompiledPattern`]: an anchored regular expression, the ordered
//! placeholder variables with their defaults, and the token tree the
//! [`UriGenerator`](crate::UriGenerator) walks to build URIs back.
//!
//! # Syntax
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{name}` | Placeholder with the default requirement |
//! | `{name:regex}` | Placeholder with an inline requirement or alias |
//! | `{name=value}` | Placeholder with a default value |
//! | `{name:regex=value}` | Both |
//! | `[...]` | Optional group, may nest |
//!
//! Literal text is escaped before it reaches the regular expression, so a
//! literal `.` or `+` only ever matches itself.

use std::collections::HashSet;
use std::fmt::Write as _;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::alias::PlaceholderAliases;
use crate::error::PatternError;

/// Maximum length of a placeholder name.
pub const MAX_VARIABLE_NAME_LENGTH: usize = 32;

/// Requirement used for path placeholders without a constraint.
pub const DEFAULT_PATH_REQUIREMENT: &str = "[^/]+";

/// Requirement used for host placeholders without a constraint.
pub const DEFAULT_HOST_REQUIREMENT: &str = "[^.]+";

/// What a pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// A request path; placeholders stop at `/`.
    Path,
    /// A request host; placeholders stop at `.` and matching ignores case.
    Host,
}

impl PatternKind {
    /// Returns the requirement used when a placeholder declares none.
    #[must_use]
    pub const fn default_requirement(self) -> &'static str {
        match self {
            Self::Path => DEFAULT_PATH_REQUIREMENT,
            Self::Host => DEFAULT_HOST_REQUIREMENT,
        }
    }
}

/// One element of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Token {
    /// Literal text, stored unescaped.
    Literal {
        /// The text.
        text: String,
    },
    /// A named placeholder.
    Placeholder {
        /// Placeholder name.
        name: String,
        /// Resolved regular expression fragment.
        requirement: String,
        /// Inline default value, if declared.
        default: Option<String>,
    },
    /// An optional group.
    Optional {
        /// Tokens inside the group.
        tokens: Vec<Token>,
    },
}

/// A compiled route pattern.
///
/// # Example
///
/// ```rust
/// use waypoint_router::PatternCompiler;
///
/// let compiler = PatternCompiler::new();
/// let compiled = compiler.compile_path("/foo/{bar:int}[/{baz=1}]", &Default::default()).unwrap();
///
/// assert_eq!(compiled.regex(), r"^/foo/(?P<bar>(?:[0-9]+))(?:/(?P<baz>[^/]+))?$");
/// assert_eq!(compiled.variables().get("bar"), Some(&None));
/// assert_eq!(compiled.variables().get("baz"), Some(&Some("1".to_string())));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPattern {
    pattern: String,
    kind: PatternKind,
    regex: String,
    tokens: Vec<Token>,
    variables: IndexMap<String, Option<String>>,
}

impl CompiledPattern {
    /// Returns the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns whether this is a path or host pattern.
    #[must_use]
    pub const fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Returns the anchored regular expression.
    #[must_use]
    pub fn regex(&self) -> &str {
        &self.regex
    }

    /// Returns the parsed token tree.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Returns the placeholders in occurrence order with their defaults.
    #[must_use]
    pub fn variables(&self) -> &IndexMap<String, Option<String>> {
        &self.variables
    }

    /// Returns true if the pattern is pure literal text.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.tokens
            .iter()
            .all(|token| matches!(token, Token::Literal { .. }))
    }

    /// Returns the literal text of a static pattern.
    #[must_use]
    pub fn static_text(&self) -> Option<String> {
        self.is_static().then(|| self.static_prefix())
    }

    /// Returns the literal text preceding the first placeholder or group.
    #[must_use]
    pub fn static_prefix(&self) -> String {
        self.tokens
            .iter()
            .map_while(|token| match token {
                Token::Literal { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the resolved requirement of a placeholder.
    #[must_use]
    pub fn requirement(&self, name: &str) -> Option<&str> {
        fn find<'a>(tokens: &'a [Token], name: &str) -> Option<&'a str> {
            tokens.iter().find_map(|token| match token {
                Token::Placeholder {
                    name: n,
                    requirement,
                    ..
                } if n == name => Some(requirement.as_str()),
                Token::Optional { tokens } => find(tokens, name),
                _ => None,
            })
        }
        find(&self.tokens, name)
    }

    /// Compiles the regular expression.
    pub fn to_regex(&self) -> Result<Regex, PatternError> {
        Regex::new(&self.regex).map_err(|source| PatternError::InvalidRegex {
            pattern: self.pattern.clone(),
            source,
        })
    }
}

/// Compiles route patterns into [`CompiledPattern`]s.
///
/// The compiler owns the alias table consulted for constraints such as
/// `{id:int}`.
#[derive(Debug, Clone, Default)]
pub struct PatternCompiler {
    aliases: PlaceholderAliases,
}

impl PatternCompiler {
    /// Creates a compiler with the built-in aliases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compiler with a custom alias table.
    #[must_use]
    pub fn with_aliases(aliases: PlaceholderAliases) -> Self {
        Self { aliases }
    }

    /// Returns the alias table.
    #[must_use]
    pub fn aliases(&self) -> &PlaceholderAliases {
        &self.aliases
    }

    /// Returns the alias table for modification.
    pub fn aliases_mut(&mut self) -> &mut PlaceholderAliases {
        &mut self.aliases
    }

    /// Compiles a path pattern.
    ///
    /// `requirements` supplies constraints for placeholders that do not
    /// declare one inline.
    pub fn compile_path(
        &self,
        pattern: &str,
        requirements: &IndexMap<String, String>,
    ) -> Result<CompiledPattern, PatternError> {
        self.compile(pattern, PatternKind::Path, requirements)
    }

    /// Compiles a host pattern.
    pub fn compile_host(
        &self,
        pattern: &str,
        requirements: &IndexMap<String, String>,
    ) -> Result<CompiledPattern, PatternError> {
        self.compile(pattern, PatternKind::Host, requirements)
    }

    /// Compiles a pattern of the given kind.
    pub fn compile(
        &self,
        pattern: &str,
        kind: PatternKind,
        requirements: &IndexMap<String, String>,
    ) -> Result<CompiledPattern, PatternError> {
        let mut parser = Parser {
            pattern,
            kind,
            aliases: &self.aliases,
            requirements,
            seen: HashSet::new(),
        };
        let tokens = parser.parse()?;

        let mut regex = String::with_capacity(pattern.len() * 2);
        if kind == PatternKind::Host {
            regex.push_str("(?i)");
        }
        regex.push('^');
        emit_regex(&tokens, &mut regex);
        regex.push('$');

        let mut variables = IndexMap::new();
        collect_variables(&tokens, &mut variables);

        let compiled = CompiledPattern {
            pattern: pattern.to_string(),
            kind,
            regex,
            tokens,
            variables,
        };
        compiled.to_regex()?;

        Ok(compiled)
    }
}

struct Parser<'a> {
    pattern: &'a str,
    kind: PatternKind,
    aliases: &'a PlaceholderAliases,
    requirements: &'a IndexMap<String, String>,
    seen: HashSet<String>,
}

impl Parser<'_> {
    fn parse(&mut self) -> Result<Vec<Token>, PatternError> {
        let mut groups: Vec<(usize, Vec<Token>)> = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut literal = String::new();
        let pattern = self.pattern;
        let mut pos = 0;

        while let Some(ch) = pattern[pos..].chars().next() {
            match ch {
                '[' => {
                    flush_literal(&mut literal, &mut current);
                    groups.push((pos, std::mem::take(&mut current)));
                }
                ']' => {
                    flush_literal(&mut literal, &mut current);
                    let (_, mut outer) = groups.pop().ok_or_else(|| PatternError::UnbalancedGroup {
                        pattern: self.pattern.to_string(),
                        position: pos,
                    })?;
                    outer.push(Token::Optional {
                        tokens: std::mem::take(&mut current),
                    });
                    current = outer;
                }
                '{' => {
                    flush_literal(&mut literal, &mut current);
                    let end = self.placeholder_end(pos)?;
                    current.push(self.placeholder(&pattern[pos + 1..end])?);
                    pos = end + 1;
                    continue;
                }
                _ => literal.push(ch),
            }
            pos += ch.len_utf8();
        }

        if let Some((position, _)) = groups.last() {
            return Err(PatternError::UnbalancedGroup {
                pattern: self.pattern.to_string(),
                position: *position,
            });
        }

        flush_literal(&mut literal, &mut current);
        Ok(current)
    }

    // Braces nest so inline requirements like `[0-9]{4}` stay inside.
    fn placeholder_end(&self, open: usize) -> Result<usize, PatternError> {
        let mut depth = 0usize;
        let mut escaped = false;

        for (offset, ch) in self.pattern[open..].char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(open + offset);
                    }
                }
                _ => {}
            }
        }

        Err(PatternError::UnclosedPlaceholder {
            pattern: self.pattern.to_string(),
            position: open,
        })
    }

    fn placeholder(&mut self, content: &str) -> Result<Token, PatternError> {
        let name_end = content.find([':', '=']).unwrap_or(content.len());
        let name = &content[..name_end];
        let rest = &content[name_end..];

        let (inline, default) = if let Some(body) = rest.strip_prefix(':') {
            split_default(body)
        } else if let Some(default) = rest.strip_prefix('=') {
            (None, Some(default))
        } else {
            (None, None)
        };

        self.validate_name(name)?;

        let requirement = match inline.or_else(|| self.requirements.get(name).map(String::as_str)) {
            Some(raw) => {
                let trimmed = strip_anchors(raw);
                if trimmed.is_empty() {
                    return Err(PatternError::EmptyRequirement {
                        pattern: self.pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                self.aliases.resolve(trimmed)
            }
            None => self.kind.default_requirement().to_string(),
        };

        Ok(Token::Placeholder {
            name: name.to_string(),
            requirement,
            default: default.map(str::to_string),
        })
    }

    fn validate_name(&mut self, name: &str) -> Result<(), PatternError> {
        let source = self.pattern;
        let error = |make: fn(String, String) -> PatternError| {
            Err(make(source.to_string(), name.to_string()))
        };

        if name.is_empty() {
            return error(|pattern, name| PatternError::InvalidName { pattern, name });
        }
        if name.len() > MAX_VARIABLE_NAME_LENGTH {
            return Err(PatternError::NameTooLong {
                pattern: source.to_string(),
                name: name.to_string(),
                max: MAX_VARIABLE_NAME_LENGTH,
            });
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return error(|pattern, name| PatternError::NameStartsWithDigit { pattern, name });
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return error(|pattern, name| PatternError::InvalidName { pattern, name });
        }
        if !self.seen.insert(name.to_string()) {
            return error(|pattern, name| PatternError::DuplicateVariable { pattern, name });
        }

        Ok(())
    }
}

fn flush_literal(literal: &mut String, tokens: &mut Vec<Token>) {
    if literal.is_empty() {
        return;
    }
    if let Some(Token::Literal { text }) = tokens.last_mut() {
        text.push_str(literal);
        literal.clear();
    } else {
        tokens.push(Token::Literal {
            text: std::mem::take(literal),
        });
    }
}

/// Splits `regex=default` on the last `=` outside any bracket pair.
fn split_default(body: &str) -> (Option<&str>, Option<&str>) {
    let mut depth = 0i32;
    let mut escaped = false;
    let mut split = None;

    for (offset, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '=' if depth == 0 => split = Some(offset),
            _ => {}
        }
    }

    match split {
        Some(offset) => (Some(&body[..offset]), Some(&body[offset + 1..])),
        None => (Some(body), None),
    }
}

fn strip_anchors(requirement: &str) -> &str {
    let mut trimmed = requirement
        .strip_prefix('^')
        .or_else(|| requirement.strip_prefix("\\A"))
        .unwrap_or(requirement);

    if let Some(rest) = trimmed.strip_suffix("\\z") {
        trimmed = rest;
    } else if let Some(rest) = trimmed.strip_suffix('$') {
        if !rest.ends_with('\\') {
            trimmed = rest;
        }
    }

    trimmed
}

fn emit_regex(tokens: &[Token], out: &mut String) {
    for token in tokens {
        match token {
            Token::Literal { text } => out.push_str(&regex::escape(text)),
            Token::Placeholder {
                name, requirement, ..
            } => {
                let _ = write!(out, "(?P<{name}>{requirement})");
            }
            Token::Optional { tokens } => {
                out.push_str("(?:");
                emit_regex(tokens, out);
                out.push_str(")?");
            }
        }
    }
}

fn collect_variables(tokens: &[Token], variables: &mut IndexMap<String, Option<String>>) {
    for token in tokens {
        match token {
            Token::Literal { .. } => {}
            Token::Placeholder { name, default, .. } => {
                variables.insert(name.clone(), default.clone());
            }
            Token::Optional { tokens } => collect_variables(tokens, variables),
        }
    }
}
