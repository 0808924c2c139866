//! Safe SQL identifier handling.
//!
//! This module provides [`Ident`] which represents a SQL identifier (schema/table/column),
//! supporting dotted notation and quoted identifiers. Configured table, schema and column
//! names go through [`Ident::parse_part`] before they are spliced into an UPDATE statement.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`
//!
//! # Example
//! ```ignore
//! use pgupdate::Ident;
//!
//! let t = Ident::parse("public.users")?;
//! let c = Ident::parse(r#""CamelCase"."UserTable""#)?;
//! # Ok::<(), pgupdate::UpdateError>(())
//! ```

use crate::error::{UpdateError, UpdateResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier: allows any characters except NUL.
    Quoted(String),
}

impl IdentPart {
    /// The identifier text without quotes.
    pub fn name(&self) -> &str {
        match self {
            Self::Unquoted(s) | Self::Quoted(s) => s,
        }
    }

    /// The name as the catalog stores it: unquoted names fold to lower case.
    pub fn catalog_name(&self) -> String {
        match self {
            Self::Unquoted(s) => s.to_lowercase(),
            Self::Quoted(s) => s.clone(),
        }
    }

    /// The part for a name read back from the catalog, quoted unless it is a plain
    /// lower-case identifier.
    pub fn from_catalog_name(name: &str) -> Self {
        let mut chars = name.chars();
        let plain = chars
            .next()
            .is_some_and(|c| c == '_' || c.is_ascii_lowercase())
            && chars.all(|c| c == '_' || c == '$' || c.is_ascii_lowercase() || c.is_ascii_digit());
        if plain {
            Self::Unquoted(name.to_string())
        } else {
            Self::Quoted(name.to_string())
        }
    }

    /// Render this part as SQL.
    pub fn to_sql(&self) -> String {
        Ident {
            parts: vec![self.clone()],
        }
        .to_sql()
    }
}

/// A SQL identifier (column, table, or schema name).
///
/// Supports dotted notation (e.g., `schema.table.column`) and quoted identifiers
/// (e.g., `"CamelCase"."User"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse a single, undotted identifier part.
    pub fn parse_part(s: &str) -> UpdateResult<IdentPart> {
        let mut ident = Self::parse(s)?;
        if ident.parts.len() != 1 {
            return Err(UpdateError::validation(format!(
                "Expected a single identifier, got '{s}'"
            )));
        }
        Ok(ident.parts.remove(0))
    }

    /// `schema.name`, or just `name` without a schema.
    pub fn qualified(schema: Option<IdentPart>, name: IdentPart) -> Self {
        Self {
            parts: schema.into_iter().chain(std::iter::once(name)).collect(),
        }
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table.column`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `public."UserTable".id`
    pub fn parse(s: &str) -> UpdateResult<Self> {
        if s.is_empty() {
            return Err(UpdateError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(UpdateError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            // Consume '.' between parts (but require there is a next part).
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(UpdateError::validation("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(UpdateError::validation(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            // Quoted identifier part.
            if chars.peek() == Some(&'"') {
                chars.next(); // opening quote
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            // Escaped quote: ""
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(UpdateError::validation("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(UpdateError::validation("Empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            // Unquoted identifier part.
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                if name.is_empty() {
                    // First char: letter or underscore.
                    if c == '_' || c.is_ascii_alphabetic() {
                        name.push(c);
                        chars.next();
                    } else {
                        return Err(UpdateError::validation(format!(
                            "Invalid identifier start character: '{c}'"
                        )));
                    }
                } else {
                    // Subsequent chars: letter, digit, underscore, or $.
                    if c == '_' || c == '$' || c.is_ascii_alphanumeric() {
                        name.push(c);
                        chars.next();
                    } else {
                        return Err(UpdateError::validation(format!(
                            "Invalid character in identifier: '{c}'"
                        )));
                    }
                }
            }
            if name.is_empty() {
                return Err(UpdateError::validation("Empty identifier segment"));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        if parts.is_empty() {
            return Err(UpdateError::validation("Empty identifier"));
        }

        Ok(Self { parts })
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut cap = self.parts.len().saturating_sub(1); // dots
        for part in &self.parts {
            match part {
                IdentPart::Unquoted(s) => cap += s.len(),
                IdentPart::Quoted(s) => cap += s.len() + 2, // surrounding quotes (escapes may add more)
            }
        }
        let mut out = String::with_capacity(cap);
        self.write_sql(&mut out);
        out
    }

    fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push('"');
                    for ch in s.chars() {
                        if ch == '"' {
                            out.push('"');
                            out.push('"');
                        } else {
                            out.push(ch);
                        }
                    }
                    out.push('"');
                }
            }
        }
    }
}
