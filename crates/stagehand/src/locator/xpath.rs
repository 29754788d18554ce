//! Textual locator syntax, a restricted XPath.
//!
//! ```text
//! //tag[@attr='v' and contains(@attr, 'v')][matches(@text, 're')]
//! ```
//!
//! One descendant step (`//tag` or `//*`) followed by any number of bracketed
//! predicate groups. Supported terms are `@attr=lit`, `contains(@attr, lit)`,
//! `matches(@text, lit)`, `name()=lit` and `text()=lit`, joined with `and`.
//! A literal is a single- or double-quoted string, or `concat()` of several
//! for values holding both quote characters.
//! Nested steps, axes, `or` and `not(...)` are rejected; scope a locator with
//! `within()` instead of chaining steps.

use super::predicate::{Predicate, TextPattern};
use crate::result::{StagehandError, StagehandResult};

/// Parse an expression into its predicate list, tag first
pub(crate) fn parse(expression: &str) -> StagehandResult<Vec<Predicate>> {
    parse_expression(expression).map_err(|reason| StagehandError::InvalidLocator {
        expression: expression.to_string(),
        reason,
    })
}

fn parse_expression(expression: &str) -> Result<Vec<Predicate>, String> {
    let mut cursor = Cursor::new(expression);
    if !cursor.eat("//") {
        return Err("expression must start with '//'".to_string());
    }

    let mut predicates = Vec::new();
    if !cursor.eat("*") {
        let tag = cursor
            .ident()
            .ok_or_else(|| cursor.unexpected("a tag name or '*'"))?;
        if cursor.peek("::") {
            return Err("axes are not supported".to_string());
        }
        predicates.push(Predicate::Tag(tag.to_string()));
    }

    while cursor.eat("[") {
        loop {
            predicates.push(term(&mut cursor)?);
            if cursor.eat("]") {
                break;
            }
            if cursor.eat_keyword("and") {
                continue;
            }
            if cursor.eat_keyword("or") {
                return Err("'or' is not supported".to_string());
            }
            return Err(cursor.unexpected("'and' or ']'"));
        }
    }

    if cursor.at_end() {
        Ok(predicates)
    } else if cursor.peek("/") {
        Err("nested steps are not supported, scope the locator with within()".to_string())
    } else {
        Err(cursor.unexpected("'[' or end of expression"))
    }
}

fn term(cursor: &mut Cursor<'_>) -> Result<Predicate, String> {
    if cursor.eat("@") {
        let key = attribute_name(cursor)?;
        cursor.expect("=")?;
        let value = cursor.literal()?;
        return Ok(Predicate::attribute_equals(key, value));
    }
    if cursor.eat_keyword("not") {
        return Err("'not(...)' is not supported".to_string());
    }
    if cursor.eat_keyword("contains") {
        cursor.expect("(")?;
        cursor.expect("@")?;
        let key = attribute_name(cursor)?;
        cursor.expect(",")?;
        let value = cursor.literal()?;
        cursor.expect(")")?;
        return Ok(Predicate::attribute_contains(key, value));
    }
    if cursor.eat_keyword("matches") {
        cursor.expect("(")?;
        cursor.expect("@")?;
        let key = attribute_name(cursor)?;
        if key != "text" {
            return Err(format!("matches() only applies to @text, not @{key}"));
        }
        cursor.expect(",")?;
        let pattern = cursor.literal()?;
        cursor.expect(")")?;
        let pattern = TextPattern::compile(&pattern).map_err(|e| e.to_string())?;
        return Ok(Predicate::TextMatches(pattern));
    }
    if cursor.eat_keyword("name") {
        cursor.expect("(")?;
        cursor.expect(")")?;
        cursor.expect("=")?;
        return Ok(Predicate::Tag(cursor.literal()?));
    }
    if cursor.eat_keyword("text") {
        cursor.expect("(")?;
        cursor.expect(")")?;
        cursor.expect("=")?;
        return Ok(Predicate::TextEquals(cursor.literal()?));
    }
    Err(cursor.unexpected("a predicate"))
}

fn attribute_name<'a>(cursor: &mut Cursor<'a>) -> Result<&'a str, String> {
    cursor.ident().ok_or_else(|| cursor.unexpected("an attribute name"))
}

/// Whitespace-insensitive scanner over the expression
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self, token: &str) -> bool {
        self.skip_ws();
        self.rest().starts_with(token)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.peek(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Like `eat`, but the keyword must not run on into an identifier
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if !self.peek(keyword) {
            return false;
        }
        let next = self.rest()[keyword.len()..].chars().next();
        if next.is_some_and(is_ident_char) {
            return false;
        }
        self.pos += keyword.len();
        true
    }

    fn expect(&mut self, token: &str) -> Result<(), String> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{token}'")))
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let first = rest.chars().next()?;
        if !(first.is_alphabetic() || first == '_') {
            return None;
        }
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_ident_char(*c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        Some(&rest[..len])
    }

    fn literal(&mut self) -> Result<String, String> {
        if self.eat_keyword("concat") {
            self.expect("(")?;
            let mut value = self.quoted()?;
            while self.eat(",") {
                value.push_str(&self.quoted()?);
            }
            self.expect(")")?;
            return Ok(value);
        }
        self.quoted()
    }

    fn quoted(&mut self) -> Result<String, String> {
        self.skip_ws();
        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.unexpected("a quoted string")),
        };
        let body = &rest[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| format!("unterminated string at offset {}", self.pos))?;
        self.pos += end + 2;
        Ok(body[..end].to_string())
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest().is_empty()
    }

    fn unexpected(&self, wanted: &str) -> String {
        let found: String = self.rest().chars().take(12).collect();
        if found.is_empty() {
            format!("expected {wanted} at end of expression")
        } else {
            format!("expected {wanted} at offset {}, found '{found}'", self.pos)
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}
