// src/parse/ntriples.rs
// =============================================================================
// Line-based parser for N-Triples and N-Quads.
//
// Each non-empty, non-comment line holds one statement:
//   <subject> <predicate> <object> [<graph>] .
// Subjects are IRIs or blank nodes, objects may also be literals with an
// optional @language or ^^<datatype>. N-Triples is simply N-Quads without a
// graph term, so one parser handles both.
// =============================================================================

use anyhow::{anyhow, bail, Context, Result};

use crate::rdf::{Quad, Term};

pub fn parse_nquads(input: &str) -> Result<Vec<Quad>> {
    let mut quads = Vec::new();
    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let quad = parse_statement(line).with_context(|| format!("line {}", number + 1))?;
        quads.push(quad);
    }
    Ok(quads)
}

fn parse_statement(line: &str) -> Result<Quad> {
    let mut scanner = Scanner { rest: line };
    let subject = scanner.term()?;
    let predicate = scanner.term()?;
    let object = scanner.term()?;

    scanner.skip_whitespace();
    let graph = if scanner.rest.starts_with('.') {
        Term::DefaultGraph
    } else {
        scanner.term()?
    };

    scanner.skip_whitespace();
    let Some(rest) = scanner.rest.strip_prefix('.') else {
        bail!("expected '.' at end of statement");
    };
    let rest = rest.trim_start();
    if !rest.is_empty() && !rest.starts_with('#') {
        bail!("unexpected content after statement: {}", rest);
    }

    if matches!(subject, Term::Literal { .. }) {
        bail!("a literal can't be a subject");
    }
    if predicate.as_iri().is_none() {
        bail!("predicate must be an IRI");
    }

    Ok(Quad::new(subject, predicate, object, graph))
}

// Walks one statement left to right
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn term(&mut self) -> Result<Term> {
        self.skip_whitespace();
        match self.rest.chars().next() {
            Some('<') => Ok(Term::iri(self.iri()?)),
            Some('_') => self.blank(),
            Some('"') => self.literal(),
            Some(c) => bail!("unexpected character '{}'", c),
            None => bail!("unexpected end of statement"),
        }
    }

    fn iri(&mut self) -> Result<String> {
        let end = self.rest.find('>').ok_or_else(|| anyhow!("unterminated IRI"))?;
        let iri = unescape(&self.rest[1..end])?;
        self.rest = &self.rest[end + 1..];
        Ok(iri)
    }

    fn blank(&mut self) -> Result<Term> {
        let Some(rest) = self.rest.strip_prefix("_:") else {
            bail!("expected '_:' to start a blank node");
        };
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '<' || c == '"')
            .unwrap_or(rest.len());
        // a label can't end with '.', that dot terminates the statement
        let label = rest[..end].trim_end_matches('.');
        if label.is_empty() {
            bail!("empty blank node label");
        }
        self.rest = &rest[label.len()..];
        Ok(Term::blank(label))
    }

    fn literal(&mut self) -> Result<Term> {
        let body = &self.rest[1..];
        let mut value = String::new();
        let mut chars = body.char_indices();
        let mut end = None;

        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    end = Some(i);
                    break;
                }
                '\\' => {
                    let (_, escaped) = chars.next().ok_or_else(|| anyhow!("dangling escape"))?;
                    match escaped {
                        't' => value.push('\t'),
                        'b' => value.push('\u{8}'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        'f' => value.push('\u{c}'),
                        '"' => value.push('"'),
                        '\'' => value.push('\''),
                        '\\' => value.push('\\'),
                        'u' => value.push(hex_char(&mut chars, 4)?),
                        'U' => value.push(hex_char(&mut chars, 8)?),
                        other => bail!("unknown escape '\\{}'", other),
                    }
                }
                _ => value.push(c),
            }
        }

        let end = end.ok_or_else(|| anyhow!("unterminated literal"))?;
        self.rest = &body[end + 1..];

        if let Some(rest) = self.rest.strip_prefix('@') {
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                .unwrap_or(rest.len());
            if len == 0 {
                bail!("empty language tag");
            }
            let language = rest[..len].to_ascii_lowercase();
            self.rest = &rest[len..];
            return Ok(Term::Literal {
                value,
                datatype: None,
                language: Some(language),
            });
        }

        if let Some(rest) = self.rest.strip_prefix("^^") {
            self.rest = rest;
            if !self.rest.starts_with('<') {
                bail!("expected datatype IRI after '^^'");
            }
            let datatype = self.iri()?;
            return Ok(Term::Literal {
                value,
                datatype: Some(datatype),
                language: None,
            });
        }

        Ok(Term::literal(value))
    }
}

fn hex_char(chars: &mut std::str::CharIndices<'_>, digits: usize) -> Result<char> {
    let hex: String = chars.by_ref().take(digits).map(|(_, c)| c).collect();
    if hex.len() != digits {
        bail!("truncated unicode escape");
    }
    let code = u32::from_str_radix(&hex, 16).context("invalid unicode escape")?;
    char::from_u32(code).ok_or_else(|| anyhow!("invalid code point {:x}", code))
}

// IRIs only allow \u and \U escapes
fn unescape(iri: &str) -> Result<String> {
    if !iri.contains('\\') {
        return Ok(iri.to_string());
    }
    let mut out = String::with_capacity(iri.len());
    let mut chars = iri.char_indices();
    while let Some((_, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, 'u')) => out.push(hex_char(&mut chars, 4)?),
            Some((_, 'U')) => out.push(hex_char(&mut chars, 8)?),
            _ => bail!("invalid escape in IRI"),
        }
    }
    Ok(out)
}
