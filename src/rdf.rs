// src/rdf.rs
// =============================================================================
// The record model: RDF terms, quads and quad patterns.
//
// Every dereferenced document is turned into quads, and the aggregated store
// is a growing set of them. A QuadPattern is what a query consumer matches
// against the store: each position is either a concrete term or a variable
// (None).
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    /// A named node (absolute IRI)
    Iri { value: String },
    /// A blank node label, scoped to the document it came from
    Blank { value: String },
    /// A literal with an optional datatype or language tag
    Literal {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// The default graph, only valid in graph position
    DefaultGraph,
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri {
            value: value.into(),
        }
    }

    pub fn blank(value: impl Into<String>) -> Self {
        Term::Blank {
            value: value.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri { value } => Some(value),
            _ => None,
        }
    }
}

// N-Triples syntax for each term kind
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri { value } => write!(f, "<{}>", value),
            Term::Blank { value } => write!(f, "_:{}", value),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "\"{}\"", escape_literal(value))?;
                if let Some(language) = language {
                    write!(f, "@{}", language)
                } else if let Some(datatype) = datatype {
                    write!(f, "^^<{}>", datatype)
                } else {
                    Ok(())
                }
            }
            Term::DefaultGraph => Ok(()),
        }
    }
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: Term,
}

impl Quad {
    pub fn new(subject: Term, predicate: Term, object: Term, graph: Term) -> Self {
        Quad {
            subject,
            predicate,
            object,
            graph,
        }
    }

    // A quad in the default graph
    pub fn triple(subject: Term, predicate: Term, object: Term) -> Self {
        Quad::new(subject, predicate, object, Term::DefaultGraph)
    }

    pub fn terms(&self) -> [&Term; 4] {
        [&self.subject, &self.predicate, &self.object, &self.graph]
    }
}

// One N-Quads line, without the trailing newline
impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if self.graph != Term::DefaultGraph {
            write!(f, " {}", self.graph)?;
        }
        write!(f, " .")
    }
}

/// A quad with variables: `None` matches any term in that position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QuadPattern {
    pub subject: Option<Term>,
    pub predicate: Option<Term>,
    pub object: Option<Term>,
    pub graph: Option<Term>,
}

impl QuadPattern {
    // The pattern that matches every quad
    pub fn any() -> Self {
        Self::default()
    }

    pub fn new(
        subject: Option<Term>,
        predicate: Option<Term>,
        object: Option<Term>,
        graph: Option<Term>,
    ) -> Self {
        QuadPattern {
            subject,
            predicate,
            object,
            graph,
        }
    }

    pub fn matches(&self, quad: &Quad) -> bool {
        fn position(pattern: &Option<Term>, term: &Term) -> bool {
            pattern.as_ref().map_or(true, |expected| expected == term)
        }

        position(&self.subject, &quad.subject)
            && position(&self.predicate, &quad.predicate)
            && position(&self.object, &quad.object)
            && position(&self.graph, &quad.graph)
    }
}
