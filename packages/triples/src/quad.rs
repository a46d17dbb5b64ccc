//! Quads and N-Quads serialization.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::vocab::{XSD_BOOLEAN, XSD_DECIMAL, XSD_INTEGER, XSD_STRING};

/// Object position of a quad.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    /// An IRI.
    Iri(String),
    /// A typed literal.
    Literal {
        /// Lexical form.
        value: String,
        /// Datatype IRI.
        datatype: String,
    },
}

impl Term {
    /// IRI term.
    #[must_use]
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(iri.into())
    }

    /// `xsd:decimal` literal.
    #[must_use]
    pub fn decimal(value: f64) -> Self {
        Self::Literal {
            value: value.to_string(),
            datatype: XSD_DECIMAL.to_string(),
        }
    }

    /// `xsd:integer` literal.
    #[must_use]
    pub fn integer(value: u32) -> Self {
        Self::Literal {
            value: value.to_string(),
            datatype: XSD_INTEGER.to_string(),
        }
    }

    /// `xsd:boolean` literal.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Literal {
            value: value.to_string(),
            datatype: XSD_BOOLEAN.to_string(),
        }
    }

    /// `xsd:string` literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: XSD_STRING.to_string(),
        }
    }
}

/// A subject-predicate-object-graph statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quad {
    /// Subject IRI.
    pub subject: String,
    /// Predicate IRI.
    pub predicate: String,
    /// Object term.
    pub object: Term,
    /// Named graph IRI.
    pub graph: String,
}

impl Quad {
    /// One N-Quads line, without the trailing newline.
    #[must_use]
    pub fn to_nquad(&self) -> String {
        let object = match &self.object {
            Term::Iri(iri) => format!("<{}>", escape_iri(iri)),
            Term::Literal { value, datatype } => {
                format!("\"{}\"^^<{}>", escape_literal(value), escape_iri(datatype))
            }
        };
        format!(
            "<{}> <{}> {object} <{}> .",
            escape_iri(&self.subject),
            escape_iri(&self.predicate),
            escape_iri(&self.graph)
        )
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Replaces characters N-Quads forbids inside `<...>` with `\u` escapes.
fn escape_iri(iri: &str) -> String {
    let mut out = String::with_capacity(iri.len());
    for c in iri.chars() {
        if matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\') || c <= ' ' {
            let _ = write!(out, "\\u{:04X}", u32::from(c));
        } else {
            out.push(c);
        }
    }
    out
}

/// Percent-encodes an identifier for use as one IRI path segment.
#[must_use]
pub fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Mints `<base><kind>/<16 hex chars of sha256(parts)>`.
///
/// Parts are separated by a unit separator before hashing so `["ab", "c"]`
/// and `["a", "bc"]` mint different IRIs.
#[must_use]
pub fn mint(base: &str, kind: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for part in parts {
        hasher.update([0x1f_u8]);
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("{base}{kind}/{}", &digest[..16])
}

/// Ordered, duplicate-free collection of quads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadSet {
    quads: BTreeSet<Quad>,
}

impl QuadSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            quads: BTreeSet::new(),
        }
    }

    /// Adds one statement.
    pub fn add(
        &mut self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: Term,
        graph: &str,
    ) {
        self.quads.insert(Quad {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
            graph: graph.to_string(),
        });
    }

    /// Adds every quad of `other`.
    pub fn extend(&mut self, other: Self) {
        self.quads.extend(other.quads);
    }

    /// Quads in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }

    /// Number of quads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Sorted N-Quads document.
    #[must_use]
    pub fn to_nquads(&self) -> String {
        let mut out = String::new();
        for quad in &self.quads {
            out.push_str(&quad.to_nquad());
            out.push('\n');
        }
        out
    }

    /// N-Quads documents of at most `batch_size` quads each.
    #[must_use]
    pub fn batches(&self, batch_size: usize) -> Vec<String> {
        let quads: Vec<&Quad> = self.quads.iter().collect();
        quads
            .chunks(batch_size.max(1))
            .map(|chunk| {
                let mut doc = String::new();
                for quad in chunk {
                    doc.push_str(&quad.to_nquad());
                    doc.push('\n');
                }
                doc
            })
            .collect()
    }

    /// Writes the N-Quads document to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_nquads())?;
        log::info!("Wrote {} quads to {}", self.len(), path.display());
        Ok(())
    }
}
