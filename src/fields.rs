//! Structured fields pulled out of recognized document text.
//!
//! Brazilian identity documents carry a CPF (`000.000.000-00`), an RG
//! (`00.000.000-0`), dates in `dd/mm/yyyy` and the holder's full name.
//! Extraction is pattern based; nothing is validated against check digits.
//! OCR often glues a label to its value ("CPF987.654.321-00"), so numbers
//! are only rejected when they continue into neighbouring digits. That keeps
//! an RG from being read out of a longer CPF.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static CPF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3}\.\d{3}\.\d{3}-\d{2}").unwrap());
static RG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2}\.\d{3}\.\d{3}-\d").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2}/\d{2}/\d{4}").unwrap());
static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-z]+ [A-Z][a-z]+ [A-Z][a-z]+").unwrap());

/// Matches not embedded in a longer run of digits
fn standalone<'t>(re: &'static Regex, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
    re.find_iter(text)
        .filter(move |m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !matches!(before, Some(c) if c.is_ascii_digit() || c == '.')
                && !matches!(after, Some(c) if c.is_ascii_digit())
        })
        .map(|m| m.as_str())
}

pub fn extract_cpf(text: &str) -> Option<String> {
    standalone(&CPF, text).next().map(str::to_string)
}

pub fn extract_rg(text: &str) -> Option<String> {
    standalone(&RG, text).next().map(str::to_string)
}

pub fn extract_dates(text: &str) -> Vec<String> {
    standalone(&DATE, text).map(str::to_string).collect()
}

/// Runs of three capitalised words, e.g. "Maria Oliveira Santos"
pub fn extract_names(text: &str) -> Vec<String> {
    NAME.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredFields {
    pub cpf: Option<String>,
    pub rg: Option<String>,
    pub dates: Vec<String>,
    pub names: Vec<String>,
    pub full_text: String,
}

impl StructuredFields {
    pub fn from_text(text: &str) -> Self {
        Self {
            cpf: extract_cpf(text),
            rg: extract_rg(text),
            dates: extract_dates(text),
            names: extract_names(text),
            full_text: text.to_string(),
        }
    }
}

/// Document category guessed from keywords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DocumentType {
    Identity,
    Invoice,
    Contract,
    General,
    /// Label supplied by the user
    Custom(String),
}

impl DocumentType {
    /// Keyword match on the upper-cased text, first rule wins
    pub fn detect(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains("CPF") && upper.contains("RG") {
            Self::Identity
        } else if upper.contains("NOTA FISCAL") {
            Self::Invoice
        } else if upper.contains("CONTRATO") {
            Self::Contract
        } else {
            Self::General
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Identity => "Identity Document",
            Self::Invoice => "Invoice",
            Self::Contract => "Contract",
            Self::General => "General Document",
            Self::Custom(label) => label,
        }
    }
}

impl From<String> for DocumentType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Identity Document" => Self::Identity,
            "Invoice" => Self::Invoice,
            "Contract" => Self::Contract,
            "General Document" => Self::General,
            _ => Self::Custom(label),
        }
    }
}

impl From<DocumentType> for String {
    fn from(doc_type: DocumentType) -> Self {
        doc_type.label().to_string()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
