//! Content type labels, text normalisation and hierarchy helpers.

use std::{fmt, iter, str::FromStr};

use serde::{Deserialize, Serialize};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{IndexError, catalog::Catalog};

/// A content type label, `app_label.model`, always lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentType(String);

impl ContentType {
    /// The label as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name of this content type's segment under the storage root.
    pub fn segment_name(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// Checks one side of a label.
fn valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for ContentType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        match label.split_once('.') {
            Some((app, model)) if valid_part(app) && valid_part(model) => Ok(Self(label)),
            _ => Err(IndexError::InvalidContentType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ContentType {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentType> for String {
    fn from(ct: ContentType) -> Self {
        ct.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Folds text to its closest ASCII-friendly form.
///
/// Characters are decomposed (NFKD) and combining marks dropped, so `café`
/// becomes `cafe`. Letters without a decomposition are mapped by a small table.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'đ' => out.push('d'),
            'Đ' => out.push('D'),
            'þ' => out.push_str("th"),
            'Þ' => out.push_str("TH"),
            other => out.push(other),
        }
    }
    out
}

/// Normalises a declared field boost.
///
/// Missing and zero boosts mean 1.0; negative or non-finite boosts are rejected.
pub fn normalize_boost(target: &str, boost: Option<f32>) -> Result<f32, IndexError> {
    match boost {
        None => Ok(1.0),
        Some(b) => query_factor(target, b).map(|b| if b == 0.0 { 1.0 } else { b }),
    }
}

/// Validates a boost factor written in a query.
///
/// Query factors multiply as given, so zero is kept.
pub fn query_factor(target: &str, factor: f32) -> Result<f32, IndexError> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(factor)
    } else {
        Err(IndexError::InvalidBoost {
            target: target.to_string(),
            boost: factor,
        })
    }
}

/// The content type, if indexed, followed by its indexed ancestors.
///
/// Writes fan out over this list.
pub fn lineage<C: Catalog + ?Sized>(catalog: &C, ct: &ContentType) -> Vec<ContentType> {
    let own = catalog.is_indexed(ct).then(|| ct.clone());
    dedup(own.into_iter().chain(catalog.ancestors(ct)))
}

/// The content type followed by its indexed descendants; searches merge over
/// this list.
///
/// Unindexed descendants have no segment. Their records are found through the
/// segments they were written to.
pub fn search_targets<C: Catalog + ?Sized>(catalog: &C, ct: &ContentType) -> Vec<ContentType> {
    let descendants = catalog
        .descendants(ct)
        .into_iter()
        .filter(|d| catalog.is_indexed(d));
    dedup(iter::once(ct.clone()).chain(descendants))
}

/// Removes repeats, keeping first occurrences in order.
fn dedup(items: impl Iterator<Item = ContentType>) -> Vec<ContentType> {
    let mut out: Vec<ContentType> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
