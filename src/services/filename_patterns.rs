// Filename Patterns
// Recovers categories from CASIA v2.0 file names

use crate::models::{Category, CategoryPair, FilenameRecord};
use regex::Regex;
use std::sync::OnceLock;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

static AUTHENTIC_RE: OnceLock<Regex> = OnceLock::new();
static TAMPERED_RE: OnceLock<Regex> = OnceLock::new();

fn authentic_re() -> &'static Regex {
    AUTHENTIC_RE.get_or_init(|| {
        Regex::new(r"(?i)^Au_(\w+)_\d+\.(jpg|jpeg|png)$").expect("authentic pattern is valid")
    })
}

fn tampered_re() -> &'static Regex {
    TAMPERED_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^Tp_D_[^_]+_[^_]+_[^_]+_([a-zA-Z]+)\d+_([a-zA-Z]+)\d+_\d+\.(jpg|jpeg|png)$",
        )
        .expect("tampered pattern is valid")
    })
}

/// True when the name carries a supported image extension (case-insensitive).
pub fn is_image_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// `Au_<category>_<id>.<ext>` -> category
pub fn parse_authentic(name: &str) -> Option<Category> {
    authentic_re()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| Category::new(m.as_str()))
}

/// `Tp_D_<f1>_<f2>_<f3>_<src><id>_<dst><id>_<id>.<ext>` -> (src, dst)
pub fn parse_tampered(name: &str) -> Option<CategoryPair> {
    let caps = tampered_re().captures(name)?;
    let source = Category::new(caps.get(1)?.as_str());
    let destination = Category::new(caps.get(2)?.as_str());
    Some(CategoryPair::new(source, destination))
}

/// Tries the authentic pattern first, then the tampered one.
pub fn parse_filename(name: &str) -> Option<FilenameRecord> {
    if let Some(category) = parse_authentic(name) {
        return Some(FilenameRecord::Authentic(category));
    }
    parse_tampered(name).map(FilenameRecord::Tampered)
}

/// Category (or category pair) for a decision-table file name.
pub fn extract_category(name: &str) -> Option<FilenameRecord> {
    parse_filename(name)
}

/// A matcher that maps a file name to a grouping key.
pub trait FilenamePattern {
    type Key: Ord + Clone;

    fn key(&self, name: &str) -> Option<Self::Key>;
}

/// Groups authentic files by category, optionally restricted to a set.
#[derive(Debug, Clone, Default)]
pub struct AuthenticPattern {
    allowed: Option<Vec<Category>>,
}

impl AuthenticPattern {
    pub fn any() -> Self {
        Self { allowed: None }
    }

    pub fn restricted(categories: &[Category]) -> Self {
        Self {
            allowed: Some(categories.to_vec()),
        }
    }
}

impl FilenamePattern for AuthenticPattern {
    type Key = Category;

    fn key(&self, name: &str) -> Option<Category> {
        let category = parse_authentic(name)?;
        match &self.allowed {
            Some(allowed) if !allowed.contains(&category) => None,
            _ => Some(category),
        }
    }
}

/// Groups tampered files by (source, destination). With a set, both tokens must belong to it.
#[derive(Debug, Clone, Default)]
pub struct TamperedPairPattern {
    allowed: Option<Vec<Category>>,
}

impl TamperedPairPattern {
    pub fn any() -> Self {
        Self { allowed: None }
    }

    pub fn restricted(categories: &[Category]) -> Self {
        Self {
            allowed: Some(categories.to_vec()),
        }
    }
}

impl FilenamePattern for TamperedPairPattern {
    type Key = CategoryPair;

    fn key(&self, name: &str) -> Option<CategoryPair> {
        let pair = parse_tampered(name)?;
        match &self.allowed {
            Some(allowed)
                if !(allowed.contains(&pair.source) && allowed.contains(&pair.destination)) =>
            {
                None
            }
            _ => Some(pair),
        }
    }
}
