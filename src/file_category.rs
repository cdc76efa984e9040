/// Extension-based file categorization.
///
/// This module holds the rule table that maps file extensions to named
/// categories (e.g. "Images", "Documents") and the classifier that applies it
/// to file names.
///
/// # Examples
///
/// ```
/// use autotidy::file_category::{Classification, RuleTable};
///
/// let rules = RuleTable::default();
/// assert_eq!(rules.classify(".JPG"), Classification::matched("Images"));
/// assert_eq!(rules.classify(".exe"), Classification::matched("Programs"));
/// assert_eq!(rules.classify(".xyz"), Classification::Unmatched);
/// ```
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A named bucket of file extensions.
///
/// Extensions are stored lowercase with a leading dot and are unique within
/// the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Folder name the files of this category are moved into.
    pub name: String,
    /// Recognized extensions, e.g. `.jpg`.
    pub extensions: Vec<String>,
}

impl Category {
    /// Creates a category, normalizing and deduplicating its extensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use autotidy::file_category::Category;
    ///
    /// let cat = Category::new("Images", ["JPG", ".jpg", ".png"]);
    /// assert_eq!(cat.extensions, vec![".jpg", ".png"]);
    /// ```
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self {
            name: name.into(),
            extensions: normalized,
        }
    }
}

/// Result of classifying a file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// The extension belongs to `category`.
    Matched { category: String },
    /// No category recognizes the extension.
    Unmatched,
}

impl Classification {
    pub fn matched(category: impl Into<String>) -> Self {
        Self::Matched {
            category: category.into(),
        }
    }

    /// Returns the category name for a match.
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Matched { category } => Some(category),
            Self::Unmatched => None,
        }
    }
}

/// Immutable mapping from extensions to categories.
///
/// Categories keep their declaration order. When an extension is listed by
/// more than one category the first declared one wins.
#[derive(Debug, Clone)]
pub struct RuleTable {
    categories: Vec<Category>,
    extension_map: HashMap<String, usize>,
}

impl RuleTable {
    /// Builds a rule table from an ordered list of categories.
    pub fn new(categories: Vec<Category>) -> Self {
        let mut extension_map = HashMap::new();
        for (index, category) in categories.iter().enumerate() {
            for ext in &category.extensions {
                extension_map.entry(ext.clone()).or_insert(index);
            }
        }
        Self {
            categories,
            extension_map,
        }
    }

    /// Builds a rule table from `(name, extensions)` pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use autotidy::file_category::{Classification, RuleTable};
    ///
    /// let rules = RuleTable::from_pairs([("Sheets", &[".csv", ".xlsx"][..])]);
    /// assert_eq!(rules.classify("csv"), Classification::matched("Sheets"));
    /// ```
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [&'a str])>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, exts)| Category::new(name, exts.iter()))
                .collect(),
        )
    }

    /// Categories in declaration order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Returns true if `name` is one of the category folder names.
    pub fn is_category_name(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }

    /// Resolves an extension to a category.
    ///
    /// Comparison is case-insensitive and a missing leading dot is added, so
    /// `"PNG"`, `".png"` and `".Png"` are the same key.
    pub fn classify(&self, extension: &str) -> Classification {
        if extension.is_empty() {
            return Classification::Unmatched;
        }
        match self.extension_map.get(&normalize_extension(extension)) {
            Some(&index) => Classification::matched(self.categories[index].name.clone()),
            None => Classification::Unmatched,
        }
    }

    /// Classifies a file by the extension of its final path component.
    ///
    /// Dotfiles such as `.bashrc` and names without an extension are
    /// `Unmatched`.
    pub fn classify_path(&self, path: &Path) -> Classification {
        match path.extension() {
            Some(ext) => self.classify(&ext.to_string_lossy()),
            None => Classification::Unmatched,
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::from_pairs([
            ("Images", &[".jpg", ".png", ".jpeg", ".gif", ".webp"][..]),
            ("Documents", &[".pdf", ".docx", ".txt"][..]),
            ("Music", &[".mp3", ".wav"][..]),
            ("Videos", &[".mp4", ".mkv"][..]),
            ("Archives", &[".zip", ".rar"][..]),
            ("Programs", &[".exe", ".msi"][..]),
            ("Powerpoints", &[".pptx"][..]),
            ("Applications", &[".exe", ".apk"][..]),
        ])
    }
}

/// Lowercases an extension and makes sure it starts with a dot.
pub fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_order() {
        let rules = RuleTable::default();
        let names: Vec<_> = rules.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Images",
                "Documents",
                "Music",
                "Videos",
                "Archives",
                "Programs",
                "Powerpoints",
                "Applications"
            ]
        );
    }

    #[test]
    fn test_every_unique_extension_matches_its_category() {
        let rules = RuleTable::default();
        for category in rules.categories() {
            for ext in &category.extensions {
                let owners = rules
                    .categories()
                    .iter()
                    .filter(|c| c.extensions.contains(ext))
                    .count();
                if owners == 1 {
                    assert_eq!(
                        rules.classify(ext),
                        Classification::matched(category.name.clone()),
                        "extension {ext}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_classify_case_insensitive() {
        let rules = RuleTable::default();
        assert_eq!(rules.classify(".JPG"), Classification::matched("Images"));
        assert_eq!(rules.classify(".Pdf"), Classification::matched("Documents"));
        assert_eq!(rules.classify("mp3"), Classification::matched("Music"));
    }

    #[test]
    fn test_ambiguous_extension_first_declared_wins() {
        let rules = RuleTable::default();
        assert_eq!(rules.classify(".exe"), Classification::matched("Programs"));
        assert_eq!(rules.classify(".apk"), Classification::matched("Applications"));

        let reversed = RuleTable::from_pairs([
            ("Applications", &[".exe"][..]),
            ("Programs", &[".exe"][..]),
        ]);
        assert_eq!(reversed.classify(".exe"), Classification::matched("Applications"));
    }

    #[test]
    fn test_classify_unmatched() {
        let rules = RuleTable::default();
        assert_eq!(rules.classify(".xyz"), Classification::Unmatched);
        assert_eq!(rules.classify(""), Classification::Unmatched);
        assert_eq!(rules.classify("."), Classification::Unmatched);
    }

    #[test]
    fn test_classify_path() {
        let rules = RuleTable::default();
        assert_eq!(
            rules.classify_path(Path::new("/tmp/holiday.JPEG")),
            Classification::matched("Images")
        );
        assert_eq!(
            rules.classify_path(Path::new("backup.tar.zip")),
            Classification::matched("Archives")
        );
        assert_eq!(rules.classify_path(Path::new(".bashrc")), Classification::Unmatched);
        assert_eq!(rules.classify_path(Path::new("Makefile")), Classification::Unmatched);
    }

    #[test]
    fn test_category_dedupes_extensions() {
        let cat = Category::new("Images", [".PNG", "png", ".gif"]);
        assert_eq!(cat.extensions, vec![".png", ".gif"]);
    }

    #[test]
    fn test_custom_table() {
        let rules = RuleTable::from_pairs([("Code", &["rs", "toml"][..])]);
        assert_eq!(rules.classify(".rs"), Classification::matched("Code"));
        assert_eq!(rules.classify(".jpg"), Classification::Unmatched);
        assert!(rules.is_category_name("Code"));
        assert!(!rules.is_category_name("Images"));
    }
}
