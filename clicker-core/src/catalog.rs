// Category catalog: the value pool each face button draws from. Loaded
// from `DEMOS.JSN`; a compiled-in set keeps the buttons useful when the
// card carries no catalog.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::json::{self, Value};
use crate::state::{CATEGORIES, Category};
use crate::storage::{self, Storage};

const FALLBACK: [&[&str]; 4] = [
    &["child", "teenager", "adult", "elder"],
    &["casual", "formal", "sporty", "vintage"],
    &["smiling", "serious", "surprised", "thoughtful"],
    &["outdoors", "studio", "city street", "cafe"],
];

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    values: [Vec<String>; 4],
}

impl Default for Catalog {
    fn default() -> Self {
        let mut values: [Vec<String>; 4] = Default::default();
        for (dst, src) in values.iter_mut().zip(FALLBACK) {
            *dst = src.iter().map(|s| s.to_string()).collect();
        }
        Self { values }
    }
}

impl Catalog {
    /// Load `DEMOS.JSN`; categories missing from the file keep their
    /// compiled-in values.
    pub fn load(storage: &mut dyn Storage) -> Self {
        let mut catalog = Self::default();
        let data = match storage.read(storage::CATALOG_FILE) {
            Ok(Some(d)) => d,
            _ => return catalog,
        };
        let Ok(doc) = json::parse(&data) else {
            log::warn!("catalog file unreadable, using built-in values");
            return catalog;
        };
        let Some(cats) = doc.get("categories") else {
            return catalog;
        };

        for cat in CATEGORIES {
            let Some(list) = cats.get(cat.key()).and_then(|c| c.get("values")) else {
                continue;
            };
            let Value::Arr(items) = list else { continue };
            let parsed: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect();
            if !parsed.is_empty() {
                catalog.values[cat.index()] = parsed;
            }
        }
        catalog
    }

    pub fn values(&self, cat: Category) -> &[String] {
        &self.values[cat.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    #[test]
    fn fallback_covers_every_category() {
        let catalog = Catalog::default();
        for cat in CATEGORIES {
            assert!(catalog.values(cat).len() >= 2);
        }
    }

    #[test]
    fn file_overrides_only_present_categories() {
        let mut s = MemStorage::new();
        s.write(
            storage::CATALOG_FILE,
            br#"{"categories": {"A": {"values": ["young", "old"]}}}"#,
        )
        .unwrap();

        let catalog = Catalog::load(&mut s);
        assert_eq!(catalog.values(Category::A), ["young", "old"]);
        assert_eq!(catalog.values(Category::B), Catalog::default().values(Category::B));
    }

    #[test]
    fn unreadable_file_keeps_builtin_values() {
        let mut s = MemStorage::new();
        s.write(storage::CATALOG_FILE, b"[[[").unwrap();
        assert_eq!(Catalog::load(&mut s), Catalog::default());
    }
}
