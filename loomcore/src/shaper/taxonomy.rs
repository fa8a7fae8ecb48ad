//! Deterministic, no-LLM taxonomy derivation used by the forced planning-completion
//! fallback (§4.4.6 step 2) and by the fallback pipeline default.

use std::collections::HashMap;

use crate::model::{Block, BlockId, Category, CategoryMapping};

/// Maps a block's DOM-role hint onto a [`Category`], matching the fixed rule table
/// in §4.4.6 step 2 exactly.
#[must_use]
pub fn fallback_category_from_hint(hint: &str) -> Category {
    let hint = hint.to_ascii_lowercase();
    if hint.contains("heading") {
        Category::Headings
    } else if hint.contains("code") {
        Category::Code
    } else if hint.contains("nav") {
        Category::Navigation
    } else if hint.contains("table") {
        Category::Tables
    } else if ["button", "label", "input", "form"].iter().any(|kw| hint.contains(kw)) {
        Category::UiControls
    } else {
        Category::MainContent
    }
}

/// Result of deriving a taxonomy over a job's blocks.
#[derive(Debug, Clone)]
pub struct DerivedTaxonomy {
    pub categories: Vec<Category>,
    pub mapping: CategoryMapping,
}

/// Derive a taxonomy from `pre_ranges_by_id` when present, else from each block's hint.
#[must_use]
pub fn derive_taxonomy(blocks: &HashMap<BlockId, Block>, pre_ranges_by_id: Option<&HashMap<BlockId, String>>) -> DerivedTaxonomy {
    let mut mapping = CategoryMapping::new();

    if let Some(pre_ranges) = pre_ranges_by_id {
        for (block_id, hint) in pre_ranges {
            mapping.insert(block_id.clone(), fallback_category_from_hint(hint));
        }
    } else {
        for (block_id, block) in blocks {
            let hint = block.hint.as_deref().unwrap_or_default();
            mapping.insert(block_id.clone(), fallback_category_from_hint(hint));
        }
    }

    let mut categories: Vec<Category> = mapping.values().copied().collect();
    categories.sort_by_key(|c| format!("{c:?}"));
    categories.dedup();

    DerivedTaxonomy { categories, mapping }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_mapping_matches_the_fixed_rule_table() {
        assert_eq!(fallback_category_from_hint("H2 heading"), Category::Headings);
        assert_eq!(fallback_category_from_hint("pre.code-block"), Category::Code);
        assert_eq!(fallback_category_from_hint("nav.primary-nav"), Category::Navigation);
        assert_eq!(fallback_category_from_hint("table.data"), Category::Tables);
        assert_eq!(fallback_category_from_hint("button.submit"), Category::UiControls);
        assert_eq!(fallback_category_from_hint("label.field"), Category::UiControls);
        assert_eq!(fallback_category_from_hint("div.paragraph"), Category::MainContent);
    }

    #[test]
    fn derive_taxonomy_prefers_pre_ranges_over_block_hints() {
        let mut blocks = HashMap::new();
        blocks.insert("b1".to_string(), Block { id: "b1".into(), hint: Some("div".into()), text: None });
        let mut pre_ranges = HashMap::new();
        pre_ranges.insert("b1".to_string(), "h1 heading".to_string());

        let derived = derive_taxonomy(&blocks, Some(&pre_ranges));
        assert_eq!(derived.mapping["b1"], Category::Headings);
    }
}
