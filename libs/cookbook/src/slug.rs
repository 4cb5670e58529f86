//! Slug derivation and per-user uniqueness
//!
//! A slug is the URL token for a recipe. It derives from the title and must
//! be unique among the owner's recipes; collisions get a numeric suffix
//! starting at `-2`.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;
use uuid::Uuid;

use crate::{backend::RecipeStore, error::CookbookResult};

/// Base used when a title contains no sluggable characters
pub const FALLBACK_SLUG: &str = "recipe";

/// Normalize a title into a URL-safe token
///
/// Lowercases, drops everything but ASCII word characters, whitespace and
/// hyphens, then collapses whitespace runs into single hyphens.
pub fn slugify(title: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let strip = STRIP
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("Failed to compile strip regex"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("Failed to compile space regex"));

    let lowered = title.trim().to_lowercase();
    let stripped = strip.replace_all(&lowered, "");
    spaces.replace_all(stripped.trim(), "-").into_owned()
}

/// [`slugify`], falling back to [`FALLBACK_SLUG`] for empty results
pub fn base_slug(title: &str) -> String {
    let base = slugify(title);
    if base.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        base
    }
}

/// True when `slug` is `base` itself or `base-N` with `N >= 2`
pub fn in_family(base: &str, slug: &str) -> bool {
    if slug == base {
        return true;
    }

    slug.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|n| !n.is_empty() && !n.starts_with('0') && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|n| n.parse::<u64>().ok())
        .is_some_and(|n| n >= 2)
}

/// Pick a free slug for `base` given the slugs already taken
///
/// `current` is the entity's own slug when renaming. If it still belongs to
/// the base's family and is free, it is kept as is.
pub fn assign_unique<'a, I>(base: &str, taken: I, current: Option<&str>) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = taken.into_iter().collect();

    if let Some(current) = current {
        if in_family(base, current) && !taken.contains(current) {
            return current.to_string();
        }
    }

    if !taken.contains(base) {
        return base.to_string();
    }

    let mut n = 2u64;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Assigns unique slugs by probing the owner's existing slugs
pub struct SlugAssigner<'a, S: RecipeStore + ?Sized> {
    store: &'a S,
    owner: Uuid,
}

impl<'a, S: RecipeStore + ?Sized> SlugAssigner<'a, S> {
    pub fn new(store: &'a S, owner: Uuid) -> Self {
        Self { store, owner }
    }

    /// Slug for a recipe that does not exist yet
    pub async fn for_new(&self, title: &str) -> CookbookResult<String> {
        let base = base_slug(title);
        let existing = self.store.slugs_with_prefix(self.owner, &base).await?;
        let slug = assign_unique(&base, existing.iter().map(|e| e.slug.as_str()), None);

        debug!("Assigned slug {} for new recipe", slug);
        Ok(slug)
    }

    /// Slug for a renamed recipe; its own row never counts as a collision
    pub async fn for_rename(
        &self,
        title: &str,
        recipe_id: Uuid,
        current_slug: &str,
    ) -> CookbookResult<String> {
        let base = base_slug(title);
        let existing = self.store.slugs_with_prefix(self.owner, &base).await?;
        let taken = existing
            .iter()
            .filter(|e| e.id != recipe_id)
            .map(|e| e.slug.as_str());
        let slug = assign_unique(&base, taken, Some(current_slug));

        debug!("Assigned slug {} for recipe {}", slug, recipe_id);
        Ok(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_normalizes_titles() {
        assert_eq!(slugify("Spicy Peanut Noodles"), "spicy-peanut-noodles");
        assert_eq!(slugify("  Mom's   Apple-Pie! "), "moms-apple-pie");
        assert_eq!(slugify("Crème brûlée"), "crme-brle");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
        assert_eq!(slugify("Tabs\tand\nnewlines"), "tabs-and-newlines");
    }

    #[test]
    fn test_slugify_trims_after_stripping() {
        assert_eq!(slugify("Soup !"), "soup");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(base_slug("!!!"), FALLBACK_SLUG);
    }

    #[test]
    fn test_in_family() {
        assert!(in_family("soup", "soup"));
        assert!(in_family("soup", "soup-2"));
        assert!(in_family("soup", "soup-17"));
        assert!(!in_family("soup", "soup-1"));
        assert!(!in_family("soup", "soup-02"));
        assert!(!in_family("soup", "soup-dumplings"));
        assert!(!in_family("soup", "soupy"));
    }

    #[test]
    fn test_assign_unique_appends_suffixes() {
        assert_eq!(assign_unique("soup", [], None), "soup");
        assert_eq!(assign_unique("soup", ["soup"], None), "soup-2");
        assert_eq!(assign_unique("soup", ["soup", "soup-2"], None), "soup-3");
        assert_eq!(assign_unique("soup", ["soup", "soup-3"], None), "soup-2");
    }

    #[test]
    fn test_assign_unique_ignores_unrelated_prefix_matches() {
        let taken = ["soup-dumplings", "soupy"];
        assert_eq!(assign_unique("soup", taken, None), "soup");
    }

    #[test]
    fn test_assign_unique_keeps_current_family_slug() {
        // Another recipe owns "soup"; this one is "soup-3" after "soup-2" was deleted
        assert_eq!(assign_unique("soup", ["soup"], Some("soup-3")), "soup-3");
        // Current slug from another family is replaced
        assert_eq!(assign_unique("soup", ["soup"], Some("stew")), "soup-2");
        // Current slug taken by someone else is not kept
        assert_eq!(assign_unique("soup", ["soup", "soup-2"], Some("soup-2")), "soup-3");
    }
}
