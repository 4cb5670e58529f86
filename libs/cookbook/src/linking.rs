//! Collection membership reconciliation
//!
//! Membership changes are applied as a diff between the links that exist and
//! the links the user wants. Links present on both sides are never touched.

use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use crate::{
    backend::{LinkStore, RecipeStore},
    error::CookbookResult,
    models::{Link, RecipeSummary},
};

/// Ids to link and unlink
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkPlan {
    pub insert: Vec<Uuid>,
    pub delete: Vec<Uuid>,
}

impl LinkPlan {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.delete.is_empty()
    }
}

/// Diff `existing` against `desired`
///
/// Inserts follow the order of `desired` with duplicates dropped; deletes
/// follow the order of `existing`.
pub fn plan_links(existing: &[Uuid], desired: &[Uuid]) -> LinkPlan {
    let existing_set: HashSet<Uuid> = existing.iter().copied().collect();
    let desired_set: HashSet<Uuid> = desired.iter().copied().collect();

    let mut seen = HashSet::new();
    let insert = desired
        .iter()
        .copied()
        .filter(|id| !existing_set.contains(id) && seen.insert(*id))
        .collect();

    let delete = existing
        .iter()
        .copied()
        .filter(|id| !desired_set.contains(id))
        .collect();

    LinkPlan { insert, delete }
}

/// Applies membership changes for one owner
pub struct MembershipEditor<'a, S: LinkStore + ?Sized> {
    store: &'a S,
    owner: Uuid,
}

impl<'a, S: LinkStore + ?Sized> MembershipEditor<'a, S> {
    pub fn new(store: &'a S, owner: Uuid) -> Self {
        Self { store, owner }
    }

    /// Collections currently containing the recipe
    pub async fn collections_of(&self, recipe_id: Uuid) -> CookbookResult<Vec<Uuid>> {
        let rows = self.store.links_for_recipe(self.owner, recipe_id).await?;
        Ok(rows.iter().map(|r| r.collection_id).collect())
    }

    /// Recipes currently in the collection, most recently added first
    pub async fn recipes_of(&self, collection_id: Uuid) -> CookbookResult<Vec<Uuid>> {
        let rows = self
            .store
            .links_for_collection(self.owner, collection_id)
            .await?;
        Ok(rows.iter().map(|r| r.recipe_id).collect())
    }

    /// Make the recipe belong to exactly `desired` collections
    pub async fn set_collections_of(
        &self,
        recipe_id: Uuid,
        desired: &[Uuid],
    ) -> CookbookResult<LinkPlan> {
        let existing = self.collections_of(recipe_id).await?;
        let plan = plan_links(&existing, desired);

        let link = |collection_id: &Uuid| Link {
            collection_id: *collection_id,
            recipe_id,
        };
        self.apply(&plan, link).await?;

        info!(
            "Recipe {} memberships: +{} -{}",
            recipe_id,
            plan.insert.len(),
            plan.delete.len()
        );
        Ok(plan)
    }

    /// Make the collection contain exactly `desired` recipes
    pub async fn set_recipes_of(
        &self,
        collection_id: Uuid,
        desired: &[Uuid],
    ) -> CookbookResult<LinkPlan> {
        let existing = self.recipes_of(collection_id).await?;
        let plan = plan_links(&existing, desired);

        let link = |recipe_id: &Uuid| Link {
            collection_id,
            recipe_id: *recipe_id,
        };
        self.apply(&plan, link).await?;

        info!(
            "Collection {} members: +{} -{}",
            collection_id,
            plan.insert.len(),
            plan.delete.len()
        );
        Ok(plan)
    }

    async fn apply(&self, plan: &LinkPlan, link: impl Fn(&Uuid) -> Link) -> CookbookResult<()> {
        if !plan.delete.is_empty() {
            let removed: Vec<Link> = plan.delete.iter().map(&link).collect();
            self.store.delete_links(self.owner, &removed).await?;
        }

        if !plan.insert.is_empty() {
            let added: Vec<Link> = plan.insert.iter().map(&link).collect();
            self.store.insert_links(self.owner, &added).await?;
        }

        Ok(())
    }
}

/// Recipes of a collection in join order, most recently added first
///
/// Join rows pointing at recipes that no longer exist are skipped.
pub async fn collection_recipes<S>(
    store: &S,
    owner: Uuid,
    collection_id: Uuid,
) -> CookbookResult<Vec<RecipeSummary>>
where
    S: RecipeStore + LinkStore + ?Sized,
{
    let rows = store.links_for_collection(owner, collection_id).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.recipe_id).collect();
    let mut by_id: HashMap<Uuid, RecipeSummary> = store
        .recipes_by_ids(owner, &ids)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_links_diffs_both_ways() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let plan = plan_links(&[a, b], &[b, c]);
        assert_eq!(plan.insert, vec![c]);
        assert_eq!(plan.delete, vec![a]);
    }

    #[test]
    fn test_plan_links_is_empty_when_unchanged() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(plan_links(&[a, b], &[b, a]).is_empty());
        assert!(plan_links(&[], &[]).is_empty());
    }

    #[test]
    fn test_plan_links_drops_duplicate_inserts() {
        let a = Uuid::new_v4();
        let plan = plan_links(&[], &[a, a]);
        assert_eq!(plan.insert, vec![a]);
    }
}
