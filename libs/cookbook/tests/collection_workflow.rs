//! Collection editing and membership against the in-memory backend

use std::sync::Arc;

use cookbook::{
    CookbookError,
    backend::{CollectionStore, LinkStore, RecipeStore},
    draft::CollectionDraft,
    editor::CollectionEditor,
    form::NewCollectionForm,
    image::ImageFile,
    memory::MemoryBackend,
    models::{Collection, Link, NewRecipe, Recipe},
    session::CurrentUser,
};
use tokio_test::assert_ok;
use uuid::Uuid;

fn cook() -> CurrentUser {
    CurrentUser {
        id: Uuid::new_v4(),
        email: "cook@example.com".to_string(),
    }
}

fn webp() -> ImageFile {
    ImageFile::new("cover.webp", "image/webp", vec![82, 73, 70, 70])
}

async fn recipe(backend: &MemoryBackend, user: &CurrentUser, slug: &str) -> Recipe {
    backend
        .insert_recipe(
            user.id,
            &NewRecipe {
                title: slug.replace('-', " "),
                slug: slug.to_string(),
                ingredients: Vec::new(),
                steps: Vec::new(),
                notes: None,
                tags: Vec::new(),
            },
        )
        .await
        .expect("Failed to insert recipe")
}

async fn collection(backend: &Arc<MemoryBackend>, user: &CurrentUser, name: &str) -> Collection {
    let mut form = NewCollectionForm::new(Arc::clone(backend), user);
    form.draft.name = name.to_string();
    form.submit().await.expect("Failed to create collection")
}

#[tokio::test]
async fn test_recipes_listed_most_recently_added_first() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let soups = collection(&backend, &user, "Soups").await;
    let a = recipe(&backend, &user, "tomato-soup").await;
    let b = recipe(&backend, &user, "pea-soup").await;
    let c = recipe(&backend, &user, "miso-soup").await;

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    editor.add_recipe(b.id).await.unwrap();
    editor.add_recipe(a.id).await.unwrap();
    editor.add_recipe(c.id).await.unwrap();

    let order: Vec<Uuid> = editor.recipes().iter().map(|r| r.id).collect();
    assert_eq!(order, vec![c.id, a.id, b.id]);

    // A fresh load sees the same order
    let reopened = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    let order: Vec<Uuid> = reopened.recipes().iter().map(|r| r.id).collect();
    assert_eq!(order, vec![c.id, a.id, b.id]);
}

#[tokio::test]
async fn test_relinking_never_duplicates_rows() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let soups = collection(&backend, &user, "Soups").await;
    let a = recipe(&backend, &user, "tomato-soup").await;

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    editor.add_recipe(a.id).await.unwrap();
    editor.remove_recipe(a.id).await.unwrap();
    assert!(editor.recipes().is_empty());
    editor.add_recipe(a.id).await.unwrap();

    // Adding a member twice is a no-op
    let plan = editor.add_recipe(a.id).await.unwrap();
    assert!(plan.is_empty());

    let link = Link {
        collection_id: soups.id,
        recipe_id: a.id,
    };
    backend.insert_links(user.id, &[link]).await.unwrap();
    backend.insert_links(user.id, &[link, link]).await.unwrap();

    assert_eq!(backend.link_rows().len(), 1);
    assert_eq!(editor.recipes().len(), 1);
}

#[tokio::test]
async fn test_set_recipes_leaves_common_rows_untouched() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let soups = collection(&backend, &user, "Soups").await;
    let a = recipe(&backend, &user, "tomato-soup").await;
    let b = recipe(&backend, &user, "pea-soup").await;
    let c = recipe(&backend, &user, "miso-soup").await;

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    editor.set_recipes(&[a.id, b.id]).await.unwrap();
    let kept = backend
        .link_rows()
        .into_iter()
        .find(|row| row.recipe_id == b.id)
        .unwrap();

    let plan = editor.set_recipes(&[b.id, c.id]).await.unwrap();
    assert_eq!(plan.insert, vec![c.id]);
    assert_eq!(plan.delete, vec![a.id]);

    let still = backend
        .link_rows()
        .into_iter()
        .find(|row| row.recipe_id == b.id)
        .unwrap();
    assert_eq!(still.added_at, kept.added_at);
}

#[tokio::test]
async fn test_save_trims_description_and_cancel_restores() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let soups = collection(&backend, &user, "Soups").await;

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    editor.start_edit().unwrap();
    let draft = editor.draft_mut().unwrap();
    draft.name = " Winter Soups ".to_string();
    draft.description = "  warming bowls  ".to_string();
    assert_ok!(editor.save().await);

    let saved = editor.collection().unwrap();
    assert_eq!(saved.name, "Winter Soups");
    assert_eq!(saved.description.as_deref(), Some("warming bowls"));

    let snapshot = CollectionDraft::from_collection(saved);
    editor.start_edit().unwrap();
    editor.draft_mut().unwrap().description = "   ".to_string();
    editor.stage_image(webp()).unwrap();
    editor.cancel_edit();
    assert_eq!(editor.draft(), &snapshot);
    assert_eq!(editor.previews().live_count(), 0);

    editor.start_edit().unwrap();
    editor.draft_mut().unwrap().description = "   ".to_string();
    editor.save().await.unwrap();
    assert_eq!(editor.collection().unwrap().description, None);
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let mut form = NewCollectionForm::new(Arc::clone(&backend), &user);
    form.draft.name = "  ".to_string();
    let result = form.submit().await;

    assert!(matches!(result, Err(CookbookError::Validation(_))));
    assert_eq!(form.last_error(), Some("Collection name is required"));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_new_collection_form_retry_saves_draft_edits() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let mut form = NewCollectionForm::new(Arc::clone(&backend), &user);
    form.draft.name = "Soups".to_string();
    form.pick_image(webp()).unwrap();

    backend.fail_next("upload_image");
    assert!(form.submit().await.is_err());
    let created = form.created().cloned().unwrap();

    form.draft.name = "Winter Soups".to_string();
    form.draft.description = "For cold nights".to_string();
    let soups = form.submit().await.unwrap();

    assert_eq!(soups.id, created.id);
    assert_eq!(soups.name, "Winter Soups");
    assert_eq!(soups.description.as_deref(), Some("For cold nights"));
    assert!(soups.image_path.is_some());
    assert!(form.created().is_none());
    assert_eq!(form.draft, CollectionDraft::default());

    let stored = backend.collection(user.id, created.id).await.unwrap();
    assert_eq!(stored.name, "Winter Soups");
    assert_eq!(backend.collections(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cover_replacement_on_collection() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let mut form = NewCollectionForm::new(Arc::clone(&backend), &user);
    form.draft.name = "Soups".to_string();
    form.pick_image(webp()).unwrap();
    let soups = form.submit().await.unwrap();

    let webp_path = format!("collections/{}/{}/cover.webp", user.id, soups.id);
    assert_eq!(soups.image_path.as_deref(), Some(webp_path.as_str()));

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    assert!(editor.image_url().is_some());

    editor.start_edit().unwrap();
    editor
        .stage_image(ImageFile::new("cover.png", "image/png", vec![1]))
        .unwrap();
    editor.save().await.unwrap();

    let png_path = format!("collections/{}/{}/cover.png", user.id, soups.id);
    assert_eq!(
        editor.collection().unwrap().image_path.as_deref(),
        Some(png_path.as_str())
    );
    assert_eq!(backend.object_paths(), vec![png_path]);
}

#[tokio::test]
async fn test_delete_removes_cover_and_join_rows() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let mut form = NewCollectionForm::new(Arc::clone(&backend), &user);
    form.draft.name = "Soups".to_string();
    form.pick_image(webp()).unwrap();
    let soups = form.submit().await.unwrap();
    let other = collection(&backend, &user, "Weeknight").await;

    let a = recipe(&backend, &user, "tomato-soup").await;
    let b = recipe(&backend, &user, "pea-soup").await;
    backend
        .insert_links(
            user.id,
            &[
                Link {
                    collection_id: soups.id,
                    recipe_id: a.id,
                },
                Link {
                    collection_id: soups.id,
                    recipe_id: b.id,
                },
                Link {
                    collection_id: other.id,
                    recipe_id: a.id,
                },
            ],
        )
        .await
        .unwrap();

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    assert_eq!(editor.recipes().len(), 2);
    editor.delete().await.unwrap();

    assert!(!editor.mount().is_mounted());
    assert!(backend.object_paths().is_empty());
    assert!(matches!(
        backend.collection(user.id, soups.id).await,
        Err(CookbookError::NotFound(_))
    ));

    // Only the other collection's link survives; recipes are untouched
    let rows = backend.link_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].collection_id, other.id);
    assert_eq!(backend.recent_recipes(user.id, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_join_cleanup_does_not_block_delete() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let soups = collection(&backend, &user, "Soups").await;

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    backend.fail_next("clear_collection_links");
    assert_ok!(editor.delete().await);
    assert!(backend.collections(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_delete_keeps_view_mounted() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let soups = collection(&backend, &user, "Soups").await;

    let mut editor = CollectionEditor::open(Arc::clone(&backend), &user, soups.id)
        .await
        .unwrap();
    backend.fail_next("delete_collection");

    assert!(editor.delete().await.is_err());
    assert!(editor.mount().is_mounted());
    assert!(editor.last_error().is_some());
    assert!(editor.collection().is_some());
}
