//! Recipe creation and editing against the in-memory backend

use std::sync::Arc;

use cookbook::{
    CookbookError,
    backend::{CollectionStore, LinkStore, RecipeStore},
    draft::RecipeDraft,
    editor::RecipeEditor,
    form::NewRecipeForm,
    image::{ImageFile, ImagePlan},
    memory::MemoryBackend,
    models::{NewCollection, Recipe, RecipePatch},
    session::CurrentUser,
};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn cook() -> CurrentUser {
    CurrentUser {
        id: Uuid::new_v4(),
        email: "cook@example.com".to_string(),
    }
}

fn png() -> ImageFile {
    ImageFile::new("cover.png", "image/png", vec![137, 80, 78, 71])
}

fn jpeg() -> ImageFile {
    ImageFile::new("photo.jpeg", "image/jpeg", vec![255, 216, 255])
}

async fn create(backend: &Arc<MemoryBackend>, user: &CurrentUser, title: &str) -> Recipe {
    let mut form = NewRecipeForm::new(Arc::clone(backend), user);
    form.draft.title = title.to_string();
    form.draft.add_ingredient("2 tomatoes");
    form.draft.add_step("Simmer");
    form.submit().await.expect("Failed to create recipe")
}

#[tokio::test]
async fn test_same_base_gets_numeric_suffixes() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let first = create(&backend, &user, "Tomato Soup").await;
    let second = create(&backend, &user, "tomato soup").await;
    let third = create(&backend, &user, "Tomato Soup!").await;

    assert_eq!(first.slug, "tomato-soup");
    assert_eq!(second.slug, "tomato-soup-2");
    assert_eq!(third.slug, "tomato-soup-3");

    // Slugs are unique per user only
    let other = create(&backend, &cook(), "Tomato Soup").await;
    assert_eq!(other.slug, "tomato-soup");
}

#[tokio::test]
async fn test_title_without_sluggable_characters_falls_back() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    assert_eq!(create(&backend, &user, "???").await.slug, "recipe");
    assert_eq!(create(&backend, &user, "!!!").await.slug, "recipe-2");
}

#[tokio::test]
async fn test_rename_within_same_base_keeps_slug() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup-2")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.draft_mut().unwrap().title = "Tomato  Soup!".to_string();

    let saved = editor.save().await.unwrap();
    assert_eq!(saved.slug_changed, None);

    let recipe = editor.recipe().unwrap();
    assert_eq!(recipe.title, "Tomato  Soup!");
    assert_eq!(recipe.slug, "tomato-soup-2");
}

#[tokio::test]
async fn test_rename_to_new_base_reports_new_slug() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let original = create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.draft_mut().unwrap().title = "  Pea Soup ".to_string();

    let saved = editor.save().await.unwrap();
    assert_eq!(saved.slug_changed.as_deref(), Some("pea-soup"));
    assert!(!editor.is_editing());

    let reloaded = backend.recipe_by_slug(user.id, "pea-soup").await.unwrap();
    assert_eq!(reloaded.id, original.id);
    assert_eq!(reloaded.title, "Pea Soup");
}

#[tokio::test]
async fn test_cancel_restores_snapshot_exactly() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    let snapshot = RecipeDraft::from_recipe(editor.recipe().unwrap());

    editor.start_edit().unwrap();
    backend.clear_calls();

    let draft = editor.draft_mut().unwrap();
    draft.title = "Something else".to_string();
    draft.notes = "Needs salt".to_string();
    draft.add_ingredient("basil");
    draft.add_tag("quick");
    draft.remove_step(0);
    editor.stage_image(png()).unwrap();
    assert_eq!(editor.previews().live_count(), 1);

    editor.cancel_edit();

    assert!(!editor.is_editing());
    assert_eq!(editor.draft(), &snapshot);
    assert_eq!(editor.image().plan(), ImagePlan::Keep);
    assert_eq!(editor.previews().live_count(), 0);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_disallowed_image_is_rejected_before_any_request() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    backend.clear_calls();

    let gif = ImageFile::new("anim.gif", "image/gif", vec![71, 73, 70]);
    let result = editor.stage_image(gif.clone());
    assert!(matches!(result, Err(CookbookError::UnsupportedImageType(_))));
    assert_eq!(
        editor.last_error(),
        Some("Only JPG, PNG, or WEBP allowed (got image/gif)")
    );

    let mut form = NewRecipeForm::new(Arc::clone(&backend), &user);
    assert_err!(form.pick_image(gif));

    assert!(backend.calls().is_empty());
    assert!(backend.object_paths().is_empty());
}

#[tokio::test]
async fn test_blank_title_fails_without_request() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.draft_mut().unwrap().title = "   ".to_string();
    backend.clear_calls();

    let result = editor.save().await;
    assert!(matches!(result, Err(CookbookError::Validation(_))));
    assert!(editor.is_editing());
    assert_eq!(editor.last_error(), Some("Recipe name is required"));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_edits_require_edit_mode() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();

    assert!(matches!(editor.draft_mut(), Err(CookbookError::NotEditing)));
    assert!(matches!(editor.stage_image(png()), Err(CookbookError::NotEditing)));
    assert!(matches!(editor.save().await, Err(CookbookError::NotEditing)));
}

#[tokio::test]
async fn test_replacing_cover_uploads_and_removes_previous_object() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let recipe = create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.stage_image(png()).unwrap();
    assert_ok!(editor.save().await);

    let png_path = format!("recipes/{}/{}/cover.png", user.id, recipe.id);
    assert_eq!(editor.recipe().unwrap().image_path.as_deref(), Some(png_path.as_str()));
    assert!(editor.image_url().unwrap().starts_with("memory://recipe-images/"));
    assert_eq!(backend.object(&png_path).unwrap().content_type, "image/png");
    assert_eq!(editor.previews().live_count(), 0);

    editor.start_edit().unwrap();
    editor.stage_image(jpeg()).unwrap();
    assert_ok!(editor.save().await);

    let jpg_path = format!("recipes/{}/{}/cover.jpg", user.id, recipe.id);
    assert_eq!(editor.recipe().unwrap().image_path.as_deref(), Some(jpg_path.as_str()));
    assert_eq!(backend.object_paths(), vec![jpg_path]);
}

#[tokio::test]
async fn test_removing_cover_clears_path_and_object() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.stage_image(png()).unwrap();
    editor.save().await.unwrap();

    editor.start_edit().unwrap();
    editor.clear_image().unwrap();
    assert_eq!(editor.display_image_url(), None);
    editor.save().await.unwrap();

    assert_eq!(editor.recipe().unwrap().image_path, None);
    assert_eq!(editor.image_url(), None);
    assert!(backend.object_paths().is_empty());
}

#[tokio::test]
async fn test_failed_cleanup_of_old_object_does_not_fail_save() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let recipe = create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.stage_image(png()).unwrap();
    editor.save().await.unwrap();

    backend.fail_next("remove_images");
    editor.start_edit().unwrap();
    editor.stage_image(jpeg()).unwrap();
    assert_ok!(editor.save().await);

    let png_path = format!("recipes/{}/{}/cover.png", user.id, recipe.id);
    let jpg_path = format!("recipes/{}/{}/cover.jpg", user.id, recipe.id);
    assert_eq!(editor.recipe().unwrap().image_path.as_deref(), Some(jpg_path.as_str()));
    // The superseded object is left for the orphan sweeper
    assert!(backend.object(&png_path).is_some());
}

#[tokio::test]
async fn test_signing_failure_leaves_no_display_url() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.stage_image(png()).unwrap();
    backend.fail_next("sign_image_url");

    assert_ok!(editor.save().await);
    assert!(editor.recipe().unwrap().image_path.is_some());
    assert_eq!(editor.image_url(), None);
}

#[tokio::test]
async fn test_failed_upload_keeps_edit_mode_and_committed_fields() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.start_edit().unwrap();
    editor.draft_mut().unwrap().title = "Pea Soup".to_string();
    editor.stage_image(png()).unwrap();
    backend.fail_next("upload_image");

    assert_err!(editor.save().await);
    assert!(editor.is_editing());
    assert!(editor.last_error().unwrap().contains("injected failure"));
    assert_eq!(editor.recipe().unwrap().slug, "pea-soup");
    assert!(editor.image().staged_file().is_some());

    backend.clear_calls();
    let saved = editor.save().await.unwrap();
    assert_eq!(saved.slug_changed, None);
    assert!(!editor.is_editing());
    assert_eq!(editor.last_error(), None);
    assert!(editor.recipe().unwrap().image_path.is_some());
    assert!(!backend.calls().contains(&"slugs_with_prefix".to_string()));
}

#[tokio::test]
async fn test_stale_loads_are_discarded() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let recipe = create(&backend, &user, "Tomato Soup").await;

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();

    let stale = editor.fetch("tomato-soup").await.unwrap();
    backend
        .update_recipe(
            user.id,
            recipe.id,
            &RecipePatch {
                title: Some("Tomato Soup v2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let fresh = editor.fetch("tomato-soup").await.unwrap();

    assert!(editor.apply(fresh));
    assert!(!editor.apply(stale));
    assert_eq!(editor.recipe().unwrap().title, "Tomato Soup v2");

    let late = editor.fetch("tomato-soup").await.unwrap();
    editor.mount().unmount();
    assert!(!editor.apply(late));
}

#[tokio::test]
async fn test_recipe_memberships() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let weeknight = backend
        .insert_collection(
            user.id,
            &NewCollection {
                name: "Weeknight".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();
    let soups = backend
        .insert_collection(
            user.id,
            &NewCollection {
                name: "Soups".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();

    let plan = editor.set_collections(&[weeknight.id, soups.id]).await.unwrap();
    assert_eq!(plan.insert.len(), 2);
    assert_eq!(editor.collection_ids(), &[soups.id, weeknight.id]);

    let plan = editor.set_collections(&[soups.id]).await.unwrap();
    assert_eq!(plan.delete, vec![weeknight.id]);
    assert!(plan.insert.is_empty());
    assert_eq!(editor.collection_ids(), &[soups.id]);
}

#[tokio::test]
async fn test_delete_removes_cover_memberships_and_row() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    let recipe = create(&backend, &user, "Tomato Soup").await;
    let soups = backend
        .insert_collection(
            user.id,
            &NewCollection {
                name: "Soups".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

    let mut editor = RecipeEditor::open(Arc::clone(&backend), &user, "tomato-soup")
        .await
        .unwrap();
    editor.set_collections(&[soups.id]).await.unwrap();
    editor.start_edit().unwrap();
    editor.stage_image(png()).unwrap();
    editor.save().await.unwrap();

    editor.delete().await.unwrap();

    assert!(!editor.mount().is_mounted());
    assert!(editor.recipe().is_none());
    assert!(backend.object_paths().is_empty());
    assert!(backend.links_for_collection(user.id, soups.id).await.unwrap().is_empty());
    assert!(matches!(
        backend.recipe_by_id(user.id, recipe.id).await,
        Err(CookbookError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_new_recipe_form_retries_only_the_cover() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let mut form = NewRecipeForm::new(Arc::clone(&backend), &user);
    form.draft.title = "Tomato Soup".to_string();
    form.pick_image(png()).unwrap();
    assert!(form.preview_url().is_some());

    backend.fail_next("upload_image");
    assert_err!(form.submit().await);
    let created = form.created().cloned().unwrap();
    assert_eq!(created.image_path, None);

    let recipe = form.submit().await.unwrap();
    assert_eq!(recipe.id, created.id);
    assert_eq!(
        recipe.image_path,
        Some(format!("recipes/{}/{}/cover.png", user.id, recipe.id))
    );
    assert_eq!(form.previews().live_count(), 0);
    assert_eq!(backend.recent_recipes(user.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_new_recipe_form_retry_saves_draft_edits() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let mut form = NewRecipeForm::new(Arc::clone(&backend), &user);
    form.draft.title = "Tomato Soup".to_string();
    form.pick_image(png()).unwrap();

    backend.fail_next("upload_image");
    assert_err!(form.submit().await);
    let created = form.created().cloned().unwrap();
    assert_eq!(created.slug, "tomato-soup");

    form.draft.title = "Tomato Bisque".to_string();
    form.draft.add_ingredient("cream");
    let recipe = form.submit().await.unwrap();

    assert_eq!(recipe.id, created.id);
    assert_eq!(recipe.title, "Tomato Bisque");
    assert_eq!(recipe.slug, "tomato-bisque");
    assert_eq!(recipe.ingredients, vec!["cream".to_string()]);
    assert!(recipe.image_path.is_some());

    let stored = backend.recipe_by_slug(user.id, "tomato-bisque").await.unwrap();
    assert_eq!(stored.id, created.id);
    assert_eq!(stored.ingredients, vec!["cream".to_string()]);
    assert_err!(backend.recipe_by_slug(user.id, "tomato-soup").await);
    assert_eq!(backend.recent_recipes(user.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_new_recipe_form_resets_after_success() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();

    let mut form = NewRecipeForm::new(Arc::clone(&backend), &user);
    form.draft.title = "Tomato Soup".to_string();
    form.draft.add_ingredient("2 tomatoes");
    let first = form.submit().await.unwrap();

    assert!(form.created().is_none());
    assert_eq!(form.draft, RecipeDraft::default());

    form.draft.title = "Pea Soup".to_string();
    let second = form.submit().await.unwrap();

    assert_ne!(second.id, first.id);
    assert_eq!(second.slug, "pea-soup");
    assert!(second.ingredients.is_empty());
    assert_eq!(backend.recent_recipes(user.id, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_recipes_are_scoped_to_their_owner() {
    let backend = Arc::new(MemoryBackend::new());
    let user = cook();
    create(&backend, &user, "Tomato Soup").await;

    let stranger = cook();
    let result = RecipeEditor::open(Arc::clone(&backend), &stranger, "tomato-soup").await;
    assert!(matches!(result, Err(CookbookError::NotFound(_))));
    assert!(backend.recent_recipes(stranger.id, None).await.unwrap().is_empty());
}
