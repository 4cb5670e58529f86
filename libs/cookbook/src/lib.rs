//! Client core for Larder
//!
//! Holds the editing workflow for recipes and collections: drafts, cover
//! image reconciliation, unique slug assignment and collection membership.
//! Editors are written against the [`backend::Backend`] traits and run over
//! either [`http::HttpBackend`] or [`memory::MemoryBackend`].

pub mod backend;
pub mod config;
pub mod draft;
pub mod editor;
pub mod error;
pub mod form;
pub mod http;
pub mod image;
pub mod linking;
pub mod memory;
pub mod models;
pub mod session;
pub mod slug;
pub mod view;

pub use error::{CookbookError, CookbookResult};

/// Example usage of the editing workflow
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cookbook::config::ClientConfig;
/// use cookbook::editor::RecipeEditor;
/// use cookbook::http::{HttpAuth, HttpBackend};
/// use cookbook::session::SessionHolder;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::from_env();
///     let session = SessionHolder::new(Arc::new(HttpAuth::new(&config)));
///     let user = session.sign_in("cook@example.com", "Secret123").await?;
///
///     let backend = Arc::new(HttpBackend::new(&config, session.subscribe()));
///     let mut editor = RecipeEditor::open(backend, &user, "tomato-soup").await?;
///     editor.start_edit()?;
///     editor.draft_mut()?.title = "Roasted Tomato Soup".to_string();
///     let saved = editor.save().await?;
///     println!("{:?}", saved.slug_changed);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
