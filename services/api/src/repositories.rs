//! Repositories for database operations
//!
//! Every query is scoped to the owner taken from the access token.

pub mod collections;
pub mod links;
pub mod recipes;

pub use collections::CollectionRepository;
pub use links::LinkRepository;
pub use recipes::RecipeRepository;
