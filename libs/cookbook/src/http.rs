//! HTTP backend talking to the auth and API services
//!
//! Owner scoping happens on the server from the bearer token, so the `owner`
//! arguments of the store traits are only used for logging here.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::{
    backend::{CollectionStore, ImageStore, LinkStore, RecipeStore},
    config::ClientConfig,
    error::{CookbookError, CookbookResult},
    image::ImageFile,
    models::{
        Collection, CollectionPatch, CollectionRecipe, Link, NewCollection, NewRecipe, Recipe,
        RecipePatch, RecipeSummary, SlugEntry,
    },
    session::{AuthBackend, CurrentUser, Session},
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    signed_url: String,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Turn a non-success response into a [`CookbookError`]
async fn error_for(response: Response) -> CookbookError {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };

    match status {
        StatusCode::UNAUTHORIZED => CookbookError::Unauthorized,
        StatusCode::NOT_FOUND => CookbookError::NotFound(message),
        StatusCode::BAD_REQUEST => CookbookError::Validation(message),
        StatusCode::CONFLICT => CookbookError::Conflict(message),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => CookbookError::UnsupportedImageType(message),
        _ => CookbookError::Backend(format!("{}: {}", status, message)),
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> CookbookResult<T> {
    if !response.status().is_success() {
        return Err(error_for(response).await);
    }
    Ok(response.json::<T>().await?)
}

async fn expect_success(response: Response) -> CookbookResult<()> {
    if !response.status().is_success() {
        return Err(error_for(response).await);
    }
    Ok(())
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    api_url: String,
    session: watch::Receiver<Option<Session>>,
}

impl HttpBackend {
    /// Create a backend following the session published by a `SessionHolder`
    pub fn new(config: &ClientConfig, session: watch::Receiver<Option<Session>>) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Attach the current access token
    fn authorized(&self, request: RequestBuilder) -> CookbookResult<RequestBuilder> {
        let token = self
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(CookbookError::NotSignedIn)?;
        Ok(request.bearer_auth(token))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> CookbookResult<T> {
        let request = self.authorized(self.client.get(self.url(path)))?;
        parse(request.send().await?).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> CookbookResult<T> {
        let request = self.authorized(self.client.post(self.url(path)).json(body))?;
        parse(request.send().await?).await
    }

    async fn post_empty<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> CookbookResult<()> {
        let request = self.authorized(self.client.post(self.url(path)).json(body))?;
        expect_success(request.send().await?).await
    }

    async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> CookbookResult<T> {
        let request = self.authorized(self.client.patch(self.url(path)).json(body))?;
        parse(request.send().await?).await
    }

    async fn delete(&self, path: &str) -> CookbookResult<()> {
        let request = self.authorized(self.client.delete(self.url(path)))?;
        expect_success(request.send().await?).await
    }
}

#[async_trait]
impl RecipeStore for HttpBackend {
    async fn recipe_by_slug(&self, _owner: Uuid, slug: &str) -> CookbookResult<Recipe> {
        self.get(&format!("/recipes/by-slug/{}", slug)).await
    }

    async fn recipe_by_id(&self, _owner: Uuid, id: Uuid) -> CookbookResult<Recipe> {
        self.get(&format!("/recipes/{}", id)).await
    }

    async fn recent_recipes(
        &self,
        _owner: Uuid,
        limit: Option<u32>,
    ) -> CookbookResult<Vec<RecipeSummary>> {
        match limit {
            Some(limit) => self.get(&format!("/recipes?limit={}", limit)).await,
            None => self.get("/recipes").await,
        }
    }

    async fn recipes_by_ids(
        &self,
        _owner: Uuid,
        ids: &[Uuid],
    ) -> CookbookResult<Vec<RecipeSummary>> {
        self.post("/recipes/lookup", &json!({ "ids": ids })).await
    }

    async fn slugs_with_prefix(&self, _owner: Uuid, prefix: &str) -> CookbookResult<Vec<SlugEntry>> {
        let request = self.authorized(
            self.client
                .get(self.url("/recipes/slugs"))
                .query(&[("prefix", prefix)]),
        )?;
        parse(request.send().await?).await
    }

    async fn insert_recipe(&self, owner: Uuid, recipe: &NewRecipe) -> CookbookResult<Recipe> {
        debug!("Creating recipe {} for {}", recipe.slug, owner);
        self.post("/recipes", recipe).await
    }

    async fn update_recipe(
        &self,
        _owner: Uuid,
        id: Uuid,
        patch: &RecipePatch,
    ) -> CookbookResult<Recipe> {
        self.patch(&format!("/recipes/{}", id), patch).await
    }

    async fn delete_recipe(&self, _owner: Uuid, id: Uuid) -> CookbookResult<()> {
        self.delete(&format!("/recipes/{}", id)).await
    }
}

#[async_trait]
impl CollectionStore for HttpBackend {
    async fn collections(&self, _owner: Uuid) -> CookbookResult<Vec<Collection>> {
        self.get("/collections").await
    }

    async fn collection(&self, _owner: Uuid, id: Uuid) -> CookbookResult<Collection> {
        self.get(&format!("/collections/{}", id)).await
    }

    async fn insert_collection(
        &self,
        _owner: Uuid,
        collection: &NewCollection,
    ) -> CookbookResult<Collection> {
        self.post("/collections", collection).await
    }

    async fn update_collection(
        &self,
        _owner: Uuid,
        id: Uuid,
        patch: &CollectionPatch,
    ) -> CookbookResult<Collection> {
        self.patch(&format!("/collections/{}", id), patch).await
    }

    async fn delete_collection(&self, _owner: Uuid, id: Uuid) -> CookbookResult<()> {
        self.delete(&format!("/collections/{}", id)).await
    }
}

#[async_trait]
impl LinkStore for HttpBackend {
    async fn links_for_collection(
        &self,
        _owner: Uuid,
        collection_id: Uuid,
    ) -> CookbookResult<Vec<CollectionRecipe>> {
        self.get(&format!("/collections/{}/links", collection_id))
            .await
    }

    async fn links_for_recipe(
        &self,
        _owner: Uuid,
        recipe_id: Uuid,
    ) -> CookbookResult<Vec<CollectionRecipe>> {
        self.get(&format!("/recipes/{}/links", recipe_id)).await
    }

    async fn insert_links(&self, _owner: Uuid, links: &[Link]) -> CookbookResult<()> {
        self.post_empty("/links", &json!({ "links": links })).await
    }

    async fn delete_links(&self, _owner: Uuid, links: &[Link]) -> CookbookResult<()> {
        self.post_empty("/links/delete", &json!({ "links": links }))
            .await
    }

    async fn clear_collection_links(&self, _owner: Uuid, collection_id: Uuid) -> CookbookResult<()> {
        self.delete(&format!("/collections/{}/links", collection_id))
            .await
    }

    async fn clear_recipe_links(&self, _owner: Uuid, recipe_id: Uuid) -> CookbookResult<()> {
        self.delete(&format!("/recipes/{}/links", recipe_id)).await
    }
}

#[async_trait]
impl ImageStore for HttpBackend {
    async fn upload_image(&self, path: &str, file: &ImageFile) -> CookbookResult<()> {
        let request = self.authorized(
            self.client
                .put(self.url(&format!("/storage/{}", path)))
                .header(reqwest::header::CONTENT_TYPE, file.content_type.as_str())
                .body(file.bytes.clone()),
        )?;
        expect_success(request.send().await?).await
    }

    async fn remove_images(&self, paths: &[String]) -> CookbookResult<()> {
        self.post_empty("/storage/remove", &json!({ "paths": paths }))
            .await
    }

    async fn sign_image_url(&self, path: &str, expires_in_seconds: u64) -> CookbookResult<String> {
        let signed: SignedUrl = self
            .post(
                "/storage/sign",
                &json!({ "path": path, "expires_in": expires_in_seconds }),
            )
            .await?;
        Ok(signed.signed_url)
    }
}

/// Auth service client
#[derive(Clone)]
pub struct HttpAuth {
    client: Client,
    auth_url: String,
}

impl HttpAuth {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            auth_url: config.auth_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.auth_url, path)
    }
}

#[async_trait]
impl AuthBackend for HttpAuth {
    async fn sign_up(&self, email: &str, password: &str) -> CookbookResult<CurrentUser> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&Credentials { email, password })
            .send()
            .await?;
        parse(response).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> CookbookResult<Session> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&Credentials { email, password })
            .send()
            .await?;
        parse(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> CookbookResult<Session> {
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        parse(response).await
    }

    async fn sign_out(&self, refresh_token: &str) -> CookbookResult<()> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        expect_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_without_session_are_rejected_locally() {
        let (_sender, receiver) = watch::channel(None);
        let config = ClientConfig {
            auth_url: "http://127.0.0.1:9".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
        };
        let backend = HttpBackend::new(&config, receiver);

        let result = backend.recipe_by_id(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(CookbookError::NotSignedIn)));
    }
}
