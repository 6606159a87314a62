//! HTTP client for the Listow API.
//!
//! [`ApiClient`] covers every endpoint. The subset the offline layer replays is behind the
//! [`RemoteApi`] trait so the queue and the view model can run against a fake.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    error::{ClientError, Result},
    models::{
        AuthResponse, Collaborator, CollaboratorId, GoogleLogin, HealthStatus, Item, ItemChanges, ItemId, ListChanges, ListId,
        MessageResponse, NewItem, NewList, Permission, PhotoUpload, ShareResponse, ShoppingList, User, UserEnvelope, UserId,
    },
    store::{AUTH_TOKEN, LocalStore, USER_DATA},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// List and item operations used by the offline layer.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn get_lists(&self) -> Result<Vec<ShoppingList>>;
    async fn create_list(&self, list: &NewList) -> Result<ShoppingList>;
    async fn get_items(&self, list_id: ListId) -> Result<Vec<Item>>;
    async fn create_item(&self, list_id: ListId, item: &NewItem) -> Result<Item>;
    async fn update_item(&self, id: ItemId, changes: &ItemChanges) -> Result<Item>;
    async fn delete_item(&self, id: ItemId) -> Result<()>;
    async fn toggle_item(&self, id: ItemId) -> Result<Item>;
}

/// Install the process-wide rustls crypto provider. Later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<LocalStore>,
}

impl ApiClient {
    /// `base_url` is the API root, for example `https://lists.example.com/api`.
    pub fn new(base_url: Url, store: Arc<LocalStore>) -> Result<Self> {
        Self::with_timeout(base_url, store, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(mut base_url: Url, store: Arc<LocalStore>, timeout: Duration) -> Result<Self> {
        install_crypto_provider();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, store })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let mut builder = self.http.request(method, self.url(path)?);
        if let Some(token) = self.auth_token().await? {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    /// Turn error statuses into [`ClientError::Api`]. A 401 also drops the stored session.
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        let user_exists = body.get("userExists").and_then(Value::as_bool);

        if status == StatusCode::UNAUTHORIZED {
            debug!("Session rejected, clearing stored credentials");
            self.store.remove(&[AUTH_TOKEN, USER_DATA]).await?;
        }

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
            user_exists,
        })
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let builder = self.request(Method::POST, path).await?.json(body);
        self.send(builder).await
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let builder = self.request(Method::PUT, path).await?.json(body);
        self.send(builder).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let builder = self.request(Method::GET, path).await?;
        self.send(builder).await
    }

    async fn delete(&self, path: &str) -> Result<MessageResponse> {
        let builder = self.request(Method::DELETE, path).await?;
        self.send(builder).await
    }

    async fn remember(&self, auth: &AuthResponse) -> Result<()> {
        self.store.set(AUTH_TOKEN, &auth.token).await?;
        self.store.set(USER_DATA, &auth.user).await
    }

    // Session

    pub async fn auth_token(&self) -> Result<Option<String>> {
        self.store.get(AUTH_TOKEN).await
    }

    pub async fn set_auth_token(&self, token: &str) -> Result<()> {
        self.store.set(AUTH_TOKEN, token).await
    }

    /// The user saved by the last successful sign in.
    pub async fn stored_user(&self) -> Result<Option<User>> {
        self.store.get(USER_DATA).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.store.remove(&[AUTH_TOKEN, USER_DATA]).await
    }

    // Authentication

    #[instrument(skip_all)]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse> {
        let auth: AuthResponse = self
            .post_json("auth/register", &json!({ "name": name, "email": email, "password": password }))
            .await?;
        self.remember(&auth).await?;
        Ok(auth)
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let auth: AuthResponse = self
            .post_json("auth/login", &json!({ "email": email, "password": password }))
            .await?;
        self.remember(&auth).await?;
        Ok(auth)
    }

    #[instrument(skip_all)]
    pub async fn login_with_google(&self, login: &GoogleLogin) -> Result<AuthResponse> {
        let auth: AuthResponse = self.post_json("auth/google", login).await?;
        self.remember(&auth).await?;
        Ok(auth)
    }

    pub async fn me(&self) -> Result<User> {
        Ok(self.get::<UserEnvelope>("auth/me").await?.user)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User> {
        Ok(self.get::<UserEnvelope>(&format!("auth/user/{id}")).await?.user)
    }

    /// Change the display name and/or photo. The stored user is refreshed.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, name: Option<&str>, photo: Option<PhotoUpload>) -> Result<User> {
        let mut form = reqwest::multipart::Form::new();
        if let Some(name) = name {
            form = form.text("name", name.to_string());
        }
        if let Some(photo) = photo {
            let part = reqwest::multipart::Part::bytes(photo.bytes)
                .file_name(photo.file_name)
                .mime_str(&photo.mime_type)?;
            form = form.part("photo", part);
        }

        let builder = self.request(Method::PUT, "auth/profile").await?.multipart(form);
        let user = self.send::<UserEnvelope>(builder).await?.user;
        self.store.set(USER_DATA, &user).await?;
        Ok(user)
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<String> {
        let response: MessageResponse = self
            .put_json(
                "auth/change-password",
                &json!({ "currentPassword": current_password, "newPassword": new_password }),
            )
            .await?;
        Ok(response.message)
    }

    pub async fn save_push_token(&self, token: &str) -> Result<()> {
        let _: MessageResponse = self.post_json("auth/save-token", &json!({ "token": token })).await?;
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let response: MessageResponse = self.post_json("auth/forgot-password", &json!({ "email": email })).await?;
        Ok(response.message)
    }

    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<String> {
        let response: MessageResponse = self
            .post_json(
                "auth/reset-password",
                &json!({ "email": email, "code": code, "newPassword": new_password }),
            )
            .await?;
        Ok(response.message)
    }

    // Lists and sharing

    pub async fn update_list(&self, id: ListId, changes: &ListChanges) -> Result<ShoppingList> {
        self.put_json(&format!("lists/{id}"), changes).await
    }

    pub async fn delete_list(&self, id: ListId) -> Result<()> {
        self.delete(&format!("lists/{id}")).await?;
        Ok(())
    }

    pub async fn share_list(&self, id: ListId, email: &str, permission: Permission) -> Result<ShareResponse> {
        self.post_json(&format!("lists/{id}/share"), &json!({ "email": email, "permission": permission }))
            .await
    }

    pub async fn collaborators(&self, id: ListId) -> Result<Vec<Collaborator>> {
        self.get(&format!("lists/{id}/collaborators")).await
    }

    pub async fn remove_collaborator(&self, list_id: ListId, collaborator_id: CollaboratorId) -> Result<()> {
        self.delete(&format!("lists/{list_id}/collaborators/{collaborator_id}")).await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("health").await
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn get_lists(&self) -> Result<Vec<ShoppingList>> {
        self.get("lists").await
    }

    async fn create_list(&self, list: &NewList) -> Result<ShoppingList> {
        self.post_json("lists", list).await
    }

    async fn get_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        self.get(&format!("items/list/{list_id}")).await
    }

    async fn create_item(&self, list_id: ListId, item: &NewItem) -> Result<Item> {
        self.post_json(&format!("items/list/{list_id}"), item).await
    }

    async fn update_item(&self, id: ItemId, changes: &ItemChanges) -> Result<Item> {
        self.put_json(&format!("items/{id}"), changes).await
    }

    async fn delete_item(&self, id: ItemId) -> Result<()> {
        self.delete(&format!("items/{id}")).await?;
        Ok(())
    }

    async fn toggle_item(&self, id: ItemId) -> Result<Item> {
        let builder = self.request(Method::PATCH, &format!("items/{id}/toggle")).await?;
        self.send(builder).await
    }
}
