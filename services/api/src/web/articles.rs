//! services/api/src/web/articles.rs
//!
//! Curated health articles: a public feed plus admin curation.

use crate::web::response::{ok, ArticleView, Body, HandlerResult, HttpError, Success};
use crate::web::state::AppState;
use axum::{extract::State, Json};
use clinic_core::domain::NewArticle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, ToSchema)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleView>,
}

#[derive(Serialize, ToSchema)]
pub struct ArticleResponse {
    pub message: String,
    pub article: ArticleView,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddArticleRequest {
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub url_to_image: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetApprovalRequest {
    pub article_id: Uuid,
    pub is_approved: bool,
}

/// GET /api/articles - Approved articles, newest first
#[utoipa::path(
    get,
    path = "/api/articles",
    responses(
        (
            status = 200,
            description = "Approved articles",
            body = Success<ArticleListResponse>
        )
    )
)]
pub async fn list_articles_handler(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<Json<Success<ArticleListResponse>>> {
    let articles = state.db.list_articles(true).await?;
    Ok(ok(ArticleListResponse {
        articles: articles.into_iter().map(ArticleView::from).collect(),
    }))
}

/// POST /api/articles/add-article
#[utoipa::path(
    post,
    path = "/api/articles/add-article",
    request_body = AddArticleRequest,
    responses(
        (status = 200, description = "Article added", body = Success<ArticleResponse>),
        (status = 400, description = "Missing title or non-http(s) URL")
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn add_article_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<AddArticleRequest>,
) -> HandlerResult<Json<Success<ArticleResponse>>> {
    let title = req.title.trim();
    let url = req.url.trim();
    if title.is_empty() || url.is_empty() {
        return Err(HttpError::bad_request("Title and URL are required"));
    }
    let derived_source = state
        .validators
        .source_of(url)
        .ok_or_else(|| HttpError::bad_request("URL must be http(s)"))?;
    let image_url = req
        .url_to_image
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(image) = image_url.as_deref() {
        if !state.validators.is_http_url(image) {
            return Err(HttpError::bad_request("Image must be an http(s) URL"));
        }
    }
    let source = req
        .source
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(derived_source);

    let article = state
        .db
        .create_article(NewArticle {
            title: title.to_string(),
            image_url,
            source,
            url: url.to_string(),
        })
        .await?;

    Ok(ok(ArticleResponse {
        message: "Article Added".to_string(),
        article: article.into(),
    }))
}

/// POST /api/articles/set-approval - Show or hide an article in the public feed
#[utoipa::path(
    post,
    path = "/api/articles/set-approval",
    request_body = SetApprovalRequest,
    responses(
        (status = 200, description = "Approval updated", body = Success<ArticleResponse>),
        (status = 404, description = "Article not found")
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn set_approval_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<SetApprovalRequest>,
) -> HandlerResult<Json<Success<ArticleResponse>>> {
    let article = state
        .db
        .set_article_approval(req.article_id, req.is_approved)
        .await?;
    let verdict = if article.approved { "Approved" } else { "Hidden" };
    Ok(ok(ArticleResponse {
        message: format!("Article {}", verdict),
        article: article.into(),
    }))
}
