//! Extractors whose rejections answer with the `AppError` body instead of
//! axum's plain-text default.

use axum::extract::{FromRequest, FromRequestParts, Multipart};

use crate::errors::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequest)]
#[from_request(rejection(AppError))]
pub struct AppMultipart(pub Multipart);
