//! Options whose wire contract is named but not detailed: `categories`
//! (the bare index; filtered search lives at `uc/search/categories/{id}`),
//! `feedback`, and `images`. Registered so `GET uc` can still advertise
//! them when enabled; until a concrete contract is specified they answer
//! with their most conservative defined response.

use async_trait::async_trait;

use crate::dispatch::{HandlerResponse, RequestContext, ResourceHandler};
use crate::error::UcResult;

/// `GET uc/categories`: always 204, mirroring `uc/sources`'s index.
pub struct CategoriesHandler;

#[async_trait]
impl ResourceHandler for CategoriesHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, _ctx: &RequestContext) -> UcResult<HandlerResponse> {
        Ok(HandlerResponse::NoContent)
    }
}

/// `uc/feedback`: left `NotImplemented` until a backend defines a
/// feedback-submission contract.
pub struct FeedbackHandler;

#[async_trait]
impl ResourceHandler for FeedbackHandler {}

/// `uc/images`: left `NotImplemented` until a backend defines an
/// image-catalogue contract.
pub struct ImagesHandler;

#[async_trait]
impl ResourceHandler for ImagesHandler {}
