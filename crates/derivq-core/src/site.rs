//! Absolute URL generation for entities and derivative upload routes.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::model::EntityRef;

/// Media type segment used by the derivative upload route.
pub const DERIVATIVE_MEDIA_TYPE: &str = "image";

/// Builds absolute URLs relative to the repository's public base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUrls {
    base: Url,
}

impl SiteUrls {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/{entity_type}/{id}`
    pub fn entity_url(&self, entity: &EntityRef) -> Result<String> {
        Ok(self
            .base
            .join(&format!("{}/{}", entity.entity_type, entity.id))?
            .to_string())
    }

    /// `{base}/{entity_type}/{id}/media/image/{term_id}`: the route a worker
    /// PUTs the finished derivative to.
    pub fn media_upload_route(&self, entity: &EntityRef, term_id: &str) -> Result<String> {
        Ok(self
            .base
            .join(&format!(
                "{}/{}/media/{}/{}",
                entity.entity_type, entity.id, DERIVATIVE_MEDIA_TYPE, term_id
            ))?
            .to_string())
    }
}
