//! Canonical derivative event (ActivityStreams 2.0 shaped).
//!
//! ```json
//! {
//!   "type": "Activity",
//!   "summary": "Generate Derivative",
//!   "actor": "http://localhost:8000/user/1",
//!   "object": "http://localhost:8000/node/1",
//!   "attachment": {
//!     "type": "Object",
//!     "mediaType": "application/json",
//!     "content": { "source_uri": "...", "destination_uri": "...", ... }
//!   }
//! }
//! ```

use derivq_config::DerivativeTaskConfig;
use derivq_core::{Entity, Principal, SiteUrls};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::resolver::Resolution;

pub const ACTIVITY_TYPE: &str = "Activity";
pub const ATTACHMENT_TYPE: &str = "Object";
pub const ATTACHMENT_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub summary: String,
    pub actor: String,
    pub object: String,
    pub attachment: Attachment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub content: EventContent,
}

/// Strategy-specific instructions for the worker. Nothing else from the
/// task configuration is ever serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventContent {
    SemanticTag {
        source_uri: String,
        destination_uri: String,
        file_upload_uri: String,
        mimetype: String,
        args: String,
    },
    FieldMapping {
        source: String,
        destination: String,
        bundle: String,
        mimetype: String,
        args: String,
    },
}

impl CanonicalEvent {
    pub fn content(&self) -> &EventContent {
        &self.attachment.content
    }

    pub fn to_json(&self) -> Result<String, BuildError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Assembles events. Reads nothing but its arguments.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    site: SiteUrls,
}

impl EventBuilder {
    pub fn new(site: SiteUrls) -> Self {
        Self { site }
    }

    /// `file_upload_uri` is the rendered storage URI; required for
    /// semantic-tag resolutions and ignored otherwise.
    pub fn build(
        &self,
        config: &DerivativeTaskConfig,
        entity: &Entity,
        principal: &Principal,
        resolution: &Resolution,
        file_upload_uri: Option<&str>,
    ) -> Result<CanonicalEvent, BuildError> {
        let mimetype = config.mimetype.to_string();
        let args = config.args.clone();

        let content = match resolution {
            Resolution::SemanticTag {
                source_uri,
                destination_uri,
                ..
            } => EventContent::SemanticTag {
                source_uri: source_uri.clone(),
                destination_uri: destination_uri.clone(),
                file_upload_uri: file_upload_uri
                    .ok_or(BuildError::MissingUploadUri)?
                    .to_string(),
                mimetype,
                args,
            },
            Resolution::FieldMapping {
                source,
                destination,
                bundle,
            } => EventContent::FieldMapping {
                source: source.clone(),
                destination: destination.clone(),
                bundle: bundle.clone(),
                mimetype,
                args,
            },
        };

        Ok(CanonicalEvent {
            kind: ACTIVITY_TYPE.to_string(),
            summary: config.event.clone(),
            actor: principal.uri.clone(),
            object: self.site.entity_url(&entity.to_ref())?,
            attachment: Attachment {
                kind: ATTACHMENT_TYPE.to_string(),
                media_type: ATTACHMENT_MEDIA_TYPE.to_string(),
                content,
            },
        })
    }
}
