//! Source and destination resolution.
//!
//! One [`ContentResolver`] per [`MappingStrategy`] variant. Both are pure
//! reads over the lookup collaborators: for the same entity, configuration
//! and repository contents they return the same [`Resolution`].

use std::sync::Arc;

use async_trait::async_trait;
use derivq_config::MappingStrategy;
use derivq_core::{
    Entity, EntityIndex, FileArtifact, MEDIA_ENTITY_TYPE, MediaSource, SiteUrls,
    TERM_ENTITY_TYPE, Term, TermIndex, compare_ids,
};
use tracing::debug;

use crate::error::{ResolutionError, TermRole};

/// Locators found for one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    SemanticTag {
        /// Canonical URL of the source file.
        source_uri: String,
        /// Route the worker uploads the derivative to.
        destination_uri: String,
        media: Entity,
        file: FileArtifact,
        derivative_term: Term,
    },
    FieldMapping {
        source: String,
        destination: String,
        bundle: String,
    },
}

#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Strategy this resolver serves, as named in configuration.
    fn strategy(&self) -> &'static str;

    async fn resolve(
        &self,
        entity: &Entity,
        strategy: &MappingStrategy,
    ) -> Result<Resolution, ResolutionError>;
}

/// Finds the media attached to the entity that carries the source term.
pub struct SemanticTagResolver {
    entities: Arc<dyn EntityIndex>,
    terms: Arc<dyn TermIndex>,
    media: Arc<dyn MediaSource>,
    site: SiteUrls,
}

impl SemanticTagResolver {
    pub fn new(
        entities: Arc<dyn EntityIndex>,
        terms: Arc<dyn TermIndex>,
        media: Arc<dyn MediaSource>,
        site: SiteUrls,
    ) -> Self {
        Self {
            entities,
            terms,
            media,
            site,
        }
    }

    async fn term(&self, role: TermRole, uri: &str) -> Result<Term, ResolutionError> {
        let mut term = self
            .terms
            .term_for_uri(uri)
            .await?
            .ok_or_else(|| ResolutionError::TermNotFound {
                role,
                uri: uri.to_string(),
            })?;
        if let Some(canonical) = self.terms.uri_for_term(&term).await? {
            term.uri = canonical;
        }
        Ok(term)
    }

    /// Media referencing `entity` and tagged with `term`, lowest id first.
    async fn tagged_media(
        &self,
        entity: &Entity,
        term: &Term,
    ) -> Result<Vec<Entity>, ResolutionError> {
        let fields = self
            .entities
            .list_reference_fields(MEDIA_ENTITY_TYPE)
            .await?;
        let tag_fields: Vec<&str> = fields
            .iter()
            .filter(|f| f.target_type == TERM_ENTITY_TYPE)
            .map(|f| f.name.as_str())
            .collect();

        let target = entity.to_ref();
        let term_ref = term.to_ref();
        let mut candidates = Vec::new();
        for field in fields.iter().filter(|f| f.target_type == entity.entity_type) {
            let media = self
                .entities
                .find_referencing(MEDIA_ENTITY_TYPE, &field.name, &target)
                .await?;
            candidates.extend(
                media
                    .into_iter()
                    .filter(|m| tag_fields.iter().any(|t| m.references_target(t, &term_ref))),
            );
        }

        candidates.sort_by(|a, b| compare_ids(&a.id, &b.id));
        candidates.dedup_by(|a, b| a.id == b.id);
        Ok(candidates)
    }
}

#[async_trait]
impl ContentResolver for SemanticTagResolver {
    fn strategy(&self) -> &'static str {
        derivq_config::task::SEMANTIC_TAG
    }

    async fn resolve(
        &self,
        entity: &Entity,
        strategy: &MappingStrategy,
    ) -> Result<Resolution, ResolutionError> {
        let MappingStrategy::SemanticTag {
            source_term_uri,
            derivative_term_uri,
            ..
        } = strategy
        else {
            return Err(ResolutionError::StrategyMismatch {
                resolver: self.strategy(),
                strategy: strategy.kind(),
            });
        };

        let source_term = self.term(TermRole::Source, source_term_uri).await?;
        let derivative_term = self.term(TermRole::Derivative, derivative_term_uri).await?;

        let candidates = self.tagged_media(entity, &source_term).await?;
        debug!(
            entity = %entity.to_ref(),
            source_term = %source_term.id,
            candidates = candidates.len(),
            "Located tagged media"
        );
        let media = candidates
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NoMatchingMedia {
                entity: entity.to_ref(),
                term_uri: source_term_uri.clone(),
            })?;

        let file = self
            .media
            .source_file(&media)
            .await?
            .ok_or_else(|| ResolutionError::SourceFileMissing {
                media: media.to_ref(),
            })?;

        let destination_uri = self
            .site
            .media_upload_route(&entity.to_ref(), &derivative_term.id)?;

        Ok(Resolution::SemanticTag {
            source_uri: file.url.clone(),
            destination_uri,
            media,
            file,
            derivative_term,
        })
    }
}

/// Uses explicit field names on the entity itself.
pub struct FieldMappingResolver {
    entities: Arc<dyn EntityIndex>,
}

impl FieldMappingResolver {
    pub fn new(entities: Arc<dyn EntityIndex>) -> Self {
        Self { entities }
    }
}

#[async_trait]
impl ContentResolver for FieldMappingResolver {
    fn strategy(&self) -> &'static str {
        derivq_config::task::FIELD_MAPPING
    }

    async fn resolve(
        &self,
        entity: &Entity,
        strategy: &MappingStrategy,
    ) -> Result<Resolution, ResolutionError> {
        let MappingStrategy::FieldMapping {
            source,
            destination,
            bundle,
        } = strategy
        else {
            return Err(ResolutionError::StrategyMismatch {
                resolver: self.strategy(),
                strategy: strategy.kind(),
            });
        };

        let fields = self
            .entities
            .list_reference_fields(&entity.entity_type)
            .await?;
        for field in [source, destination] {
            if !fields.iter().any(|f| &f.name == field) {
                return Err(ResolutionError::FieldNotFound {
                    entity_type: entity.entity_type.clone(),
                    field: field.clone(),
                });
            }
        }
        if entity.references(source).is_empty() {
            return Err(ResolutionError::EmptyField {
                entity: entity.to_ref(),
                field: source.clone(),
            });
        }

        Ok(Resolution::FieldMapping {
            source: source.clone(),
            destination: destination.clone(),
            bundle: bundle.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use derivq_core::{EntityRef, FieldDescriptor, MemoryRepository};

    use super::*;

    const ORIGINAL: &str = "http://pcdm.org/use#OriginalFile";
    const SERVICE: &str = "http://pcdm.org/use#ServiceFile";

    async fn repository() -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_term(Term {
            id: "1".into(),
            name: "Original File".into(),
            uri: ORIGINAL.into(),
        })
        .await;
        repo.insert_term(Term {
            id: "2".into(),
            name: "Service File".into(),
            uri: SERVICE.into(),
        })
        .await;
        repo.define_reference_field("media", FieldDescriptor::new("field_media_of", "node"))
            .await;
        repo.define_reference_field(
            "media",
            FieldDescriptor::new("field_media_use", TERM_ENTITY_TYPE),
        )
        .await;
        repo.define_reference_field("node", FieldDescriptor::new("field_media", "media"))
            .await;
        repo.insert_file(FileArtifact {
            id: "5".into(),
            uri: "public://test_file.txt".into(),
            url: "http://localhost:8000/sites/default/files/test_file.txt".into(),
        })
        .await;
        repo.insert_entity(Entity::new("node", "1", "repository_item")).await;
        repo
    }

    fn media(id: &str, term_id: &str, file_id: Option<&str>) -> Entity {
        let mut media = Entity::new("media", id, "file")
            .with_reference("field_media_of", EntityRef::new("node", "1"))
            .with_reference("field_media_use", EntityRef::new(TERM_ENTITY_TYPE, term_id));
        if let Some(file_id) = file_id {
            media = media.with_reference("field_media_file", EntityRef::new("file", file_id));
        }
        media
    }

    fn resolver(repo: &Arc<MemoryRepository>) -> SemanticTagResolver {
        SemanticTagResolver::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            SiteUrls::new("http://localhost:8000").unwrap(),
        )
    }

    fn semantic(source: &str, derivative: &str) -> MappingStrategy {
        MappingStrategy::SemanticTag {
            source_term_uri: source.into(),
            derivative_term_uri: derivative.into(),
            scheme: "public".into(),
            path: "[node:nid].jpg".into(),
        }
    }

    #[tokio::test]
    async fn test_semantic_tag_resolves_lowest_tagged_media() {
        let repo = repository().await;
        repo.insert_entity(media("12", "1", Some("5"))).await;
        repo.insert_entity(media("9", "1", Some("5"))).await;
        repo.insert_entity(media("3", "2", None)).await;

        let node = Entity::new("node", "1", "repository_item");
        let resolution = resolver(&repo)
            .resolve(&node, &semantic(ORIGINAL, SERVICE))
            .await
            .unwrap();
        match resolution {
            Resolution::SemanticTag {
                source_uri,
                destination_uri,
                media,
                derivative_term,
                ..
            } => {
                assert!(source_uri.ends_with("test_file.txt"));
                assert_eq!(destination_uri, "http://localhost:8000/node/1/media/image/2");
                assert_eq!(media.id, "9");
                assert_eq!(derivative_term.id, "2");
            }
            other => panic!("unexpected resolution {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_untagged_media_does_not_match() {
        let repo = repository().await;
        repo.insert_entity(media("10", "2", Some("5"))).await;

        let node = Entity::new("node", "1", "repository_item");
        let err = resolver(&repo)
            .resolve(&node, &semantic(ORIGINAL, SERVICE))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NoMatchingMedia { .. }));
    }

    #[tokio::test]
    async fn test_terms_checked_independently() {
        let repo = repository().await;
        repo.insert_entity(media("10", "1", Some("5"))).await;
        let node = Entity::new("node", "1", "repository_item");

        let err = resolver(&repo)
            .resolve(&node, &semantic(ORIGINAL, "http://example.org/missing"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::TermNotFound { role: TermRole::Derivative, ref uri }
                if uri == "http://example.org/missing"
        ));

        let err = resolver(&repo)
            .resolve(&node, &semantic("http://example.org/missing", SERVICE))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::TermNotFound {
                role: TermRole::Source,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_media_without_file() {
        let repo = repository().await;
        repo.insert_entity(media("10", "1", None)).await;
        let node = Entity::new("node", "1", "repository_item");

        let err = resolver(&repo)
            .resolve(&node, &semantic(ORIGINAL, SERVICE))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::SourceFileMissing { .. }));
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let repo = repository().await;
        for id in ["4", "20", "7"] {
            repo.insert_entity(media(id, "1", Some("5"))).await;
        }
        let node = Entity::new("node", "1", "repository_item");
        let resolver = resolver(&repo);
        let first = resolver.resolve(&node, &semantic(ORIGINAL, SERVICE)).await.unwrap();
        for _ in 0..5 {
            let again = resolver.resolve(&node, &semantic(ORIGINAL, SERVICE)).await.unwrap();
            assert_eq!(first, again);
        }
    }

    #[tokio::test]
    async fn test_field_mapping() {
        let repo = repository().await;
        let resolver = FieldMappingResolver::new(repo.clone());
        let strategy = MappingStrategy::FieldMapping {
            source: "field_media".into(),
            destination: "field_media".into(),
            bundle: "tn".into(),
        };

        let node = Entity::new("node", "1", "repository_item")
            .with_reference("field_media", EntityRef::new("media", "10"));
        assert_eq!(
            resolver.resolve(&node, &strategy).await.unwrap(),
            Resolution::FieldMapping {
                source: "field_media".into(),
                destination: "field_media".into(),
                bundle: "tn".into(),
            }
        );

        let empty = Entity::new("node", "1", "repository_item");
        assert!(matches!(
            resolver.resolve(&empty, &strategy).await,
            Err(ResolutionError::EmptyField { .. })
        ));

        let unknown = MappingStrategy::FieldMapping {
            source: "field_media".into(),
            destination: "field_thumbnail".into(),
            bundle: "tn".into(),
        };
        assert!(matches!(
            resolver.resolve(&node, &unknown).await,
            Err(ResolutionError::FieldNotFound { ref field, .. }) if field == "field_thumbnail"
        ));
    }

    #[tokio::test]
    async fn test_strategy_mismatch() {
        let repo = repository().await;
        let node = Entity::new("node", "1", "repository_item");
        let err = FieldMappingResolver::new(repo)
            .resolve(&node, &semantic(ORIGINAL, SERVICE))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::StrategyMismatch { .. }));
    }
}
