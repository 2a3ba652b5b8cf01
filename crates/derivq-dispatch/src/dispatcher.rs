//! Dispatch orchestration.
//!
//! A dispatch runs resolve, template, build, authenticate and publish in that
//! order and stops at the first failure. Nothing is handed to the publisher
//! until a token has been issued for a fully built event.

use std::sync::Arc;

use derivq_auth::AuthProvider;
use derivq_broker::{Headers, Publisher};
use derivq_config::{DerivativeTaskConfig, MappingStrategy};
use derivq_core::{
    Entity, EntityIndex, EntityRef, MediaSource, PrincipalProvider, SiteUrls, TermIndex,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::event::{CanonicalEvent, EventBuilder};
use crate::resolver::{ContentResolver, FieldMappingResolver, Resolution, SemanticTagResolver};
use crate::state::DispatchState;
use crate::template::{TemplateEngine, TokenContext, storage_uri};

/// Everything a dispatcher talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub entities: Arc<dyn EntityIndex>,
    pub terms: Arc<dyn TermIndex>,
    pub media: Arc<dyn MediaSource>,
    pub principals: Arc<dyn PrincipalProvider>,
    pub auth: Arc<dyn AuthProvider>,
    pub publisher: Arc<dyn Publisher>,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub task: String,
    pub entity: EntityRef,
    pub queue: String,
    /// Every state visited, `Idle` through `Done`.
    pub states: Vec<DispatchState>,
    pub event: CanonicalEvent,
}

impl DispatchReport {
    pub fn final_state(&self) -> &DispatchState {
        self.states.last().unwrap_or(&DispatchState::Idle)
    }
}

/// Outcome of an aborted dispatch: the error plus how far it got.
#[derive(Debug, thiserror::Error)]
#[error("Dispatch of {task} for {entity} aborted: {error}")]
pub struct DispatchFailure {
    pub task: String,
    pub entity: EntityRef,
    /// Every state visited, `Idle` through `Aborted`.
    pub states: Vec<DispatchState>,
    /// The event, when the dispatch got past building it.
    pub event: Option<CanonicalEvent>,
    #[source]
    pub error: DispatchError,
}

impl DispatchFailure {
    pub fn final_state(&self) -> &DispatchState {
        self.states.last().unwrap_or(&DispatchState::Idle)
    }

    /// See [`DispatchError::stage`].
    pub fn stage(&self) -> DispatchState {
        self.error.stage()
    }

    /// See [`DispatchError::reached_broker`].
    pub fn reached_broker(&self) -> bool {
        self.error.reached_broker()
    }
}

struct Progress {
    task: String,
    entity: EntityRef,
    states: Vec<DispatchState>,
    event: Option<CanonicalEvent>,
}

impl Progress {
    fn new(task: &str, entity: EntityRef) -> Self {
        Self {
            task: task.to_string(),
            entity,
            states: vec![DispatchState::Idle],
            event: None,
        }
    }

    fn current(&self) -> &DispatchState {
        self.states.last().unwrap_or(&DispatchState::Idle)
    }

    fn advance(&mut self, next: DispatchState) {
        debug_assert!(
            self.current().can_advance_to(&next),
            "illegal transition {} -> {}",
            self.current(),
            next
        );
        debug!(
            task = %self.task,
            entity = %self.entity,
            from = self.current().name(),
            to = next.name(),
            "Dispatch state transition"
        );
        self.states.push(next);
    }

    fn abort(mut self, error: DispatchError) -> DispatchFailure {
        warn!(
            task = %self.task,
            entity = %self.entity,
            stage = self.current().name(),
            reached_broker = error.reached_broker(),
            event_built = self.event.is_some(),
            error = %error,
            "Derivative dispatch aborted"
        );
        self.advance(DispatchState::Aborted(error.to_string()));
        DispatchFailure {
            task: self.task,
            entity: self.entity,
            states: self.states,
            event: self.event,
            error,
        }
    }
}

pub struct Dispatcher {
    semantic_tag: Arc<dyn ContentResolver>,
    field_mapping: Arc<dyn ContentResolver>,
    templates: TemplateEngine,
    events: EventBuilder,
    principals: Arc<dyn PrincipalProvider>,
    auth: Arc<dyn AuthProvider>,
    publisher: Arc<dyn Publisher>,
}

impl Dispatcher {
    pub fn new(collaborators: Collaborators, site: SiteUrls) -> Self {
        let Collaborators {
            entities,
            terms,
            media,
            principals,
            auth,
            publisher,
        } = collaborators;
        Self {
            semantic_tag: Arc::new(SemanticTagResolver::new(
                entities.clone(),
                terms,
                media,
                site.clone(),
            )),
            field_mapping: Arc::new(FieldMappingResolver::new(entities)),
            templates: TemplateEngine::new(),
            events: EventBuilder::new(site),
            principals,
            auth,
            publisher,
        }
    }

    /// Replace the template engine, e.g. to register extra namespaces.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateEngine) -> Self {
        self.templates = templates;
        self
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    fn resolver_for(&self, strategy: &MappingStrategy) -> &dyn ContentResolver {
        match strategy {
            MappingStrategy::SemanticTag { .. } => self.semantic_tag.as_ref(),
            MappingStrategy::FieldMapping { .. } => self.field_mapping.as_ref(),
        }
    }

    /// Run one dispatch for `entity` under `config`.
    ///
    /// # Errors
    /// A [`DispatchFailure`] carrying the visited states and, past the build
    /// step, the event. Only [`DispatchError::Publish`] can occur after the
    /// publisher was called.
    pub async fn dispatch(
        &self,
        entity: &Entity,
        config: &DerivativeTaskConfig,
    ) -> Result<DispatchReport, DispatchFailure> {
        let mut progress = Progress::new(&config.name, entity.to_ref());
        let outcome = self.run(entity, config, &mut progress).await;
        match outcome {
            Ok(event) => {
                progress.advance(DispatchState::Done);
                info!(
                    task = %config.name,
                    entity = %progress.entity,
                    queue = %config.queue,
                    publisher = self.publisher.name(),
                    "Derivative event published"
                );
                Ok(DispatchReport {
                    task: config.name.clone(),
                    entity: progress.entity,
                    queue: config.queue.clone(),
                    states: progress.states,
                    event,
                })
            }
            Err(err) => Err(progress.abort(err)),
        }
    }

    async fn run(
        &self,
        entity: &Entity,
        config: &DerivativeTaskConfig,
        progress: &mut Progress,
    ) -> Result<CanonicalEvent, DispatchError> {
        progress.advance(DispatchState::Resolving);
        config.check_shape()?;
        let resolution = self
            .resolver_for(&config.strategy)
            .resolve(entity, &config.strategy)
            .await?;

        progress.advance(DispatchState::Building);
        let file_upload_uri =
            self.file_upload_uri(entity, config, &resolution, OffsetDateTime::now_utc())?;
        let principal = self
            .principals
            .current_principal()
            .await
            .map_err(DispatchError::Principal)?;
        let event = self.events.build(
            config,
            entity,
            &principal,
            &resolution,
            file_upload_uri.as_deref(),
        )?;
        let body = event.to_json()?;
        progress.event = Some(event.clone());

        progress.advance(DispatchState::Authenticating);
        let token = self.auth.issue(&principal).await?;

        progress.advance(DispatchState::Publishing);
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        self.publisher
            .publish(&config.queue, &headers, &body)
            .await?;

        Ok(event)
    }

    /// Rendered `scheme://path` for semantic-tag tasks.
    fn file_upload_uri(
        &self,
        entity: &Entity,
        config: &DerivativeTaskConfig,
        resolution: &Resolution,
        dispatch_time: OffsetDateTime,
    ) -> Result<Option<String>, DispatchError> {
        let (
            MappingStrategy::SemanticTag { scheme, path, .. },
            Resolution::SemanticTag {
                media,
                derivative_term,
                ..
            },
        ) = (&config.strategy, resolution)
        else {
            return Ok(None);
        };

        let ctx = TokenContext::new(dispatch_time)
            .with_entity(entity)
            .with_media(media)
            .with_term(derivative_term);
        let path = self.templates.render(path, &ctx)?;
        Ok(Some(storage_uri(scheme, &path)))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("templates", &self.templates)
            .field("publisher", &self.publisher.name())
            .finish_non_exhaustive()
    }
}
