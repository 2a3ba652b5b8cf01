//! Save-time validation against the content repository.

use std::sync::Arc;

use derivq_core::{EntityIndex, TermIndex};
use tracing::debug;

use crate::error::{Collector, ConfigError};
use crate::task::{MappingStrategy, TaskConfigForm, TaskDefinition};

/// Validates task forms the way the admin surface does on save: structure
/// first, then every referenced term and field against the repository.
pub struct ConfigValidator {
    terms: Arc<dyn TermIndex>,
    entities: Arc<dyn EntityIndex>,
    schemes: Vec<String>,
}

impl ConfigValidator {
    pub fn new(
        terms: Arc<dyn TermIndex>,
        entities: Arc<dyn EntityIndex>,
        schemes: Vec<String>,
    ) -> Self {
        Self {
            terms,
            entities,
            schemes,
        }
    }

    /// # Errors
    /// `ConfigError::Invalid` with one message per offending field, or
    /// `ConfigError::Lookup` when the repository cannot be queried.
    pub async fn validate(&self, form: &TaskConfigForm) -> Result<TaskDefinition, ConfigError> {
        let task = form.validate(&self.schemes)?;
        let mut errors = Collector::default();

        match &task.config.strategy {
            MappingStrategy::SemanticTag {
                source_term_uri,
                derivative_term_uri,
                ..
            } => {
                // Each term is checked on its own.
                if self.terms.term_for_uri(source_term_uri).await?.is_none() {
                    errors.push(
                        "source_term_uri",
                        format!("no term found with URI {source_term_uri}"),
                    );
                }
                if self.terms.term_for_uri(derivative_term_uri).await?.is_none() {
                    errors.push(
                        "derivative_term_uri",
                        format!("no term found with URI {derivative_term_uri}"),
                    );
                }
            }
            MappingStrategy::FieldMapping {
                source,
                destination,
                ..
            } => {
                for entity_type in &task.trigger.entity_types {
                    let fields = self.entities.list_reference_fields(entity_type).await?;
                    let checks = [("source_field", source), ("destination_field", destination)];
                    for (form_field, name) in checks {
                        if !fields.iter().any(|f| &f.name == name) {
                            errors.push(
                                form_field,
                                format!("{entity_type} has no reference field {name}"),
                            );
                        }
                    }
                }
            }
        }

        debug!(task = %task.config.name, strategy = task.config.strategy.kind(), "Validated task");
        errors.finish(task)
    }
}
