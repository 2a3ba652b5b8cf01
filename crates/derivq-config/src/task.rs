//! Derivative task configuration.
//!
//! [`TaskConfigForm`] is the flat shape tasks are stored and edited in. It
//! becomes a [`DerivativeTaskConfig`] only through [`TaskConfigForm::validate`],
//! which selects the [`MappingStrategy`] variant once; dispatch never sees an
//! unvalidated form.

use derivq_core::events::{MutationEvent, MutationKind};
use derivq_core::parse_template;
use serde::{Deserialize, Serialize};

use crate::error::{Collector, ConfigError};
use crate::mimetype::MimeType;

pub const DEFAULT_QUEUE: &str = "islandora-connector-houdini";
pub const DEFAULT_EVENT: &str = "Generate Derivative";
pub const DEFAULT_MIMETYPE: &str = "image/jpeg";
/// Derivatives are images; only this top-level type is accepted.
pub const IMAGE_TYPE: &str = "image";
pub const DEFAULT_SCHEME: &str = "public";
pub const DEFAULT_PATH: &str = "[date:custom:Y]-[date:custom:m]/[node:nid].jpg";

pub const SEMANTIC_TAG: &str = "semantic_tag";
pub const FIELD_MAPPING: &str = "field_mapping";

/// How source and destination locators are found for a trigger entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MappingStrategy {
    /// Media tagged with a source term; derivative uploaded under a second term.
    SemanticTag {
        source_term_uri: String,
        derivative_term_uri: String,
        scheme: String,
        /// Path template, already trimmed of leading and trailing separators.
        path: String,
    },
    /// Explicit source field, destination field and target bundle.
    FieldMapping {
        source: String,
        destination: String,
        bundle: String,
    },
}

impl MappingStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SemanticTag { .. } => SEMANTIC_TAG,
            Self::FieldMapping { .. } => FIELD_MAPPING,
        }
    }
}

/// Validated, immutable configuration for one derivative task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeTaskConfig {
    pub name: String,
    pub queue: String,
    pub event: String,
    pub mimetype: MimeType,
    pub args: String,
    #[serde(flatten)]
    pub strategy: MappingStrategy,
}

impl DerivativeTaskConfig {
    /// Re-check the invariants `validate` established. Run at dispatch so a
    /// hand-built config cannot reach the resolver malformed.
    pub fn check_shape(&self) -> Result<(), ConfigError> {
        let mut errors = Collector::default();
        if self.queue.trim().is_empty() {
            errors.push("queue", "must not be empty");
        }
        if self.event.trim().is_empty() {
            errors.push("event", "must not be empty");
        }
        if self.mimetype.type_() != IMAGE_TYPE {
            errors.push("mimetype", format!("'{}' is not an image mimetype", self.mimetype));
        }
        match &self.strategy {
            MappingStrategy::SemanticTag {
                source_term_uri,
                derivative_term_uri,
                scheme,
                path,
            } => {
                require(&mut errors, "source_term_uri", source_term_uri);
                require(&mut errors, "derivative_term_uri", derivative_term_uri);
                require(&mut errors, "scheme", scheme);
                require(&mut errors, "path", path);
                if let Err(e) = parse_template(path) {
                    errors.push("path", e.to_string());
                }
            }
            MappingStrategy::FieldMapping {
                source,
                destination,
                bundle,
            } => {
                require(&mut errors, "source_field", source);
                require(&mut errors, "destination_field", destination);
                require(&mut errors, "bundle", bundle);
            }
        }
        errors.finish(())
    }
}

fn require(errors: &mut Collector, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, "is required");
    }
}

/// Which mutations fire a task. Deletions never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerFilter {
    pub entity_types: Vec<String>,
    /// Empty matches every bundle.
    pub bundles: Vec<String>,
    pub kinds: Vec<MutationKind>,
}

impl Default for TriggerFilter {
    fn default() -> Self {
        Self {
            entity_types: vec!["node".to_string()],
            bundles: Vec::new(),
            kinds: vec![MutationKind::Created, MutationKind::Updated],
        }
    }
}

impl TriggerFilter {
    pub fn matches(&self, event: &MutationEvent) -> bool {
        event.kind != MutationKind::Deleted
            && self.kinds.contains(&event.kind)
            && self.entity_types.contains(&event.entity.entity_type)
            && (self.bundles.is_empty() || self.bundles.contains(&event.entity.bundle))
    }
}

/// A validated task together with its trigger filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    pub config: DerivativeTaskConfig,
    pub trigger: TriggerFilter,
}

/// Flat, editable task configuration.
///
/// Only the fields of the selected `strategy` are read; the others keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfigForm {
    pub name: String,
    pub queue: String,
    pub event: String,
    pub mimetype: String,
    pub args: String,
    /// `semantic_tag` or `field_mapping`.
    pub strategy: String,

    pub source_term_uri: String,
    pub derivative_term_uri: String,
    pub scheme: String,
    pub path: String,

    pub source_field: String,
    pub destination_field: String,
    pub bundle: String,

    pub trigger: TriggerFilter,
}

impl Default for TaskConfigForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            queue: DEFAULT_QUEUE.to_string(),
            event: DEFAULT_EVENT.to_string(),
            mimetype: DEFAULT_MIMETYPE.to_string(),
            args: String::new(),
            strategy: SEMANTIC_TAG.to_string(),
            source_term_uri: String::new(),
            derivative_term_uri: String::new(),
            scheme: DEFAULT_SCHEME.to_string(),
            path: DEFAULT_PATH.to_string(),
            source_field: String::new(),
            destination_field: String::new(),
            bundle: String::new(),
            trigger: TriggerFilter::default(),
        }
    }
}

impl TaskConfigForm {
    /// Name used to select and log the task: `name`, or `event` when unset.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.event.trim()
        } else {
            self.name.trim()
        }
    }

    /// Structural validation. `schemes` lists the storage schemes the site
    /// exposes; an empty list accepts any scheme.
    ///
    /// Every problem is reported, each against the field it concerns.
    pub fn validate(&self, schemes: &[String]) -> Result<TaskDefinition, ConfigError> {
        let mut errors = Collector::default();

        let queue = self.queue.trim();
        if queue.is_empty() {
            errors.push("queue", "must not be empty");
        }
        let event = self.event.trim();
        if event.is_empty() {
            errors.push("event", "must not be empty");
        }

        let mimetype = match self.mimetype.trim().parse::<MimeType>() {
            Ok(mimetype) if mimetype.type_() == IMAGE_TYPE => Some(mimetype),
            Ok(mimetype) => {
                errors.push(
                    "mimetype",
                    format!("'{mimetype}' is not an image mimetype (e.g. image/jpeg, image/png)"),
                );
                None
            }
            Err(reason) => {
                errors.push("mimetype", format!("invalid mimetype: {reason}"));
                None
            }
        };

        let strategy = match self.strategy.trim() {
            SEMANTIC_TAG => Some(self.semantic_tag(schemes, &mut errors)),
            FIELD_MAPPING => Some(self.field_mapping(&mut errors)),
            other => {
                errors.push(
                    "strategy",
                    format!("unknown strategy '{other}', expected {SEMANTIC_TAG} or {FIELD_MAPPING}"),
                );
                None
            }
        };

        self.validate_trigger(&mut errors);

        let (Some(mimetype), Some(strategy)) = (mimetype, strategy) else {
            return Err(errors
                .finish(())
                .err()
                .unwrap_or_else(|| ConfigError::field("strategy", "could not be determined")));
        };

        errors.finish(TaskDefinition {
            config: DerivativeTaskConfig {
                name: self.display_name().to_string(),
                queue: queue.to_string(),
                event: event.to_string(),
                mimetype,
                args: self.args.clone(),
                strategy,
            },
            trigger: self.trigger.clone(),
        })
    }

    fn semantic_tag(&self, schemes: &[String], errors: &mut Collector) -> MappingStrategy {
        let source_term_uri = self.source_term_uri.trim();
        let derivative_term_uri = self.derivative_term_uri.trim();
        require(errors, "source_term_uri", source_term_uri);
        require(errors, "derivative_term_uri", derivative_term_uri);

        let scheme = self.scheme.trim();
        if scheme.is_empty() {
            errors.push("scheme", "is required");
        } else if !schemes.is_empty() && !schemes.iter().any(|s| s == scheme) {
            errors.push(
                "scheme",
                format!("'{scheme}' is not one of: {}", schemes.join(", ")),
            );
        }

        let path = normalize_path(&self.path);
        if path.is_empty() {
            errors.push("path", "is required");
        } else if let Err(e) = parse_template(&path) {
            errors.push("path", e.to_string());
        }

        MappingStrategy::SemanticTag {
            source_term_uri: source_term_uri.to_string(),
            derivative_term_uri: derivative_term_uri.to_string(),
            scheme: scheme.to_string(),
            path,
        }
    }

    fn field_mapping(&self, errors: &mut Collector) -> MappingStrategy {
        let source = self.source_field.trim();
        let destination = self.destination_field.trim();
        let bundle = self.bundle.trim();
        require(errors, "source_field", source);
        require(errors, "destination_field", destination);
        require(errors, "bundle", bundle);

        MappingStrategy::FieldMapping {
            source: source.to_string(),
            destination: destination.to_string(),
            bundle: bundle.to_string(),
        }
    }

    fn validate_trigger(&self, errors: &mut Collector) {
        if self.trigger.entity_types.is_empty() {
            errors.push("trigger.entity_types", "must name at least one entity type");
        }
        if self.trigger.kinds.is_empty() {
            errors.push("trigger.kinds", "must name at least one mutation kind");
        }
        if self.trigger.kinds.contains(&MutationKind::Deleted) {
            errors.push("trigger.kinds", "deleted entities cannot trigger derivatives");
        }
    }
}

/// Strip whitespace and leading/trailing `/` and `\`.
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .trim_matches(|c| c == '/' || c == '\\')
        .to_string()
}
