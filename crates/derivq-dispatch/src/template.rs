//! Storage path templating.
//!
//! Tokens look like `[namespace:property]`. Each namespace is served by a
//! [`TokenResolver`] registered on the [`TemplateEngine`]; registering a new
//! one needs no change to the engine.
//!
//! Built-in namespaces:
//!
//! | namespace          | properties                                     |
//! |--------------------|------------------------------------------------|
//! | `date`             | `custom:<format>`, `timestamp`                 |
//! | `node` / `entity`  | `nid`/`id`, `type`, `bundle`, `title`/`label`  |
//! | `media`            | `mid`/`id`, `bundle`, `name`/`label`           |
//! | `term`             | `tid`/`id`, `name`/`label`, `url`/`uri`        |
//!
//! `custom` formats use the characters `Y y m n d j H G i s U`; any other
//! character is copied, and `\` copies the next character verbatim. Dates
//! render in UTC.

use std::collections::HashMap;
use std::sync::Arc;

use derivq_core::template::contains_token;
use derivq_core::{Entity, Segment, Term, parse_template};
use time::{OffsetDateTime, UtcOffset};

use crate::error::TemplateError;

/// Everything a token may draw on.
#[derive(Debug, Clone, Copy)]
pub struct TokenContext<'a> {
    pub entity: Option<&'a Entity>,
    pub media: Option<&'a Entity>,
    pub term: Option<&'a Term>,
    pub dispatch_time: OffsetDateTime,
}

impl<'a> TokenContext<'a> {
    pub fn new(dispatch_time: OffsetDateTime) -> Self {
        Self {
            entity: None,
            media: None,
            term: None,
            dispatch_time,
        }
    }

    #[must_use]
    pub fn with_entity(mut self, entity: &'a Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: &'a Entity) -> Self {
        self.media = Some(media);
        self
    }

    #[must_use]
    pub fn with_term(mut self, term: &'a Term) -> Self {
        self.term = Some(term);
        self
    }
}

/// Resolves the properties of one token namespace.
pub trait TokenResolver: Send + Sync {
    fn resolve(
        &self,
        namespace: &str,
        property: &str,
        ctx: &TokenContext<'_>,
    ) -> Result<String, TemplateError>;
}

impl<F> TokenResolver for F
where
    F: Fn(&str, &str, &TokenContext<'_>) -> Result<String, TemplateError> + Send + Sync,
{
    fn resolve(
        &self,
        namespace: &str,
        property: &str,
        ctx: &TokenContext<'_>,
    ) -> Result<String, TemplateError> {
        self(namespace, property, ctx)
    }
}

/// Namespace registry and renderer.
#[derive(Clone)]
pub struct TemplateEngine {
    resolvers: HashMap<String, Arc<dyn TokenResolver>>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        let mut engine = Self::empty();
        engine.register("date", DateTokens);
        engine.register("node", EntityTokens);
        engine.register("entity", EntityTokens);
        engine.register("media", MediaTokens);
        engine.register("term", TermTokens);
        engine
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut namespaces: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        namespaces.sort_unstable();
        f.debug_struct("TemplateEngine")
            .field("namespaces", &namespaces)
            .finish()
    }
}

impl TemplateEngine {
    /// An engine with the built-in namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with no namespaces at all.
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Register (or replace) the resolver for `namespace`.
    pub fn register(&mut self, namespace: impl Into<String>, resolver: impl TokenResolver + 'static) {
        self.resolvers.insert(namespace.into(), Arc::new(resolver));
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.resolvers.contains_key(namespace)
    }

    /// Substitute every token and strip leading/trailing `/` and `\`.
    ///
    /// # Errors
    /// Fails on malformed syntax, an unknown namespace or property, a token
    /// whose context object is absent, an empty result, or a result that
    /// still reads as a token because a substituted value carried one.
    pub fn render(&self, template: &str, ctx: &TokenContext<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        for segment in parse_template(template)? {
            match segment {
                Segment::Literal(text) => out.push_str(&text),
                Segment::Token {
                    namespace,
                    property,
                } => {
                    let resolver = self
                        .resolvers
                        .get(&namespace)
                        .ok_or_else(|| TemplateError::UnknownNamespace(namespace.clone()))?;
                    out.push_str(&resolver.resolve(&namespace, &property, ctx)?);
                }
            }
        }

        let path = out.trim_matches(|c| c == '/' || c == '\\');
        if path.is_empty() {
            return Err(TemplateError::EmptyPath);
        }
        if contains_token(path) {
            return Err(TemplateError::UnresolvedToken(path.to_string()));
        }
        Ok(path.to_string())
    }
}

/// `scheme://path`
pub fn storage_uri(scheme: &str, path: &str) -> String {
    format!("{scheme}://{path}")
}

struct DateTokens;

impl TokenResolver for DateTokens {
    fn resolve(
        &self,
        namespace: &str,
        property: &str,
        ctx: &TokenContext<'_>,
    ) -> Result<String, TemplateError> {
        let utc = ctx.dispatch_time.to_offset(UtcOffset::UTC);
        if let Some(format) = property.strip_prefix("custom:") {
            return Ok(format_date(utc, format));
        }
        match property {
            "timestamp" => Ok(utc.unix_timestamp().to_string()),
            _ => Err(TemplateError::unknown_property(namespace, property)),
        }
    }
}

/// PHP `date()`-style formatting for the supported characters.
pub fn format_date(at: OffsetDateTime, format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            'Y' => out.push_str(&at.year().to_string()),
            'y' => out.push_str(&format!("{:02}", at.year().rem_euclid(100))),
            'm' => out.push_str(&format!("{:02}", u8::from(at.month()))),
            'n' => out.push_str(&u8::from(at.month()).to_string()),
            'd' => out.push_str(&format!("{:02}", at.day())),
            'j' => out.push_str(&at.day().to_string()),
            'H' => out.push_str(&format!("{:02}", at.hour())),
            'G' => out.push_str(&at.hour().to_string()),
            'i' => out.push_str(&format!("{:02}", at.minute())),
            's' => out.push_str(&format!("{:02}", at.second())),
            'U' => out.push_str(&at.unix_timestamp().to_string()),
            other => out.push(other),
        }
    }
    out
}

struct EntityTokens;

impl TokenResolver for EntityTokens {
    fn resolve(
        &self,
        namespace: &str,
        property: &str,
        ctx: &TokenContext<'_>,
    ) -> Result<String, TemplateError> {
        let entity = ctx
            .entity
            .ok_or_else(|| TemplateError::missing_context(namespace, property))?;
        match property {
            "nid" | "id" => Ok(entity.id.clone()),
            "type" => Ok(entity.entity_type.clone()),
            "bundle" => Ok(entity.bundle.clone()),
            "title" | "label" => Ok(entity.label.clone()),
            _ => Err(TemplateError::unknown_property(namespace, property)),
        }
    }
}

struct MediaTokens;

impl TokenResolver for MediaTokens {
    fn resolve(
        &self,
        namespace: &str,
        property: &str,
        ctx: &TokenContext<'_>,
    ) -> Result<String, TemplateError> {
        let media = ctx
            .media
            .ok_or_else(|| TemplateError::missing_context(namespace, property))?;
        match property {
            "mid" | "id" => Ok(media.id.clone()),
            "bundle" => Ok(media.bundle.clone()),
            "name" | "label" => Ok(media.label.clone()),
            _ => Err(TemplateError::unknown_property(namespace, property)),
        }
    }
}

struct TermTokens;

impl TokenResolver for TermTokens {
    fn resolve(
        &self,
        namespace: &str,
        property: &str,
        ctx: &TokenContext<'_>,
    ) -> Result<String, TemplateError> {
        let term = ctx
            .term
            .ok_or_else(|| TemplateError::missing_context(namespace, property))?;
        match property {
            "tid" | "id" => Ok(term.id.clone()),
            "name" | "label" => Ok(term.name.clone()),
            "url" | "uri" => Ok(term.uri.clone()),
            _ => Err(TemplateError::unknown_property(namespace, property)),
        }
    }
}
