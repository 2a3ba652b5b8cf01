use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use derivq_auth::JwtAuthProvider;
use derivq_broker::{Publisher, RecordingPublisher, StompPublisher};
use derivq_core::events::{MutationBus, MutationEvent, TriggerSource};
use derivq_core::{EntityIndex, EntityRef, MemoryRepository, SiteUrls, StaticPrincipal};
use derivq_dispatch::{Collaborators, DerivativeHook, Dispatcher, TaskBinding};
use serde_json::Value;
use tracing::info;

use crate::cli::DispatchArgs;
use crate::output::{print_field, print_json, print_success, print_warning};

pub async fn run(args: DispatchArgs, level_override: bool) -> Result<()> {
    let config = super::load(&args.config, level_override)?;

    let target = EntityRef::parse(&args.entity)
        .ok_or_else(|| anyhow!("entity must look like type/id, got '{}'", args.entity))?;

    let bindings: Vec<TaskBinding> = config
        .task_definitions()?
        .into_iter()
        .filter(|t| args.task.as_ref().is_none_or(|name| &t.config.name == name))
        .map(TaskBinding::from)
        .collect();
    if bindings.is_empty() {
        match &args.task {
            Some(name) => bail!("no task named '{name}'"),
            None => bail!("no tasks configured"),
        }
    }

    let (repository, principal) = MemoryRepository::load(&args.fixture)
        .with_context(|| format!("loading fixture {}", args.fixture.display()))?;
    let principal = principal.ok_or_else(|| {
        anyhow!(
            "fixture {} has no principal to dispatch as",
            args.fixture.display()
        )
    })?;
    let repository = Arc::new(repository);
    let entity = repository
        .lookup_entity(&target.entity_type, &target.id)
        .await?
        .ok_or_else(|| anyhow!("entity {target} not found in fixture"))?;

    let auth = JwtAuthProvider::from_config(&config.auth)?;
    let recording = Arc::new(RecordingPublisher::new());
    let stomp = (!args.dry_run).then(|| Arc::new(StompPublisher::new(config.broker.clone())));
    let publisher: Arc<dyn Publisher> = match &stomp {
        Some(stomp) => stomp.clone() as Arc<dyn Publisher>,
        None => recording.clone() as Arc<dyn Publisher>,
    };

    let dispatcher = Dispatcher::new(
        Collaborators {
            entities: repository.clone(),
            terms: repository.clone(),
            media: repository,
            principals: Arc::new(StaticPrincipal(principal)),
            auth: Arc::new(auth),
            publisher,
        },
        SiteUrls::new(&config.site.base_url)?,
    );
    let hook = Arc::new(DerivativeHook::new(Arc::new(dispatcher), bindings));

    let bus = MutationBus::new();
    bus.subscribe(hook.clone()).await;
    let event = MutationEvent::new(args.kind.into(), entity);
    info!(entity = %target, kind = %event.kind, "Emitting mutation");
    let summary = bus.emit(&event).await;

    if let Some(stomp) = &stomp {
        stomp.close().await;
    }

    if summary.matched == 0 {
        print_warning(&format!("No task is triggered by {} of {target}", event.kind));
        return Ok(());
    }

    if args.dry_run {
        for message in recording.messages().await {
            print_success(&format!("Would send to {}", message.queue));
            for name in message.headers.keys() {
                print_field(name, "<redacted>");
            }
            let body: Value = serde_json::from_str(&message.body)?;
            print_json(&body);
        }
    }

    let stats = hook.stats();
    print_field("dispatched", &stats.dispatched().to_string());
    print_field("aborted", &stats.aborted().to_string());
    if stats.aborted() > 0 {
        bail!("{} dispatch(es) aborted; see log output", stats.aborted());
    }
    Ok(())
}
