use std::sync::Arc;

use anyhow::{Result, bail};
use derivq_config::{ConfigValidator, TaskConfigForm};
use derivq_core::MemoryRepository;

use crate::cli::ValidateArgs;
use crate::output::{print_error, print_field, print_success, print_warning};

pub async fn run(args: ValidateArgs, level_override: bool) -> Result<()> {
    let config = super::load(&args.config, level_override)?;
    print_success(&format!(
        "Loaded {} ({} task(s))",
        args.config.display(),
        config.tasks.len()
    ));
    if config.tasks.is_empty() {
        print_warning("No tasks configured");
    }

    let Some(fixture) = args.fixture else {
        for task in &config.tasks {
            describe(task);
        }
        return Ok(());
    };

    let (repository, _) = MemoryRepository::load(&fixture)?;
    let repository = Arc::new(repository);
    let validator = ConfigValidator::new(
        repository.clone(),
        repository,
        config.site.schemes.clone(),
    );

    let mut failed = 0usize;
    for task in &config.tasks {
        match validator.validate(task).await {
            Ok(_) => describe(task),
            Err(e) => {
                failed += 1;
                print_error(&format!("Task '{}' is invalid", task.display_name()));
                let errors = e.field_errors();
                if errors.is_empty() {
                    print_field("error", &e.to_string());
                }
                for fe in errors {
                    print_field(&fe.field, &fe.message);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} task(s) failed validation against {}", fixture.display());
    }
    Ok(())
}

fn describe(task: &TaskConfigForm) {
    print_success(&format!("Task '{}'", task.display_name()));
    print_field("strategy", &task.strategy);
    print_field("queue", &task.queue);
}
