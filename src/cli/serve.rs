//! `hotserve serve`: run every configured instance until Ctrl+C.

use anyhow::{Context, Result, bail};
use crossbeam::channel::Receiver;

use crate::config::Config;
use crate::log;
use crate::server::{InstanceOptions, Orchestrator, RouteSource};

pub fn run(config: &Config, shutdown: Receiver<()>) -> Result<()> {
    if config.instances.is_empty() {
        bail!(
            "no [[instance]] in {}, nothing to serve",
            config.config_path.display()
        );
    }

    let orchestrator = Orchestrator::from_config(config)
        .build()
        .context("failed to start orchestrator")?;

    for instance in &config.instances {
        let options = InstanceOptions {
            views: instance.views.clone(),
            public: instance.public.clone(),
            watch: instance.watch,
            launch: instance.launch.clone(),
        };
        let created = orchestrator.create_instance(
            &instance.name,
            RouteSource::File(instance.routes.clone()),
            instance.port,
            options,
        );
        if let Err(e) = created {
            // Stop the instances already started before reporting
            orchestrator.cleanup();
            return Err(e)
                .with_context(|| format!("failed to start instance `{}`", instance.name));
        }
    }

    // Block until Ctrl+C
    let _ = shutdown.recv();

    let report = orchestrator.cleanup();
    if !report.failed.is_empty() {
        log!("serve"; "{} instance(s) did not stop cleanly", report.failed.len());
    }
    Ok(())
}
