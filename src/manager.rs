//! Environment manager
//!
//! [`Environment`] is the context shared by the command dispatcher and the
//! drift reconciler. It owns the parsed documents, the service graph, the
//! active set and the environment store. Every reload, mutation and persist
//! runs under one async mutex, so at most one of them is in flight.

use crate::compose::graph::extract_services;
use crate::compose::{
    emitter, ActiveSet, ComposeParser, MaterializeOutcome, Service, ServiceGraph, StructuralIssue,
};
use crate::config::Settings;
use crate::debug::render_config;
use crate::env_store::EnvStore;
use crate::error::{DevenvError, Result};
use crate::reconcile::{ReconcileReport, ServiceFailure};
use crate::runtime::{CommandRunner, ServiceControl};
use serde::Serialize;
use serde_yaml::Value;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Parsed documents and everything derived from them
struct State {
    template: Value,
    graph: ServiceGraph,
    deployment: Vec<Service>,
    active: ActiveSet,
    env: EnvStore,
    template_issues: Vec<StructuralIssue>,
    deployment_issues: Vec<StructuralIssue>,
}

/// Copy of the derived state at one point in time
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Template services, sorted by name
    pub graph: ServiceGraph,
    /// Deployment services, in document order
    pub deployment: Vec<Service>,
    /// Active set aligned with `graph`
    pub active: ActiveSet,
    /// Shape problems found in either document
    pub issues: Vec<StructuralIssue>,
}

impl Snapshot {
    /// One status row per template service
    pub fn statuses(&self) -> Vec<ServiceStatus> {
        self.graph
            .iter()
            .zip(self.active.flags())
            .map(|(service, active)| ServiceStatus {
                name: service.name.clone(),
                image: service.image.clone(),
                links: service.links.clone(),
                depends_on: service.depends_on.clone(),
                active: *active,
            })
            .collect()
    }
}

/// A template service and whether it is deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub image: String,
    pub links: Vec<String>,
    pub depends_on: Vec<String>,
    pub active: bool,
}

/// The managed development environment
pub struct Environment {
    settings: Settings,
    control: ServiceControl,
    state: Mutex<State>,
}

impl Environment {
    /// Load the documents described by `settings`.
    ///
    /// Fails only when the template cannot be read or parsed; a missing or
    /// unreadable deployment document means nothing is deployed yet.
    pub async fn load(settings: Settings, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let state = read_state(&settings).await?;
        let control = ServiceControl::new(runner, &settings);
        info!(
            "Loaded {} services ({} active) from {}",
            state.graph.len(),
            state.active.len(),
            settings.template_path().display()
        );
        Ok(Self {
            settings,
            control,
            state: Mutex::new(state),
        })
    }

    /// Settings the environment was loaded with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Re-read every document. On failure the previous state is kept.
    pub async fn reload(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = read_state(&self.settings).await?;
        debug!("Reloaded environment, {} active services", state.active.len());
        Ok(())
    }

    /// Copy of the current graph and active set
    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        Snapshot {
            graph: state.graph.clone(),
            deployment: state.deployment.clone(),
            active: state.active.clone(),
            issues: state
                .template_issues
                .iter()
                .chain(state.deployment_issues.iter())
                .cloned()
                .collect(),
        }
    }

    /// Names of deployed services, in deployment document order
    pub async fn active_services(&self) -> Vec<String> {
        self.state.lock().await.active.names().to_vec()
    }

    /// Look up a template service by name
    pub async fn get_service(&self, name: &str) -> Option<Service> {
        self.state.lock().await.graph.get(name).cloned()
    }

    /// Write a deployment document holding the requested services, then
    /// re-read it so the active set reflects what was written.
    ///
    /// Names missing from the template are skipped and listed in the outcome.
    pub async fn materialize<I, S>(&self, requested: I) -> Result<MaterializeOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: Vec<String> = requested
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        let mut state = self.state.lock().await;
        self.materialize_locked(&mut state, &requested).await
    }

    /// Materialize the requested services and run the install script
    pub async fn up<I, S>(&self, requested: I) -> Result<MaterializeOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: Vec<String> = requested
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        let mut state = self.state.lock().await;
        let outcome = self.materialize_locked(&mut state, &requested).await?;
        let script = self.settings.install_script_path();
        info!("Applying deployment with {}", script.display());
        self.control.apply(&script).await?;
        Ok(outcome)
    }

    async fn materialize_locked(
        &self,
        state: &mut State,
        requested: &[String],
    ) -> Result<MaterializeOutcome> {
        let outcome = emitter::materialize(
            &state.template,
            &state.graph,
            requested,
            &self.settings.deployment_path(),
        )
        .await?;
        resync_deployment(&self.settings, state)?;
        info!(
            "Materialized {} services to {}",
            outcome.emitted.len(),
            outcome.path.display()
        );
        Ok(outcome)
    }

    /// Rewrite debug configuration for `address` and restart affected services.
    ///
    /// The deployment document and the environment store are re-read before
    /// use, as other processes may have rewritten them. `previous` is
    /// the address currently recorded in the environment store; when given,
    /// the store is updated to the new address. Failures of single services
    /// are collected in the report and do not stop the pass.
    ///
    /// The state lock is held only while documents are read and the store is
    /// rewritten, not across container commands.
    pub async fn regenerate_debug_config(
        &self,
        address: Ipv4Addr,
        previous: Option<&str>,
    ) -> ReconcileReport {
        let settings = &self.settings;
        let naming = &settings.naming;
        let address = address.to_string();
        let mut report = ReconcileReport::new(&address, previous);

        let active = {
            let mut state = self.state.lock().await;
            if let Err(e) = resync_deployment(settings, &mut state) {
                warn!("Using cached deployment, re-read failed: {}", e);
            }
            state.active.names().to_vec()
        };

        for service in naming.debug_services(&active) {
            let content = render_config(naming.debug_variant(service), &address, settings.debug_port);
            match self
                .control
                .write_file(service, &settings.debug_config_path, &content)
                .await
            {
                Ok(()) => report.configured.push(service.to_string()),
                Err(e) => {
                    warn!("Failed to write debug configuration for {}: {}", service, e);
                    report.failed.push(ServiceFailure::new(service, e));
                }
            }
        }

        if let Some(previous) = previous {
            let mut state = self.state.lock().await;
            if let Err(e) = self.update_debug_host(&mut state, previous, &address).await {
                warn!("Failed to update {}: {}", settings.env_path().display(), e);
                report.env_error = Some(e.to_string());
            } else {
                report.env_updated =
                    state.env.get(&settings.debug_host_key).as_deref() == Some(address.as_str());
            }
        }

        let mut targets: Vec<&str> = naming
            .restart_order(&active)
            .into_iter()
            .filter(|name| *name != settings.reverse_proxy && *name != settings.web_server)
            .collect();
        targets.push(&settings.reverse_proxy);
        targets.push(&settings.web_server);

        for service in targets {
            match self.control.restart(service).await {
                Ok(()) => report.restarted.push(service.to_string()),
                Err(e) => {
                    warn!("Failed to restart {}: {}", service, e);
                    report.failed.push(ServiceFailure::new(service, e));
                }
            }
        }

        report.finish()
    }

    /// Re-read the environment store, swap the debug host entry and persist
    async fn update_debug_host(
        &self,
        state: &mut State,
        previous: &str,
        address: &str,
    ) -> Result<()> {
        let settings = &self.settings;
        state.env = EnvStore::load(&settings.env_path(), &settings.env_example_path()).await?;

        let key = &settings.debug_host_key;
        let replaced = state
            .env
            .substitute(&format!("{}={}", key, previous), &format!("{}={}", key, address));
        if replaced == 0 {
            debug!("{}={} not found in environment store", key, previous);
            return Ok(());
        }
        state.env.persist().await
    }

    /// Restart the reverse proxy and, unless `proxy_only`, the web server
    pub async fn restart_web_tier(&self, proxy_only: bool) -> Result<()> {
        let _guard = self.state.lock().await;
        self.control
            .restart_web_tier(
                &self.settings.reverse_proxy,
                &self.settings.web_server,
                proxy_only,
            )
            .await
    }

    /// Current environment store text
    pub async fn env_content(&self) -> String {
        self.state.lock().await.env.content().to_string()
    }

    /// Replace the environment store text and persist it
    pub async fn set_env(&self, content: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.env.set_content(content);
        state.env.persist().await
    }
}

async fn read_state(settings: &Settings) -> Result<State> {
    let template = ComposeParser::parse_file(&settings.template_path())?;
    let (graph, template_issues) = ServiceGraph::from_document(&template);
    for issue in &template_issues {
        warn!("Template: {}", issue);
    }

    let env = EnvStore::load(&settings.env_path(), &settings.env_example_path()).await?;

    let mut state = State {
        template,
        graph,
        deployment: Vec::new(),
        active: ActiveSet::default(),
        env,
        template_issues,
        deployment_issues: Vec::new(),
    };
    resync_deployment(settings, &mut state)?;
    Ok(state)
}

/// Re-read the deployment document and recompute the active set
fn resync_deployment(settings: &Settings, state: &mut State) -> Result<()> {
    let path = settings.deployment_path();
    let document = match ComposeParser::parse_optional(&path) {
        Ok(document) => document,
        Err(DevenvError::ComposeParse(e)) => {
            warn!("Ignoring unreadable deployment document {}: {}", path.display(), e);
            None
        }
        Err(e) => return Err(e),
    };

    // A missing document simply means nothing is deployed yet.
    let (deployment, issues) = match &document {
        Some(doc) => extract_services(doc),
        None => (Vec::new(), Vec::new()),
    };
    for issue in &issues {
        warn!("Deployment: {}", issue);
    }

    state.active = ActiveSet::compute(&state.graph, document.as_ref());
    state.deployment = deployment;
    state.deployment_issues = issues;
    Ok(())
}
