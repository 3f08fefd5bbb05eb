//! Discovery of custom resource kinds served by the cluster.
//!
//! Each pass lists both ThirdPartyResources and CustomResourceDefinitions,
//! synthesizes a descriptor per declared kind and version, and replaces the
//! contents of the registry with the result.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    cluster::{ClusterApi, ClusterError, CurrentDefinition, LegacyDefinition},
    descriptor::{self, ResourceDescriptor, Source},
    registry::Registry,
    Error,
};

/// Owns the registry and the run-once state of discovery.
pub struct Discovery<A> {
    api: Arc<A>,
    /// `None` until a discovery pass has completed.
    registry: Mutex<Option<Registry>>,
}

impl<A: ClusterApi> Discovery<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            registry: Mutex::new(None),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Runs a fresh discovery pass, discarding everything a previous pass registered.
    pub async fn discover(&self) -> Result<(), Error> {
        let mut state = self.registry.lock().await;
        self.run(&mut state).await
    }

    /// Runs discovery unless a pass has already completed.
    ///
    /// Concurrent callers wait for the pass in progress instead of starting their own.
    pub async fn ensure_discovered(&self) -> Result<(), Error> {
        let mut state = self.registry.lock().await;
        if state.is_some() {
            return Ok(());
        }
        self.run(&mut state).await
    }

    pub async fn is_discovered(&self) -> bool {
        self.registry.lock().await.is_some()
    }

    pub async fn lookup(
        &self,
        group: &str,
        kind: &str,
        version: &str,
    ) -> Option<Arc<ResourceDescriptor>> {
        self.registry
            .lock()
            .await
            .as_ref()?
            .lookup(group, kind, version)
    }

    /// Every descriptor registered by the last completed pass.
    pub async fn all(&self) -> Vec<Arc<ResourceDescriptor>> {
        self.registry
            .lock()
            .await
            .as_ref()
            .map(Registry::all)
            .unwrap_or_default()
    }

    async fn run(&self, state: &mut Option<Registry>) -> Result<(), Error> {
        log::info!("Discovering custom resources");

        let registry = state.get_or_insert_with(Registry::new);
        registry.reset();

        let result = populate(&*self.api, registry).await;
        match &result {
            Ok(()) => log::debug!("Discovered {} custom resource kinds", registry.len()),
            // a failed pass must not satisfy `ensure_discovered`
            Err(_) => *state = None,
        }
        result
    }
}

async fn populate<A: ClusterApi>(api: &A, registry: &mut Registry) -> Result<(), Error> {
    let (legacy, current) = futures::join!(
        api.list_legacy_definitions(),
        api.list_current_definitions()
    );

    if let Some(definitions) = legacy? {
        register_legacy(registry, &definitions)?;
    }

    match current {
        Ok(definitions) => register_current(registry, &definitions)?,
        Err(ClusterError::Unsupported(reason)) => {
            log::warn!("Unable to discover CustomResourceDefinitions: {reason}");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}

/// Registers one descriptor per declared version of each ThirdPartyResource.
pub fn register_legacy(
    registry: &mut Registry,
    definitions: &[LegacyDefinition],
) -> Result<(), Error> {
    for definition in definitions {
        let (kind, group) = definition
            .name
            .split_once('.')
            .unwrap_or((definition.name.as_str(), ""));

        for version in &definition.versions {
            let descriptor =
                descriptor::synthesize(Source::Legacy, group, kind, version, &definition.annotations)?;
            log::debug!("Registered {}", descriptor.identity());
            registry.register(descriptor);
        }
    }
    Ok(())
}

/// Registers one descriptor per CustomResourceDefinition.
pub fn register_current(
    registry: &mut Registry,
    definitions: &[CurrentDefinition],
) -> Result<(), Error> {
    for definition in definitions {
        let descriptor = descriptor::synthesize(
            Source::Current,
            &definition.group,
            &definition.kind,
            &definition.version,
            &definition.annotations,
        )?;
        log::debug!("Registered {}", descriptor.identity());
        registry.register(descriptor);
    }
    Ok(())
}
