//! Configuration of a [`Dispatcher`].

use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    cluster::ClusterApi,
    discovery::Discovery,
    dispatch::Dispatcher,
    kubectl::Runner,
    resource::{Behavior, DeployMethod},
};

/// Handler of a kind known without discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    behavior: Behavior,
    timeout: Duration,
    deploy_method: DeployMethod,
}

impl Builtin {
    /// Timeout of kinds that do not specify their own.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            timeout: Self::DEFAULT_TIMEOUT,
            deploy_method: DeployMethod::Apply,
        }
    }

    pub fn generic() -> Self {
        Self::new(Behavior::Generic)
    }

    pub fn resource_quota() -> Self {
        Self::new(Behavior::ResourceQuota).with_timeout(Duration::from_secs(30))
    }

    pub fn legacy_definition() -> Self {
        Self::new(Behavior::LegacyDefinition).with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_deploy_method(mut self, deploy_method: DeployMethod) -> Self {
        self.deploy_method = deploy_method;
        self
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deploy_method(&self) -> DeployMethod {
        self.deploy_method
    }
}

/// The built-in kinds every dispatcher starts with.
pub fn default_builtins() -> HashMap<String, Builtin> {
    [
        ("ResourceQuota", Builtin::resource_quota()),
        ("ThirdPartyResource", Builtin::legacy_definition()),
        (
            // updates are rejected, see kubernetes/kubernetes#45398
            "PodDisruptionBudget",
            Builtin::generic().with_deploy_method(DeployMethod::ReplaceForce),
        ),
    ]
    .into_iter()
    .map(|(kind, builtin)| (kind.to_owned(), builtin))
    .collect()
}

/// Builds a [`Dispatcher`]. Created by [`on`].
pub struct Builder<A, R> {
    api: A,
    runner: R,
    builtins: HashMap<String, Builtin>,
    generic_fallback: bool,
}

impl<A: ClusterApi, R: Runner> Builder<A, R> {
    /// Adds a built-in kind, replacing any previous handler for it.
    ///
    /// Built-in kinds take precedence over discovered kinds of the same name.
    pub fn with(mut self, kind: impl Into<String>, builtin: Builtin) -> Self {
        self.builtins.insert(kind.into(), builtin);
        self
    }

    /// Makes kinds that are neither built-in nor discovered an error
    /// instead of deploying them with the generic handler.
    pub fn without_generic_fallback(mut self) -> Self {
        self.generic_fallback = false;
        self
    }

    pub fn build(self) -> Dispatcher<A, R> {
        Dispatcher::new(
            Arc::new(Discovery::new(Arc::new(self.api))),
            Arc::new(self.runner),
            self.builtins,
            self.generic_fallback.then(Builtin::generic),
        )
    }
}

/// Starts configuring a dispatcher reading the cluster through `api` and `runner`.
pub fn on<A: ClusterApi, R: Runner>(api: A, runner: R) -> Builder<A, R> {
    Builder {
        api,
        runner,
        builtins: default_builtins(),
        generic_fallback: true,
    }
}
