//! Access to Argo CD Application objects
//!
//! The maintenance flow only needs list, get and replace. Keeping that
//! surface behind a trait lets tests run the whole flow against an
//! in-memory store instead of a cluster.

use async_trait::async_trait;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, instrument};

use crate::crd::Application;
use crate::error::{Error, Result};
use crate::selector::LabelSelector;

/// Namespace plus optional label selector
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub namespace: String,
    pub selector: LabelSelector,
}

impl ApplicationQuery {
    pub fn new(namespace: impl Into<String>, selector: LabelSelector) -> Self {
        Self {
            namespace: namespace.into(),
            selector,
        }
    }
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Applications matching the query, in backend order
    async fn list(&self, query: &ApplicationQuery) -> Result<Vec<Application>>;

    /// `Ok(None)` when the application does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Application>>;

    /// Replace the whole object
    async fn update(&self, app: &Application) -> Result<Application>;
}

/// Store backed by the Kubernetes API of the current kubeconfig context
#[derive(Clone)]
pub struct KubeApplicationStore {
    client: Client,
}

impl KubeApplicationStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the active kubeconfig context (or in-cluster config)
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::backend("create kubernetes client", e))?;
        Ok(Self::new(client))
    }

    fn api(&self, namespace: &str) -> Api<Application> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ApplicationStore for KubeApplicationStore {
    #[instrument(skip(self), fields(namespace = %query.namespace, selector = %query.selector))]
    async fn list(&self, query: &ApplicationQuery) -> Result<Vec<Application>> {
        let mut params = ListParams::default();
        if !query.selector.is_empty() {
            params = params.labels(&query.selector.to_string());
        }
        let list = self
            .api(&query.namespace)
            .list(&params)
            .await
            .map_err(|e| Error::backend("list applications", e))?;
        debug!("Listed {} applications", list.items.len());
        Ok(list.items)
    }

    #[instrument(skip(self))]
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Application>> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::backend(format!("get application {namespace}/{name}"), e))
    }

    #[instrument(skip(self, app), fields(name = %app.name_any()))]
    async fn update(&self, app: &Application) -> Result<Application> {
        let namespace = app.namespace().unwrap_or_default();
        let name = app.name_any();
        self.api(&namespace)
            .replace(&name, &PostParams::default(), app)
            .await
            .map_err(|e| Error::backend(format!("update application {name}"), e))
    }
}
