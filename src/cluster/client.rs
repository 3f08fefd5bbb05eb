use std::{collections::HashMap, sync::Arc};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionVersion,
};
use kube_client::{
    api::ListParams,
    config::KubeConfigOptions,
    discovery::{self, ApiCapabilities, ApiGroup, Scope},
    Api, Client, Config,
};
use kube_core::{ApiResource, DynamicObject, GroupVersion};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::{ClusterApi, ClusterError, CurrentDefinition, LegacyDefinition};
use crate::descriptor::Identity;

const LEGACY_GROUP: &str = "extensions";
const LEGACY_VERSION: &str = "v1beta1";
const LEGACY_KIND: &str = "ThirdPartyResource";
const LEGACY_PLURAL: &str = "thirdpartyresources";

/// [`ClusterApi`] backed by a `kube-client` connection to one context.
pub struct KubeClusterApi {
    client: Client,
    /// Discovery results per (group, version), resolved on first use.
    groups: Mutex<HashMap<(String, String), Arc<OnceCell<ApiGroup>>>>,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            groups: Mutex::default(),
        }
    }

    /// Connects using the named context from the local kubeconfig.
    pub async fn for_context(context: &str) -> Result<Self, ClusterError> {
        let options = KubeConfigOptions {
            context: Some(context.to_owned()),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_kubeconfig(&options).await?;
        Ok(Self::new(Client::try_from(config)?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn resolve(
        &self,
        identity: &Identity,
    ) -> Result<(ApiResource, ApiCapabilities), ClusterError> {
        let cell = {
            let mut groups = self.groups.lock();
            let key = (identity.group.clone(), identity.version.clone());
            Arc::clone(groups.entry(key).or_default())
        };

        let group = cell
            .get_or_try_init(|| async move {
                log::debug!("Discovering resources served under {}", identity.api_version());
                let gv = GroupVersion::gv(&identity.group, &identity.version);
                discovery::pinned_group(&self.client, &gv).await
            })
            .await?;

        group
            .versioned_resources(&identity.version)
            .into_iter()
            .find(|(resource, _)| kind_matches(&resource.kind, &identity.kind))
            .ok_or_else(|| ClusterError::UnknownResource {
                identity: identity.clone(),
            })
    }

    async fn serves_legacy_definitions(&self) -> Result<bool, ClusterError> {
        let api_version = format!("{LEGACY_GROUP}/{LEGACY_VERSION}");
        match self.client.list_api_group_resources(&api_version).await {
            Ok(list) => Ok(list
                .resources
                .iter()
                .any(|resource| resource.name == LEGACY_PLURAL)),
            Err(kube_client::Error::Api(response)) if response.code == 404 => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Compares kinds ignoring case and dashes. Legacy kinds are derived from
/// definition names, so `Cron-tab` has to find the served `CronTab`.
fn kind_matches(served: &str, kind: &str) -> bool {
    let normalize = |kind: &str| -> String {
        kind.chars()
            .filter(|c| *c != '-')
            .flat_map(char::to_lowercase)
            .collect()
    };
    normalize(served) == normalize(kind)
}

impl ClusterApi for KubeClusterApi {
    async fn list_legacy_definitions(&self) -> Result<Option<Vec<LegacyDefinition>>, ClusterError> {
        if !self.serves_legacy_definitions().await? {
            return Ok(None);
        }

        let resource = ApiResource {
            group: LEGACY_GROUP.to_owned(),
            version: LEGACY_VERSION.to_owned(),
            api_version: format!("{LEGACY_GROUP}/{LEGACY_VERSION}"),
            kind: LEGACY_KIND.to_owned(),
            plural: LEGACY_PLURAL.to_owned(),
        };
        let api = Api::<DynamicObject>::all_with(self.client.clone(), &resource);
        let list = api.list(&ListParams::default()).await?;

        list.items
            .into_iter()
            .map(legacy_definition)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    async fn list_current_definitions(&self) -> Result<Vec<CurrentDefinition>, ClusterError> {
        let api = Api::<CustomResourceDefinition>::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(classify_list_error)?;

        list.items.into_iter().map(current_definition).collect()
    }

    async fn get_raw(
        &self,
        identity: &Identity,
        name: &str,
        namespace: &str,
    ) -> Result<Value, ClusterError> {
        let (resource, capabilities) = self.resolve(identity).await?;
        let api: Api<DynamicObject> = match capabilities.scope {
            Scope::Cluster => Api::all_with(self.client.clone(), &resource),
            Scope::Namespaced => Api::namespaced_with(self.client.clone(), namespace, &resource),
        };
        let object = api.get(name).await?;
        Ok(serde_json::to_value(object)?)
    }
}

fn classify_list_error(err: kube_client::Error) -> ClusterError {
    match err {
        kube_client::Error::Api(response) if matches!(response.code, 404 | 405) => {
            ClusterError::Unsupported(response.message)
        }
        other => other.into(),
    }
}

#[derive(Deserialize)]
struct LegacyBody {
    #[serde(default)]
    versions: Vec<LegacyVersion>,
}

#[derive(Deserialize)]
struct LegacyVersion {
    name: String,
}

fn legacy_definition(object: DynamicObject) -> Result<LegacyDefinition, ClusterError> {
    let name = object.metadata.name.ok_or_else(|| ClusterError::Malformed {
        name: String::from("<unnamed>"),
        reason: String::from("missing metadata.name"),
    })?;
    let body: LegacyBody =
        serde_json::from_value(object.data).map_err(|err| ClusterError::Malformed {
            name: name.clone(),
            reason: err.to_string(),
        })?;

    Ok(LegacyDefinition {
        name,
        annotations: object.metadata.annotations.unwrap_or_default(),
        versions: body.versions.into_iter().map(|version| version.name).collect(),
    })
}

fn current_definition(crd: CustomResourceDefinition) -> Result<CurrentDefinition, ClusterError> {
    let name = crd.metadata.name.unwrap_or_default();
    let version = stored_version(&crd.spec.versions).ok_or_else(|| ClusterError::Malformed {
        name: name.clone(),
        reason: String::from("no served version"),
    })?;

    Ok(CurrentDefinition {
        group: crd.spec.group,
        kind: crd.spec.names.kind,
        version,
        annotations: crd.metadata.annotations.unwrap_or_default(),
    })
}

/// The storage version if it is served, otherwise the first served version.
fn stored_version(versions: &[CustomResourceDefinitionVersion]) -> Option<String> {
    versions
        .iter()
        .find(|version| version.storage && version.served)
        .or_else(|| versions.iter().find(|version| version.served))
        .map(|version| version.name.clone())
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinitionVersion;
    use kube_core::{DynamicObject, ErrorResponse};
    use serde_json::json;

    use super::*;

    fn version(name: &str, served: bool, storage: bool) -> CustomResourceDefinitionVersion {
        CustomResourceDefinitionVersion {
            name: name.to_owned(),
            served,
            storage,
            ..Default::default()
        }
    }

    #[test]
    fn picks_served_storage_version() {
        let versions = [version("v1alpha1", true, false), version("v1", true, true)];
        assert_eq!(stored_version(&versions).as_deref(), Some("v1"));

        let versions = [version("v1", false, true), version("v2", true, false)];
        assert_eq!(stored_version(&versions).as_deref(), Some("v2"));

        assert_eq!(stored_version(&[version("v1", false, true)]), None);
    }

    #[test]
    fn legacy_kinds_match_served_kinds() {
        assert!(kind_matches("CronTab", "Cron-tab"));
        assert!(kind_matches("CronTab", "Crontab"));
        assert!(kind_matches("Widget", "Widget"));
        assert!(!kind_matches("Widget", "Gizmo"));
        assert!(!kind_matches("CronTab", "Cron"));
    }

    #[test]
    fn reads_legacy_definition_versions() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "extensions/v1beta1",
            "kind": "ThirdPartyResource",
            "metadata": {
                "name": "gizmo.example.com",
                "annotations": {"kubernetes-deploy.shopify.io/prunable": "true"},
            },
            "versions": [{"name": "v1"}, {"name": "v2"}],
        }))
        .unwrap();

        let definition = legacy_definition(object).unwrap();
        assert_eq!(definition.name, "gizmo.example.com");
        assert_eq!(definition.versions, ["v1", "v2"]);
        assert_eq!(
            definition.annotations.get("kubernetes-deploy.shopify.io/prunable").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn not_found_listing_is_unsupported() {
        let response = |code| {
            kube_client::Error::Api(ErrorResponse {
                status: "Failure".to_owned(),
                message: "the server could not find the requested resource".to_owned(),
                reason: "NotFound".to_owned(),
                code,
            })
        };

        assert!(matches!(classify_list_error(response(404)), ClusterError::Unsupported(_)));
        assert!(matches!(classify_list_error(response(403)), ClusterError::Kube(_)));
    }
}
