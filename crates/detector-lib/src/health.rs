//! Component health tracking for the detector service
//!
//! Backs the `/healthz` and `/readyz` probes. Readiness follows the served
//! model: the service is ready once some artifact version is serving and no
//! component has failed outright.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but something needs attention
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

/// The parts of the detector that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    Classifier,
    Scaler,
    ArtifactStore,
    Trainer,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Classifier,
        Component::Scaler,
        Component::ArtifactStore,
        Component::Trainer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Classifier => "classifier",
            Component::Scaler => "scaler",
            Component::ArtifactStore => "artifact_store",
            Component::Trainer => "trainer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix seconds of the last status change
    pub since: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            since: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct Snapshot {
    components: BTreeMap<Component, ComponentHealth>,
    serving: Option<String>,
}

impl Snapshot {
    /// Worst status across components; none registered means healthy
    fn overall(&self) -> ComponentStatus {
        self.components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    inner: Arc<RwLock<Snapshot>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `components` registered as healthy
    pub fn with_components(components: &[Component]) -> Self {
        let snapshot = Snapshot {
            components: components
                .iter()
                .map(|c| (*c, ComponentHealth::healthy()))
                .collect(),
            serving: None,
        };
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub async fn mark(&self, component: Component, health: ComponentHealth) {
        self.inner.write().await.components.insert(component, health);
    }

    pub async fn set_healthy(&self, component: Component) {
        self.mark(component, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.mark(component, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.mark(component, ComponentHealth::unhealthy(message)).await;
    }

    /// Record which artifact version is serving, if any. Classifier and
    /// scaler travel together in one artifact, so both follow it.
    pub async fn record_serving(&self, version: Option<String>) {
        let mut snapshot = self.inner.write().await;
        let (classifier, scaler) = match version {
            Some(_) => (ComponentHealth::healthy(), ComponentHealth::healthy()),
            None => (
                ComponentHealth::degraded("no model loaded"),
                ComponentHealth::degraded("no scaler loaded"),
            ),
        };
        snapshot.components.insert(Component::Classifier, classifier);
        snapshot.components.insert(Component::Scaler, scaler);
        snapshot.serving = version;
    }

    pub async fn health(&self) -> HealthResponse {
        let snapshot = self.inner.read().await;
        HealthResponse {
            status: snapshot.overall(),
            model_version: snapshot.serving.clone(),
            components: snapshot
                .components
                .iter()
                .map(|(c, h)| (c.as_str().to_string(), h.clone()))
                .collect(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let snapshot = self.inner.read().await;
        let reason = match (&snapshot.serving, snapshot.overall()) {
            (None, _) => Some("No model is being served yet"),
            (Some(_), ComponentStatus::Unhealthy) => Some("Critical component unhealthy"),
            _ => None,
        };
        ReadinessResponse {
            ready: reason.is_none(),
            model_version: snapshot.serving.clone(),
            reason: reason.map(str::to_string),
        }
    }
}
