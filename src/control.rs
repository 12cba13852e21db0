//! The surface the HTTP routing layer is built on.
//!
//! [`Controller`] ties the upstream API and the permission store to the pure
//! selector, scope and status logic. Each request obtains a [`Scope`] once
//! through [`Controller::scope_for`] and passes it to every later call.

use crate::client::{LifxClient, StateChange, StateResults};
use crate::resource::{Fixture, Scene};
use crate::scope::{Caller, PermissionSet, Scope};
use crate::selector::{Selector, SelectorList};
use crate::status::{all_scene_statuses, check_scene_status, SceneStatus};
use crate::LightError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Pause between consecutive zone writes so they do not override each other
/// on the device.
const ZONE_COMMAND_GAP: Duration = Duration::from_millis(300);

pub trait FixtureSource {
    fn fixtures(&self) -> impl Future<Output = crate::Result<Vec<Fixture>>> + Send;
}

pub trait SceneSource {
    fn scenes(&self) -> impl Future<Output = crate::Result<Vec<Scene>>> + Send;
}

pub trait LightControl {
    fn set_state(
        &self,
        selector: &SelectorList,
        change: &StateChange,
    ) -> impl Future<Output = crate::Result<StateResults>> + Send;

    fn toggle(&self, selector: &SelectorList)
        -> impl Future<Output = crate::Result<StateResults>> + Send;

    fn activate_scene(&self, scene_id: &str)
        -> impl Future<Output = crate::Result<StateResults>> + Send;
}

/// Where per-user grants are persisted. Unknown users have no grants.
pub trait PermissionStore {
    fn permissions(&self, caller_id: &str)
        -> impl Future<Output = crate::Result<PermissionSet>> + Send;
}

impl FixtureSource for LifxClient {
    async fn fixtures(&self) -> crate::Result<Vec<Fixture>> {
        self.get_all_lights().await
    }
}

impl SceneSource for LifxClient {
    async fn scenes(&self) -> crate::Result<Vec<Scene>> {
        self.get_all_scenes().await
    }
}

impl LightControl for LifxClient {
    async fn set_state(
        &self,
        selector: &SelectorList,
        change: &StateChange,
    ) -> crate::Result<StateResults> {
        LifxClient::set_state(self, selector, change).await
    }

    async fn toggle(&self, selector: &SelectorList) -> crate::Result<StateResults> {
        LifxClient::toggle(self, selector).await
    }

    async fn activate_scene(&self, scene_id: &str) -> crate::Result<StateResults> {
        LifxClient::activate_scene(self, scene_id).await
    }
}

/// What a caller is shown of the fleet, e.g. as context for a natural
/// language planner.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub lights: Vec<Fixture>,
    pub scenes: Vec<Scene>,
}

/// One step of a plan produced outside this crate from a user utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Toggle {
        selector: String,
        #[serde(default)]
        description: String,
    },
    SetState {
        selector: String,
        state: StateChange,
        #[serde(default)]
        description: String,
    },
    ActivateScene {
        scene_id: String,
        #[serde(default)]
        description: String,
    },
}

impl Action {
    pub fn description(&self) -> &str {
        match self {
            Action::Toggle { description, .. }
            | Action::SetState { description, .. }
            | Action::ActivateScene { description, .. } => description,
        }
    }

    fn addresses_zones(&self) -> bool {
        let selector = match self {
            Action::Toggle { selector, .. } | Action::SetState { selector, .. } => selector,
            Action::ActivateScene { .. } => return false,
        };
        selector.split(',').any(|part| {
            matches!(
                Selector::parse(part),
                Selector::ByFixtureId { zone: Some(_), .. }
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub description: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Controller<U, P> {
    upstream: U,
    store: P,
}

impl<U, P> Controller<U, P>
where
    U: FixtureSource + SceneSource + LightControl,
    P: PermissionStore,
{
    pub fn new(upstream: U, store: P) -> Self {
        Controller { upstream, store }
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Reads the caller's grants once. Admin grants are never read.
    pub async fn scope_for(&self, caller: Caller) -> crate::Result<Scope> {
        let permissions = if caller.is_admin {
            PermissionSet::default()
        } else {
            self.store.permissions(&caller.id).await?
        };
        Ok(Scope::new(caller, permissions))
    }

    pub async fn list_fixtures(&self, scope: &Scope) -> crate::Result<Vec<Fixture>> {
        Ok(scope.filter_fixtures(self.upstream.fixtures().await?))
    }

    pub async fn list_scenes(&self, scope: &Scope) -> crate::Result<Vec<Scene>> {
        Ok(scope.filter_scenes(self.upstream.scenes().await?))
    }

    pub fn authorize_selector(&self, scope: &Scope, text: &str) -> crate::Result<SelectorList> {
        scope.authorize_selector(text)
    }

    /// Status of a scene the caller is entitled to, judged against every
    /// live fixture, including ones the caller cannot see.
    pub async fn scene_status(&self, scope: &Scope, scene_id: &str) -> crate::Result<SceneStatus> {
        scope.authorize_scene(scene_id)?;
        let scenes = self.upstream.scenes().await?;
        let scene = scenes
            .iter()
            .find(|scene| scene.id == scene_id)
            .ok_or_else(|| LightError::SceneNotFound {
                id: scene_id.to_string(),
            })?;
        let fixtures = self.upstream.fixtures().await?;
        Ok(check_scene_status(scene, &fixtures))
    }

    /// Status of every visible scene, judged against the visible fixtures.
    pub async fn scene_statuses(&self, scope: &Scope) -> crate::Result<HashMap<String, SceneStatus>> {
        let Snapshot { lights, scenes } = self.context(scope).await?;
        Ok(all_scene_statuses(&scenes, &lights))
    }

    pub async fn context(&self, scope: &Scope) -> crate::Result<Snapshot> {
        Ok(Snapshot {
            lights: self.list_fixtures(scope).await?,
            scenes: self.list_scenes(scope).await?,
        })
    }

    pub async fn set_state(
        &self,
        scope: &Scope,
        selector: &str,
        change: &StateChange,
    ) -> crate::Result<StateResults> {
        if change.is_empty() {
            return Err(LightError::EmptyStateChange);
        }
        let selector = scope.authorize_selector(selector)?;
        self.upstream.set_state(&selector, change).await
    }

    pub async fn toggle(&self, scope: &Scope, selector: &str) -> crate::Result<StateResults> {
        let selector = scope.authorize_selector(selector)?;
        self.upstream.toggle(&selector).await
    }

    pub async fn activate_scene(&self, scope: &Scope, scene_id: &str) -> crate::Result<StateResults> {
        scope.authorize_scene(scene_id)?;
        self.upstream.activate_scene(scene_id).await
    }

    async fn run(&self, scope: &Scope, action: &Action) -> crate::Result<StateResults> {
        match action {
            Action::Toggle { selector, .. } => self.toggle(scope, selector).await,
            Action::SetState {
                selector, state, ..
            } => self.set_state(scope, selector, state).await,
            Action::ActivateScene { scene_id, .. } => self.activate_scene(scope, scene_id).await,
        }
    }

    /// Runs a plan step by step. Every step is authorized on its own and a
    /// failing step does not stop the ones after it.
    pub async fn execute(&self, scope: &Scope, actions: &[Action]) -> crate::Result<Vec<ActionOutcome>> {
        if !scope.caller().nlp_enabled {
            return Err(LightError::NlpDisabled);
        }
        let mut outcomes = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            if index > 0 && action.addresses_zones() {
                tokio::time::sleep(ZONE_COMMAND_GAP).await;
            }
            let outcome = match self.run(scope, action).await {
                Ok(results) => ActionOutcome {
                    description: action.description().to_string(),
                    success: true,
                    details: (!results.results.is_empty()).then(|| results.summary()),
                    error: None,
                },
                Err(error) => {
                    log::debug!("action {:?} failed: {}", action, error);
                    ActionOutcome {
                        description: action.description().to_string(),
                        success: false,
                        details: None,
                        error: Some(error.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}
