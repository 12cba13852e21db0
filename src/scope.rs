//! Restricts what a caller may see and address.
//!
//! A [`Scope`] freezes one caller's permissions for the duration of a request
//! so that filtering, authorization and wildcard rewriting all consult the
//! same snapshot. Everything is denied unless explicitly granted.

use crate::resource::{Fixture, Scene};
use crate::selector::{Selector, SelectorList};
use crate::LightError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub is_admin: bool,
    pub is_guest: bool,
    pub nlp_enabled: bool,
}

impl Caller {
    /// A regular, non-admin user.
    pub fn new(id: impl Into<String>) -> Caller {
        Caller {
            id: id.into(),
            is_admin: false,
            is_guest: false,
            nlp_enabled: true,
        }
    }

    pub fn admin(id: impl Into<String>) -> Caller {
        Caller {
            is_admin: true,
            ..Caller::new(id)
        }
    }

    /// The identity used when a request carries no session.
    pub fn guest() -> Caller {
        Caller {
            id: "guest".to_string(),
            is_admin: false,
            is_guest: true,
            nlp_enabled: false,
        }
    }
}

/// Fixture, group and scene ids granted to a non-admin caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub fixtures: BTreeSet<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub scenes: BTreeSet<String>,
}

impl PermissionSet {
    pub fn with_fixture(mut self, id: impl Into<String>) -> Self {
        self.fixtures.insert(id.into());
        self
    }

    pub fn with_group(mut self, id: impl Into<String>) -> Self {
        self.groups.insert(id.into());
        self
    }

    pub fn with_scene(mut self, id: impl Into<String>) -> Self {
        self.scenes.insert(id.into());
        self
    }

    /// True when no fixture can be reached, either directly or by group.
    pub fn reaches_no_fixture(&self) -> bool {
        self.fixtures.is_empty() && self.groups.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Grant {
    Everything,
    Only(PermissionSet),
}

#[derive(Debug, Clone)]
pub struct Scope {
    caller: Caller,
    grant: Grant,
}

impl Scope {
    /// Admins are granted everything and `permissions` is ignored for them.
    pub fn new(caller: Caller, permissions: PermissionSet) -> Scope {
        let grant = if caller.is_admin {
            Grant::Everything
        } else {
            Grant::Only(permissions)
        };
        Scope { caller, grant }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// `None` for admins, whose permissions are never materialized.
    pub fn permissions(&self) -> Option<&PermissionSet> {
        match &self.grant {
            Grant::Everything => None,
            Grant::Only(permissions) => Some(permissions),
        }
    }

    pub fn can_see_fixture(&self, fixture: &Fixture) -> bool {
        match &self.grant {
            Grant::Everything => true,
            Grant::Only(permissions) => {
                permissions.fixtures.contains(&fixture.id)
                    || fixture
                        .group_id()
                        .is_some_and(|group| permissions.groups.contains(group))
            }
        }
    }

    pub fn can_see_scene(&self, scene_id: &str) -> bool {
        match &self.grant {
            Grant::Everything => true,
            Grant::Only(permissions) => permissions.scenes.contains(scene_id),
        }
    }

    pub fn filter_fixtures(&self, mut fixtures: Vec<Fixture>) -> Vec<Fixture> {
        fixtures.retain(|fixture| self.can_see_fixture(fixture));
        fixtures
    }

    /// Scenes are granted one by one; group grants do not extend to them.
    pub fn filter_scenes(&self, mut scenes: Vec<Scene>) -> Vec<Scene> {
        scenes.retain(|scene| self.can_see_scene(&scene.id));
        scenes
    }

    /// Whether the caller may address `selector`.
    ///
    /// `group:<name>` is allowed for any caller holding at least one group:
    /// the name is only resolved to an id upstream, which narrows the
    /// request to what actually exists. This over-approximates.
    pub fn authorize(&self, selector: &Selector) -> bool {
        let permissions = match &self.grant {
            Grant::Everything => return true,
            Grant::Only(permissions) => permissions,
        };
        match selector {
            Selector::All => !permissions.reaches_no_fixture(),
            Selector::ByFixtureId { id, .. } => permissions.fixtures.contains(id),
            Selector::ByGroupId(id) => permissions.groups.contains(id),
            Selector::ByGroupName(_) => !permissions.groups.is_empty(),
            Selector::ByLocationId(_) | Selector::ByLocationName(_) | Selector::Unknown(_) => false,
        }
    }

    /// The selector `all` stands for when this caller uses it, or `None`
    /// when the caller can reach no fixture at all.
    pub fn rewrite_wildcard(&self) -> Option<SelectorList> {
        let permissions = match &self.grant {
            Grant::Everything => return Some(SelectorList::all()),
            Grant::Only(permissions) => permissions,
        };
        let list: SelectorList = permissions
            .fixtures
            .iter()
            .map(|id| Selector::fixture(id.as_str()))
            .chain(
                permissions
                    .groups
                    .iter()
                    .map(|id| Selector::ByGroupId(id.clone())),
            )
            .collect();
        (!list.is_empty()).then_some(list)
    }

    /// Parses, authorizes and scopes a requested selector, returning the
    /// selector that may be dispatched upstream.
    pub fn authorize_selector(&self, text: &str) -> crate::Result<SelectorList> {
        let requested: SelectorList = text.parse()?;
        if let Some(refused) = requested.iter().find(|selector| !self.authorize(selector)) {
            log::debug!("user {} may not address {}", self.caller.id, refused);
            return Err(LightError::denied(text));
        }
        if !requested.contains_all() {
            return Ok(requested);
        }
        let rewritten = self.rewrite_wildcard().ok_or(LightError::NoEligibleTargets)?;
        if !self.caller.is_admin {
            log::debug!("rewrote all to {} for user {}", rewritten, self.caller.id);
        }
        Ok(rewritten)
    }

    pub fn authorize_scene(&self, scene_id: &str) -> crate::Result<()> {
        if self.can_see_scene(scene_id) {
            Ok(())
        } else {
            log::debug!("user {} may not use scene {}", self.caller.id, scene_id);
            Err(LightError::denied(format!("scene_id:{scene_id}")))
        }
    }
}
