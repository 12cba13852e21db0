use crate::matcher::matches_target;
use crate::resource::{Fixture, Scene, Target};
use serde::Serialize;
use std::collections::HashMap;

/// Fraction of a scene's targets that must be realized for it to be active.
pub const SCENE_MATCH_THRESHOLD: f64 = 0.70;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneStatus {
    pub active: bool,
    #[serde(rename = "matched_states")]
    pub matched: usize,
    #[serde(rename = "total_states")]
    pub total: usize,
    #[serde(rename = "match_percentage")]
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SceneStatus {
    fn inactive(reason: &str) -> SceneStatus {
        SceneStatus {
            active: false,
            matched: 0,
            total: 0,
            percentage: 0.0,
            reason: Some(reason.to_string()),
        }
    }
}

/// A target is realized as soon as one fixture it addresses matches it.
fn target_realized(target: &Target, fixtures: &[Fixture]) -> Option<bool> {
    let selector = target.selector.as_ref()?;
    Some(
        selector
            .select(fixtures)
            .any(|fixture| matches_target(fixture, target).matched()),
    )
}

/// Decides whether `scene` is currently realized by `fixtures`.
///
/// Targets without a selector are skipped and do not count toward the total.
pub fn check_scene_status(scene: &Scene, fixtures: &[Fixture]) -> SceneStatus {
    let Some(targets) = &scene.targets else {
        return SceneStatus::inactive("No scene states defined");
    };
    if targets.is_empty() {
        return SceneStatus::inactive("Scene has no lights");
    }

    let (matched, total) = targets
        .iter()
        .filter_map(|target| target_realized(target, fixtures))
        .fold((0, 0), |(matched, total), realized| {
            (matched + usize::from(realized), total + 1)
        });
    if total == 0 {
        return SceneStatus::inactive("Scene has no addressable states");
    }

    let ratio = matched as f64 / total as f64;
    let status = SceneStatus {
        active: ratio >= SCENE_MATCH_THRESHOLD,
        matched,
        total,
        percentage: (ratio * 1000.0).round_ties_even() / 10.0,
        reason: None,
    };
    log::debug!(
        "scene {} ({}): {}/{} states matched, active={}",
        scene.id,
        scene.name,
        matched,
        total,
        status.active
    );
    status
}

/// Status of every scene, keyed by scene id.
pub fn all_scene_statuses(scenes: &[Scene], fixtures: &[Fixture]) -> HashMap<String, SceneStatus> {
    scenes
        .iter()
        .map(|scene| (scene.id.clone(), check_scene_status(scene, fixtures)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Power, Reference};
    use crate::selector::Selector;

    fn lamp(id: &str, group: &str, power: Power) -> Fixture {
        Fixture {
            id: id.into(),
            power: Some(power),
            brightness: Some(1.0),
            group: Some(Reference {
                id: format!("{group}-id"),
                name: group.into(),
            }),
            ..Default::default()
        }
    }

    fn target(selector: &str, power: Power) -> Target {
        Target {
            selector: Some(Selector::parse(selector)),
            power: Some(power),
            ..Default::default()
        }
    }

    fn scene(targets: Vec<Target>) -> Scene {
        Scene {
            id: "scene-1".into(),
            name: "Evening".into(),
            targets: Some(targets),
        }
    }

    fn fixtures() -> Vec<Fixture> {
        vec![
            lamp("a", "Lounge", Power::On),
            lamp("b", "Lounge", Power::Off),
            lamp("c", "Kitchen", Power::On),
        ]
    }

    #[test]
    fn scene_without_targets_is_inactive() {
        let status = check_scene_status(&scene(vec![]), &fixtures());
        assert!(!status.active);
        assert_eq!((status.matched, status.total, status.percentage), (0, 0, 0.0));
        assert_eq!(status.reason.as_deref(), Some("Scene has no lights"));

        let missing = Scene {
            targets: None,
            ..scene(vec![])
        };
        let status = check_scene_status(&missing, &fixtures());
        assert_eq!(status.reason.as_deref(), Some("No scene states defined"));
    }

    #[test]
    fn two_of_three_is_below_threshold() {
        let status = check_scene_status(
            &scene(vec![
                target("id:a", Power::On),
                target("id:c", Power::On),
                target("id:b", Power::On),
            ]),
            &fixtures(),
        );
        assert_eq!(
            status,
            SceneStatus {
                active: false,
                matched: 2,
                total: 3,
                percentage: 66.7,
                reason: None
            }
        );
    }

    #[test]
    fn all_targets_realized_is_active() {
        let status = check_scene_status(
            &scene(vec![
                target("id:a", Power::On),
                target("id:c", Power::On),
                target("id:b", Power::Off),
            ]),
            &fixtures(),
        );
        assert!(status.active);
        assert_eq!(status.percentage, 100.0);
    }

    #[test]
    fn one_fixture_of_a_group_suffices() {
        let status = check_scene_status(&scene(vec![target("group:lounge", Power::Off)]), &fixtures());
        assert!(status.active);
        assert_eq!(status.matched, 1);
    }

    #[test]
    fn unresolved_selector_is_unmatched() {
        let status = check_scene_status(
            &scene(vec![target("id:missing", Power::On), target("bogus", Power::On)]),
            &fixtures(),
        );
        assert_eq!((status.matched, status.total), (0, 2));
        assert!(!status.active);
    }

    #[test]
    fn targets_without_selector_are_skipped() {
        let blank = Target {
            power: Some(Power::On),
            ..Default::default()
        };
        let status = check_scene_status(
            &scene(vec![blank.clone(), target("id:a", Power::On)]),
            &fixtures(),
        );
        assert_eq!((status.matched, status.total), (1, 1));
        assert!(status.active);

        let status = check_scene_status(&scene(vec![blank]), &fixtures());
        assert_eq!(status.total, 0);
        assert!(!status.active);
        assert!(status.reason.is_some());
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut targets: Vec<Target> = (0..7).map(|_| target("id:a", Power::On)).collect();
        targets.extend((0..3).map(|_| target("id:a", Power::Off)));
        let status = check_scene_status(&scene(targets), &fixtures());
        assert_eq!(status.percentage, 70.0);
        assert!(status.active);
    }

    #[test]
    fn percentage_rounds_half_to_even() {
        let mut targets = vec![target("id:a", Power::On)];
        targets.extend((0..15).map(|_| target("id:a", Power::Off)));
        let status = check_scene_status(&scene(targets), &fixtures());
        assert_eq!((status.matched, status.total), (1, 16));
        assert_eq!(status.percentage, 6.2);
    }

    #[test]
    fn statuses_are_keyed_by_scene_id() {
        let other = Scene {
            id: "scene-2".into(),
            ..scene(vec![target("id:b", Power::On)])
        };
        let statuses = all_scene_statuses(&[scene(vec![target("id:a", Power::On)]), other], &fixtures());
        assert!(statuses["scene-1"].active);
        assert!(!statuses["scene-2"].active);
    }

    #[test]
    fn serializes_with_upstream_field_names() {
        let status = check_scene_status(&scene(vec![target("id:a", Power::On)]), &fixtures());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["matched_states"], 1);
        assert_eq!(json["match_percentage"], 100.0);
        assert!(json.get("reason").is_none());
    }
}
