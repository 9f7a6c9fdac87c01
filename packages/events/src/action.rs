//! Maps a risk tier to a mitigation plan.

use citypulse_config::ActionsConfig;
use citypulse_events_models::{
    ActionKind, ActionPlan, EventCameraMapping, Priority, RiskLevel, RiskScore,
};

/// Builds the plan for `risk` over the cameras in `mapping`.
///
/// | tier     | action                      | priority | notify |
/// |----------|-----------------------------|----------|--------|
/// | critical | deploy traffic control      | urgent   | yes    |
/// | high     | alternate-route signaling   | high     | no     |
/// | medium   | monitor                     | normal   | no     |
/// | low      | no action, no targets       | low      | no     |
///
/// Cost is the tier's base cost plus the per-camera cost for each target.
#[must_use]
pub fn plan(risk: &RiskScore, mapping: &EventCameraMapping, config: &ActionsConfig) -> ActionPlan {
    let targets = mapping.camera_ids();
    let score = risk.score;
    let attendees = risk.factors.attendee_count;
    let event = &risk.event_id;

    let (action, priority, base_cost, public_notification, reason) = match risk.risk_level {
        RiskLevel::Critical => (
            ActionKind::DeployTrafficControl,
            Priority::Urgent,
            config.critical_base_cost,
            true,
            format!(
                "Critical congestion risk ({score:.0}) from {event} with ~{attendees} attendees; \
                 deploy traffic control at {} cameras and notify the public",
                targets.len()
            ),
        ),
        RiskLevel::High => (
            ActionKind::AlternateRouteSignaling,
            Priority::High,
            config.high_base_cost,
            false,
            format!(
                "High congestion risk ({score:.0}) from {event}; signal alternate routes at {} cameras",
                targets.len()
            ),
        ),
        RiskLevel::Medium => (
            ActionKind::Monitor,
            Priority::Normal,
            config.medium_base_cost,
            false,
            format!(
                "Medium congestion risk ({score:.0}) from {event}; monitor {} cameras",
                targets.len()
            ),
        ),
        RiskLevel::Low => {
            return ActionPlan {
                action: ActionKind::NoAction,
                priority: Priority::Low,
                target_cameras: Vec::new(),
                reason: format!("Low congestion risk ({score:.0}) from {event}; no action needed"),
                estimated_cost: 0.0,
                public_notification: false,
            };
        }
    };

    #[allow(clippy::cast_precision_loss)]
    let estimated_cost = config.per_camera_cost.mul_add(targets.len() as f64, base_cost);

    ActionPlan {
        action,
        priority,
        target_cameras: targets,
        reason,
        estimated_cost,
        public_notification,
    }
}
