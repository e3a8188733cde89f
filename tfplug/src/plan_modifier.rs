//! Plan modifiers attached to schema attributes
//!
//! The host runs every attribute's modifiers while planning a change against
//! existing state. A modifier may rewrite the planned value or flag that the
//! change cannot be applied in place.

use crate::types::{AttributePath, Diagnostic, Dynamic};

pub struct PlanModifierRequest {
    pub path: AttributePath,
    pub config_value: Dynamic,
    pub state_value: Dynamic,
    pub plan_value: Dynamic,
}

pub struct PlanModifierResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;

    fn modify_plan(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

/// Changing the attribute destroys and recreates the resource
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "Changing this value forces the resource to be replaced".to_string()
    }

    fn modify_plan(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        // Null prior state means the resource is being created, not changed.
        let requires_replace = !matches!(request.state_value, Dynamic::Null)
            && !request.plan_value.contains_unknown()
            && request.state_value != request.plan_value;

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}
