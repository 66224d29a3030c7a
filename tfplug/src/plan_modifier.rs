//! Built-in plan modifiers

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::{values_equal, Dynamic};
use std::sync::Arc;

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Arc<dyn PlanModifier> {
        Arc::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute replaces the resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let state = &request.state_value.value;
        let plan = &request.plan_value.value;

        let requires_replace = !matches!(
            (state, plan),
            (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
        ) && !values_equal(state, plan);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }

    fn forces_replacement(&self) -> bool {
        true
    }
}

/// Keeps the prior state value for a computed attribute whose planned value
/// is unknown
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Arc<dyn PlanModifier> {
        Arc::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value does not change".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match (&request.plan_value.value, &request.state_value.value) {
            (Dynamic::Unknown | Dynamic::Null, Dynamic::Null) => request.plan_value,
            (Dynamic::Unknown | Dynamic::Null, _) => request.state_value,
            _ => request.plan_value,
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}
