//! Default value providers for attributes
//!
//! Defaults are applied while planning when an optional attribute is absent
//! from configuration.

use crate::schema::{AttributeDefault, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};
use std::env;
use std::sync::Arc;

/// StaticDefault provides a fixed value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Arc<dyn AttributeDefault> {
        Arc::new(Self { value })
    }

    pub fn string(value: &str) -> Arc<dyn AttributeDefault> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Arc<dyn AttributeDefault> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Arc<dyn AttributeDefault> {
        Self::create(Dynamic::Bool(value))
    }
}

impl AttributeDefault for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

/// EnvDefault reads the default from an environment variable, with an
/// optional fallback
pub struct EnvDefault {
    env_var: String,
    fallback: Option<Dynamic>,
}

impl EnvDefault {
    pub fn create(env_var: &str, fallback: Dynamic) -> Arc<dyn AttributeDefault> {
        Arc::new(Self {
            env_var: env_var.to_string(),
            fallback: Some(fallback),
        })
    }

    pub fn create_required(env_var: &str) -> Arc<dyn AttributeDefault> {
        Arc::new(Self {
            env_var: env_var.to_string(),
            fallback: None,
        })
    }
}

impl AttributeDefault for EnvDefault {
    fn description(&self) -> String {
        format!("default from environment variable {}", self.env_var)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        let value = match env::var(&self.env_var) {
            Ok(val) if !val.is_empty() => Dynamic::String(val),
            _ => self.fallback.clone().unwrap_or(Dynamic::Null),
        };

        DefaultResponse {
            value: DynamicValue::new(value),
        }
    }
}
