//! Built-in attribute validators

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use std::sync::Arc;

/// Accepts only the listed strings
pub struct StringOneOf {
    allowed: Vec<String>,
}

impl StringOneOf {
    pub fn create(allowed: &[&str]) -> Arc<dyn Validator> {
        Arc::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Dynamic::String(s) = &request.config_value.value {
            if !self.allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid attribute value",
                        format!(
                            "expected {} to be one of [{}], got {}",
                            request.path,
                            self.allowed.join(", "),
                            s
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub struct StringLength {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLength {
    pub fn create(min: Option<usize>, max: Option<usize>) -> Arc<dyn Validator> {
        Arc::new(Self { min, max })
    }
}

impl Validator for StringLength {
    fn description(&self) -> String {
        format!("string length must be within {:?}..{:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Dynamic::String(s) = &request.config_value.value {
            let len = s.chars().count();
            if let Some(min) = self.min.filter(|min| len < *min) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must have minimum length of {}", request.path, min),
                        format!("Got length {}", len),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
            if let Some(max) = self.max.filter(|max| len > *max) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must have maximum length of {}", request.path, max),
                        format!("Got length {}", len),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRange {
    pub fn create(min: Option<f64>, max: Option<f64>) -> Arc<dyn Validator> {
        Arc::new(Self { min, max })
    }
}

impl Validator for NumberRange {
    fn description(&self) -> String {
        format!("number must be within {:?}..{:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Dynamic::Number(n) = request.config_value.value {
            if let Some(min) = self.min.filter(|min| n < *min) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be at least {}", request.path, min),
                        format!("Got {}", n),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
            if let Some(max) = self.max.filter(|max| n > *max) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be at most {}", request.path, max),
                        format!("Got {}", n),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

pub struct ListLength {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ListLength {
    pub fn create(min: Option<usize>, max: Option<usize>) -> Arc<dyn Validator> {
        Arc::new(Self { min, max })
    }
}

impl Validator for ListLength {
    fn description(&self) -> String {
        format!("list length must be within {:?}..{:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        if let Dynamic::List(items) = &request.config_value.value {
            if let Some(min) = self.min.filter(|min| items.len() < *min) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must have at least {} items", request.path, min),
                        format!("Got {} items", items.len()),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
            if let Some(max) = self.max.filter(|max| items.len() > *max) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must have at most {} items", request.path, max),
                        format!("Got {} items", items.len()),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}
