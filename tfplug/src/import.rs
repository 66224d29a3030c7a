//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Copies the import ID into a single attribute of an otherwise empty state.
///
/// Example: ID "cloud-1/vol-9" -> state.id = "cloud-1/vol-9"
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
        identity: request.identity.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientCapabilities;

    #[test]
    fn passthrough_sets_id() {
        let request = ImportResourceStateRequest {
            type_name: "ppc_key".to_string(),
            id: "cloud-1/my-key".to_string(),
            client_capabilities: ClientCapabilities::default(),
            identity: None,
        };
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };

        import_state_passthrough_id(
            &Context::new(),
            AttributePath::new("id"),
            &request,
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        assert_eq!(
            response.imported_resources[0]
                .state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "cloud-1/my-key"
        );
    }
}
