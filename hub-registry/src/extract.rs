//! Derives tool-facing parameters from a method's request contract.

use hub_primitives::{Contract, ParameterDescriptor};

use crate::method::MethodDefinition;

/// Returns the parameters a caller supplies to `method`, in contract order.
///
/// Envelope metadata fields are skipped. The result is computed fresh on each
/// call and never stored alongside the method.
#[must_use]
pub fn extract(method: &MethodDefinition) -> Vec<ParameterDescriptor> {
    extract_contract(method.request_contract())
}

/// Same as [`extract`], for a bare contract.
#[must_use]
pub fn extract_contract(contract: &Contract) -> Vec<ParameterDescriptor> {
    contract
        .fields()
        .iter()
        .filter(|field| !field.is_envelope())
        .map(ParameterDescriptor::from)
        .collect()
}
