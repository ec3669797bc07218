//! Error module containing the counterfactual error type.

mod counterfactual_error;

pub use counterfactual_error::CounterfactualError;
