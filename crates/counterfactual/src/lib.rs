//! # counterfactual
//!
//! Estimates counterfactual evapotranspiration: a regressor trained on
//! natural land is applied to agricultural land, and the gap between
//! observed and predicted ET is the agricultural water-use signal.

pub use counterfactual_facade::*;
