//! Regression estimators.

mod forest;
mod mean;
mod tree;

pub use forest::{MaxFeatures, RandomForestModel, RandomForestRegressor};
pub use mean::{MeanModel, MeanRegressor};
pub use tree::{RegressionTree, TreeNode, TreeParams};
