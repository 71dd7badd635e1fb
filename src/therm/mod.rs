//! Thermal equilibrium states

mod gibbs;

pub use gibbs::{gibbs_state, gibbs_weights, GibbsResult};
