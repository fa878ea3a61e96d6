//! Runtime components of the binary: the dashboard model and feed readiness.

pub mod dashboard;
pub mod readiness;
