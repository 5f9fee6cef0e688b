//! Graph algorithms over the employee store.

pub mod hierarchy;
