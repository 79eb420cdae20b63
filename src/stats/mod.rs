pub(crate) mod constants;
pub mod histogram;
pub mod predicate_op;
pub mod stats_registry;
