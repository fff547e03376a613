//! Command implementations, one module per subcommand

pub mod compile;
pub mod validate;
