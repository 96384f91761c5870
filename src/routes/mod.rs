pub mod diagnostics;
pub mod follows;
pub mod users;
