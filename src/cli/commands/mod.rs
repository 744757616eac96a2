//! CLI command implementations

pub mod build;
pub mod check;
pub mod links;
pub mod setup_symlinks;

pub use build::execute as build;
pub use check::execute as check;
pub use links::execute as links;
pub use setup_symlinks::execute as setup_symlinks;
