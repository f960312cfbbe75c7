pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod lint;
pub mod output;
pub mod runtime;
pub mod serve;
pub mod settings;
pub mod sign;
pub mod verify;

pub use app::run;
pub use lint::{cmd_lint_policy, LintArgs};
pub use serve::{cmd_serve, ServeArgs};
