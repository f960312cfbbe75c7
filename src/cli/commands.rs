use clap::Subcommand;

use super::lint::LintArgs;
use super::serve::ServeArgs;
use super::settings::SettingsArgs;
use super::sign::SignArgs;
use super::verify::VerifyArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run a guarded HTTP listener with the policy synchronizer
    Serve(ServeArgs),

    /// Print a fresh Request-Time header value
    Sign(SignArgs),

    /// Check a Request-Time header value against the signing policy
    Verify(VerifyArgs),

    /// Decode a policy document and report rules that never match or never block
    LintPolicy(LintArgs),

    /// Show the effective guard settings and where each value came from
    Settings(SettingsArgs),
}
