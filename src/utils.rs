//!
//! Utility functions shared by the configuration loader and the transport.
//!
//! - [`replace_handlebars_with_env`] - Template substitution for environment variables
//! - [`panic_message`] - Best-effort text of a caught panic payload
//!

use {
    regex::{Captures, Regex},
    std::{any::Any, env, sync::LazyLock},
};

/// Regular expression pattern for matching handlebars-style environment variable references.
/// Matches patterns like `{{ VAR_NAME }}` with optional whitespace around the variable name.
/// Variable names must be uppercase letters, digits, or underscores (standard env var naming).
static HANDLEBAR_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap());

///
/// Replaces `{{ VAR_NAME }}` references with the value of the environment
/// variable. Unset variables are replaced by an empty string.
///
/// ```
/// use axum_autoroutes::replace_handlebars_with_env;
///
/// let text = replace_handlebars_with_env("port = {{ SOME_UNSET_VARIABLE_FOR_DOCS }}");
/// assert_eq!(text, "port = ");
/// ```
pub fn replace_handlebars_with_env(text: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(text, |caps: &Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// Extracts the message of a caught panic payload.
pub fn panic_message(err: &(dyn Any + Send + 'static)) -> String {
    // NOTE: mirrors the downcasts of tower-http's DefaultResponseForPanic
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "`CatchPanic` was unable to downcast the panic info".to_string()
    }
}
