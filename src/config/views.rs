use std::{fmt, path::PathBuf};

/// Template engines a views directory can be registered for.
///
/// Rendering itself belongs to the application: the registered
/// [`ViewSettings`] are made available to handlers as an
/// `axum::Extension<ViewSettings>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewEngine {
    #[default]
    None,
    Ejs,
    Pug,
    Nunjucks,
    Handlebars,
}

impl ViewEngine {
    /// Looks up an engine by its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ViewEngine::None),
            "ejs" => Some(ViewEngine::Ejs),
            "pug" => Some(ViewEngine::Pug),
            "nunjucks" => Some(ViewEngine::Nunjucks),
            "handlebars" => Some(ViewEngine::Handlebars),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewEngine::None => "none",
            ViewEngine::Ejs => "ejs",
            ViewEngine::Pug => "pug",
            ViewEngine::Nunjucks => "nunjucks",
            ViewEngine::Handlebars => "handlebars",
        }
    }

    /// Template file extension the engine conventionally uses.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ViewEngine::None => None,
            ViewEngine::Ejs => Some("ejs"),
            ViewEngine::Pug => Some("pug"),
            ViewEngine::Nunjucks => Some("njk"),
            ViewEngine::Handlebars => Some("hbs"),
        }
    }
}

impl fmt::Display for ViewEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered view engine together with the directory holding its templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    pub engine: ViewEngine,
    pub directory: PathBuf,
}

impl ViewSettings {
    /// Path of the template `name` for this engine, e.g. `views/index.hbs`.
    pub fn template_path(&self, name: &str) -> PathBuf {
        match self.engine.extension() {
            Some(ext) => self.directory.join(format!("{name}.{ext}")),
            None => self.directory.join(name),
        }
    }
}
