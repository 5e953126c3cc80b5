use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static REG: Lazy<Handlebars> = Lazy::new(|| {
    let mut reg = Handlebars::new();
    reg.set_strict_mode(true);
    reg.register_escape_fn(handlebars::no_escape);
    reg
});

/// A path template over [`Values`], e.g. `configs/{{workload}}/{{workload}}_c{{llc}}.cfg`.
///
/// The inner string is private so a template is only ever used rendered.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Template(String);

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Template {
    fn from(template: String) -> Self {
        Self(template)
    }
}

impl From<&str> for Template {
    fn from(template: &str) -> Self {
        Self(template.to_string())
    }
}

impl Template {
    pub fn render(&self, data: &impl Serialize) -> Result<String, handlebars::RenderError> {
        REG.render_template(&self.0, data)
    }

    /// Render to a path, relative to `root` unless absolute.
    pub fn render_path(
        &self,
        root: &Path,
        data: &impl Serialize,
    ) -> Result<PathBuf, handlebars::RenderError> {
        self.render(data).map(|path| root.join(path))
    }
}

/// Values a path template can refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Values {
    pub workload: String,
    pub llc: u64,
    pub num_pe: u64,
    pub num_batch: u64,
}
