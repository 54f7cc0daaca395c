//! On-disk shape of a route module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::route::StaticResponse;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFile {
    #[serde(default, rename = "use")]
    pub imports: Imports,

    #[serde(default)]
    pub handlers: BTreeMap<String, StaticResponse>,

    /// Default export.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,

    #[serde(default)]
    pub exports: BTreeMap<String, ExportSpec>,
}

/// `use = "./a"` or `use = ["./a", "./b"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Imports {
    One(String),
    Many(Vec<String>),
}

impl Default for Imports {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl Imports {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            Self::One(one) => std::slice::from_ref(one),
            Self::Many(many) => many.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

/// One `[[routes]]` entry, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    #[serde(default = "default_method")]
    pub method: String,

    pub path: String,

    pub handler: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
}

fn default_method() -> String {
    "GET".into()
}

impl RouteSpec {
    /// `METHOD /path`, for error messages.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSpec {
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_module() {
        let source: ModuleFile = toml::from_str(
            r#"
use = ["./shared"]

[handlers.hello]
status = 201
body = "hi"
headers = { x-test = "1" }

[[routes]]
path = "/"
handler = "hello"
middleware = ["cors"]

[exports.admin]
routes = [{ method = "POST", path = "/admin", handler = "hello" }]
"#,
        )
        .unwrap();

        assert_eq!(source.imports.iter().collect::<Vec<_>>(), vec!["./shared"]);
        assert_eq!(source.handlers["hello"].status, 201);
        assert_eq!(source.routes[0].method, "GET");
        assert_eq!(source.routes[0].middleware, vec!["cors"]);
        assert_eq!(source.exports["admin"].routes[0].label(), "POST /admin");
    }

    #[test]
    fn test_single_import() {
        let source: ModuleFile = toml::from_str("use = \"./one\"").unwrap();
        assert_eq!(source.imports, Imports::One("./one".into()));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<ModuleFile>("extra = 1").is_err());
        assert!(toml::from_str::<ModuleFile>("[[routes]]\npath = \"/\"\nhandler = \"h\"\nverb = \"GET\"").is_err());
        assert!(toml::from_str::<ModuleFile>("[handlers.h]\nstatuss = 200").is_err());
    }
}
