//! Filtered `package.json` descriptors.

use serde_json::Value;

/// The `type` field of a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PackageType {
    /// Field absent or unrecognized.
    #[default]
    None,
    CommonJs,
    Module,
}

/// The parts of a manifest the resolver cares about.
///
/// A manifest that fails to parse still yields a descriptor, with `exists`
/// cleared, so a corrupt file reads as "no package here" instead of an
/// error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageDescriptor {
    pub exists: bool,
    pub name: Option<String>,
    /// Only string values count; anything else is treated as absent.
    pub main: Option<String>,
    pub exports: Option<Value>,
    pub imports: Option<Value>,
    pub kind: PackageType,
}

impl PackageDescriptor {
    /// Parse manifest text. An empty manifest reads as `{}`.
    pub fn parse(json: &str) -> Self {
        let json = if json.is_empty() { "{}" } else { json };
        let parsed: Value = match serde_json::from_str(json) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable package manifest");
                return Self { exists: false, ..Self::default() };
            },
        };
        let string = |key: &str| parsed.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            exists: true,
            name: string("name"),
            main: string("main"),
            exports: parsed.get("exports").cloned(),
            imports: parsed.get("imports").cloned(),
            kind: match parsed.get("type").and_then(Value::as_str) {
                Some("module") => PackageType::Module,
                Some("commonjs") => PackageType::CommonJs,
                _ => PackageType::None,
            },
        }
    }

    /// The declared entry point, if it is a non-empty string.
    pub fn main(&self) -> Option<&str> {
        self.main.as_deref().filter(|main| !main.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn filters_fields() {
        let package = PackageDescriptor::parse(
            r#"{"name": "dep", "main": "lib/main.js", "type": "module", "exports": {".": "./x.js"}, "scripts": {}}"#,
        );
        assert!(package.exists);
        assert_eq!(package.name.as_deref(), Some("dep"));
        assert_eq!(package.main(), Some("lib/main.js"));
        assert_eq!(package.kind, PackageType::Module);
        assert_eq!(package.exports, Some(json!({".": "./x.js"})));
        assert_eq!(package.imports, None);
    }

    #[rstest]
    #[case("")]
    #[case("{}")]
    #[case(r#"{"main": ""}"#)]
    #[case(r#"{"main": 42}"#)]
    #[case("[1, 2]")]
    fn no_usable_main(#[case] json: &str) {
        let package = PackageDescriptor::parse(json);
        assert!(package.exists);
        assert_eq!(package.main(), None);
        assert_eq!(package.kind, PackageType::None);
    }

    #[test]
    fn corrupt_manifest_does_not_exist() {
        let package = PackageDescriptor::parse("{ \"main\": ");
        assert!(!package.exists);
        assert_eq!(package.main(), None);
    }
}
