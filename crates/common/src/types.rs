//! Core types for webgrade benchmark definitions

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

use crate::check::CheckSpec;
use crate::error::{Error, Result};

/// Named browser window size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    pub fn is_desktop(&self) -> bool {
        self.name.eq_ignore_ascii_case("desktop")
    }

    pub fn is_mobile(&self) -> bool {
        self.name.eq_ignore_ascii_case("mobile")
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

/// Ordered viewport plan
///
/// Accepted as a JSON object `{"desktop": [1920, 1080]}` (key order kept) or
/// as a list of `{name, width, height}` objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportPlan(Vec<Viewport>);

impl ViewportPlan {
    pub fn new(viewports: Vec<Viewport>) -> Self {
        Self(viewports)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Viewport> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Viewport> {
        self.0.first()
    }

    /// True when the plan names both a desktop and a mobile viewport
    pub fn covers_desktop_and_mobile(&self) -> bool {
        self.0.iter().any(Viewport::is_desktop) && self.0.iter().any(Viewport::is_mobile)
    }
}

impl Default for ViewportPlan {
    fn default() -> Self {
        Self(vec![
            Viewport::new("desktop", 1920, 1080),
            Viewport::new("mobile", 375, 667),
        ])
    }
}

impl<'a> IntoIterator for &'a ViewportPlan {
    type Item = &'a Viewport;
    type IntoIter = std::slice::Iter<'a, Viewport>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ViewportPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for vp in &self.0 {
            map.serialize_entry(&vp.name, &(vp.width, vp.height))?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Dimensions {
    Pair(u32, u32),
    Object { width: u32, height: u32 },
}

impl Dimensions {
    fn into_pair(self) -> (u32, u32) {
        match self {
            Dimensions::Pair(w, h) => (w, h),
            Dimensions::Object { width, height } => (width, height),
        }
    }
}

struct ViewportPlanVisitor;

impl<'de> Visitor<'de> for ViewportPlanVisitor {
    type Value = ViewportPlan;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of viewport name to [width, height] or a list of viewports")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut viewports = Vec::new();
        while let Some((name, dims)) = access.next_entry::<String, Dimensions>()? {
            let (width, height) = dims.into_pair();
            viewports.push(Viewport::new(name, width, height));
        }
        Ok(ViewportPlan(viewports))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut viewports = Vec::new();
        while let Some(vp) = access.next_element::<Viewport>()? {
            viewports.push(vp);
        }
        Ok(ViewportPlan(viewports))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(ViewportPlan::default())
    }
}

impl<'de> Deserialize<'de> for ViewportPlan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let plan = deserializer.deserialize_any(ViewportPlanVisitor)?;
        if plan.is_empty() {
            return Ok(ViewportPlan::default());
        }
        Ok(plan)
    }
}

/// One prompt of a benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    #[serde(default)]
    pub prompt_id: Option<String>,

    #[serde(default)]
    pub prompt_description: String,

    #[serde(default)]
    pub viewports_to_test: ViewportPlan,

    #[serde(default)]
    pub adherence_checks: Vec<CheckSpec>,
}

impl PromptSpec {
    /// HTML artifact expected for this prompt inside a model's directory
    pub fn html_file_name(&self) -> Option<String> {
        self.prompt_id.as_ref().map(|id| format!("{}.html", id))
    }

    pub fn max_adherence_points(&self) -> f64 {
        self.adherence_checks.iter().map(|c| c.points).sum()
    }
}

/// Benchmark definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkDefinition {
    #[serde(default = "default_run_name")]
    pub benchmark_run_name: String,

    pub prompts: Vec<PromptSpec>,
}

fn default_run_name() -> String {
    "UI Benchmark Run".to_string()
}

impl BenchmarkDefinition {
    /// Load and validate a definition; any problem is a configuration error
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let def: BenchmarkDefinition = serde_json::from_str(raw)?;
        Ok(def)
    }

    pub fn prompt(&self, prompt_id: &str) -> Result<&PromptSpec> {
        self.prompts
            .iter()
            .find(|p| p.prompt_id.as_deref() == Some(prompt_id))
            .ok_or_else(|| Error::PromptNotFound(prompt_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_plan_keeps_object_key_order() {
        let plan: ViewportPlan =
            serde_json::from_str(r#"{"mobile": [375, 667], "tablet": [768, 1024], "desktop": [1280, 800]}"#)
                .unwrap();
        let names: Vec<&str> = plan.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["mobile", "tablet", "desktop"]);
        assert!(plan.covers_desktop_and_mobile());
    }

    #[test]
    fn test_viewport_plan_from_list() {
        let plan: ViewportPlan =
            serde_json::from_str(r#"[{"name": "Desktop", "width": 1440, "height": 900}]"#).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.first().unwrap().is_desktop());
        assert!(!plan.covers_desktop_and_mobile());
    }

    #[test]
    fn test_prompt_without_viewports_gets_default_plan() {
        let prompt: PromptSpec =
            serde_json::from_str(r#"{"prompt_id": "p1", "prompt_description": "A page"}"#).unwrap();
        assert_eq!(prompt.viewports_to_test, ViewportPlan::default());
        assert_eq!(prompt.html_file_name().as_deref(), Some("p1.html"));
        assert!(prompt.adherence_checks.is_empty());
    }

    #[test]
    fn test_benchmark_definition_lookup() {
        let def = BenchmarkDefinition::from_json(
            r#"{
                "benchmark_run_name": "Run",
                "prompts": [
                    {"prompt_id": "landing", "adherence_checks": [
                        {"type": "element_presence", "name": "Hero", "points": 5, "selector": ".hero"},
                        {"type": "text_content", "name": "Title", "points": 3, "selector": "h1", "expected_text": "Hi"}
                    ]},
                    {"prompt_description": "missing id"}
                ]
            }"#,
        )
        .unwrap();

        let landing = def.prompt("landing").unwrap();
        assert_eq!(landing.max_adherence_points(), 8.0);
        assert!(matches!(def.prompt("nope"), Err(Error::PromptNotFound(_))));
        assert_eq!(def.prompts[1].prompt_id, None);
    }

    #[test]
    fn test_malformed_definition_is_config_error() {
        let dir = std::env::temp_dir().join("webgrade-types-test-malformed.json");
        std::fs::write(&dir, "{ not json").unwrap();
        assert!(matches!(BenchmarkDefinition::load(&dir), Err(Error::InvalidConfig(_))));
        let _ = std::fs::remove_file(&dir);
    }
}
