//! Findings emitted by checks

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Verdict of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
    Warn,
    Info,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
            Status::Warn => write!(f, "WARN"),
            Status::Info => write!(f, "INFO"),
        }
    }
}

/// Technical quality category, or prompt adherence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Accessibility (Axe-core)")]
    AxeAccessibility,
    #[serde(rename = "Performance (Lighthouse)")]
    LighthousePerformance,
    #[serde(rename = "Accessibility (Lighthouse)")]
    LighthouseAccessibility,
    #[serde(rename = "Best Practices (Lighthouse)")]
    LighthouseBestPractices,
    #[serde(rename = "SEO (Lighthouse)")]
    LighthouseSeo,
    #[serde(rename = "Rendered Color & Contrast")]
    ColorContrast,
    #[serde(rename = "HTML Structure & Semantics")]
    HtmlStructure,
    #[serde(rename = "CSS Quality")]
    CssQuality,
    #[serde(rename = "Responsiveness (Viewport & Scroll)")]
    Responsiveness,
    #[serde(rename = "JavaScript Health")]
    JavaScriptHealth,
    #[serde(rename = "Page Load Errors")]
    PageLoadErrors,
    #[serde(rename = "Prompt Adherence")]
    PromptAdherence,
}

impl Category {
    /// All technical quality categories in report order
    pub const TECHNICAL: [Category; 11] = [
        Category::AxeAccessibility,
        Category::LighthousePerformance,
        Category::LighthouseAccessibility,
        Category::LighthouseBestPractices,
        Category::LighthouseSeo,
        Category::ColorContrast,
        Category::HtmlStructure,
        Category::CssQuality,
        Category::Responsiveness,
        Category::JavaScriptHealth,
        Category::PageLoadErrors,
    ];

    /// Points available for one viewport
    pub fn base_cap(self) -> f64 {
        match self {
            Category::AxeAccessibility => 20.0,
            Category::LighthousePerformance => 20.0,
            Category::LighthouseAccessibility => 10.0,
            Category::LighthouseBestPractices => 5.0,
            Category::LighthouseSeo => 5.0,
            Category::ColorContrast => 15.0,
            Category::HtmlStructure => 10.0,
            Category::CssQuality => 5.0,
            Category::Responsiveness => 10.0,
            Category::JavaScriptHealth => 5.0,
            Category::PageLoadErrors => 0.0,
            Category::PromptAdherence => 0.0,
        }
    }

    /// Whether the cap doubles for a desktop + mobile plan
    pub fn is_viewport_scalable(self) -> bool {
        matches!(
            self,
            Category::AxeAccessibility
                | Category::LighthousePerformance
                | Category::LighthouseAccessibility
                | Category::LighthouseBestPractices
                | Category::LighthouseSeo
                | Category::ColorContrast
                | Category::Responsiveness
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::AxeAccessibility => "Accessibility (Axe-core)",
            Category::LighthousePerformance => "Performance (Lighthouse)",
            Category::LighthouseAccessibility => "Accessibility (Lighthouse)",
            Category::LighthouseBestPractices => "Best Practices (Lighthouse)",
            Category::LighthouseSeo => "SEO (Lighthouse)",
            Category::ColorContrast => "Rendered Color & Contrast",
            Category::HtmlStructure => "HTML Structure & Semantics",
            Category::CssQuality => "CSS Quality",
            Category::Responsiveness => "Responsiveness (Viewport & Scroll)",
            Category::JavaScriptHealth => "JavaScript Health",
            Category::PageLoadErrors => "Page Load Errors",
            Category::PromptAdherence => "Prompt Adherence",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One check result. Built once and handed to the score board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub check: String,
    pub status: Status,
    pub points_earned: f64,
    pub max_points_for_this_check: f64,
    pub viewport: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Finding {
    pub fn new(
        category: Category,
        check: impl Into<String>,
        status: Status,
        points_earned: f64,
        max_points: f64,
        viewport: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            check: check.into(),
            status,
            points_earned,
            max_points_for_this_check: max_points,
            viewport: viewport.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Full points on pass, zero otherwise
    pub fn verdict(
        category: Category,
        check: impl Into<String>,
        passed: bool,
        max_points: f64,
        viewport: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let (status, earned) = if passed {
            (Status::Pass, max_points)
        } else {
            (Status::Fail, 0.0)
        };
        Self::new(category, check, status, earned, max_points, viewport, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }
}
