//! Computed-style, color, dimension and text checks.
//!
//! Comparison rules:
//!
//! - generic properties compare exactly (trimmed, case-insensitive) unless a
//!   tolerance is given, in which case numeric values (`px`/`%` stripped) may
//!   differ by at most that much;
//! - dimensions default to ±[`DEFAULT_DIMENSION_TOLERANCE_PX`];
//! - colors are parsed into [`Rgba`] on both sides and must match exactly.

mod color;
mod properties;

pub use color::Rgba;
pub use properties::{CssVariables, PropertySheet};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::result::{ProbeError, ProbeResult};
use crate::script::Script;
use crate::target::RenderTargetClient;

/// Default tolerance for width/height checks
pub const DEFAULT_DIMENSION_TOLERANCE_PX: f64 = 1.0;

/// Which color of an element to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKind {
    /// Foreground (`color`)
    #[default]
    Text,
    /// `background-color`
    Background,
    /// Top border color
    Border,
}

impl ColorKind {
    /// Computed-style property holding this color
    #[must_use]
    pub const fn property(self) -> &'static str {
        match self {
            Self::Text => "color",
            Self::Background => "background-color",
            Self::Border => "border-top-color",
        }
    }
}

impl FromStr for ColorKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "color" | "text" => Ok(Self::Text),
            "background" | "bg" | "background-color" => Ok(Self::Background),
            "border" | "border-color" => Ok(Self::Border),
            other => Err(ProbeError::config(format!("unknown color kind `{other}`"))),
        }
    }
}

/// Element box as reported by the browser
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dimensions {
    /// Bounding box width
    pub width: f64,
    /// Bounding box height
    pub height: f64,
    /// Bounding box top
    pub top: f64,
    /// Bounding box left
    pub left: f64,
    /// Bounding box right
    pub right: f64,
    /// Bounding box bottom
    pub bottom: f64,
    /// `clientWidth`
    pub client_width: f64,
    /// `clientHeight`
    pub client_height: f64,
    /// `offsetWidth`
    pub offset_width: f64,
    /// `offsetHeight`
    pub offset_height: f64,
    /// `scrollWidth`
    pub scroll_width: f64,
    /// `scrollHeight`
    pub scroll_height: f64,
}

/// One entry for [`PropertyInspector::verify_properties`]
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpectation {
    /// CSS property
    pub property: String,
    /// Expected value
    pub expected: String,
    /// Numeric tolerance, `None` for an exact match
    pub tolerance: Option<f64>,
}

impl PropertyExpectation {
    /// Exact expectation
    pub fn exact(property: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            expected: expected.into(),
            tolerance: None,
        }
    }

    /// Numeric expectation with tolerance
    pub fn within(property: impl Into<String>, expected: impl Into<String>, tolerance: f64) -> Self {
        Self {
            property: property.into(),
            expected: expected.into(),
            tolerance: Some(tolerance),
        }
    }
}

/// How text is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    /// Expected text occurs anywhere
    Contains,
    /// Equal after trimming both sides
    Exact,
}

impl TextMatch {
    /// `true` → exact, `false` → contains
    #[must_use]
    pub const fn from_exact(exact: bool) -> Self {
        if exact {
            Self::Exact
        } else {
            Self::Contains
        }
    }

    /// Does `actual` satisfy `expected`
    #[must_use]
    pub fn matches(self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Contains => actual.contains(expected),
            Self::Exact => actual.trim() == expected.trim(),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Exact => "exact",
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Numeric part of a CSS length (`12px`, `50%`, `1.5`)
#[must_use]
pub fn parse_numeric(value: &str) -> Option<f64> {
    let v = value.trim();
    let v = v
        .strip_suffix("px")
        .or_else(|| v.strip_suffix('%'))
        .unwrap_or(v)
        .trim();
    v.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Compare a property value. Without a tolerance the normalized strings must be
/// equal; with one, numeric values may differ by at most `tolerance` and
/// non-numeric values fall back to string equality.
pub fn compare_property(
    key: &str,
    expected: &str,
    actual: &str,
    tolerance: Option<f64>,
) -> ProbeResult<()> {
    let ok = match tolerance {
        None => normalize(expected) == normalize(actual),
        Some(t) => match (parse_numeric(expected), parse_numeric(actual)) {
            (Some(e), Some(a)) => (a - e).abs() <= t,
            _ => normalize(expected) == normalize(actual),
        },
    };
    if ok {
        Ok(())
    } else {
        Err(ProbeError::ToleranceExceeded {
            key: key.to_string(),
            expected: expected.trim().to_string(),
            actual: actual.trim().to_string(),
            tolerance,
        })
    }
}

/// Lenient equality used by bulk checks: normalized strings, then lengths
/// (`0` equals `0px`), then colors (`#fff` equals `rgb(255, 255, 255)`)
#[must_use]
pub fn css_values_match(expected: &str, actual: &str) -> bool {
    let (e, a) = (normalize(expected), normalize(actual));
    if e == a {
        return true;
    }
    if e.is_empty() || a.is_empty() {
        return false;
    }
    let length = |s: &str| {
        let stripped = s.replace("px", "").replace('%', "");
        let stripped = stripped.trim();
        if stripped.is_empty() {
            Some(0.0)
        } else {
            stripped.parse::<f64>().ok()
        }
    };
    if let (Some(x), Some(y)) = (length(&e), length(&a)) {
        return x == y;
    }
    matches!((Rgba::parse(&e), Rgba::parse(&a)), (Ok(x), Ok(y)) if x == y)
}

fn string_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Reads and checks CSS/DOM facts of the loaded story
#[derive(Debug, Clone)]
pub struct PropertyInspector {
    client: RenderTargetClient,
}

impl PropertyInspector {
    /// Create an inspector on `client`
    #[must_use]
    pub const fn new(client: RenderTargetClient) -> Self {
        Self { client }
    }

    // ------------------------------------------------------------------
    // Computed styles
    // ------------------------------------------------------------------

    /// One computed style value (CSS or camelCase name)
    pub async fn get_computed_style(&self, selector: &str, property: &str) -> ProbeResult<String> {
        let map = self
            .client
            .element(&Script::computed_style(selector, property))
            .await?;
        Ok(string_field(&map, "value"))
    }

    /// Every computed style property
    pub async fn get_all_computed_styles(
        &self,
        selector: &str,
    ) -> ProbeResult<BTreeMap<String, String>> {
        let mut map = self
            .client
            .element(&Script::all_computed_styles(selector))
            .await?;
        Ok(match map.remove("styles") {
            Some(Value::Object(styles)) => styles
                .into_iter()
                .map(|(k, v)| (k, v.as_str().unwrap_or_default().to_string()))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    /// Check one property; see [`compare_property`]
    pub async fn verify_property(
        &self,
        selector: &str,
        property: &str,
        expected: &str,
        tolerance: Option<f64>,
    ) -> ProbeResult<()> {
        let actual = self.get_computed_style(selector, property).await?;
        debug!(selector, property, expected, %actual, ?tolerance, "verify property");
        compare_property(&format!("{selector}.{property}"), expected, &actual, tolerance)?;
        info!(selector, property, %actual, "property verified");
        Ok(())
    }

    /// Check several properties and report every mismatch at once
    pub async fn verify_properties(
        &self,
        selector: &str,
        expectations: &[PropertyExpectation],
    ) -> ProbeResult<()> {
        let mut failures = Vec::new();
        for exp in expectations {
            let actual = self.get_computed_style(selector, &exp.property).await?;
            let key = format!("{selector}.{}", exp.property);
            let ok = match exp.tolerance {
                Some(_) => compare_property(&key, &exp.expected, &actual, exp.tolerance).is_ok(),
                None => css_values_match(&exp.expected, &actual),
            };
            if !ok {
                failures.push(
                    ProbeError::ToleranceExceeded {
                        key,
                        expected: exp.expected.clone(),
                        actual,
                        tolerance: exp.tolerance,
                    }
                    .to_string(),
                );
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProbeError::PropertyMismatches { failures })
        }
    }

    // ------------------------------------------------------------------
    // Colors
    // ------------------------------------------------------------------

    /// Computed color of `kind`
    pub async fn get_color(&self, selector: &str, kind: ColorKind) -> ProbeResult<Rgba> {
        let raw = self.get_computed_style(selector, kind.property()).await?;
        Rgba::parse(&raw)
    }

    /// Check a color against any supported literal
    pub async fn verify_color(
        &self,
        selector: &str,
        expected: &str,
        kind: ColorKind,
    ) -> ProbeResult<()> {
        let want = Rgba::parse(expected)?;
        let got = self.get_color(selector, kind).await?;
        if want == got {
            info!(selector, property = kind.property(), color = %got, "color verified");
            Ok(())
        } else {
            Err(ProbeError::ToleranceExceeded {
                key: format!("{selector}.{}", kind.property()),
                expected: format!("{expected} ({want})"),
                actual: got.to_string(),
                tolerance: None,
            })
        }
    }

    // ------------------------------------------------------------------
    // Dimensions
    // ------------------------------------------------------------------

    /// Box metrics
    pub async fn get_dimensions(&self, selector: &str) -> ProbeResult<Dimensions> {
        let map = self
            .client
            .element(&Script::element_metrics(selector))
            .await?;
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    fn check_dimension(
        selector: &str,
        axis: &str,
        expected: f64,
        actual: f64,
        tolerance: Option<f64>,
    ) -> ProbeResult<()> {
        let tolerance = tolerance.unwrap_or(DEFAULT_DIMENSION_TOLERANCE_PX);
        if (actual - expected).abs() <= tolerance {
            Ok(())
        } else {
            Err(ProbeError::ToleranceExceeded {
                key: format!("{selector}.{axis}"),
                expected: format!("{expected}px"),
                actual: format!("{actual}px"),
                tolerance: Some(tolerance),
            })
        }
    }

    /// Width within `tolerance` (default ±1px)
    pub async fn verify_width(
        &self,
        selector: &str,
        expected: f64,
        tolerance: Option<f64>,
    ) -> ProbeResult<()> {
        let dims = self.get_dimensions(selector).await?;
        Self::check_dimension(selector, "width", expected, dims.width, tolerance)
    }

    /// Height within `tolerance` (default ±1px)
    pub async fn verify_height(
        &self,
        selector: &str,
        expected: f64,
        tolerance: Option<f64>,
    ) -> ProbeResult<()> {
        let dims = self.get_dimensions(selector).await?;
        Self::check_dimension(selector, "height", expected, dims.height, tolerance)
    }

    /// Width and height within `tolerance` (default ±1px)
    pub async fn verify_dimensions(
        &self,
        selector: &str,
        width: f64,
        height: f64,
        tolerance: Option<f64>,
    ) -> ProbeResult<()> {
        let dims = self.get_dimensions(selector).await?;
        Self::check_dimension(selector, "width", width, dims.width, tolerance)?;
        Self::check_dimension(selector, "height", height, dims.height, tolerance)
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// `textContent`, hidden descendants included
    pub async fn get_component_text(&self, selector: &str) -> ProbeResult<String> {
        let map = self.client.element(&Script::text_content(selector)).await?;
        Ok(string_field(&map, "value"))
    }

    /// `innerText`, rendered text only
    pub async fn get_component_inner_text(&self, selector: &str) -> ProbeResult<String> {
        let map = self.client.element(&Script::inner_text(selector)).await?;
        Ok(string_field(&map, "value"))
    }

    fn check_text(selector: &str, expected: &str, actual: String, exact: bool) -> ProbeResult<()> {
        let mode = TextMatch::from_exact(exact);
        if mode.matches(&actual, expected) {
            Ok(())
        } else {
            Err(ProbeError::TextMismatch {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                mode: mode.label(),
            })
        }
    }

    /// Check `textContent`: substring by default, trimmed equality when `exact`
    pub async fn verify_component_text(
        &self,
        selector: &str,
        expected: &str,
        exact: bool,
    ) -> ProbeResult<()> {
        let actual = self.get_component_text(selector).await?;
        Self::check_text(selector, expected, actual, exact)
    }

    /// Check `innerText`: substring by default, trimmed equality when `exact`
    pub async fn verify_component_inner_text(
        &self,
        selector: &str,
        expected: &str,
        exact: bool,
    ) -> ProbeResult<()> {
        let actual = self.get_component_inner_text(selector).await?;
        Self::check_text(selector, expected, actual, exact)
    }

    // ------------------------------------------------------------------
    // DOM mutation
    // ------------------------------------------------------------------

    /// Replace an element's text
    pub async fn update_label(&self, selector: &str, text: &str) -> ProbeResult<()> {
        self.client.element(&Script::set_text(selector, text)).await?;
        Ok(())
    }

    /// Replace an element's inner HTML
    pub async fn update_label_html(&self, selector: &str, html: &str) -> ProbeResult<()> {
        self.client.element(&Script::set_html(selector, html)).await?;
        Ok(())
    }

    /// Set an input's value and fire input/change
    pub async fn update_input_value(&self, selector: &str, value: &str) -> ProbeResult<()> {
        self.client
            .element(&Script::set_input_value(selector, value))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sheets and design tokens
    // ------------------------------------------------------------------

    /// Custom properties on the story document's `:root`
    pub async fn get_css_variables(&self, names: &[String]) -> ProbeResult<BTreeMap<String, String>> {
        let answer = self
            .client
            .evaluate(&Script::root_css_variables(names))
            .await?;
        Ok(match answer.get("values") {
            Some(Value::Object(values)) => values
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    /// Check `:root` against the expected design tokens. Missing variables
    /// and differing values are all reported.
    pub async fn verify_css_variables(&self, expected: &CssVariables) -> ProbeResult<()> {
        let actual = self.get_css_variables(&expected.names()).await?;
        let failures: Vec<String> = expected
            .iter()
            .filter_map(|(name, want)| match actual.get(name) {
                None => Some(format!("{name}: not defined on :root")),
                Some(got) if !css_values_match(want, got) => {
                    Some(format!("{name}: expected {want}, got {got}"))
                }
                Some(_) => None,
            })
            .collect();
        if failures.is_empty() {
            info!(count = expected.len(), "css variables verified");
            Ok(())
        } else {
            Err(ProbeError::PropertyMismatches { failures })
        }
    }

    /// Check a component against a sheet. Literal values are compared with
    /// [`css_values_match`]; `var(--name)` values are resolved through
    /// `variables` first.
    pub async fn verify_component_properties(
        &self,
        selector: &str,
        sheet: &PropertySheet,
        variables: &CssVariables,
    ) -> ProbeResult<()> {
        let mut failures = Vec::new();
        for (property, want) in sheet.literal() {
            let got = self.get_computed_style(selector, property).await?;
            if !css_values_match(want, &got) {
                failures.push(format!("{property}: expected {want}, got {got}"));
            }
        }
        for (property, var) in sheet.variable_refs() {
            let Some(want) = variables.get(var) else {
                failures.push(format!("{property}: no value defined for {var}"));
                continue;
            };
            let got = self.get_computed_style(selector, property).await?;
            if !css_values_match(want, &got) {
                failures.push(format!("{property}: expected {want} ({var}), got {got}"));
            }
        }
        if failures.is_empty() {
            info!(selector, count = sheet.len(), "component properties verified");
            Ok(())
        } else {
            Err(ProbeError::PropertyMismatches { failures })
        }
    }
}
