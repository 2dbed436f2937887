//! Conversion requests and page-layout options
//!
//! Callers send layout options as a loose JSON object. `LayoutOptions` overlays
//! that object on the service defaults key-by-key, and `LayoutOptions::resolve`
//! interprets the keys the service understands into a typed `PdfOptions`.
//! Keys the service does not understand are kept verbatim in
//! `PdfOptions::passthrough` and handed to the engine untouched.

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::{Error, Result};

/// Paper format used when the caller does not pick one
pub const DEFAULT_FORMAT: &str = "A4";
/// Margin applied to every side when the caller does not supply `margin`
pub const DEFAULT_MARGIN: &str = "1cm";

const CSS_PX_PER_INCH: f64 = 96.0;

// Letter, for a missing `width`/`height` when no format is named
const FALLBACK_PAPER_WIDTH: f64 = 8.5;
const FALLBACK_PAPER_HEIGHT: f64 = 11.0;

/// Paper sizes in inches (width, height)
const PAPER_FORMATS: &[(&str, f64, f64)] = &[
    ("letter", 8.5, 11.0),
    ("legal", 8.5, 14.0),
    ("tabloid", 11.0, 17.0),
    ("ledger", 17.0, 11.0),
    ("a0", 33.1, 46.8),
    ("a1", 23.4, 33.1),
    ("a2", 16.54, 23.4),
    ("a3", 11.7, 16.54),
    ("a4", 8.27, 11.7),
    ("a5", 5.83, 8.27),
    ("a6", 4.13, 5.83),
];

/// Keys interpreted by the service; everything else passes through.
const RECOGNIZED_KEYS: &[&str] = &[
    "format",
    "width",
    "height",
    "margin",
    "printBackground",
    "landscape",
    "scale",
    "displayHeaderFooter",
    "headerTemplate",
    "footerTemplate",
    "pageRanges",
    "preferCSSPageSize",
    "tagged",
    "outline",
];

/// Body of a `POST /convert` request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionRequest {
    /// Markup to render
    #[serde(default)]
    pub html: Option<String>,
    /// Caller overrides for the layout defaults
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
}

impl ConversionRequest {
    /// Parse a request from a raw JSON body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    /// Build a request carrying only markup.
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            options: None,
        }
    }

    /// Attach a layout override.
    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    /// The markup, or `Error::MissingHtml` when it is absent or empty.
    pub fn html(&self) -> Result<&str> {
        match self.html.as_deref() {
            Some(html) if !html.is_empty() => Ok(html),
            _ => Err(Error::MissingHtml),
        }
    }

    /// Defaults overlaid with this request's overrides.
    pub fn layout(&self) -> LayoutOptions {
        LayoutOptions::with_overrides(self.options.clone().unwrap_or_default())
    }
}

/// Layout defaults merged with caller overrides, still in JSON form
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    values: Map<String, Value>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        let mut values = Map::new();
        values.insert("format".into(), Value::String(DEFAULT_FORMAT.into()));
        values.insert("printBackground".into(), Value::Bool(true));

        let mut margin = Map::new();
        for side in ["top", "right", "bottom", "left"] {
            margin.insert(side.into(), Value::String(DEFAULT_MARGIN.into()));
        }
        values.insert("margin".into(), Value::Object(margin));

        Self { values }
    }
}

impl LayoutOptions {
    /// Overlay `overrides` on the defaults. Each top-level key replaces the
    /// default of the same name wholesale.
    pub fn with_overrides(overrides: Map<String, Value>) -> Self {
        let mut layout = Self::default();
        layout.values.extend(overrides);
        layout
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Interpret the merged options into engine parameters.
    pub fn resolve(&self) -> Result<PdfOptions> {
        // A named format wins; explicit sizes only apply without one
        let (paper_width, paper_height) = match self.present("format") {
            Some(value) if value.as_str() != Some("") => paper_format(value)?,
            _ => (
                self.length_or("width", FALLBACK_PAPER_WIDTH)?,
                self.length_or("height", FALLBACK_PAPER_HEIGHT)?,
            ),
        };

        let margin = match self.present("margin") {
            Some(value) => Margins::from_value(value)?,
            None => Margins::default(),
        };

        let scale = match self.present("scale") {
            Some(value) => {
                let scale = value
                    .as_f64()
                    .ok_or_else(|| Error::invalid_option("scale", "expected a number"))?;
                if !(0.1..=2.0).contains(&scale) {
                    return Err(Error::invalid_option("scale", "must be between 0.1 and 2"));
                }
                Some(scale)
            }
            None => None,
        };

        let passthrough = self
            .values
            .iter()
            .filter(|(key, _)| !RECOGNIZED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(PdfOptions {
            paper_width,
            paper_height,
            margin,
            print_background: self.flag("printBackground")?.unwrap_or(false),
            landscape: self.flag("landscape")?.unwrap_or(false),
            scale,
            display_header_footer: self.flag("displayHeaderFooter")?.unwrap_or(false),
            header_template: self.text("headerTemplate")?,
            footer_template: self.text("footerTemplate")?,
            page_ranges: self.text("pageRanges")?,
            prefer_css_page_size: self.flag("preferCSSPageSize")?.unwrap_or(false),
            tagged: self.flag("tagged")?,
            outline: self.flag("outline")?,
            passthrough,
        })
    }

    // null counts as "not supplied"
    fn present(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    fn length_or(&self, key: &str, fallback: f64) -> Result<f64> {
        match self.present(key) {
            Some(value) => length_in_inches(key, value),
            None => Ok(fallback),
        }
    }

    fn flag(&self, key: &str) -> Result<Option<bool>> {
        match self.present(key) {
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(Error::invalid_option(key, "expected a boolean")),
            None => Ok(None),
        }
    }

    fn text(&self, key: &str) -> Result<Option<String>> {
        match self.present(key) {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Error::invalid_option(key, "expected a string")),
            None => Ok(None),
        }
    }
}

/// Page margins in inches
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    fn from_value(value: &Value) -> Result<Self> {
        let sides = value
            .as_object()
            .ok_or_else(|| Error::invalid_option("margin", "expected an object"))?;

        let side = |name: &str| -> Result<f64> {
            match sides.get(name).filter(|v| !v.is_null()) {
                Some(v) => length_in_inches(&format!("margin.{}", name), v),
                None => Ok(0.0),
            }
        };

        Ok(Self {
            top: side("top")?,
            right: side("right")?,
            bottom: side("bottom")?,
            left: side("left")?,
        })
    }
}

/// Fully interpreted print parameters handed to an engine
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    /// Paper width in inches
    pub paper_width: f64,
    /// Paper height in inches
    pub paper_height: f64,
    pub margin: Margins,
    pub print_background: bool,
    pub landscape: bool,
    pub scale: Option<f64>,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub page_ranges: Option<String>,
    pub prefer_css_page_size: bool,
    pub tagged: Option<bool>,
    pub outline: Option<bool>,
    /// Caller keys the service does not interpret
    pub passthrough: Map<String, Value>,
}

impl Default for PdfOptions {
    /// A4 with 1cm margins and backgrounds, matching `LayoutOptions::default()`
    fn default() -> Self {
        let cm = 37.8 / CSS_PX_PER_INCH;
        Self {
            paper_width: 8.27,
            paper_height: 11.7,
            margin: Margins {
                top: cm,
                right: cm,
                bottom: cm,
                left: cm,
            },
            print_background: true,
            landscape: false,
            scale: None,
            display_header_footer: false,
            header_template: None,
            footer_template: None,
            page_ranges: None,
            prefer_css_page_size: false,
            tagged: None,
            outline: None,
            passthrough: Map::new(),
        }
    }
}

impl PdfOptions {
    /// Build the DevTools `Page.printToPDF` parameter object. Passthrough keys
    /// are merged last and win over interpreted ones.
    pub fn to_print_params(&self) -> Value {
        let mut params = Map::new();
        params.insert("landscape".into(), Value::Bool(self.landscape));
        params.insert(
            "displayHeaderFooter".into(),
            Value::Bool(self.display_header_footer),
        );
        params.insert("printBackground".into(), Value::Bool(self.print_background));
        if let Some(scale) = self.scale {
            params.insert("scale".into(), number(scale));
        }
        params.insert("paperWidth".into(), number(self.paper_width));
        params.insert("paperHeight".into(), number(self.paper_height));
        params.insert("marginTop".into(), number(self.margin.top));
        params.insert("marginBottom".into(), number(self.margin.bottom));
        params.insert("marginLeft".into(), number(self.margin.left));
        params.insert("marginRight".into(), number(self.margin.right));
        if let Some(ranges) = &self.page_ranges {
            params.insert("pageRanges".into(), Value::String(ranges.clone()));
        }
        if let Some(header) = &self.header_template {
            params.insert("headerTemplate".into(), Value::String(header.clone()));
        }
        if let Some(footer) = &self.footer_template {
            params.insert("footerTemplate".into(), Value::String(footer.clone()));
        }
        params.insert(
            "preferCSSPageSize".into(),
            Value::Bool(self.prefer_css_page_size),
        );
        if let Some(tagged) = self.tagged {
            params.insert("generateTaggedPDF".into(), Value::Bool(tagged));
        }
        if let Some(outline) = self.outline {
            params.insert("generateDocumentOutline".into(), Value::Bool(outline));
        }

        params.extend(self.passthrough.clone());
        Value::Object(params)
    }
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn paper_format(value: &Value) -> Result<(f64, f64)> {
    let name = value
        .as_str()
        .ok_or_else(|| Error::invalid_option("format", "expected a string"))?;
    let lower = name.to_ascii_lowercase();
    PAPER_FORMATS
        .iter()
        .find(|(format, _, _)| *format == lower)
        .map(|(_, w, h)| (*w, *h))
        .ok_or_else(|| Error::invalid_option("format", format!("unknown paper format {:?}", name)))
}

/// Convert a CSS-ish length (a bare number of pixels, or a string with an
/// optional px/in/cm/mm suffix) to inches.
fn length_in_inches(key: &str, value: &Value) -> Result<f64> {
    let pixels = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::invalid_option(key, "not a finite number"))?,
        Value::String(text) => {
            let text = text.trim();
            let split = text.len().saturating_sub(2);
            let (number_part, px_per_unit) = match text.get(split..).map(str::to_ascii_lowercase) {
                Some(unit) if unit == "px" => (&text[..split], 1.0),
                Some(unit) if unit == "in" => (&text[..split], CSS_PX_PER_INCH),
                Some(unit) if unit == "cm" => (&text[..split], 37.8),
                Some(unit) if unit == "mm" => (&text[..split], 3.78),
                _ => (text, 1.0),
            };
            let amount: f64 = number_part
                .trim()
                .parse()
                .map_err(|_| Error::invalid_option(key, format!("cannot parse length {:?}", text)))?;
            amount * px_per_unit
        }
        _ => return Err(Error::invalid_option(key, "expected a number or a length string")),
    };

    if !pixels.is_finite() || pixels < 0.0 {
        return Err(Error::invalid_option(key, "length must be a non-negative number"));
    }
    Ok(pixels / CSS_PX_PER_INCH)
}
