use regex::{Captures, Regex, Replacer};
use std::{collections::HashMap, sync::LazyLock};

// From https://dashif.org/docs/DASH-IF-IOP-v4.3.pdf:
// "For the avoidance of doubt, only %0[width]d is permitted and no other identifiers."
//
// Example template: "$RepresentationID$/$Number%06d$.m4s"
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(RepresentationID|Number|Time|Bandwidth)(?:%0(\d+)d)?)?\$")
        .expect("template pattern is valid")
});

/// Identifier values substituted into a `SegmentTemplate` string.
#[derive(Debug, Default)]
pub struct Template<'a> {
    args: HashMap<&'a str, String>,
}

impl<'a> Template<'a> {
    pub const REPRESENTATION_ID: &'static str = "RepresentationID";
    pub const NUMBER: &'static str = "Number";
    pub const TIME: &'static str = "Time";
    pub const BANDWIDTH: &'static str = "Bandwidth";

    pub fn new() -> Self {
        Self {
            args: HashMap::with_capacity(4),
        }
    }

    pub fn insert(&mut self, key: &'a str, value: String) {
        self.args.insert(key, value);
    }

    pub fn insert_optional<T: ToString>(&mut self, key: &'a str, value: Option<T>) {
        if let Some(value) = value {
            self.insert(key, value.to_string());
        }
    }

    pub fn resolve(&self, template: &str) -> String {
        TEMPLATE_REGEX
            .replace_all(template, TemplateReplacer(&self.args))
            .to_string()
    }
}

struct TemplateReplacer<'a>(&'a HashMap<&'a str, String>);

impl Replacer for TemplateReplacer<'_> {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) {
        // $$ is an escaped dollar sign
        let Some(key) = caps.get(1) else {
            dst.push('$');
            return;
        };
        let Some(value) = self.0.get(key.as_str()) else {
            dst.push_str(&caps[0]);
            return;
        };

        match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
            Some(width) => dst.push_str(&format!("{value:0>width$}")),
            None => dst.push_str(value),
        }
    }
}

/// Per-representation view of the `@media` and `@initialization` templates.
#[derive(Debug, Clone)]
pub struct SegmentTemplate {
    representation_id: Option<String>,
    bandwidth: Option<u64>,
    media: Option<String>,
    initialization: Option<String>,
}

impl SegmentTemplate {
    pub fn new(
        representation_id: Option<String>,
        bandwidth: Option<u64>,
        media: Option<String>,
        initialization: Option<String>,
    ) -> Self {
        Self {
            representation_id,
            bandwidth,
            media,
            initialization,
        }
    }

    fn args(&self) -> Template<'static> {
        let mut args = Template::new();
        args.insert_optional(Template::REPRESENTATION_ID, self.representation_id.as_ref());
        args.insert_optional(Template::BANDWIDTH, self.bandwidth);
        args
    }

    pub fn initialization(&self) -> Option<String> {
        let template = self.initialization.as_deref()?;
        Some(self.args().resolve(template))
    }

    pub fn media(&self, number: u64, time: u64) -> Option<String> {
        let template = self.media.as_deref()?;
        let mut args = self.args();
        args.insert(Template::NUMBER, number.to_string());
        args.insert(Template::TIME, time.to_string());
        Some(args.resolve(template))
    }
}
