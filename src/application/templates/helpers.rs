//! Template function library
//!
//! String and collection helpers in the spirit of the usual text-template
//! function libraries, plus the report specific ones:
//!
//! - `include name data`: renders another template of the same registry and
//!   returns the text, so it can be used inline or piped into other helpers
//!   (`{{indent 2 (include "interfaces" this)}}`).
//! - `address cidr` / `netmask cidr`: see [`super::cidr`].
//!
//! Helpers that grow their input by a template supplied count (`repeat`,
//! `padLeft`, `padRight`, `indent`, `nindent`) refuse to add more than
//! [`MAX_EXPANSION`] bytes per call.

use std::cell::Cell;

use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperDef, RenderContext, RenderError,
    RenderErrorReason, ScopedJson,
};
use serde_json::Value;

use super::cidr::{cidr_address, cidr_netmask};
use crate::support::errors::CidrError;

/// Register every helper of the library on `registry`.
pub fn register(registry: &mut Handlebars<'_>, max_include_depth: Option<usize>) {
    registry.register_helper("upper", Box::new(upper));
    registry.register_helper("lower", Box::new(lower));
    registry.register_helper("title", Box::new(title));
    registry.register_helper("trim", Box::new(trim));
    registry.register_helper("trimPrefix", Box::new(trim_prefix));
    registry.register_helper("trimSuffix", Box::new(trim_suffix));
    registry.register_helper("hasPrefix", Box::new(has_prefix));
    registry.register_helper("hasSuffix", Box::new(has_suffix));
    registry.register_helper("contains", Box::new(contains));
    registry.register_helper("replace", Box::new(replace));
    registry.register_helper("repeat", Box::new(ExpandHelper(Expand::Repeat)));
    registry.register_helper("indent", Box::new(ExpandHelper(Expand::Indent)));
    registry.register_helper("nindent", Box::new(ExpandHelper(Expand::Nindent)));
    registry.register_helper("quote", Box::new(quote));
    registry.register_helper("join", Box::new(join));
    registry.register_helper("split", Box::new(split));
    registry.register_helper("default", Box::new(default));
    registry.register_helper("empty", Box::new(empty));
    registry.register_helper("padLeft", Box::new(ExpandHelper(Expand::PadLeft)));
    registry.register_helper("padRight", Box::new(ExpandHelper(Expand::PadRight)));
    registry.register_helper("add", Box::new(add));
    registry.register_helper("sub", Box::new(sub));
    registry.register_helper("sortAlpha", Box::new(sort_alpha));
    registry.register_helper("uniq", Box::new(uniq));
    registry.register_helper("keys", Box::new(keys));
    registry.register_helper("toJson", Box::new(to_json));
    registry.register_helper("toPrettyJson", Box::new(to_pretty_json));

    registry.register_helper("include", Box::new(IncludeHelper::new(max_include_depth)));
    registry.register_helper("address", Box::new(CidrHelper::new("address", cidr_address)));
    registry.register_helper("netmask", Box::new(CidrHelper::new("netmask", cidr_netmask)));
}

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(title: |s: str| title_case(s));
handlebars_helper!(trim: |s: str| s.trim().to_string());
handlebars_helper!(trim_prefix: |prefix: str, s: str| s.strip_prefix(prefix).unwrap_or(s).to_string());
handlebars_helper!(trim_suffix: |suffix: str, s: str| s.strip_suffix(suffix).unwrap_or(s).to_string());
handlebars_helper!(has_prefix: |prefix: str, s: str| s.starts_with(prefix));
handlebars_helper!(has_suffix: |suffix: str, s: str| s.ends_with(suffix));
handlebars_helper!(contains: |needle: str, s: str| s.contains(needle));
handlebars_helper!(replace: |old: str, new: str, s: str| s.replace(old, new));
handlebars_helper!(quote: |v: Json| Value::String(display_value(v)).to_string());
handlebars_helper!(join: |sep: str, items: array| {
    items.iter().map(display_value).collect::<Vec<_>>().join(sep)
});
handlebars_helper!(split: |sep: str, s: str| {
    s.split(sep).map(str::to_string).collect::<Vec<_>>()
});
handlebars_helper!(default: |fallback: Json, v: Json| {
    if is_empty_value(v) { fallback.clone() } else { v.clone() }
});
handlebars_helper!(empty: |v: Json| is_empty_value(v));
handlebars_helper!(add: |a: i64, b: i64| a.saturating_add(b));
handlebars_helper!(sub: |a: i64, b: i64| a.saturating_sub(b));
handlebars_helper!(sort_alpha: |items: array| {
    let mut out = items.iter().map(display_value).collect::<Vec<_>>();
    out.sort();
    out
});
handlebars_helper!(uniq: |items: array| {
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
});
handlebars_helper!(keys: |obj: object| obj.keys().cloned().collect::<Vec<_>>());
handlebars_helper!(to_json: |v: Json| v.to_string());
handlebars_helper!(to_pretty_json: |v: Json| serde_json::to_string_pretty(v).unwrap_or_default());

/// Renders a JSON value the way it should read in a text report: strings
/// without quotes, null as nothing.
fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;

    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }

    out
}

fn indent_lines(spaces: usize, s: &str) -> String {
    let pad = " ".repeat(spaces);
    s.split('\n')
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Upper bound on the bytes a single sizing helper may add to the output.
pub const MAX_EXPANSION: usize = 1 << 20;

#[derive(Debug, Clone, Copy)]
pub enum Expand {
    Repeat,
    PadLeft,
    PadRight,
    Indent,
    Nindent,
}

impl Expand {
    fn name(self) -> &'static str {
        match self {
            Expand::Repeat => "repeat",
            Expand::PadLeft => "padLeft",
            Expand::PadRight => "padRight",
            Expand::Indent => "indent",
            Expand::Nindent => "nindent",
        }
    }
}

/// `count` times `unit` bytes, or an error once that passes [`MAX_EXPANSION`].
fn expansion(name: &str, count: u64, unit: usize) -> Result<usize, RenderError> {
    usize::try_from(count)
        .ok()
        .filter(|&n| n.checked_mul(unit).is_some_and(|total| total <= MAX_EXPANSION))
        .ok_or_else(|| {
            RenderErrorReason::Other(format!(
                "{name}: {count} x {unit} bytes exceeds the {MAX_EXPANSION} byte limit"
            ))
            .into()
        })
}

/// `<helper> count value`, where `count` decides how large the result is.
pub struct ExpandHelper(pub Expand);

impl HelperDef for ExpandHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let name = self.0.name();
        let count = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex(name, 0))?
            .value()
            .as_u64()
            .ok_or(RenderErrorReason::InvalidParamType("count must be a non-negative integer"))?;
        let value = h
            .param(1)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex(name, 1))?
            .value();

        let out = match self.0 {
            Expand::Repeat => {
                let s = value
                    .as_str()
                    .ok_or(RenderErrorReason::InvalidParamType("repeat needs a string"))?;
                s.repeat(expansion(name, count, s.len())?)
            }
            Expand::PadLeft => {
                let width = expansion(name, count, 1)?;
                format!("{:>width$}", display_value(value))
            }
            Expand::PadRight => {
                let width = expansion(name, count, 1)?;
                format!("{:<width$}", display_value(value))
            }
            Expand::Indent | Expand::Nindent => {
                let s = value
                    .as_str()
                    .ok_or(RenderErrorReason::InvalidParamType("indent needs a string"))?;
                let spaces = expansion(name, count, s.split('\n').count())?;
                let indented = indent_lines(spaces, s);
                match self.0 {
                    Expand::Nindent => format!("\n{indented}"),
                    _ => indented,
                }
            }
        };

        Ok(ScopedJson::Derived(Value::String(out)))
    }
}

thread_local! {
    static INCLUDE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks nesting of `include` on the rendering thread. Rendering is
/// synchronous, so nested includes always run on the thread that started
/// the outer render.
struct IncludeDepth;

impl IncludeDepth {
    fn enter(name: &str, limit: Option<usize>) -> Result<Self, RenderError> {
        let depth = INCLUDE_DEPTH.with(|d| d.get());

        if let Some(limit) = limit {
            if depth >= limit {
                return Err(RenderErrorReason::Other(format!(
                    "include {name:?}: nesting exceeds {limit} levels"
                ))
                .into());
            }
        }

        INCLUDE_DEPTH.with(|d| d.set(depth + 1));
        Ok(Self)
    }
}

impl Drop for IncludeDepth {
    fn drop(&mut self) {
        INCLUDE_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// `include name [data]`: renders the named template of the registry that
/// is currently rendering, with `data` (or the current context) as input.
///
/// There is no cycle detection unless a depth limit is configured: a
/// template that includes itself recurses until the stack is exhausted.
pub struct IncludeHelper {
    max_depth: Option<usize>,
}

impl IncludeHelper {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self { max_depth }
    }
}

impl HelperDef for IncludeHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let name = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("include", 0))?
            .value()
            .as_str()
            .ok_or(RenderErrorReason::InvalidParamType("template name must be a string"))?;

        let data = h.param(1).map(|p| p.value()).unwrap_or_else(|| ctx.data());

        let _depth = IncludeDepth::enter(name, self.max_depth)?;
        let rendered = r.render(name, data)?;

        Ok(ScopedJson::Derived(Value::String(rendered)))
    }
}

/// Single string argument helper backed by a fallible CIDR function.
pub struct CidrHelper {
    name: &'static str,
    func: fn(&str) -> Result<String, CidrError>,
}

impl CidrHelper {
    pub fn new(name: &'static str, func: fn(&str) -> Result<String, CidrError>) -> Self {
        Self { name, func }
    }
}

impl HelperDef for CidrHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let cidr = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex(self.name, 0))?
            .value()
            .as_str()
            .ok_or(RenderErrorReason::InvalidParamType("CIDR must be a string"))?;

        let value = (self.func)(cidr)
            .map_err(|e| RenderErrorReason::Other(format!("{}: {e}", self.name)))?;

        Ok(ScopedJson::Derived(Value::String(value)))
    }
}
