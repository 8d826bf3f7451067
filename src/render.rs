//! HTML rendering: embedded minijinja templates and the filters they use.
//!
//! Templates are `.html`, so every interpolation is auto-escaped; the only
//! unescaped output comes from the `markdown` filter, which escapes raw HTML
//! in its input and sanitizes what it produces.

use chrono::{Locale, NaiveDateTime, TimeZone, Utc};
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};
use pulldown_cmark::{html, Event, Options, Parser};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

const DATE_LOCALE: Locale = Locale::fr_FR;
const DEFAULT_TRUNCATE: usize = 150;

/// Markdown to sanitized HTML.
pub fn markdown_to_html(src: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    // raw HTML blocks are shown as text, never passed through
    let events = Parser::new_ext(src, opts).map(|ev| match ev {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(src.len() * 3 / 2);
    html::push_html(&mut out, events);
    ammonia::clean(&out)
}

/// First `n` characters, with `...` appended when something was cut.
pub fn truncate(text: &str, n: usize) -> String {
    match text.char_indices().nth(n) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Long-form date such as `15 janvier 2024`. Unparseable input is echoed back.
pub fn format_date(raw: &str) -> String {
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).format_localized("%-d %B %Y", DATE_LOCALE).to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Splits the comma-delimited tags column.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn build_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.set_loader(|name| match Templates::get(name) {
        Some(file) => String::from_utf8(file.data.into_owned())
            .map(Some)
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, "template is not UTF-8").with_source(e)),
        None => Ok(None),
    });
    env.add_filter("markdown", |value: Option<String>| {
        Value::from_safe_string(markdown_to_html(value.as_deref().unwrap_or_default()))
    });
    env.add_filter("truncate", |value: Option<String>, n: Option<usize>| {
        truncate(value.as_deref().unwrap_or_default(), n.unwrap_or(DEFAULT_TRUNCATE))
    });
    env.add_filter("date", |value: Option<String>| format_date(value.as_deref().unwrap_or_default()));
    env.add_filter("tags", |value: Option<String>| split_tags(value.as_deref().unwrap_or_default()));
    env
}

/// Template renderer. With caching on, the environment (and every template
/// it has loaded) lives for the whole process; with it off each render starts
/// from a fresh environment so edited templates show up immediately.
pub struct Renderer {
    cached: Option<Environment<'static>>,
}

impl Renderer {
    pub fn new(cache: bool) -> Self {
        Self { cached: cache.then(build_environment) }
    }

    pub fn render(&self, name: &str, ctx: Value) -> Result<String, Error> {
        match &self.cached {
            Some(env) => env.get_template(name)?.render(ctx),
            None => {
                let env = build_environment();
                let html = env.get_template(name)?.render(ctx)?;
                Ok(html)
            }
        }
    }
}
