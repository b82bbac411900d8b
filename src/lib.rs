//! rtpl: render Jinja-style templates with data from various sources.
//!
//! The engine does one job: evaluate a template against structured data
//! and return the rendered text. Parsing and rendering are separate, so
//! one parsed [`Template`] can be rendered against any number of data
//! sets.
//!
//! Supported grammar:
//! - Literals, emitted verbatim.
//! - `{{ expr }}` with variables, `a.b` / `a['b']` / `a[0]` access,
//!   string/number/bool literals, `+`, `==`, `!=`, `and`, `or`, `not`.
//! - `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}`.
//! - `{% for x in expr %}` / `{% endfor %}`, arbitrarily nested, with a
//!   `loop` helper (`index`, `index0`, `first`, `last`, `length`).
//!
//! Not supported:
//! - Filters (`| upper`), macros, includes, assignments.
//! - Escape sequences for literal `{{`; every `{{` and `{%` opens a tag.
//!
//! Newline semantics: the output contains exactly the newlines present in
//! the template (and bound data). With [`Options::trim_blocks`] the single
//! newline directly after a `%}` is dropped, which keeps block-heavy
//! templates readable without littering the output with blank lines.
//!
//! Failures are classified into three kinds ([`Error`]): `Syntax` (bad
//! template, with line/column), `Data` (bad or unreadable input data),
//! and `Render` (evaluation failure, e.g. an undefined variable). No
//! partial output is ever produced: rendering returns a complete string
//! or an error.

pub mod ast;
pub mod data;
mod error;
mod eval;
mod lexer;
mod parser;
mod value;

pub use data::{bind, DataSource};
pub use error::{Error, Location, Result};
pub use value::{Number, Value};

use eval::Evaluator;
use parser::Parser;

/// Knobs shared by parsing and rendering. The defaults are safe for
/// untrusted templates: nesting depth and total loop iterations are both
/// bounded.
#[derive(Debug, Clone)]
pub struct Options {
    /// Drop the newline immediately following a `%}` block tag.
    pub trim_blocks: bool,
    /// Maximum `if`/`for` nesting depth accepted by the parser.
    pub max_depth: usize,
    /// Total loop iterations allowed in one render.
    pub max_iterations: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trim_blocks: false,
            max_depth: 64,
            max_iterations: 1_000_000,
        }
    }
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<ast::Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with(source, &Options::default())
    }

    pub fn parse_with(source: &str, options: &Options) -> Result<Self> {
        let nodes = Parser::new(source, options).parse_template()?;
        Ok(Template { nodes })
    }

    pub fn render(&self, data: &Value) -> Result<String> {
        self.render_with(data, &Options::default())
    }

    pub fn render_with(&self, data: &Value, options: &Options) -> Result<String> {
        Evaluator::new(data, options).render(&self.nodes)
    }
}

/// One-shot parse + render with default options.
pub fn render(source: &str, data: &Value) -> Result<String> {
    Template::parse(source)?.render(data)
}
