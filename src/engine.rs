use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::io::Write;

/// TemplateEngine wraps minijinja::Environment and provides a clean API for
/// compiling and rendering template bodies.
///
/// Undefined variables are strict errors so that a model missing a field a
/// template relies on aborts the render instead of emitting empty text.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Creates a new TemplateEngine with default configuration.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        // Register custom filters
        env.add_filter("camelcase", crate::filters::camelcase);
        env.add_filter("pascalcase", crate::filters::pascalcase);
        env.add_filter("snakecase", crate::filters::snakecase);
        env.add_filter("kebabcase", crate::filters::kebabcase);
        env.add_filter("screamingsnakecase", crate::filters::screamingsnakecase);

        // Strict mapping lookup; fails on a missing key rather than
        // yielding an empty value.
        env.add_function("lookup", crate::filters::lookup);

        Self { env }
    }

    /// Renders a template string with the given context.
    pub fn render_string<T: Serialize>(
        &self,
        template_str: &str,
        context: &T,
    ) -> Result<String, minijinja::Error> {
        let template = self.env.template_from_str(template_str)?;
        template.render(context)
    }

    /// Renders a template string into a writer, streaming the output.
    pub fn render_to_write<T: Serialize, W: Write>(
        &self,
        template_str: &str,
        context: &T,
        writer: W,
    ) -> Result<(), minijinja::Error> {
        let template = self.env.template_from_str(template_str)?;
        template.render_to_write(context, writer).map(|_| ())
    }

    /// Compiles a template string without rendering it, so compile errors can
    /// be caught before any output file is touched.
    pub fn check_compile(&self, template_str: &str) -> Result<(), minijinja::Error> {
        self.env.template_from_str(template_str).map(|_| ())
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
