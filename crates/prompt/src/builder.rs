//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use docent_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Build a prompt from a definition and input variables.
///
/// Any serializable value can supply the variables; field names become
/// template variables. Both the optional system template and the main
/// template are rendered against the same data. Every name listed in
/// `definition.variables` must be present, or the build fails before
/// rendering.
///
/// # Example
/// ```no_run
/// use docent_prompt::{build_prompt, builtin_prompt, ANSWER_PROMPT_ID};
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(ANSWER_PROMPT_ID).expect("built-in prompt");
/// let vars = json!({"question": "What is Rust?", "context": "...", "low_confidence": false});
///
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt<T: Serialize>(definition: &PromptDefinition, variables: &T) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let data = serde_json::to_value(variables)
        .map_err(|e| AppError::Prompt(format!("Failed to serialize variables: {}", e)))?;
    check_variables(definition, &data)?;

    let user = render_template(&definition.template, &data)?;
    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &data))
        .transpose()?;

    Ok(BuiltPrompt::new(system, user, definition.id.clone()))
}

fn check_variables(definition: &PromptDefinition, data: &serde_json::Value) -> AppResult<()> {
    let missing: Vec<&str> = definition
        .variables
        .iter()
        .filter(|name| data.get(name.as_str()).is_none())
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Prompt(format!(
            "Prompt '{}' is missing variables: {}",
            definition.id,
            missing.join(", ")
        )))
    }
}

/// Render a Handlebars template with variables.
fn render_template<T: Serialize>(template: &str, variables: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
