//! Built-in prompt definitions.

use crate::types::PromptDefinition;

/// Identifier of the grounded-answer prompt used by the answer engine.
pub const ANSWER_PROMPT_ID: &str = "rag.answer";

const ANSWER_SYSTEM: &str = "You answer questions using only the provided document excerpts. \
If the excerpts do not contain the answer, say so plainly instead of guessing.";

const ANSWER_TEMPLATE: &str = r#"Use the following excerpts to answer the question. Cite the document name in square brackets after each claim.
{{#if low_confidence}}
The excerpts are only weakly related to the question. If they do not contain the answer, reply that the documents do not cover it.
{{/if}}
Excerpts:
{{context}}

Question: {{question}}

Answer:"#;

/// Look up a built-in prompt by ID.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        ANSWER_PROMPT_ID => Some(PromptDefinition {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Grounded answer".to_string(),
            api_version: "1.0".to_string(),
            system: Some(ANSWER_SYSTEM.to_string()),
            template: ANSWER_TEMPLATE.to_string(),
            variables: vec!["context".to_string(), "question".to_string()],
        }),
        _ => None,
    }
}
