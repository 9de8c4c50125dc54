//! Chat prompts rendered from minijinja templates.

use minijinja::Environment;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::{ChatMessage, Document};

/// Render one template string against `context`.
pub fn render(template: &str, context: &BTreeMap<String, Value>) -> Result<String> {
    let env = Environment::new();
    env.render_str(template, context).map_err(|e| Error::config(format!("template rendering failed: {e}")))
}

/// Every message of the template is rendered with `documents`, `query` and
/// any other template variables in scope.
pub struct PromptBuilder {
    template: Vec<ChatMessage>,
}

impl PromptBuilder {
    pub fn new(template: Vec<ChatMessage>) -> Self { Self { template } }

    /// System prompt plus one user message template.
    pub fn chat(system_prompt: &str, user_template: &str) -> Self {
        Self::new(vec![ChatMessage::system(system_prompt), ChatMessage::user(user_template)])
    }

    pub fn build(&self, template: Option<&[ChatMessage]>, documents: &[Document], variables: BTreeMap<String, Value>) -> Result<Vec<ChatMessage>> {
        let mut context = variables;
        context.insert("documents".into(), Value::Array(documents.iter().map(document_context).collect()));
        template
            .unwrap_or(&self.template)
            .iter()
            .map(|message| Ok(ChatMessage { role: message.role, content: render(&message.content, &context)? }))
            .collect()
    }
}

// Embeddings stay out of the template context.
fn document_context(doc: &Document) -> Value {
    json!({
        "id": doc.id,
        "content": doc.content,
        "score": doc.score,
        "meta": doc.meta,
    })
}

impl Stage for PromptBuilder {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let documents = inputs.take_documents("documents")?.unwrap_or_default();
        let template = inputs.take_messages("template")?;
        let variables = inputs.take_variables("template_variables")?;
        let prompt = self.build(template.as_deref(), &documents, variables)?;
        Ok(Ports::new().with("prompt", prompt))
    }
}
