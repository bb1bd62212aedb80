#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    pub id: &'static str,
    pub name: &'static str,
}

impl Model {
    pub const fn new(id: &'static str, name: &'static str) -> Self {
        Self { id, name }
    }
}

pub const DEFAULT_MODEL_ID: &str = "claude-opus";

/// Entries shown in the model selector. Selection is cosmetic for now.
pub const MODELS: [Model; 3] = [
    Model::new("claude-opus", "Claude 3.5 Sonnet"),
    Model::new("gpt-4", "GPT-4o"),
    Model::new("gemini-pro", "Gemini 1.5 Pro"),
];

pub fn default_model() -> Model {
    MODELS[0]
}

pub fn find_model(id: &str) -> Option<Model> {
    MODELS.iter().copied().find(|model| model.id == id)
}
