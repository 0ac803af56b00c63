use crate::constants::models::CATALOG;

/// A selectable model as shown in the model picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    pub id: &'static str,
    pub display_name: &'static str,
}

pub fn model_options() -> impl Iterator<Item = ModelOption> {
    CATALOG
        .iter()
        .map(|&(id, display_name)| ModelOption { id, display_name })
}

/// Resolve user input, either an identifier or a display name, to a catalog entry.
pub fn find_model(input: &str) -> Option<ModelOption> {
    let input = input.trim();
    model_options().find(|option| {
        option.id.eq_ignore_ascii_case(input) || option.display_name.eq_ignore_ascii_case(input)
    })
}
