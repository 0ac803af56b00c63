//! Canned prompt templates with `{field}` placeholders.
//!
//! A pattern is tokenized once into literal text and named fields. A field
//! is `{` followed by one or more characters other than `}` and a closing
//! `}`. Anything else, including `{}` and an unclosed `{`, is literal text.

use crate::error::CoTeacherError;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Field(String),
}

/// Split `pattern` into literal and field tokens.
pub fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) if close > 0 => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Field(after[..close].to_string()));
                rest = &after[close + 1..];
            }
            _ => {
                literal.push('{');
                rest = after;
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// A named prompt pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    pattern: String,
    tokens: Vec<Token>,
}

impl Template {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let tokens = tokenize(&pattern);
        Self {
            name: name.into(),
            pattern,
            tokens,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Distinct field names in order of first appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for token in &self.tokens {
            if let Token::Field(name) = token {
                if !fields.contains(&name.as_str()) {
                    fields.push(name);
                }
            }
        }
        fields
    }

    /// Fields that have no value or only whitespace.
    pub fn missing_fields(&self, values: &HashMap<String, String>) -> Vec<String> {
        self.fields()
            .into_iter()
            .filter(|field| values.get(*field).map_or(true, |v| v.trim().is_empty()))
            .map(str::to_string)
            .collect()
    }

    /// Whether every field has a value, i.e. the template may be offered for use.
    pub fn is_ready(&self, values: &HashMap<String, String>) -> bool {
        self.missing_fields(values).is_empty()
    }

    /// Fill every placeholder. Rejected before any substitution when a field is missing.
    pub fn instantiate(&self, values: &HashMap<String, String>) -> Result<String, CoTeacherError> {
        let missing = self.missing_fields(values);
        if !missing.is_empty() {
            return Err(CoTeacherError::IncompleteTemplate { missing });
        }

        let mut output = String::with_capacity(self.pattern.len());
        for token in &self.tokens {
            match token {
                Token::Literal(text) => output.push_str(text),
                Token::Field(name) => output.push_str(&values[name]),
            }
        }
        Ok(output)
    }
}

/// Prompt label for a field: the name with its first letter capitalized.
pub fn field_label(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// The built-in catalog, in menu order.
pub fn builtin_templates() -> Vec<Template> {
    vec![
        Template::new(
            "Create a Lesson Plan",
            "Create a 45-minute lesson plan for {subject} about {topic} for grade {grade} students.",
        ),
        Template::new(
            "Generate a Quiz",
            "Generate a 10-question quiz on the subject {subject} and for the topic {topic} is for {grade} grade, including answer key.",
        ),
        Template::new(
            "Classroom Management",
            "Suggest strategies for managing a classroom where students {issue}.",
        ),
        Template::new(
            "Differentiated Instruction",
            "How can I differentiate my {subject} instruction for students who {need}?",
        ),
        Template::new("Parent Communication", "Draft an email to parents about {topic}."),
    ]
}

/// Look a built-in template up by name (case-insensitive) or 1-based menu position.
pub fn find_template(key: &str) -> Option<Template> {
    let key = key.trim();
    let templates = builtin_templates();

    if let Ok(index) = key.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| templates.into_iter().nth(i));
    }

    templates
        .into_iter()
        .find(|t| t.name().eq_ignore_ascii_case(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn instantiates_the_lesson_plan_example() {
        let template = Template::new("t", "Create a plan for {subject} about {topic}");
        let filled = template
            .instantiate(&values(&[("subject", "Math"), ("topic", "Fractions")]))
            .unwrap();
        assert_eq!(filled, "Create a plan for Math about Fractions");
    }

    #[test]
    fn missing_value_is_rejected_before_substitution() {
        let template = Template::new("t", "Create a plan for {subject} about {topic}");
        let err = template
            .instantiate(&values(&[("subject", "Math")]))
            .unwrap_err();

        match err {
            CoTeacherError::IncompleteTemplate { missing } => assert_eq!(missing, vec!["topic"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let template = Template::new("t", "About {topic}");
        assert!(!template.is_ready(&values(&[("topic", "  ")])));
        assert!(template.is_ready(&values(&[("topic", "rivers")])));
    }

    #[test]
    fn repeated_fields_are_listed_once_and_all_replaced() {
        let template = Template::new("t", "{a} and {b} then {a} again");
        assert_eq!(template.fields(), vec!["a", "b"]);

        let filled = template.instantiate(&values(&[("a", "X"), ("b", "Y")])).unwrap();
        assert_eq!(filled, "X and Y then X again");
    }

    #[test]
    fn braces_without_a_name_stay_literal() {
        assert_eq!(
            tokenize("set {} and {open"),
            vec![Token::Literal("set {} and {open".into())]
        );

        let template = Template::new("t", "{x}{}");
        assert_eq!(template.fields(), vec!["x"]);
        assert_eq!(template.instantiate(&values(&[("x", "1")])).unwrap(), "1{}");
    }

    #[test]
    fn field_name_runs_to_the_first_closing_brace() {
        assert_eq!(
            tokenize("a {b{c} d"),
            vec![
                Token::Literal("a ".into()),
                Token::Field("b{c".into()),
                Token::Literal(" d".into()),
            ]
        );
    }

    #[test]
    fn template_without_fields_is_always_ready() {
        let template = Template::new("t", "Plain prompt");
        assert!(template.fields().is_empty());
        assert_eq!(template.instantiate(&HashMap::new()).unwrap(), "Plain prompt");
    }

    #[test]
    fn catalog_fields_match_the_menu() {
        let templates = builtin_templates();
        assert_eq!(templates.len(), 5);
        assert_eq!(templates[0].fields(), vec!["subject", "topic", "grade"]);
        assert_eq!(templates[2].fields(), vec!["issue"]);
        assert_eq!(templates[4].fields(), vec!["topic"]);
    }

    #[test]
    fn find_template_by_position_or_name() {
        assert_eq!(find_template("2").unwrap().name(), "Generate a Quiz");
        assert_eq!(find_template("parent communication").unwrap().name(), "Parent Communication");
        assert!(find_template("0").is_none());
        assert!(find_template("9").is_none());
        assert!(find_template("Homework").is_none());
    }

    #[test]
    fn labels_capitalize_the_first_letter() {
        assert_eq!(field_label("topic"), "Topic");
        assert_eq!(field_label("GRADE"), "Grade");
        assert_eq!(field_label(""), "");
    }
}
