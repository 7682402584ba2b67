//! Behavioral rules attached to reasoning steps.

use serde::{Deserialize, Serialize};

/// How a rule participates beyond being shown to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Prompt-only constraint.
    Plain,
    /// The step must still answer when it cannot find one.
    BestGuess,
}

/// A single behavioral constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub text: String,
    pub kind: RuleKind,
}

impl Rule {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: RuleKind::Plain,
        }
    }

    /// A rule that licenses an educated guess when nothing is found.
    pub fn best_guess(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: RuleKind::BestGuess,
        }
    }

    pub fn is_best_guess(&self) -> bool {
        self.kind == RuleKind::BestGuess
    }
}

/// Whether any rule in the set licenses guessing.
pub fn allows_best_guess(rules: &[Rule]) -> bool {
    rules.iter().any(Rule::is_best_guess)
}

/// What a reasoning step does when a tool call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailurePolicy {
    /// The first failure fails the step.
    Propagate,
    /// Failures are handed to the model as error results so it can recover.
    ReportToModel,
}

impl ToolFailurePolicy {
    /// Derive the policy from a step's rules.
    pub fn from_rules(rules: &[Rule]) -> Self {
        if allows_best_guess(rules) {
            Self::ReportToModel
        } else {
            Self::Propagate
        }
    }
}

/// Build the system prompt carrying the rules, if there are any.
pub fn system_prompt(rules: &[Rule]) -> Option<String> {
    if rules.is_empty() {
        return None;
    }

    let mut prompt = String::from(
        "You are one step of an automated pipeline. Answer the task directly.\n\n\
         Follow these rules:\n",
    );
    for (i, rule) in rules.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, rule.text));
    }
    Some(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_rules() {
        let plain = vec![Rule::new("Be brief.")];
        assert_eq!(
            ToolFailurePolicy::from_rules(&plain),
            ToolFailurePolicy::Propagate
        );

        let guessing = vec![
            Rule::new("Be brief."),
            Rule::best_guess("If you can't find it, make a best educated guess."),
        ];
        assert_eq!(
            ToolFailurePolicy::from_rules(&guessing),
            ToolFailurePolicy::ReportToModel
        );
        assert_eq!(ToolFailurePolicy::from_rules(&[]), ToolFailurePolicy::Propagate);
    }

    #[test]
    fn test_system_prompt_numbers_rules() {
        let prompt = system_prompt(&[Rule::new("One."), Rule::best_guess("Two.")]).unwrap();
        assert!(prompt.contains("1. One.\n"));
        assert!(prompt.contains("2. Two.\n"));
        assert!(system_prompt(&[]).is_none());
    }
}
