//! Instruction pairs for the ruling and bias completion calls
//!
//! Both builders are pure: same inputs, same prompt text.

use crate::model::Verdict;

/// System persona for ruling generation
pub const RULING_SYSTEM_PROMPT: &str = "You are a careful courtroom assistant for minor cases. \
You analyze the facts, summarize the applicable rules, propose a fair outcome within simple bounds, \
explain the reasoning in plain language and flag risks. You do not give legal advice beyond this \
constrained setting. Keep responses concise and structured.";

/// System persona for the fairness audit
pub const BIAS_SYSTEM_PROMPT: &str = "You are auditing a ruling for fairness risks. \
Read the ruling and point out potential bias or unfairness.";

/// A system/user instruction pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the ruling prompt for a case.
///
/// `extra` entries are rendered as `key: value` lines under an
/// `Additional context:` heading; the block is omitted when `extra` is empty.
pub fn build_ruling_prompt(
    title: &str,
    narrative: &str,
    locale: &str,
    extra: &[(String, String)],
) -> Prompt {
    let extra_context = if extra.is_empty() {
        String::new()
    } else {
        let lines = extra
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\nAdditional context:\n{}\n", lines)
    };

    let user = format!(
        "Jurisdiction hint: {locale}\n\
         \n\
         Case title: {title}\n\
         \n\
         Case narrative (user words):\n\
         {narrative}\n\
         {extra_context}\n\
         Output JSON with keys:\n\
         - verdict (choose the single best-fit label from: {labels}; base the choice on the facts and stay concise)\n\
         - rationale (4-8 sentences that walk through the key facts, the applicable rules and why the verdict was selected)\n\
         - citations (array of short strings, or empty)\n\
         - risk_flags (array of short strings, or empty, highlighting potential fairness concerns or missing information)",
        locale = locale,
        title = title,
        narrative = narrative,
        extra_context = extra_context,
        labels = Verdict::label_list(),
    );

    Prompt {
        system: RULING_SYSTEM_PROMPT.to_string(),
        user: user.trim().to_string(),
    }
}

/// Build the bias audit prompt around the serialized ruling JSON
pub fn build_bias_prompt(ruling_json: &str) -> Prompt {
    let user = format!(
        "RULING JSON:\n{}\n\nReturn JSON: {{ \"bias_score\": number between 0 and 1, \"notes\": [short strings] }}.",
        ruling_json
    );

    Prompt {
        system: BIAS_SYSTEM_PROMPT.to_string(),
        user: user.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ruling_prompt_embeds_case_facts() {
        let prompt = build_ruling_prompt(
            "Stop sign",
            "I stopped fully but the officer observed differently.",
            "California",
            &[],
        );

        assert_eq!(prompt.system, RULING_SYSTEM_PROMPT);
        assert!(prompt.user.starts_with("Jurisdiction hint: California"));
        assert!(prompt.user.contains("Case title: Stop sign"));
        assert!(prompt
            .user
            .contains("Case narrative (user words):\nI stopped fully but the officer observed differently."));
        assert!(!prompt.user.contains("Additional context"));
    }

    #[test]
    fn test_ruling_prompt_output_contract() {
        let prompt = build_ruling_prompt("t", "n", "l", &[]);
        for verdict in Verdict::ALL {
            assert!(prompt.user.contains(verdict.as_str()));
        }
        assert!(prompt.user.contains("- verdict"));
        assert!(prompt.user.contains("- rationale (4-8 sentences"));
        assert!(prompt.user.contains("- citations"));
        assert!(prompt.user.contains("- risk_flags"));
    }

    #[test]
    fn test_ruling_prompt_extra_context() {
        let extra = vec![
            ("case_id".to_string(), "12".to_string()),
            ("prior_offenses".to_string(), "none".to_string()),
        ];
        let prompt = build_ruling_prompt("t", "narrative", "l", &extra);
        assert!(prompt
            .user
            .contains("Additional context:\ncase_id: 12\nprior_offenses: none\n"));
    }

    #[test]
    fn test_ruling_prompt_is_deterministic() {
        let extra = vec![("case_id".to_string(), "1".to_string())];
        assert_eq!(
            build_ruling_prompt("a", "b", "c", &extra),
            build_ruling_prompt("a", "b", "c", &extra)
        );
    }

    #[test]
    fn test_bias_prompt_embeds_ruling() {
        let ruling = r#"{"verdict":"reduced","rationale":"Because."}"#;
        let prompt = build_bias_prompt(ruling);
        assert_eq!(prompt.system, BIAS_SYSTEM_PROMPT);
        assert!(prompt.user.starts_with("RULING JSON:\n"));
        assert!(prompt.user.contains(ruling));
        assert!(prompt.user.contains("\"bias_score\": number between 0 and 1"));
        assert!(prompt.user.contains("\"notes\": [short strings]"));
    }
}
