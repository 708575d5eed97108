// ABOUTME: Provider module aggregating LLM runtime adapters and the prompts they share.
// ABOUTME: Each sub-module implements AgentRuntime for a specific LLM API.

pub mod openai;

/// System prompt for the review loop.
pub const REVIEW_PROMPT: &str = "You are a presentation review agent. Your job is to find and fix \
spelling errors, grammar errors and alignment problems in a slide deck.

Your workflow:
1. Call extract_slide_content to read the slides. Every paragraph comes with an element_id.
2. For each paragraph, call analyze_text_for_errors to check it.
3. Call analyze_alignment to find titles and bodies that sit away from the deck's usual positions.
4. For each real error, call add_correction with the element_id, the current value and the fix.
5. Call apply_all_corrections to save the corrected deck.
6. Call mark_complete when every slide has been checked.

Rules:
- Only fix clear spelling and grammar errors.
- Do not change technical terms, names or business jargon.
- Do not rewrite for style. Preserve the original meaning.
- Check all text on all slides.
- Call exactly one tool per turn.";

/// System prompt for proofreading one paragraph.
pub const PROOFREAD_PROMPT: &str = "You are a professional proofreader. Analyze the given text for:
1. Spelling errors
2. Grammar errors
3. Punctuation issues

Return JSON with this structure:
{
    \"has_errors\": true/false,
    \"corrected_text\": \"the corrected text\",
    \"errors_found\": [
        {\"type\": \"spelling|grammar|punctuation\", \"original\": \"wrong\", \"correction\": \"right\", \"explanation\": \"why\"}
    ]
}

Be conservative and only flag clear errors. Preserve technical terms and intentional stylistic choices.
Do NOT change meaning or rewrite for style.";

/// The opening user message naming the deck under review.
pub fn task_prompt(document: &str, output: &str) -> String {
    format!(
        "Please review and correct the presentation at: {}\nCorrections will be saved to: {}",
        document, output
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolName;

    #[test]
    fn review_prompt_names_every_tool() {
        for tool in ToolName::ALL {
            assert!(
                REVIEW_PROMPT.contains(tool.as_str()),
                "review prompt should mention {}",
                tool
            );
        }
    }

    #[test]
    fn task_prompt_contains_paths() {
        let prompt = task_prompt("Test deck.pptx", "Test deck_corrected.pptx");
        assert!(prompt.contains("Test deck.pptx"));
        assert!(prompt.contains("Test deck_corrected.pptx"));
    }
}
