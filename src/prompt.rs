//! prompt.rs — Instruction-prompt assembly and reply post-processing for the
//! generative providers.
//!
//! The instruction prompt embeds the last three conversation turns plus the
//! current message. `format_markdown` applies the lightweight emphasis the
//! frontend renders: italicized emotion words, bolded cue phrases, leading
//! breaks before suggestion blocks, block-quoted trailing questions.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::transcript::Turn;

/// How many trailing turns of context the providers see.
pub const CONTEXT_TURNS: usize = 3;

static EMOTION_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(anxiety|stress|depression|overwhelmed|worried|scared)\b")
        .expect("valid emotion-word pattern")
});

static CUE_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(remember|important|key takeaway|try this)\b:")
        .expect("valid cue-phrase pattern")
});

static SUGGESTION_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(Here'?s?( are)? (what|some|a few)|Try these|You could)")
        .expect("valid suggestion-opener pattern")
});

/// Renders the last [`CONTEXT_TURNS`] turns as `role: text` lines. Empty
/// history renders as the empty string.
pub fn render_recent_context(turns: &[Turn]) -> String {
    let start = turns.len().saturating_sub(CONTEXT_TURNS);
    turns[start..]
        .iter()
        .map(|t| format!("{}: {}", t.role.as_str(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The templated instruction prompt sent to the conversational provider.
pub fn build_instruction_prompt(message: &str, history: &str) -> String {
    format!(
        r#"You are a compassionate mental health assistant. Respond naturally and conversationally, while maintaining professionalism. Keep responses concise and friendly.

Previous Context:
{history}

Current Message: "{message}"

Guidelines:
- Start with a warm, natural greeting when appropriate
- Show empathy through conversational language
- Give practical advice in a friendly way
- Use casual transitions between topics
- Include gentle questions to encourage conversation
- Keep medical terminology minimal unless specifically asked
- Use markdown formatting for emphasis and structure

Remember to:
- Highlight emotional words in _italics_
- Use **bold** for key points
- Break long responses into readable paragraphs
- Use bullet points sparingly and naturally
- End with an open-ended question

Respond in a way that feels like talking to a supportive friend who happens to be a mental health professional."#
    )
}

/// Per-line emphasis pass over generated text. Blank lines are dropped and
/// the surviving lines are re-joined as paragraphs. A suggestion opener wins
/// over the trailing-question rule for the same line.
pub fn format_markdown(text: &str) -> String {
    let paragraphs: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let line = EMOTION_WORDS.replace_all(line, "_${1}_");
            let line = CUE_PHRASES.replace_all(&line, "**${1}:**");
            if SUGGESTION_OPENER.is_match(&line) {
                format!("\n{line}")
            } else if line.ends_with('?') {
                format!("\n> {line}")
            } else {
                line.into_owned()
            }
        })
        .collect();
    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{Role, Turn};

    fn turn(role: Role, text: &str) -> Turn {
        Turn::new(role, text)
    }

    #[test]
    fn context_renders_last_three_turns() {
        let turns = vec![
            turn(Role::User, "one"),
            turn(Role::Bot, "two"),
            turn(Role::User, "three"),
            turn(Role::Bot, "four"),
            turn(Role::User, "five"),
        ];
        let rendered = render_recent_context(&turns);
        assert_eq!(rendered, "user: three\nbot: four\nuser: five");
        assert_eq!(render_recent_context(&[]), "");
    }

    #[test]
    fn prompt_embeds_message_and_history() {
        let p = build_instruction_prompt("i can't sleep", "user: hi\nbot: hello");
        assert!(p.contains("Current Message: \"i can't sleep\""));
        assert!(p.contains("Previous Context:\nuser: hi\nbot: hello"));
        assert!(p.contains("compassionate mental health assistant"));
    }

    #[test]
    fn markdown_italicizes_emotion_words_preserving_case() {
        let out = format_markdown("Anxiety is common and stress passes.");
        assert_eq!(out, "_Anxiety_ is common and _stress_ passes.");
    }

    #[test]
    fn markdown_bolds_cue_phrases() {
        let out = format_markdown("Remember: breathe slowly.");
        assert_eq!(out, "**Remember:** breathe slowly.");
    }

    #[test]
    fn markdown_blockquotes_trailing_questions() {
        let out = format_markdown("Take your time.\nHow does that sound?");
        assert_eq!(out, "Take your time.\n\n\n> How does that sound?");
    }

    #[test]
    fn markdown_suggestion_opener_wins_over_question_rule() {
        let out = format_markdown("Here's what you could try?");
        assert_eq!(out, "\nHere's what you could try?");
    }

    #[test]
    fn markdown_drops_blank_lines_and_trims() {
        let out = format_markdown("  first line  \n\n   \nsecond line");
        assert_eq!(out, "first line\n\nsecond line");
    }

    #[test]
    fn markdown_empty_input_is_empty() {
        assert_eq!(format_markdown(""), "");
        assert_eq!(format_markdown("\n \n"), "");
    }
}
