use crate::board::GenerationContext;

pub const DEFAULT_BASE_PROMPT: &str = "Indian wedding moodboard";
pub const CLOSING_INSTRUCTION: &str = "Generate cohesive Indian wedding moodboard image concepts emphasizing authentic cultural details, rich textures, balanced composition, and cinematic soft lighting.";

/// At most this many ceremonies are named in the prompt, even when the context holds more.
const PROMPT_CEREMONY_LIMIT: usize = 8;

/// Composes the final generation prompt from user text and board context.
///
/// Layout: trimmed base prompt, then (only if any category is non-empty) a
/// `Context:` block with one `Label: a, b` line per non-empty category, then
/// the fixed closing instruction.
pub fn build_prompt(base_prompt: &str, context: &GenerationContext) -> String {
    let base = match base_prompt.trim() {
        "" => DEFAULT_BASE_PROMPT,
        trimmed => trimmed,
    };

    let mut sections = Vec::new();
    let mut push = |label: &str, values: &[String]| {
        if !values.is_empty() {
            sections.push(format!("{label}: {}", values.join(", ")));
        }
    };
    push("Palette", &context.colors);
    push("Key Elements", &context.elements);
    push("Motifs", &context.motifs);
    push("Themes", &context.themes);
    let ceremony_count = context.ceremonies.len().min(PROMPT_CEREMONY_LIMIT);
    push("Ceremony Focus", &context.ceremonies[..ceremony_count]);

    let mut prompt = base.to_string();
    if !sections.is_empty() {
        prompt.push_str("\nContext:\n");
        prompt.push_str(&sections.join("\n"));
    }
    prompt.push('\n');
    prompt.push_str(CLOSING_INSTRUCTION);
    prompt
}

#[cfg(test)]
mod tests {
    use super::{build_prompt, CLOSING_INSTRUCTION, DEFAULT_BASE_PROMPT};
    use crate::board::GenerationContext;

    #[test]
    fn empty_context_has_no_context_block() {
        let prompt = build_prompt("  Royal palace evening  ", &GenerationContext::default());
        assert_eq!(prompt, format!("Royal palace evening\n{CLOSING_INSTRUCTION}"));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn colors_only_yields_one_palette_line() {
        let context = GenerationContext {
            colors: vec!["#B3001B".to_string(), "Gold".to_string()],
            ..GenerationContext::default()
        };
        let prompt = build_prompt("Traditional Rich", &context);
        let category_lines: Vec<&str> = prompt
            .lines()
            .filter(|line| line.contains(": "))
            .collect();
        assert_eq!(category_lines, vec!["Palette: #B3001B, Gold"]);
        assert!(prompt.starts_with("Traditional Rich\nContext:\nPalette: #B3001B, Gold\n"));
    }

    #[test]
    fn categories_render_in_fixed_order() {
        let context = GenerationContext {
            colors: vec!["Red".to_string()],
            elements: vec!["Mandap".to_string()],
            motifs: vec!["Peacock Feather".to_string()],
            themes: vec!["Modern".to_string()],
            ceremonies: vec!["Haldi".to_string(), "Sangeet".to_string()],
        };
        let prompt = build_prompt("Dusk", &context);
        assert_eq!(
            prompt,
            format!(
                "Dusk\nContext:\nPalette: Red\nKey Elements: Mandap\nMotifs: Peacock Feather\nThemes: Modern\nCeremony Focus: Haldi, Sangeet\n{CLOSING_INSTRUCTION}"
            )
        );
    }

    #[test]
    fn blank_base_prompt_uses_default() {
        let prompt = build_prompt(" \n ", &GenerationContext::default());
        assert!(prompt.starts_with(DEFAULT_BASE_PROMPT));
    }

    #[test]
    fn ceremony_focus_names_at_most_eight() {
        let context = GenerationContext {
            ceremonies: (1..=10).map(|idx| format!("c{idx}")).collect(),
            ..GenerationContext::default()
        };
        let prompt = build_prompt("x", &context);
        assert!(prompt.contains("Ceremony Focus: c1, c2, c3, c4, c5, c6, c7, c8\n"));
        assert!(!prompt.contains("c9"));
    }
}
