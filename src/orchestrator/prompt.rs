use crate::rag::SearchResult;

const GENERIC_INTRO: &str = "Sei un assistente domestico esperto e amichevole specializzato in:
- Consigli per la pulizia naturale della casa
- Gestione delle utenze domestiche
- Manutenzione casalinga
- Organizzazione domestica

Rispondi in italiano in modo pratico, dettagliato e amichevole.";

const GROUNDED_INTRO: &str =
    "Sei un assistente domestico esperto e amichevole specializzato in consigli per la casa.";

const GROUNDED_INSTRUCTIONS: &str = "Rispondi in italiano incorporando naturalmente le informazioni della knowledge base quando rilevanti.
Sii pratico, dettagliato e amichevole. Se le informazioni della knowledge base non sono sufficienti,
integra con la tua conoscenza generale sui temi domestici.";

/// Single-turn prompt: generic framing without knowledge, grounded otherwise.
pub fn build_prompt(user_message: &str, knowledge: &[SearchResult]) -> String {
    if knowledge.is_empty() {
        return format!("{}\n\nDOMANDA UTENTE: {}", GENERIC_INTRO, user_message);
    }

    format!(
        "{}\n\nEcco informazioni rilevanti dalla tua base di conoscenze:\n{}\n\nDOMANDA UTENTE: {}\n\n{}",
        GROUNDED_INTRO,
        grounding_context(knowledge),
        user_message,
        GROUNDED_INSTRUCTIONS
    )
}

/// One `[CATEGORY] content` line per result.
pub fn grounding_context(knowledge: &[SearchResult]) -> String {
    knowledge
        .iter()
        .map(|k| format!("[{}] {}", k.category.to_uppercase(), k.content))
        .collect::<Vec<_>>()
        .join("\n")
}
