//! Prompt templates for the analysis nodes. `{name}` placeholders, literal
//! braces doubled.

/// `gpt_analyze`: vars `message`, `custom_instructions`, `intent_options`.
pub const ANALYZE: &str = "
Tu es un expert en analyse de messages clients pour un service WhatsApp.
Analyse le message suivant et retourne UNIQUEMENT un JSON valide.

MESSAGE DU CLIENT:
\"{message}\"

{custom_instructions}

RETOURNE UN JSON avec ces champs:
{{
    \"intent\": \"{intent_options}\",
    \"intent_confidence\": 0.0 à 1.0,
    \"sentiment\": \"très_positif|positif|neutre|négatif|très_négatif\",
    \"sentiment_score\": -1.0 à 1.0,
    \"urgency\": 1 à 5,
    \"emotions\": [\"joie\", \"frustration\", \"colère\", \"satisfaction\", etc.],
    \"auto_resolvable\": true/false,
    \"keywords\": [\"mot1\", \"mot2\"],
    \"suggested_action\": \"répondre poliment|transférer humain|proposer catalogue|etc.\",
    \"response_tone\": \"amical|formel|empathique|apologétique\"
}}

JSON:";

/// `sentiment`: var `message`.
pub const SENTIMENT: &str = "
Tu es un expert en analyse de sentiment pour un service client WhatsApp.
Analyse le sentiment du message suivant et retourne UNIQUEMENT un JSON valide.

MESSAGE:
\"{message}\"

RETOURNE UN JSON avec:
{{
    \"sentiment\": \"très_positif|positif|neutre|négatif|très_négatif\",
    \"sentiment_score\": nombre entre -1.0 (très négatif) et 1.0 (très positif),
    \"emotions\": [\"joie\", \"frustration\", \"colère\", \"tristesse\", \"satisfaction\", \"inquiétude\"],
    \"tone\": \"formel|informel|urgent|amical|hostile|neutre\",
    \"urgency\": nombre entre 1 (pas urgent) et 5 (très urgent),
    \"confidence\": nombre entre 0.0 et 1.0,
    \"key_indicators\": [\"mot ou expression qui indique le sentiment\"]
}}

JSON:";

/// Rendered into `{custom_instructions}` when the node has any.
pub fn extra_instructions(instructions: &str) -> String {
    if instructions.is_empty() {
        String::new()
    } else {
        format!("Instructions supplémentaires: {}", instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wozif_core::prompt::{render, vars};

    #[test]
    fn test_analyze_renders_literal_braces() {
        let out = render(
            ANALYZE,
            &vars([
                ("message", "Où est ma commande ?"),
                ("custom_instructions", ""),
                ("intent_options", "commande|autre"),
            ]),
        );
        assert!(out.contains("\"Où est ma commande ?\""));
        assert!(out.contains("\"intent\": \"commande|autre\""));
        assert!(out.contains("{\n    \"intent\""));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_extra_instructions() {
        assert_eq!(extra_instructions(""), "");
        assert_eq!(
            extra_instructions("Sois bref"),
            "Instructions supplémentaires: Sois bref"
        );
    }
}
