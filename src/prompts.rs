use crate::matcher::render_properties;
use crate::models::Property;
use crate::state::ConversationState;

pub const SYSTEM_PROMPT: &str = "Tu es l'Assistant SABBAR, un agent IA spécialisé dans l'immobilier marocain.

OBJECTIF PRINCIPAL :
Qualifier intelligemment les prospects en extrayant leurs besoins immobiliers à travers une conversation naturelle et chaleureuse.

STYLE DE CONVERSATION :
- Ton chaleureux et professionnel
- Questions courtes et ciblées (une à la fois maximum)
- Utilise le français naturel du Maroc
- Empathique et à l'écoute

INFORMATIONS À COLLECTER (par priorité) :
1. TYPE DE TRANSACTION : achat ou location ?
2. BUDGET : fourchette de prix en MAD
3. LOCALISATION : ville(s) et quartier(s) préférés
4. TYPE DE BIEN : appartement, villa, maison, riad, terrain, bureau, local commercial
5. CRITÈRES SPÉCIFIQUES : nombre de chambres, superficie, équipements
6. DÉLAI DU PROJET : urgent, 1-3 mois, 3-6 mois, plus tard
7. CONTACT : nom et téléphone pour le suivi

COMPORTEMENT :
- Ne pose qu'UNE seule question à la fois
- Reformule les réponses pour confirmer ta compréhension
- Propose des propriétés quand tu as : ville + type + budget
- Ne donne JAMAIS de conseil juridique ou fiscal
- Ne garantis JAMAIS une disponibilité sans confirmation

DEVISES ET PRIX :
- Utilise toujours \"MAD\" ou \"dirhams\"
- Accepte les montants en millions (ex: \"2 millions\" = 2 000 000 MAD)";

pub const WELCOME_MESSAGE: &str = "Bonjour ! 👋 Je suis l'assistant SABBAR, votre aide pour trouver la propriété idéale au Maroc.

Je peux vous aider à trouver un bien qui correspond parfaitement à vos besoins.

Parlez-moi de ce que vous recherchez : budget, ville, type de bien... 🏡";

/// Reply while the model is cold-starting or the circuit is open.
pub const WARMING_UP_REPLY: &str =
    "⏳ Le modèle IA est en cours d'initialisation. Veuillez patienter 20-30 secondes et réessayer.";

pub const SERVICE_UNAVAILABLE_REPLY: &str =
    "Désolé, notre assistant est momentanément indisponible. Un conseiller reviendra vers vous.";

pub const TECHNICAL_ERROR_REPLY: &str = "Désolé, une erreur technique est survenue.";

/// Reply when the model answered with nothing usable.
pub const EMPTY_REPLY_FALLBACK: &str =
    "Je suis désolé, j'ai rencontré un problème technique. Pouvez-vous reformuler votre message ?";

/// Qualification context appended to the system prompt for each reply.
pub fn build_context(state: &ConversationState, properties: &[Property]) -> String {
    let criteria = serde_json::to_string(state.criteria()).unwrap_or_default();
    let contact = serde_json::to_string(state.contact_info()).unwrap_or_default();

    let mut context = format!(
        "CONTEXTE DE LA CONVERSATION :\n\
         - Score de qualification actuel : {}/100\n\
         - Qualité du lead : {}\n\
         - Critères extraits : {}\n\
         - Contact : {}\n",
        state.qualification_score(),
        state.lead_quality(),
        criteria,
        contact,
    );

    if !properties.is_empty() {
        context.push('\n');
        context.push_str(&render_properties(properties));
    }

    context
}

pub fn system_prompt_with_context(state: &ConversationState, properties: &[Property]) -> String {
    format!("{}\n\n{}", SYSTEM_PROMPT, build_context(state, properties))
}
