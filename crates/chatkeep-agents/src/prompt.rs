use chatkeep_common::{Message, Personalization, Role};
use chatkeep_config::AppConfig;

use crate::providers::LlmRequest;
use crate::state::ConversationState;

const MEMORY_HEADER: &str = "What you remember about the user from earlier conversations:";

/// Build the system instruction for the next request.
///
/// Returns `None` in incognito mode or when nothing would be said, so callers
/// omit the field instead of sending an empty one.
pub fn build_system_prompt(state: &ConversationState, persona: Option<&str>) -> Option<String> {
    if state.is_incognito() {
        return None;
    }
    let memory = state.memory_enabled().then(|| state.memory());
    compose_system_prompt(persona, state.personalization(), memory)
}

fn compose_system_prompt(
    persona: Option<&str>,
    personalization: &Personalization,
    memory: Option<&str>,
) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(persona) = persona.map(str::trim).filter(|p| !p.is_empty()) {
        lines.push(persona.to_string());
    }

    if !personalization.is_empty() {
        push_personalization(&mut lines, personalization);
    }

    if let Some(memory) = memory.map(str::trim).filter(|m| !m.is_empty()) {
        lines.push(format!("{MEMORY_HEADER}\n{memory}"));
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn push_personalization(lines: &mut Vec<String>, personalization: &Personalization) {
    let name = personalization.name.trim();
    if !name.is_empty() {
        lines.push(format!("The user's name is {name}."));
    }
    let hobbies = personalization.hobbies.trim();
    if !hobbies.is_empty() {
        lines.push(format!("The user's hobbies and interests: {hobbies}"));
    }
    let about = personalization.about.trim();
    if !about.is_empty() {
        lines.push(format!("More about the user: {about}"));
    }
    let instructions = personalization.instructions.trim();
    if !instructions.is_empty() {
        lines.push(format!("Special instructions: {instructions}"));
    }
}

/// Turns the current conversation into one provider-neutral request.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    /// Keep only the most recent N turns. `None` sends the full history.
    pub history_window: Option<usize>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub persona: Option<String>,
}

impl RequestBuilder {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            history_window: config.provider.history_window(),
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            persona: config.provider.persona().map(str::to_string),
        }
    }

    pub fn build(&self, state: &ConversationState) -> LlmRequest {
        let history = state.history();
        let start = match self.history_window {
            Some(window) => window_start(history, window),
            None => 0,
        };

        LlmRequest {
            model: state.model().to_string(),
            messages: history[start..].to_vec(),
            system: build_system_prompt(state, self.persona.as_deref()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// First index of the last `window` turns, moved forward so the slice opens
/// on a user turn. Falls back to the raw cut if the window holds no user turn.
fn window_start(history: &[Message], window: usize) -> usize {
    let cut = history.len().saturating_sub(window);
    history[cut..]
        .iter()
        .position(|m| m.role == Role::User)
        .map_or(cut, |offset| cut + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatkeep_db::SqliteStore;
    use std::sync::Arc;

    const PERSONA: &str = "You are a friendly assistant.";

    async fn state() -> ConversationState {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut state = ConversationState::new(store, "test-model");
        state.initialize(None).await.unwrap();
        state
    }

    fn builder(window: Option<usize>) -> RequestBuilder {
        RequestBuilder {
            history_window: window,
            temperature: 0.7,
            max_tokens: 2048,
            persona: Some(PERSONA.to_string()),
        }
    }

    #[tokio::test]
    async fn incognito_omits_system_prompt() {
        let mut state = state().await;
        state
            .save_personalization(Personalization {
                name: "Alex".into(),
                hobbies: "chess".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        state.append_memory("Has a cat.").await.unwrap();
        state.set_incognito(true).await.unwrap();

        assert!(build_system_prompt(&state, Some(PERSONA)).is_none());
        assert!(builder(None).build(&state).system.is_none());
    }

    #[tokio::test]
    async fn empty_state_yields_only_persona() {
        let mut state = state().await;
        state.set_memory_enabled(false).await.unwrap();

        assert_eq!(
            build_system_prompt(&state, Some(PERSONA)).as_deref(),
            Some(PERSONA)
        );
        assert!(build_system_prompt(&state, None).is_none());
        assert!(build_system_prompt(&state, Some("   ")).is_none());
    }

    #[tokio::test]
    async fn name_follows_persona() {
        let mut state = state().await;
        state
            .save_personalization(Personalization {
                name: "Alex".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let prompt = build_system_prompt(&state, Some(PERSONA)).unwrap();
        assert_eq!(prompt, format!("{PERSONA}\nThe user's name is Alex."));
    }

    #[test]
    fn fields_render_in_fixed_order() {
        let personalization = Personalization {
            name: "Alex".into(),
            hobbies: "hiking".into(),
            instructions: "Answer briefly.".into(),
            about: "Works as a nurse.".into(),
        };
        let prompt = compose_system_prompt(None, &personalization, None).unwrap();
        let lines: Vec<&str> = prompt.lines().collect();
        assert_eq!(
            lines,
            vec![
                "The user's name is Alex.",
                "The user's hobbies and interests: hiking",
                "More about the user: Works as a nurse.",
                "Special instructions: Answer briefly.",
            ]
        );
    }

    #[test]
    fn memory_block_comes_last() {
        let personalization = Personalization {
            name: "Alex".into(),
            ..Default::default()
        };
        let prompt =
            compose_system_prompt(None, &personalization, Some("Likes tea.\nHas a dog.")).unwrap();
        assert!(prompt.ends_with(&format!("{MEMORY_HEADER}\nLikes tea.\nHas a dog.")));
        assert!(prompt.starts_with("The user's name is Alex."));

        assert!(compose_system_prompt(None, &Personalization::default(), Some("  ")).is_none());
    }

    #[test]
    fn blank_personalization_adds_no_lines() {
        let personalization = Personalization {
            name: "  ".into(),
            hobbies: "\n".into(),
            ..Default::default()
        };
        assert!(compose_system_prompt(None, &personalization, None).is_none());
        assert_eq!(
            compose_system_prompt(Some(PERSONA), &personalization, None).as_deref(),
            Some(PERSONA)
        );
    }

    #[tokio::test]
    async fn disabled_memory_is_not_sent() {
        let mut state = state().await;
        state.append_memory("Likes tea.").await.unwrap();
        state.set_memory_enabled(false).await.unwrap();

        assert!(build_system_prompt(&state, None).is_none());
    }

    #[tokio::test]
    async fn window_keeps_most_recent_turns() {
        let mut state = state().await;
        state.create_new_chat().await.unwrap();
        for i in 0..5 {
            state.push_message(Message::user(format!("q{i}")));
            state.push_message(Message::assistant(format!("a{i}")));
        }

        let request = builder(Some(4)).build(&state);
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q3", "a3", "q4", "a4"]);
        assert_eq!(request.model, "test-model");
        assert_eq!(request.max_tokens, 2048);

        assert_eq!(builder(None).build(&state).messages.len(), 10);
        assert_eq!(builder(Some(50)).build(&state).messages.len(), 10);
    }

    #[tokio::test]
    async fn window_never_opens_on_assistant_turn() {
        let mut state = state().await;
        state.create_new_chat().await.unwrap();
        for i in 0..5 {
            state.push_message(Message::user(format!("q{i}")));
            state.push_message(Message::assistant(format!("a{i}")));
        }
        state.push_message(Message::user("q5"));

        let request = builder(Some(4)).build(&state);
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q4", "a4", "q5"]);
        assert_eq!(request.messages[0].role, Role::User);

        let request = builder(Some(3)).build(&state);
        assert_eq!(request.messages[0].content, "q4");
    }
}
