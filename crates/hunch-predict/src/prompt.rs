use hunch_core::{GeneratorDemo, NextQuestion, PredictorState, ReflectorDemo, Transcript};
use serde_json::{Map, Value};

use crate::parse::ReasonedCritique;

/// Demos beyond this many are left out of the prompt, oldest first.
pub const MAX_DEMOS: usize = 4;

fn yes_no(answer: bool) -> &'static str {
    if answer {
        "yes"
    } else {
        "no"
    }
}

/// Convert a transcript to a compact numbered list for LLM consumption.
pub fn render_history(history: &Transcript) -> String {
    if history.is_empty() {
        return "HISTORY: (no questions asked yet)\n".to_string();
    }

    let mut out = String::with_capacity(64 * history.len() + 16);
    out.push_str("HISTORY:\n");
    for (i, turn) in history.turns().iter().enumerate() {
        out.push_str(&format!(
            "{}. {} -> {}\n",
            i + 1,
            turn.question,
            yes_no(turn.answer)
        ));
    }
    out
}

/// JSON Schema of the generator output. With chain of thought the
/// `reasoning` field becomes required, otherwise it is dropped.
pub fn generator_schema(chain_of_thought: bool) -> Value {
    let mut schema = schemars::schema_for!(NextQuestion).to_value();
    apply_reasoning(&mut schema, chain_of_thought);
    schema
}

fn critique_schema() -> Value {
    let mut schema = schemars::schema_for!(ReasonedCritique).to_value();
    apply_reasoning(&mut schema, true);
    schema
}

fn apply_reasoning(schema: &mut Value, chain_of_thought: bool) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    if chain_of_thought {
        let required = obj
            .entry("required")
            .or_insert_with(|| Value::Array(vec![]));
        if let Some(list) = required.as_array_mut() {
            if !list.iter().any(|v| v == "reasoning") {
                list.insert(0, Value::String("reasoning".into()));
            }
        }
        // Required means present and a string, never null
        if let Some(reasoning) = obj
            .get_mut("properties")
            .and_then(|p| p.get_mut("reasoning"))
            .and_then(|r| r.as_object_mut())
        {
            reasoning.insert("type".into(), Value::String("string".into()));
            reasoning.remove("default");
        }
    } else if let Some(props) = obj.get_mut("properties").and_then(|p| p.as_object_mut()) {
        let kept: Map<String, Value> = std::mem::take(props)
            .into_iter()
            .filter(|(k, _)| k != "reasoning")
            .collect();
        *props = kept;
    }
}

fn recent<D>(demos: &[D]) -> impl Iterator<Item = &D> {
    demos.iter().rev().take(MAX_DEMOS)
}

pub fn generator_system_prompt(state: &PredictorState<GeneratorDemo>) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str(state.instructions.trim());
    out.push_str("\n\n## Output\n");
    out.push_str("Output ONLY a JSON object matching this schema, nothing else:\n");
    out.push_str(&generator_schema(state.chain_of_thought).to_string());
    out.push('\n');
    if state.chain_of_thought {
        out.push_str(
            "Think step by step: write \"reasoning\" first, then decide on \"question\" \
and \"guess_made\".\n",
        );
    }

    if !state.demos.is_empty() {
        out.push_str("\n## Examples\n");
        for demo in recent(&state.demos) {
            out.push_str(&render_history(&demo.history));
            let output = NextQuestion {
                reasoning: None,
                question: demo.output.question.clone(),
                guess_made: demo.output.guess_made,
            };
            out.push_str("OUTPUT: ");
            out.push_str(&serde_json::to_string(&output).unwrap_or_default());
            out.push_str("\n\n");
        }
    }

    out
}

pub fn generator_user_message(history: &Transcript) -> String {
    let mut out = render_history(history);
    out.push_str("\nAsk the next question.");
    out
}

pub fn reflector_system_prompt(state: &PredictorState<ReflectorDemo>) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(state.instructions.trim());
    out.push('\n');
    if state.chain_of_thought {
        out.push_str("\n## Output\n");
        out.push_str("Output ONLY a JSON object matching this schema, nothing else:\n");
        out.push_str(&critique_schema().to_string());
        out.push_str("\nThink step by step in \"reasoning\" before writing \"critique\".\n");
    }

    if !state.demos.is_empty() {
        out.push_str("\n## Examples\n");
        for demo in recent(&state.demos) {
            out.push_str(&reflector_user_message(
                &demo.concept,
                &demo.final_question,
                &demo.history,
            ));
            out.push_str("\nCRITIQUE: ");
            out.push_str(demo.critique.trim());
            out.push_str("\n\n");
        }
    }

    out
}

pub fn reflector_user_message(concept: &str, final_question: &str, history: &Transcript) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("PERSON: ");
    out.push_str(concept);
    out.push_str("\nFINAL QUESTION: ");
    out.push_str(final_question);
    out.push('\n');
    out.push_str(&render_history(history));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Transcript {
        let mut t = Transcript::new();
        t.push("Is the person alive?", true);
        t.push("Is the person an actor?", false);
        t
    }

    #[test]
    fn history_is_numbered_with_answers() {
        assert_eq!(
            render_history(&history()),
            "HISTORY:\n1. Is the person alive? -> yes\n2. Is the person an actor? -> no\n"
        );
        assert!(render_history(&Transcript::new()).contains("no questions asked yet"));
    }

    #[test]
    fn schema_requires_reasoning_only_with_chain_of_thought() {
        let cot = generator_schema(true);
        let required = cot["required"].as_array().unwrap();
        assert_eq!(required[0], "reasoning");
        assert!(required.iter().any(|v| v == "guess_made"));
        assert_eq!(cot["properties"]["reasoning"]["type"], "string");
        assert!(cot["properties"]["reasoning"].get("default").is_none());

        let plain = generator_schema(false);
        assert!(plain["properties"].get("reasoning").is_none());
        assert!(plain["properties"].get("question").is_some());
        assert!(!plain["required"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v == "reasoning"));
    }

    #[test]
    fn schema_lists_fields_in_answer_order() {
        let keys = |schema: &Value| -> Vec<String> {
            schema["properties"]
                .as_object()
                .unwrap()
                .keys()
                .cloned()
                .collect()
        };
        assert_eq!(
            keys(&generator_schema(true)),
            vec!["reasoning", "question", "guess_made"]
        );
        assert_eq!(keys(&generator_schema(false)), vec!["question", "guess_made"]);

        let critique = critique_schema();
        assert_eq!(keys(&critique), vec!["reasoning", "critique"]);
        assert_eq!(critique["properties"]["reasoning"]["type"], "string");
    }

    #[test]
    fn generator_prompt_never_mentions_the_concept_and_caps_demos() {
        let mut state = PredictorState::<GeneratorDemo>::new("Ask good questions.", false);
        for i in 0..6 {
            state.demos.push(GeneratorDemo {
                history: history(),
                output: NextQuestion::guess(format!("Is it Person {i}?")),
            });
        }
        let prompt = generator_system_prompt(&state);
        assert!(prompt.starts_with("Ask good questions."));
        assert!(prompt.contains("Is it Person 5?"));
        assert!(prompt.contains("Is it Person 2?"));
        assert!(!prompt.contains("Is it Person 1?"));
        assert!(!prompt.contains("Think step by step"));

        let user = generator_user_message(&history());
        assert!(user.contains("2. Is the person an actor? -> no"));
        assert!(!user.contains("PERSON:"));
    }

    #[test]
    fn reflector_message_carries_truth_and_final_guess() {
        let msg = reflector_user_message("Keanu Reeves", "Is it Tom Hanks?", &history());
        assert!(msg.starts_with("PERSON: Keanu Reeves\nFINAL QUESTION: Is it Tom Hanks?\n"));
        assert!(msg.contains("1. Is the person alive? -> yes"));
    }

    #[test]
    fn reflector_prompt_switches_to_json_with_chain_of_thought() {
        let plain = PredictorState::<ReflectorDemo>::new("Review the game.", false);
        assert!(!reflector_system_prompt(&plain).contains("JSON"));

        let cot = PredictorState::<ReflectorDemo>::new("Review the game.", true);
        let prompt = reflector_system_prompt(&cot);
        assert!(prompt.contains("\"critique\""));
        assert!(prompt.contains("\"reasoning\""));
    }
}
