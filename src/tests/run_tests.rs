use crate::metrics::RunMetrics;
use crate::run::Run;
use crate::types::{Message, Role, ToolCall};
use chrono::Utc;
use serde_json::json;

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_round_trip(run: &mut Run) {
        run.add_message(Message::user("What is 2+3?"));
        run.add_message(Message::assistant_tool_calls(
            None,
            vec![ToolCall::function("c1", "add", r#"{"a":2,"b":3}"#)],
        ));
        run.add_message(Message::tool("c1", "add", "5", None));
        run.add_message(Message::assistant("2+3 is 5"));
    }

    #[test]
    fn test_run_creation() {
        let run = Run::new(Some("alice"));

        assert!(!run.run_id.is_empty());
        assert_eq!(run.user_id.as_deref(), Some("alice"));
        assert!(run.messages.is_empty());
        assert!(run.created_at <= Utc::now());
        assert_eq!(run.created_at, run.updated_at);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(Run::new(None).run_id, Run::new(None).run_id);
        assert_eq!(Run::with_id("fixed", None).run_id, "fixed");
    }

    #[test]
    fn test_add_message_touches_updated_at() {
        let mut run = Run::new(None);
        let initial_updated = run.updated_at;

        run.add_message(Message::user("Hello"));

        assert_eq!(run.messages.len(), 1);
        assert!(run.updated_at >= initial_updated);
        assert_eq!(run.messages[0].role, Role::User);
        assert_eq!(run.messages[0].text(), "Hello");
    }

    #[test]
    fn test_history_skips_system_messages() {
        let mut run = Run::new(None);
        run.add_message(Message::system("be nice"));
        run.add_message(Message::user("hi"));
        run.add_message(Message::assistant("hello"));

        let history = run.history(None);
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn test_history_never_starts_with_a_tool_message() {
        let mut run = Run::new(None);
        tool_round_trip(&mut run);

        // The last two replayable messages are [tool, assistant]; the orphaned
        // tool reply is dropped.
        let history = run.history(Some(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text(), "2+3 is 5");

        let history = run.history(Some(3));
        assert_eq!(history.len(), 3);
        assert!(history[0].has_tool_calls());
    }

    #[test]
    fn test_chat_pairs_ignore_tool_traffic() {
        let mut run = Run::new(None);
        tool_round_trip(&mut run);
        run.add_message(Message::user("thanks"));

        let pairs = run.chat_pairs();
        assert_eq!(pairs, vec![("What is 2+3?".to_string(), "2+3 is 5".to_string())]);
    }

    #[test]
    fn test_run_serialization_round_trip() {
        let mut run = Run::new(Some("bob"));
        tool_round_trip(&mut run);
        run.set_name(Some("math"));
        run.set_llm(json!({"model": "scripted"}));
        let mut metrics = RunMetrics::default();
        metrics.record_tool_call("add", std::time::Duration::from_millis(3));
        run.set_metrics(metrics.clone());

        let text = serde_json::to_string(&run).unwrap();
        let back: Run = serde_json::from_str(&text).unwrap();

        assert_eq!(back.run_id, run.run_id);
        assert_eq!(back.name.as_deref(), Some("math"));
        assert_eq!(back.messages.len(), 4);
        assert_eq!(back.messages[1].tool_calls.as_ref().unwrap()[0].function.name, "add");
        assert_eq!(back.messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(back.metrics, metrics);
        assert_eq!(back.llm, Some(json!({"model": "scripted"})));
    }
}
