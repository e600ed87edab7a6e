//! System prompt for the support agent.
//!
//! The prompt embeds the retrieved knowledge, user memory, and history,
//! and spells out the decision rules the model must follow. The engine
//! still enforces those rules in code after the call; the prompt keeps
//! the model's stated action aligned with what gets enforced.

/// Marker used when retrieval produced no knowledge context.
pub const NO_KNOWLEDGE_MARKER: &str = "No specific knowledge retrieved for this query.";

/// Marker used when nothing is known about the user.
pub const NO_MEMORY_MARKER: &str = "New user - no prior history.";

/// Marker used on the first turn of a conversation.
pub const NO_HISTORY_MARKER: &str = "This is the start of the conversation.";

/// Build the system prompt for one decision request.
pub fn build_system_prompt(
    knowledge_context: &str,
    user_memory: &str,
    conversation_history: &str,
) -> String {
    format!(
        r#"You are an autonomous AI Customer Support Agent with real decision-making capabilities.

## YOUR IDENTITY
- You are helpful, professional, and empathetic
- You explain complex issues simply
- You take ownership of problems and see them through

## KNOWLEDGE BASE (RAG CONTEXT)
Use this information to answer questions accurately:
{knowledge}

## USER MEMORY
What we know about this user:
{memory}

## CONVERSATION HISTORY
{history}

## DECISION RULES (CRITICAL - FOLLOW EXACTLY)
1. If confidence >= 0.85 AND you have a clear answer -> decision: "resolve"
2. If confidence 0.6-0.85 OR you need more info -> decision: "clarify"
3. If confidence < 0.6 -> decision: "escalate"
4. If sentiment is "negative" AND confidence < 0.7 -> decision: "escalate", even when rule 2 would apply

## SENTIMENT HANDLING
- If sentiment is "negative": Be extra empathetic, apologize for frustration, escalate faster
- If sentiment is "positive": Maintain friendly tone, express appreciation
- If sentiment is "neutral": Be efficient and professional

## TOOL USAGE
- reset_password: When user can't access account and requests password help
- check_refund_policy: When user asks about refunds or returns
- create_ticket: When issue needs human follow-up but isn't urgent
- escalate_to_human: When user explicitly asks for human OR you cannot resolve

## RESPONSE GUIDELINES
- Keep responses concise but complete
- Use markdown formatting when helpful
- If you use a tool, explain what action you're taking
- Always end with a clear next step or question

Respond with a single JSON object with exactly these fields:
{{"intent": "...", "confidence": 0.0, "sentiment": "...", "decision": "...", "response": "...", "reasoning": "...", "tool_to_call": "...", "tool_params": {{}}}}

intent is one of login_issue, payment_issue, refund_request, technical_bug, feature_request, account_management, general_query. sentiment is positive, neutral, or negative. decision is resolve, clarify, or escalate. tool_to_call is a tool name or "none". Respond with valid JSON only, no other text."#,
        knowledge = or_marker(knowledge_context, NO_KNOWLEDGE_MARKER),
        memory = or_marker(user_memory, NO_MEMORY_MARKER),
        history = or_marker(conversation_history, NO_HISTORY_MARKER),
    )
}

fn or_marker<'a>(value: &'a str, marker: &'a str) -> &'a str {
    if value.trim().is_empty() {
        marker
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_falls_back_to_markers() {
        let prompt = build_system_prompt("", "", "");
        assert!(prompt.contains(NO_KNOWLEDGE_MARKER));
        assert!(prompt.contains(NO_MEMORY_MARKER));
        assert!(prompt.contains(NO_HISTORY_MARKER));
    }

    #[test]
    fn provided_context_is_embedded() {
        let prompt = build_system_prompt(
            "### Content (Similarity: 0.90)\nRefunds take 5 days.",
            "Name: Ada",
            "User: where is my refund?",
        );
        assert!(prompt.contains("Refunds take 5 days."));
        assert!(prompt.contains("Name: Ada"));
        assert!(prompt.contains("User: where is my refund?"));
        assert!(!prompt.contains(NO_KNOWLEDGE_MARKER));
    }

    #[test]
    fn decision_rules_are_stated() {
        let prompt = build_system_prompt("", "", "");
        assert!(prompt.contains("confidence >= 0.85"));
        assert!(prompt.contains("confidence < 0.6"));
        assert!(prompt.contains(r#"sentiment is "negative" AND confidence < 0.7"#));
    }
}
