//! Prompt templates for answering, refinement and the plain-completion endpoints

use crate::conversation::Turn;
use crate::providers::ChatMessage;
use crate::retrieval::AttributeInfo;
use crate::types::ScoredEntry;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved chunk texts with blank lines
    pub fn build_context(results: &[ScoredEntry]) -> String {
        results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// System message grounding the answer in the retrieved context
    pub fn build_system_instruction(context: &str) -> String {
        format!(
            "You are an assistant responsible for answering questions about documents. \
             Answer the user's question with a reasonable level of detail based on the \
             following context document(s):\n\n{}",
            context
        )
    }

    /// System instruction, prior turns as user/assistant pairs, then the question
    pub fn build_chat_messages(context: &str, history: &[Turn], question: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(Self::build_system_instruction(context)));
        for turn in history {
            messages.push(ChatMessage::user(turn.question.clone()));
            messages.push(ChatMessage::assistant(turn.answer.clone()));
        }
        messages.push(ChatMessage::user(question));
        messages
    }

    /// Second pass asking the model to improve its first answer
    pub fn build_refine_prompt(context: &str, question: &str, answer: &str) -> String {
        format!(
            "Given this context and question: {context}\n\n\
             Question: {question}\n\n\
             Initial answer: {answer}\n\n\
             Please provide a more refined and detailed answer:",
            context = context,
            question = question,
            answer = answer
        )
    }

    /// Analysis of a freshly uploaded document
    pub fn build_analysis_prompt(document_text: &str) -> String {
        format!("Analyze this document: {}", document_text)
    }

    /// Final `/chat` completion combining the RAG answer with the user's text
    pub fn build_chat_prompt(rag_response: &str, text: &str) -> String {
        format!("Given this context: {}, respond to: {}", rag_response, text)
    }

    /// Build a summarization prompt
    pub fn build_summary_prompt(text: &str) -> String {
        format!(
            r#"Summarize the following text in clear, concise language:

{text}

Summary:"#,
            text = text
        )
    }

    /// Ask the model to turn a question into a search string plus metadata filter
    pub fn build_self_query_prompt(
        question: &str,
        content_description: &str,
        attributes: &[AttributeInfo],
    ) -> String {
        let attributes = attributes
            .iter()
            .map(|a| format!("- {} ({}): {}", a.name, a.attr_type, a.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Your goal is to structure the user's question to match the request schema below.

Return a JSON object with two keys:
- "query": text to compare against document contents, without any filter conditions
- "filter": a filter object, or null when the question sets no conditions

Filter objects use an "op" key:
- comparisons: {{"op": "eq"|"ne"|"gt"|"gte"|"lt"|"lte", "attribute": NAME, "value": VALUE}}
- membership: {{"op": "in", "attribute": NAME, "values": [VALUE, ...]}}
- logic: {{"op": "and"|"or", "filters": [FILTER, ...]}} and {{"op": "not", "filter": FILTER}}

Only use the attributes listed below. Do not invent attributes.

Documents contain: {description}

Attributes:
{attributes}

Example:
Question: What do the PDF files say about budgets?
{{"query": "budgets", "filter": {{"op": "eq", "attribute": "filetype", "value": "pdf"}}}}

Question: {question}
"#,
            description = content_description,
            attributes = attributes,
            question = question
        )
    }
}
