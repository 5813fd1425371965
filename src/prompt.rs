/// Reply the model is told to give when the context has no answer.
pub const FALLBACK_ANSWER: &str =
    "I am sorry, but I cannot find that specific information in the provided legal documents.";

const INSTRUCTIONS: &str = "You are a precise legal AI assistant specializing in vehicle laws and compliance in India.
Your answers must be based ONLY on the following context from verified legal sources.

If the answer cannot be found in the provided context, reply exactly:";

/// Fill the legal-assistant template with retrieved context and the question.
pub fn render(context: &str, question: &str) -> String {
    format!(
        "{}\n\"{}\"\n\nCONTEXT:\n{}\n\nQUESTION:\n{}\n\nHELPFUL ANSWER:\n",
        INSTRUCTIONS,
        FALLBACK_ANSWER,
        context,
        question.trim()
    )
}

/// Final string step of the chain.
pub fn parse_output(raw: &str) -> String {
    raw.trim().to_string()
}
