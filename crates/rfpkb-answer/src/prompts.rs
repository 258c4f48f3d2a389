use rfpkb_core::types::Attribute;

pub const NO_ANSWER: &str = "Insufficient information: the knowledge base does not contain enough information to answer this question.";

pub fn rag_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the RFP question professionally and accurately using only the context below. \
         If the context does not cover part of the question, say so rather than guessing.\n\n\
         Context:\n{}\n\nQuestion: {}\n\nAnswer:",
        context, question
    )
}

pub fn attribute_prompt(question: &str, attribute: &Attribute) -> String {
    format!(
        "Answer the RFP question in one or two professional sentences using this verified company fact.\n\n\
         Fact ({}): {} = {}\n\nQuestion: {}\n\nAnswer:",
        attribute.category, attribute.key, attribute.value, question
    )
}

pub const QUALITY_SYSTEM: &str = "You grade answers to RFP questions. Answer with a single JSON object.";

pub fn quality_prompt(question: &str, answer: &str) -> String {
    format!(
        "Rate how completely and specifically the answer addresses the question, from 0 (useless) to 100 (complete).\n\n\
         Question: {}\n\nAnswer: {}\n\nRespond with JSON: {{\"score\": <0-100>}}",
        question, answer
    )
}
