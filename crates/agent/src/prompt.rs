//! Prompt assembly for the "stuff" strategy: every retrieved passage goes
//! into a single prompt together with the question.

use helpbot_config::PromptPolicyKind;
use helpbot_core::Document;

/// Generic instruction: answer from context, admit ignorance otherwise.
pub const BASIC_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:";

/// Connector builder instruction with citations and the open-issue caveat.
pub const CITED_TEMPLATE: &str = "You are a question-answering bot operating on Github issues and documentation pages for a product called connector builder. The documentation pages document what can be done, the issues document future plans and bugs. Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer. Always state were you got this information from (and the github issue number if applicable).
If the answer is based on a Github issue that's not closed yet, add 'This issue is not closed yet - the feature might not be shipped yet' to the answer.

{context}

Question: {question}
Helpful Answer:";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";
const PASSAGE_SEPARATOR: &str = "\n\n";

/// Which instruction template to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptPolicy {
    Basic,
    #[default]
    Cited,
}

impl PromptPolicy {
    pub fn template(&self) -> &'static str {
        match self {
            Self::Basic => BASIC_TEMPLATE,
            Self::Cited => CITED_TEMPLATE,
        }
    }
}

impl From<PromptPolicyKind> for PromptPolicy {
    fn from(kind: PromptPolicyKind) -> Self {
        match kind {
            PromptPolicyKind::Basic => Self::Basic,
            PromptPolicyKind::Cited => Self::Cited,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler {
    policy: PromptPolicy,
}

impl PromptAssembler {
    pub fn new(policy: PromptPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PromptPolicy {
        self.policy
    }

    /// Render the template with the passages (in order, blank-line
    /// separated) and the question (verbatim). Nothing is truncated.
    pub fn assemble(&self, documents: &[Document], question: &str) -> String {
        let context = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);
        render(self.policy.template(), &context, question)
    }
}

/// Substitute both slots in one left-to-right pass over the template, so
/// slot-like text inside the substituted values is never expanded again.
fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}
