//! Sub-questions and answered question pairs

use serde::{Deserialize, Serialize};

/// Upper bound on sub-questions per run, regardless of what the planner returns
pub const MAX_SUB_QUESTIONS: usize = 5;

/// One decomposed research question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub text: String,
    /// 1-based position in the planner's list
    pub index: usize,
    pub total: usize,
}

impl SubQuestion {
    /// Number a list of planned question texts, 1-based
    pub fn from_texts(texts: Vec<String>) -> Vec<SubQuestion> {
        let total = texts.len();
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| SubQuestion {
                text,
                index: i + 1,
                total,
            })
            .collect()
    }
}

/// A sub-question together with the answer the search model produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}
