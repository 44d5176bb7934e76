use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const CATEGORY_TYPE: &str = "category";
pub const QUESTION_TYPE: &str = "question";

/// A category document in the `questions` collection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<ObjectId>,
    pub code: String,
    pub name: String,
    #[serde(rename = "type", default = "category_type")]
    pub kind: String,
}

fn category_type() -> String {
    CATEGORY_TYPE.to_string()
}

fn question_type() -> String {
    QUESTION_TYPE.to_string()
}

impl Category {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            doc_id: None,
            code: code.into(),
            name: name.into(),
            kind: category_type(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unknown Category"
        } else {
            &self.name
        }
    }
}

/// A question document in the `questions` collection.
/// Scores are keyed by `code` (the document's `id` field, e.g. "A1").
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<ObjectId>,
    #[serde(rename = "id")]
    pub code: String,
    #[serde(default)]
    pub category_id: String,
    pub category_code: String,
    pub text: String,
    #[serde(rename = "type", default = "question_type")]
    pub kind: String,
}

impl Question {
    pub fn new(
        code: impl Into<String>,
        category_code: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: None,
            code: code.into(),
            category_id: String::new(),
            category_code: category_code.into(),
            text: text.into(),
            kind: question_type(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CategoryQuestions {
    pub category: Category,
    pub questions: Vec<Question>,
}

/// Questions grouped under their categories, categories ordered by code.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct CategorizedQuestions {
    pub categories: Vec<CategoryQuestions>,
}

impl CategorizedQuestions {
    /// Groups questions under categories. A question is attached by
    /// `categoryId` when set, otherwise by `categoryCode`. Questions whose
    /// category is unknown are dropped.
    pub fn organize(mut categories: Vec<Category>, mut questions: Vec<Question>) -> Self {
        categories.sort_by(|a, b| a.code.cmp(&b.code));
        questions.sort_by(|a, b| {
            a.category_code
                .cmp(&b.category_code)
                .then_with(|| a.code.cmp(&b.code))
        });

        let mut grouped: Vec<CategoryQuestions> = categories
            .into_iter()
            .map(|category| CategoryQuestions {
                category,
                questions: Vec::new(),
            })
            .collect();

        for question in questions {
            let slot = grouped.iter_mut().find(|group| {
                if question.category_id.is_empty() {
                    group.category.code == question.category_code
                } else {
                    group.category.doc_id.map(|id| id.to_hex()).as_deref()
                        == Some(question.category_id.as_str())
                }
            });
            match slot {
                Some(group) => group.questions.push(question),
                None => log::warn!(
                    "Question {} references unknown category {}",
                    question.code,
                    question.category_code
                ),
            }
        }

        Self { categories: grouped }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn total_questions(&self) -> usize {
        self.categories.iter().map(|group| group.questions.len()).sum()
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.categories.iter().flat_map(|group| group.questions.iter())
    }

    pub fn category_of(&self, question_code: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|group| group.questions.iter().any(|q| q.code == question_code))
            .map(|group| &group.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organize_by_code_and_id() {
        let mut cat_b = Category::new("B", "Game Sense");
        cat_b.doc_id = Some(ObjectId::new());
        let cat_a = Category::new("A", "Mechanics");

        let mut b1 = Question::new("B1", "B", "Map awareness");
        b1.category_id = cat_b.doc_id.unwrap().to_hex();
        let a2 = Question::new("A2", "A", "Movement");
        let a1 = Question::new("A1", "A", "Aim");
        let orphan = Question::new("Z1", "Z", "Nobody owns this");

        let organized =
            CategorizedQuestions::organize(vec![cat_b, cat_a], vec![b1, a2, orphan, a1]);

        assert_eq!(organized.categories.len(), 2);
        assert_eq!(organized.categories[0].category.code, "A");
        let codes: Vec<_> = organized.questions().map(|q| q.code.as_str()).collect();
        assert_eq!(codes, vec!["A1", "A2", "B1"]);
        assert_eq!(organized.total_questions(), 3);
        assert_eq!(organized.category_of("B1").unwrap().name, "Game Sense");
        assert!(organized.category_of("Z1").is_none());
    }
}
