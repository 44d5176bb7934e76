use crate::database::MongoDB;
use crate::models::{Category, Question, User};
use crate::store::{MemoryStore, QUESTIONS_COLLECTION};
use mongodb::bson::{doc, Document};

struct SeedCategory {
    code: &'static str,
    name: &'static str,
    questions: &'static [(&'static str, &'static str)],
}

const QUESTION_BANK: &[SeedCategory] = &[
    SeedCategory {
        code: "A",
        name: "Mechanical Skill & Hero Proficiency",
        questions: &[
            ("A1", "Player demonstrates accurate and consistent aiming."),
            ("A2", "Player utilizes movement mechanics effectively for positioning, dodging, and engagement."),
            ("A3", "Player uses their primary hero's abilities accurately and with good timing."),
            ("A4", "Player demonstrates proficiency across a wide hero pool for their role."),
            ("A5", "Player effectively executes the core mechanics required for their assigned role."),
            ("A6", "Player shows quick reaction times in time-sensitive matchups."),
        ],
    },
    SeedCategory {
        code: "B",
        name: "Game Sense & Strategy",
        questions: &[
            ("B1", "Player demonstrates strong map awareness (enemy positions, objective status, flank routes)."),
            ("B2", "Player understands and plays according to the current objective effectively."),
            ("B3", "Player makes sound decisions regarding positioning during fights and rotations."),
            ("B4", "Player understands character matchups, synergies, and potential team comps."),
            ("B5", "Player effectively manages their ultimate ability (builds it efficiently, uses it impactfully)."),
            ("B6", "Player contributes valuable input to team strategy and potential adjustments."),
            ("B7", "Player understands and tracks ultimate economy and cooldowns."),
        ],
    },
    SeedCategory {
        code: "C",
        name: "Teamwork & Communication",
        questions: &[
            ("C1", "Player communicates clearly, concisely, and provides relevant information (callouts, intentions)."),
            ("C2", "Player actively listens to and processes teammate communication and callouts."),
            ("C3", "Player coordinates effectively with teammates for ability combos and ultimate usage."),
            ("C4", "Player follows team directives and adapts to team calls during a match."),
            ("C5", "Player maintains a positive and constructive attitude within the team environment."),
            ("C6", "Player fulfills their role responsibilities in relation to others (peeling, focusing targets called)."),
        ],
    },
    SeedCategory {
        code: "D",
        name: "Adaptability & Learning",
        questions: &[
            ("D1", "Player adapts their playstyle effectively based on the flow of the game and enemy strategies."),
            ("D2", "Player is receptive to constructive criticism and coaching feedback."),
            ("D3", "Player actively seeks to learn from mistakes (e.g., through VOD review, self-reflection)."),
            ("D4", "Player demonstrates improvement in areas previously identified for development."),
            ("D5", "Player shows willingness to learn new heroes, roles, or strategies as required by the team."),
        ],
    },
    SeedCategory {
        code: "E",
        name: "Attitude & Professionalism",
        questions: &[
            ("E1", "Player maintains composure under pressure and avoids tilt."),
            ("E2", "Player demonstrates commitment and punctuality for practices, scrims, and matches."),
            ("E3", "Player shows respect toward teammates, opponents, and coaching staff."),
            ("E4", "Player contributes positively to team morale."),
            ("E5", "Player displays a strong work ethic and desire to improve."),
            ("E6", "Player adheres to team rules and codes of conduct."),
        ],
    },
];

/// Users created for the in-memory backend so it can be logged into.
const DEMO_USERS: &[(&str, &str)] = &[
    ("Alice", "ALICE2025"),
    ("Bob", "BOB2025"),
    ("Carol", "CAROL2025"),
];

/// The built-in question bank as category documents, each with its questions.
pub fn question_bank() -> Vec<(Category, Vec<Question>)> {
    QUESTION_BANK
        .iter()
        .map(|seed| {
            let questions = seed
                .questions
                .iter()
                .map(|(id, text)| Question::new(*id, seed.code, *text))
                .collect();
            (Category::new(seed.code, seed.name), questions)
        })
        .collect()
}

/// Replaces the `questions` collection with the built-in bank. Each question
/// references its category document by id. Returns (categories, questions).
pub async fn upload_questions(db: &MongoDB) -> anyhow::Result<(usize, usize)> {
    let raw = db.collection::<Document>(QUESTIONS_COLLECTION);
    let cleared = raw.delete_many(doc! {}).await?;
    log::info!("🗑️  Existing questions cleared: {}", cleared.deleted_count);

    let categories = db.collection::<Category>(QUESTIONS_COLLECTION);
    let questions = db.collection::<Question>(QUESTIONS_COLLECTION);
    let mut question_total = 0;
    let bank = question_bank();

    for (category, mut category_questions) in bank.iter().cloned() {
        let inserted = categories.insert_one(&category).await?;
        let category_id = inserted
            .inserted_id
            .as_object_id()
            .map(|id| id.to_hex())
            .ok_or_else(|| anyhow::anyhow!("Category {} got a non-ObjectId id", category.code))?;
        log::info!("   ✅ Category added: {}", category.name);

        for question in category_questions.iter_mut() {
            question.category_id = category_id.clone();
        }
        questions.insert_many(&category_questions).await?;
        question_total += category_questions.len();
        log::info!(
            "   ✅ Added {} questions for category: {}",
            category_questions.len(),
            category.name
        );
    }

    Ok((bank.len(), question_total))
}

/// Fills an empty in-memory store with the question bank and demo users.
pub fn seed_memory_store(store: &MemoryStore) {
    for (category, questions) in question_bank() {
        store.add_category(category);
        for question in questions {
            store.add_question(question);
        }
    }
    for (name, code) in DEMO_USERS {
        store.add_user(User::new(*name, *code));
    }
    log::info!(
        "🌱 In-memory store seeded: {} categories, {} users",
        QUESTION_BANK.len(),
        DEMO_USERS.len()
    );
}
