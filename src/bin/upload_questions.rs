//! Replaces the `questions` collection with the built-in question bank.

use peer_evaluation::{admin, seeds::questions_seed};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let db = match admin::connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error initializing database connection: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match questions_seed::upload_questions(&db).await {
        Ok((categories, questions)) => {
            println!(
                "All questions uploaded successfully! {} categories, {} questions.",
                categories, questions
            );
        }
        Err(e) => eprintln!("Error uploading questions: {:#}", e),
    }
    ExitCode::SUCCESS
}
