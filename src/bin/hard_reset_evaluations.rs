//! Deletes all evaluations and summaries after typed confirmation.

use peer_evaluation::{
    admin,
    store::{EVALUATIONS_COLLECTION, SUMMARIZED_EVALUATIONS_COLLECTION},
};
use std::io;
use std::process::ExitCode;

const WARNING: &str = "
!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!
!!! WARNING: DESTRUCTIVE OPERATION AHEAD                    !!!
!!! This program will permanently delete ALL data from:     !!!
!!!   - 'evaluations' collection                            !!!
!!!   - 'summarized_evaluations' collection                 !!!
!!!                                                         !!!
!!! THERE IS NO UNDO. Ensure you have backups if needed.    !!!
!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!
";

#[tokio::main]
async fn main() -> ExitCode {
    let db = match admin::connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error initializing database connection: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", WARNING);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let plan = match admin::ask_reset_plan(&mut input, &mut output) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Prompt failed: {}. Run this program in a standard terminal.", e);
            return ExitCode::SUCCESS;
        }
    };

    if !plan.deletes_anything() {
        println!("\nNo data was deleted. Operation cancelled or no deletions selected.");
        return ExitCode::SUCCESS;
    }

    let targets = [
        (plan.delete_evaluations, EVALUATIONS_COLLECTION),
        (plan.delete_summaries, SUMMARIZED_EVALUATIONS_COLLECTION),
    ];
    for (selected, collection) in targets {
        if !selected {
            println!("\nSkipping deletion of '{}' collection as per user choice.", collection);
            continue;
        }
        println!("\nProceeding with deletion of '{}' collection...", collection);
        if let Err(e) = admin::delete_collection(&db, collection).await {
            eprintln!("An error occurred during the hard reset process: {:#}", e);
            return ExitCode::SUCCESS;
        }
    }

    if plan.bump_reset_marker {
        match admin::bump_reset_marker(&db).await {
            Ok(marker) => println!("\nReset marker updated to {}.", marker),
            Err(e) => eprintln!("Failed to update the reset marker: {:#}", e),
        }
    }

    println!("\nAll requested deletions completed.");
    ExitCode::SUCCESS
}
