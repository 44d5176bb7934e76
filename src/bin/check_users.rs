//! Lists users and settings, and checks which peers one user would see.
//! The checked code comes from `CHECK_USER_CODE` (default `ALICE2025`).

use peer_evaluation::admin;
use std::process::ExitCode;

const DEFAULT_CHECK_CODE: &str = "ALICE2025";

#[tokio::main]
async fn main() -> ExitCode {
    let db = match admin::connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error initializing database connection: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let code = std::env::var("CHECK_USER_CODE").unwrap_or_else(|_| DEFAULT_CHECK_CODE.to_string());

    println!("\n----- LISTING ALL USERS IN DATABASE -----\n");
    let users = match admin::load_users(&db).await {
        Ok(users) => users,
        Err(e) => {
            eprintln!("Error listing users: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if users.is_empty() {
        println!("No users found in the database");
    } else {
        println!("Found {} users in the database:\n", users.len());
        for user in &users {
            println!("ID: {}", user.id_hex());
            println!("Name: {}", if user.name.is_empty() { "N/A" } else { &user.name });
            println!("Code: {}", if user.code.is_empty() { "N/A" } else { &user.code });
            println!("Other fields: {}", admin::other_fields(user).join(", "));
            println!("------------");
        }

        println!("\n----- TESTING PEER FILTERING LOGIC -----\n");
        let report = admin::build_user_report(users, &code);
        match report.checked {
            None => println!("Could not find a user with code {} in the database", code),
            Some((me, peers)) => {
                println!("{} found with ID: {}", me.name, me.id_hex());
                println!("\nPeers that should be available to {}:", me.name);
                for peer in &peers {
                    println!("- {} (ID: {})", peer.display_name(), peer.id_hex());
                }
                if peers.is_empty() {
                    println!("No peers found for {} after filtering", me.name);
                } else {
                    println!("Found {} peers for {}", peers.len(), me.name);
                }
            }
        }
    }

    println!("\n----- CHECKING APP SETTINGS -----\n");
    match admin::load_settings_documents(&db).await {
        Ok(settings) if settings.is_empty() => println!("No app settings found in the database"),
        Ok(settings) => {
            for document in settings {
                println!(
                    "Settings document ID: {}",
                    document.id.map(|id| id.to_hex()).unwrap_or_default()
                );
                println!("isOpen: {}", document.is_open);
                println!("isDebug: {}", document.is_debug);
                println!("resetAllPeers: {:?}", document.reset_all_peers);
                println!("evaluationPeriodId: {}", document.period_id());
            }
        }
        Err(e) => {
            eprintln!("Error checking app settings: {:#}", e);
            return ExitCode::FAILURE;
        }
    }

    println!("\nDiagnostic complete.");
    ExitCode::SUCCESS
}
