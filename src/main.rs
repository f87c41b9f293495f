mod display;
mod error;
mod export;
mod parser;
mod schedule;
mod state;
mod storage;
mod store;
mod web;

use std::path::Path;

use display::print_roster;
use export::write_roster_json;
use schedule::types::Roster;
use schedule::{parse_schedule_file, ContextDetector, HospitalClassifier, HospitalDirectory, ParserConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Check if we should run in web mode
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "web" {
        let port = args.get(2)
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);
        let password = std::env::var("ADMIN_PASSWORD")
            .unwrap_or_else(|_| "admin123".to_string()); // Default password, change this!
        let data_dir = std::env::var("ROTA_DATA_DIR")
            .unwrap_or_else(|_| "data".to_string());

        println!("Starting web server on port {}...", port);
        println!("Admin password: {}", password);
        println!("Access the site at http://localhost:{}", port);

        web::start_server(port, password, &data_dir).await?;
        return Ok(());
    }

    // CLI mode: parse one schedule export and print the roster
    let path = match args.get(1) {
        Some(path) => path.clone(),
        None => {
            eprintln!("Usage: clinical-rota <schedule.csv|schedule.xlsx>");
            eprintln!("       clinical-rota web [port]");
            std::process::exit(1);
        }
    };

    println!("Loading schedule from {}...", path);
    let classifier = HospitalClassifier::standard();
    let detector = ContextDetector::standard();
    let parsed = parse_schedule_file(&path, &ParserConfig::default(), &classifier, &detector)?;

    println!("Found {} dated columns", parsed.date_columns.len());

    let roster = Roster {
        total_students: parsed.total_students,
        students: parsed.students,
        date_range: parsed.date_range,
    };
    let directory = HospitalDirectory::standard();
    print_roster(&roster, directory.review_color());

    let out_path = "updated_schedule.json";
    write_roster_json(Path::new(out_path), &roster.students)?;
    println!("\nSchedule written to {}", out_path);

    Ok(())
}
