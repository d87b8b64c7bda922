use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;

use expense_tracker::{
    Category, Expense, LocalTimezone, MILLIS_PER_DAY, now_millis, open_app_state,
};

/// A utility for creating a test database for the expense tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Title, amount, category and notes of the sample expenses added to each day.
const SAMPLES: [(&str, f64, Category, Option<&str>); 4] = [
    ("Coffee", 4.5, Category::Food, None),
    ("Bus fare", 3.2, Category::Travel, Some("Commute")),
    ("Lunch", 18.0, Category::Food, Some("Team lunch, Friday special")),
    ("Phone bill", 59.99, Category::Utility, None),
];

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let timezone = LocalTimezone::system();
    let state = open_app_state(output_path, timezone)?;

    println!("Creating a week of sample expenses...");

    let now = now_millis();
    let mut count = 0;

    for days_ago in 0..7 {
        // Skip every other sample on odd days so the daily totals differ.
        for (i, (title, amount, category, notes)) in SAMPLES.iter().enumerate() {
            if days_ago % 2 == 1 && i % 2 == 1 {
                continue;
            }

            let timestamp = now - days_ago * MILLIS_PER_DAY - i as i64 * 60 * 60 * 1000;
            let expense = Expense::build(
                title,
                *amount,
                *category,
                timestamp,
                timezone.start_of_day(timestamp),
            )
            .notes(notes.map(str::to_owned));

            state.add_expense(expense)?;
            count += 1;
        }
    }

    state.theme().set_dark(false)?;

    println!("Added {count} expenses. Success!");

    Ok(())
}
