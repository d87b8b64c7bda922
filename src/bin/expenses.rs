use std::{fs::OpenOptions, path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand, ValueEnum};
use time::{Date, macros::format_description};
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use expense_tracker::{
    Category, Day, EXPENSE_ADDED_MESSAGE, Error, Expense, ExpenseStore, LocalTimezone,
    SQLAppState, category_totals, daily_total, daily_totals, export_last_seven_days, now_millis,
    open_app_state, write_export,
};

/// Record and report on daily expenses.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, default_value = "expenses.db")]
    db_path: PathBuf,

    /// The canonical timezone that decides which day an expense belongs to,
    /// e.g. "Pacific/Auckland". Defaults to the system's current UTC offset.
    #[arg(long)]
    timezone: Option<String>,

    /// Also write debug logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new expense.
    Add {
        /// What the money was spent on.
        #[arg(long)]
        title: String,

        /// How much was spent.
        #[arg(long)]
        amount: f64,

        /// One of Staff, Travel, Food or Utility.
        #[arg(long, value_parser = parse_category, default_value = "Food")]
        category: Category,

        /// Optional notes, at most 100 characters.
        #[arg(long)]
        notes: Option<String>,

        /// A reference to a photo of the receipt.
        #[arg(long)]
        receipt: Option<String>,

        /// The day to file the expense under (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },
    /// List the expenses for a day, most recent first.
    List {
        /// The day to list (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,

        /// Keep running and print the list again whenever it changes.
        #[arg(long)]
        watch: bool,
    },
    /// Show the total spent on a day.
    Total {
        /// The day to total (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,

        /// Break the total down by category.
        #[arg(long)]
        by_category: bool,
    },
    /// Show the total for each of the last few days.
    Report {
        /// How many days to show, ending today.
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Save the last seven days of expenses as a CSV report.
    Export {
        /// The directory to save `expenses_last7days.csv` to.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Show or change the theme preference.
    Theme {
        /// The theme to use from now on.
        #[arg(value_enum)]
        set: Option<Theme>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Theme {
    Dark,
    Light,
}

fn parse_category(text: &str) -> Result<Category, String> {
    text.parse().map_err(|error: Error| error.to_string())
}

fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text, format_description!("[year]-[month]-[day]")).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(error) = setup_logging(args.log_file.as_ref()) {
        eprintln!("Could not set up logging: {error}");
        return ExitCode::FAILURE;
    }

    let local_timezone = match &args.timezone {
        Some(name) => match LocalTimezone::from_name(name) {
            Ok(timezone) => timezone,
            Err(error) => {
                eprintln!("{}", error.user_message());
                return ExitCode::FAILURE;
            }
        },
        None => LocalTimezone::system(),
    };

    let state = match open_app_state(&args.db_path, local_timezone) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("{}", error.user_message());
            return ExitCode::FAILURE;
        }
    };

    match run(&state, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(state: &SQLAppState, command: Command) -> Result<(), Error> {
    match command {
        Command::Add {
            title,
            amount,
            category,
            notes,
            receipt,
            date,
        } => {
            let timestamp = now_millis();
            let day = pick_day(state, date);
            let expense = Expense::build(&title, amount, category, timestamp, day)
                .notes(notes)
                .receipt_uri(receipt);

            state.add_expense(expense)?;
            println!("{EXPENSE_ADDED_MESSAGE}");
        }
        Command::List { date, watch } => {
            let day = pick_day(state, date);

            if watch {
                watch_day(state, day).await?;
            } else {
                print_expenses(state, day, &state.expense_store.query_by_date(day)?);
            }
        }
        Command::Total { date, by_category } => {
            let day = pick_day(state, date);

            if by_category {
                for (category, total) in category_totals(&state.expense_store, day)? {
                    println!("{category:<8} {total:>10.2}");
                }
            }
            println!("Total    {:>10.2}", daily_total(&state.expense_store, day)?);
        }
        Command::Report { days } => {
            let totals = daily_totals(
                &state.expense_store,
                &state.local_timezone,
                state.today(),
                days,
            )?;

            for daily in totals {
                println!(
                    "{}  {:>10.2}",
                    state.local_timezone.date_of(daily.day),
                    daily.total
                );
            }
        }
        Command::Export { output_dir } => {
            let contents = export_last_seven_days(&state.expense_store, now_millis())?;
            let path = write_export(&output_dir, &contents)?;
            println!("Saved report to {}", path.display());
        }
        Command::Theme { set } => {
            let theme = state.theme();

            if let Some(choice) = set {
                theme.set_dark(choice == Theme::Dark)?;
            }

            let name = if theme.is_dark(false)? { "dark" } else { "light" };
            println!("Theme: {name}");
        }
    }

    Ok(())
}

fn pick_day(state: &SQLAppState, date: Option<Date>) -> Day {
    match date {
        Some(date) => state.local_timezone.day_of_date(date),
        None => state.today(),
    }
}

fn print_expenses(state: &SQLAppState, day: Day, expenses: &[Expense]) {
    println!("{}", state.local_timezone.date_of(day));

    if expenses.is_empty() {
        println!("  No expenses");
        return;
    }

    for expense in expenses {
        println!(
            "  #{:<5} {:<24} {:>10.2}  {:<8} {}",
            expense.id,
            expense.title,
            expense.amount,
            expense.category,
            expense.notes.as_deref().unwrap_or_default()
        );
    }
}

/// Print the day's expenses every time they change until interrupted.
async fn watch_day(state: &SQLAppState, day: Day) -> Result<(), Error> {
    let view = state.day_view(day);
    let mut snapshots = view.subscribe();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                match snapshot.error {
                    Some(error) => eprintln!("{}", error.user_message()),
                    None => print_expenses(state, snapshot.day, &snapshot.expenses),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn setup_logging(log_file: Option<&PathBuf>) -> Result<(), std::io::Error> {
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let debug_log = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(filter::LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .init();

    Ok(())
}
