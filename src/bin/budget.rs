use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use time::{Date, OffsetDateTime};
use tracing_subscriber::EnvFilter;

use budget_tracker::{
    CategoryData, CategoryName, DateRange, Error, TransactionData, TransactionKind,
    aggregation::{category_breakdown, monthly_summary},
    backend::RemoteBackend,
    category::find_by_name,
    config::ClientConfig,
    session::{AuthResult, SessionManager, SessionOptions},
    storage::{FileStore, LocalStorage},
    transaction::parse_date,
    user::ProfileUpdate,
};

type Session = SessionManager<RemoteBackend, FileStore>;

/// Track income and expenses from the command line.
///
/// Sign in with demo@budgettracker.com and the password demo1234 to try it out without a
/// server. The demo account's data stays on this device.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and sign in.
    Register {
        /// The name shown in the app.
        #[arg(long)]
        name: String,
        /// The email address to sign in with.
        #[arg(long)]
        email: String,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Sign in to an existing account.
    Login {
        /// The email address of the account.
        #[arg(long)]
        email: String,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Sign out and clear the data cached on this device.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Exchange the refresh token for a new session.
    Refresh,
    /// Send a new email confirmation token.
    ResendConfirmation {
        /// The email address of the unconfirmed account.
        #[arg(long)]
        email: String,
    },
    /// Update the profile of the signed-in user.
    Profile {
        /// The new display name.
        #[arg(long)]
        name: Option<String>,
        /// The date of birth, YYYY-MM-DD.
        #[arg(long, value_parser = parse_date_arg)]
        date_of_birth: Option<Date>,
        /// A government or bank identity number.
        #[arg(long)]
        identity_number: Option<String>,
    },
    /// Manage categories.
    #[command(subcommand)]
    Categories(CategoryCommand),
    /// Manage transactions.
    #[command(subcommand)]
    Transactions(TransactionCommand),
    /// Summarize a month's income and expenses.
    Summary {
        /// Any day in the month to summarize, defaults to today.
        #[arg(long, value_parser = parse_date_arg)]
        month: Option<Date>,
    },
    /// Show or set the overall monthly spending limit.
    #[command(subcommand)]
    Budget(BudgetCommand),
    /// Manage bill reminders.
    #[command(subcommand)]
    Reminders(ReminderCommand),
    /// Manage the shopping cart.
    #[command(subcommand)]
    Cart(CartCommand),
}

#[derive(Args, Debug)]
struct PasswordArg {
    /// The password, prompted for if not given.
    #[arg(long, env = "BUDGET_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl PasswordArg {
    fn resolve(self) -> std::io::Result<String> {
        match self.password {
            Some(password) => Ok(password),
            None => rpassword::prompt_password("Password: "),
        }
    }
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// List the categories.
    List,
    /// Create a category.
    Add {
        /// The category name, unique per type.
        name: String,
        /// "income" or "expense".
        #[arg(long)]
        kind: TransactionKind,
        /// The display color.
        #[arg(long)]
        color: Option<String>,
        /// The display icon.
        #[arg(long)]
        icon: Option<String>,
        /// The monthly budget for the category.
        #[arg(long)]
        budget: Option<f64>,
    },
    /// Delete a category, keeping its transactions.
    Delete {
        /// The category ID.
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum TransactionCommand {
    /// List transactions, newest first.
    List {
        /// The first date to include, YYYY-MM-DD.
        #[arg(long, value_parser = parse_date_arg)]
        start: Option<Date>,
        /// The last date to include, YYYY-MM-DD.
        #[arg(long, value_parser = parse_date_arg)]
        end: Option<Date>,
    },
    /// Record a transaction.
    Add {
        /// "income" or "expense".
        #[arg(long)]
        kind: TransactionKind,
        /// The amount, must be positive.
        #[arg(long)]
        amount: f64,
        /// The category name.
        #[arg(long)]
        category: Option<String>,
        /// What the transaction was for.
        #[arg(long, default_value = "")]
        description: String,
        /// When the transaction happened, defaults to today.
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
    },
    /// Delete a transaction.
    Delete {
        /// The transaction ID.
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    /// Show the monthly spending limit.
    Show,
    /// Set the monthly spending limit.
    Set {
        /// The limit, zero or more.
        amount: f64,
    },
}

#[derive(Subcommand, Debug)]
enum ReminderCommand {
    /// List unpaid reminders, soonest first.
    List,
    /// Add a reminder.
    Add {
        /// What the bill is for.
        title: String,
        /// How much is due.
        #[arg(long)]
        amount: f64,
        /// When the bill is due, YYYY-MM-DD.
        #[arg(long, value_parser = parse_date_arg)]
        due: Date,
    },
    /// Mark a reminder as paid.
    Pay {
        /// The reminder ID.
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum CartCommand {
    /// List the cart and its total.
    List,
    /// Add an item.
    Add {
        /// The item name.
        name: String,
        /// The price of one item.
        #[arg(long)]
        price: f64,
        /// How many to buy.
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove an item.
    Remove {
        /// The item ID.
        id: i64,
    },
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    parse_date(raw).map_err(|error| error.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn open_session(config: &ClientConfig) -> Result<Session, Error> {
    let storage = LocalStorage::open(FileStore::open(&config.data_dir)?)?.shared();
    let backend = RemoteBackend::new(&config.api_url, &config.api_key)?;

    Ok(SessionManager::new(backend, storage).with_options(SessionOptions {
        offline: config.offline,
        ..Default::default()
    }))
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env();
    let session = open_session(&config)?;

    match command {
        Command::Register {
            name,
            email,
            password,
        } => {
            let result = session.register(&name, &email, &password.resolve()?).await;
            report(result, "Registered")?;
        }
        Command::Login { email, password } => {
            let result = session.login(&email, &password.resolve()?).await;
            report(result, "Logged in")?;
        }
        Command::Logout => report(session.logout().await, "Logged out")?,
        Command::Whoami => match session.current_user() {
            Some(user) => println!(
                "{} <{}> (ID {}, profile {})",
                user.name,
                user.email,
                user.id,
                if user.profile_complete {
                    "complete"
                } else {
                    "incomplete"
                }
            ),
            None => println!("Not logged in."),
        },
        Command::Refresh => report(session.refresh_session().await, "Session refreshed")?,
        Command::ResendConfirmation { email } => report(
            session.resend_confirmation(&email).await,
            "Sent a new confirmation token",
        )?,
        Command::Profile {
            name,
            date_of_birth,
            identity_number,
        } => {
            let update = ProfileUpdate {
                display_name: name,
                date_of_birth,
                identity_number,
            };
            let profile = session.update_profile(&update).await?;
            println!(
                "Updated profile for {}, profile {}.",
                profile.display_name,
                if profile.profile_complete {
                    "complete"
                } else {
                    "incomplete"
                }
            );
        }
        Command::Categories(command) => run_category_command(&session, command).await?,
        Command::Transactions(command) => run_transaction_command(&session, command).await?,
        Command::Summary { month } => {
            let month = month.unwrap_or_else(today);
            let ledger = session.ledger()?;
            let transactions = ledger.transactions(None).await?;
            let categories = ledger.categories().await?;
            let monthly_budget = session.planner().monthly_budget()?;

            let summary = monthly_summary(&transactions, month, monthly_budget);
            println!("{} {}", summary.month.month(), summary.month.year());
            println!("  Income:   {:>10.2}", summary.totals.income);
            println!("  Expenses: {:>10.2}", summary.totals.expenses);
            println!("  Net:      {:>10.2}", summary.totals.net());
            if let Some(change) = summary.expense_change_percent {
                println!("  Expenses vs last month: {change:+.1}%");
            }
            if let Some(percent) = summary.budget_percent {
                println!("  Budget used: {percent:.1}%");
            }

            let month_transactions: Vec<_> = transactions
                .into_iter()
                .filter(|transaction| DateRange::month_of(month).contains(transaction.date))
                .collect();
            println!("Spending by category:");
            for spend in category_breakdown(&month_transactions, &categories, TransactionKind::Expense)
            {
                print!("  {:<16} {:>10.2} {:>5.1}%", spend.name, spend.total, spend.share_percent);
                match spend.budget_percent {
                    Some(percent) => println!(" ({percent:.0}% of budget)"),
                    None => println!(),
                }
            }
        }
        Command::Budget(BudgetCommand::Show) => match session.planner().monthly_budget()? {
            Some(budget) => println!("Monthly budget: {budget:.2}"),
            None => println!("No monthly budget set."),
        },
        Command::Budget(BudgetCommand::Set { amount }) => {
            session.planner().set_monthly_budget(amount)?;
            println!("Monthly budget set to {amount:.2}.");
        }
        Command::Reminders(command) => {
            let planner = session.planner();
            match command {
                ReminderCommand::List => {
                    for reminder in planner.reminders()? {
                        println!(
                            "{:>4}  {}  {:>10.2}  {}",
                            reminder.id, reminder.due_date, reminder.amount, reminder.title
                        );
                    }
                }
                ReminderCommand::Add { title, amount, due } => {
                    let reminder = planner.add_reminder(&title, amount, due, None)?;
                    println!("Added reminder {}.", reminder.id);
                }
                ReminderCommand::Pay { id } => {
                    let paid = planner.pay_reminder(id)?;
                    println!("Paid \"{}\".", paid.reminder.title);
                }
            }
        }
        Command::Cart(command) => {
            let planner = session.planner();
            match command {
                CartCommand::List => {
                    for item in planner.cart_items()? {
                        println!(
                            "{:>4}  {:<20} {:>3} x {:>8.2}",
                            item.id, item.name, item.quantity, item.price
                        );
                    }
                    println!("Total: {:.2}", planner.cart_total()?);
                }
                CartCommand::Add {
                    name,
                    price,
                    quantity,
                } => {
                    let item = planner.add_cart_item(&name, price, quantity)?;
                    println!("Added {} to the cart.", item.name);
                }
                CartCommand::Remove { id } => {
                    if planner.remove_cart_item(id)? {
                        println!("Removed item {id}.");
                    } else {
                        println!("There is no item {id} in the cart.");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run_category_command(session: &Session, command: CategoryCommand) -> Result<(), Error> {
    let ledger = session.ledger()?;

    match command {
        CategoryCommand::List => {
            for category in ledger.categories().await? {
                let budget = category
                    .budget
                    .map(|budget| format!("{budget:.2}"))
                    .unwrap_or_default();
                println!(
                    "{:>4}  {:<8} {:<16} {}",
                    category.id,
                    category.kind.as_str(),
                    category.name.as_ref(),
                    budget
                );
            }
        }
        CategoryCommand::Add {
            name,
            kind,
            color,
            icon,
            budget,
        } => {
            let mut data = CategoryData::new(CategoryName::new(&name)?, kind).budget(budget);
            if let Some(color) = color {
                data.color = color;
            }
            if let Some(icon) = icon {
                data.icon = icon;
            }

            let category = ledger.create_category(data).await?;
            println!("Created category {} ({}).", category.name, category.id);
        }
        CategoryCommand::Delete { id } => {
            ledger.delete_category(id).await?;
            println!("Deleted category {id}.");
        }
    }

    Ok(())
}

async fn run_transaction_command(
    session: &Session,
    command: TransactionCommand,
) -> Result<(), Error> {
    let ledger = session.ledger()?;

    match command {
        TransactionCommand::List { start, end } => {
            let range = match (start, end) {
                (None, None) => None,
                (start, end) => {
                    let start = start.or(end).unwrap_or_else(today);
                    Some(DateRange::new(start, end.unwrap_or(start))?)
                }
            };

            let categories = ledger.categories().await?;
            for transaction in ledger.transactions(range).await? {
                let category = transaction
                    .category_id
                    .and_then(|id| categories.iter().find(|category| category.id == id))
                    .map(|category| category.name.to_string())
                    .unwrap_or_default();

                println!(
                    "{:>4}  {}  {:<8} {:>10.2}  {:<16} {}",
                    transaction.id,
                    transaction.date,
                    transaction.kind.as_str(),
                    transaction.amount,
                    category,
                    transaction.description
                );
            }
        }
        TransactionCommand::Add {
            kind,
            amount,
            category,
            description,
            date,
        } => {
            let category_id = match category {
                Some(name) => {
                    let categories = ledger.categories().await?;
                    let category = find_by_name(&categories, &name, Some(kind))
                        .ok_or(Error::InvalidCategory(None))?;
                    Some(category.id)
                }
                None => None,
            };

            let data = TransactionData::new(kind, amount, date.unwrap_or_else(today))?
                .category(category_id)
                .description(&description);

            let transaction = ledger.create_transaction(data).await?;
            println!("Recorded transaction {}.", transaction.id);
        }
        TransactionCommand::Delete { id } => {
            ledger.delete_transaction(id).await?;
            println!("Deleted transaction {id}.");
        }
    }

    Ok(())
}

fn report(result: AuthResult, success_message: &str) -> Result<(), Box<dyn std::error::Error>> {
    if result.confirmation_pending {
        println!("Check your email to confirm your account, then log in.");
        return Ok(());
    }

    if !result.success {
        return Err(result
            .error
            .unwrap_or_else(|| "the request failed".to_owned())
            .into());
    }

    match result.user {
        Some(user) => println!("{success_message} as {} <{}>.", user.name, user.email),
        None => println!("{success_message}."),
    }

    Ok(())
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
