use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use rust_decimal::Decimal;
use std::process;

use bluebank_ledger::{config, Ledger, Store};

mod cli;

/// BlueBank - terminal front end for the retail banking ledger
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Sets the configuration file
    #[clap(short, long, value_name = "FILE", default_value = "config.toml")]
    config: String,

    /// Turn debugging information on
    #[clap(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[clap(subcommand)]
        command: UserCommands,
    },

    /// Account management commands
    Account {
        #[clap(subcommand)]
        command: AccountCommands,
    },

    /// Interac e-Transfer commands
    Interac {
        #[clap(subcommand)]
        command: InteracCommands,
    },

    /// Credit card commands
    Card {
        #[clap(subcommand)]
        command: CardCommands,
    },

    /// Bill payment commands
    Bill {
        #[clap(subcommand)]
        command: BillCommands,
    },

    /// Interest commands
    Interest {
        #[clap(subcommand)]
        command: InterestCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a new user
    Create {
        /// Email address
        #[clap(short, long)]
        email: String,

        /// Display name
        #[clap(short, long)]
        username: String,

        /// Date of birth (YYYY-MM-DD)
        #[clap(long)]
        dob: Option<NaiveDate>,
    },

    /// Show a user
    Show {
        /// User ID
        #[clap(long)]
        user_id: i64,
    },

    /// Delete a user and everything they own
    Delete {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Skip the confirmation prompt
        #[clap(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Open a new account
    Open {
        /// Owner's user ID
        #[clap(long)]
        user_id: i64,

        /// Account type (chequing, savings, or any other label)
        #[clap(short = 't', long, default_value = "chequing")]
        account_type: String,

        /// Opening balance
        #[clap(short, long, default_value = "0")]
        balance: Decimal,

        /// Annual interest rate; savings accounts default to the configured rate
        #[clap(short, long)]
        rate: Option<Decimal>,
    },

    /// Deposit money into an account
    Deposit {
        /// Account ID
        #[clap(long)]
        account_id: i64,

        /// Amount to deposit
        #[clap(short, long)]
        amount: Decimal,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Account ID
        #[clap(long)]
        account_id: i64,

        /// Amount to withdraw
        #[clap(short, long)]
        amount: Decimal,
    },

    /// Transfer money between accounts
    Transfer {
        /// Source account ID
        #[clap(long)]
        from: i64,

        /// Destination account ID
        #[clap(long)]
        to: i64,

        /// Amount to transfer
        #[clap(short, long)]
        amount: Decimal,
    },

    /// List a user's accounts
    List {
        /// User ID
        #[clap(long)]
        user_id: i64,
    },

    /// Show an account's transaction history
    History {
        /// Account ID
        #[clap(long)]
        account_id: i64,

        /// Maximum number of transactions to show
        #[clap(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show total and savings balances for a user
    Overview {
        /// User ID
        #[clap(long)]
        user_id: i64,
    },

    /// Check an account's balance against its transaction history
    Reconcile {
        /// Account ID
        #[clap(long)]
        account_id: i64,
    },
}

#[derive(Subcommand)]
enum InteracCommands {
    /// Register an email address for receiving transfers
    Register {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Account that receives the money
        #[clap(long)]
        account_id: i64,

        /// Email address
        #[clap(short, long)]
        email: String,
    },

    /// Send an Interac e-Transfer
    Send {
        /// Source account ID
        #[clap(long)]
        from: i64,

        /// Recipient's registered email
        #[clap(short, long)]
        email: String,

        /// Amount to send
        #[clap(short, long)]
        amount: Decimal,
    },

    /// List a user's registered emails
    List {
        /// User ID
        #[clap(long)]
        user_id: i64,
    },
}

#[derive(Subcommand)]
enum CardCommands {
    /// Issue a new credit card
    Issue {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Requested credit limit
        #[clap(short, long, default_value = "2000")]
        limit: Decimal,
    },

    /// Charge a purchase to a card
    Spend {
        /// Card ID
        #[clap(long)]
        card_id: i64,

        /// Purchase amount
        #[clap(short, long)]
        amount: Decimal,
    },

    /// Pay down a card from an account
    Pay {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Source account ID
        #[clap(long)]
        from: i64,

        /// Card ID
        #[clap(long)]
        card_id: i64,

        /// Payment amount
        #[clap(short, long)]
        amount: Decimal,
    },

    /// List a user's cards
    List {
        /// User ID
        #[clap(long)]
        user_id: i64,
    },

    /// Freeze a card
    Freeze {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Card ID
        #[clap(long)]
        card_id: i64,
    },

    /// Unfreeze a card
    Unfreeze {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Card ID
        #[clap(long)]
        card_id: i64,
    },
}

#[derive(Subcommand)]
enum BillCommands {
    /// Add a payee to the directory
    AddPayee {
        /// Payee name
        #[clap(short, long)]
        name: String,

        /// Payee category
        #[clap(short, long)]
        category: Option<String>,
    },

    /// List all payees
    Payees {},

    /// Pay a bill
    Pay {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Source account ID
        #[clap(long)]
        from: i64,

        /// Payee ID
        #[clap(long)]
        payee_id: i64,

        /// Payment amount
        #[clap(short, long)]
        amount: Decimal,

        /// Payment reference
        #[clap(short, long)]
        reference: Option<String>,
    },

    /// Show a user's bill payments
    History {
        /// User ID
        #[clap(long)]
        user_id: i64,

        /// Maximum number of payments to show
        #[clap(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum InterestCommands {
    /// Credit any interest due on a user's accounts
    Apply {
        /// User ID
        #[clap(long)]
        user_id: i64,
    },
}

fn open_ledger() -> anyhow::Result<Ledger> {
    let config = config::get_config();
    let store = Store::open(&config.database)?;
    Ok(Ledger::new(store, config.ledger))
}

fn run(ledger: &Ledger, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::User { command } => match command {
            UserCommands::Create { email, username, dob } => cli::user::create_user(ledger, email, username, *dob),
            UserCommands::Show { user_id } => cli::user::show_user(ledger, *user_id),
            UserCommands::Delete { user_id, yes } => cli::user::delete_user(ledger, *user_id, *yes),
        },
        Commands::Account { command } => match command {
            AccountCommands::Open { user_id, account_type, balance, rate } => {
                cli::account::open_account(ledger, *user_id, account_type, *balance, *rate)
            }
            AccountCommands::Deposit { account_id, amount } => cli::account::deposit(ledger, *account_id, *amount),
            AccountCommands::Withdraw { account_id, amount } => cli::account::withdraw(ledger, *account_id, *amount),
            AccountCommands::Transfer { from, to, amount } => cli::account::transfer(ledger, *from, *to, *amount),
            AccountCommands::List { user_id } => cli::account::list_accounts(ledger, *user_id),
            AccountCommands::History { account_id, limit } => cli::account::show_history(ledger, *account_id, *limit),
            AccountCommands::Overview { user_id } => cli::account::show_overview(ledger, *user_id),
            AccountCommands::Reconcile { account_id } => cli::account::reconcile(ledger, *account_id),
        },
        Commands::Interac { command } => match command {
            InteracCommands::Register { user_id, account_id, email } => {
                cli::payments::register_interac(ledger, *user_id, *account_id, email)
            }
            InteracCommands::Send { from, email, amount } => cli::payments::send_interac(ledger, *from, email, *amount),
            InteracCommands::List { user_id } => cli::payments::list_interac(ledger, *user_id),
        },
        Commands::Card { command } => match command {
            CardCommands::Issue { user_id, limit } => cli::payments::issue_card(ledger, *user_id, *limit),
            CardCommands::Spend { card_id, amount } => cli::payments::spend(ledger, *card_id, *amount),
            CardCommands::Pay { user_id, from, card_id, amount } => {
                cli::payments::pay_card(ledger, *user_id, *from, *card_id, *amount)
            }
            CardCommands::List { user_id } => cli::payments::list_cards(ledger, *user_id),
            CardCommands::Freeze { user_id, card_id } => cli::payments::freeze_card(ledger, *user_id, *card_id, true),
            CardCommands::Unfreeze { user_id, card_id } => cli::payments::freeze_card(ledger, *user_id, *card_id, false),
        },
        Commands::Bill { command } => match command {
            BillCommands::AddPayee { name, category } => cli::payments::add_payee(ledger, name, category.as_deref()),
            BillCommands::Payees {} => cli::payments::list_payees(ledger),
            BillCommands::Pay { user_id, from, payee_id, amount, reference } => {
                cli::payments::pay_bill(ledger, *user_id, *from, *payee_id, *amount, reference.as_deref())
            }
            BillCommands::History { user_id, limit } => cli::payments::bill_history(ledger, *user_id, *limit),
        },
        Commands::Interest { command } => match command {
            InterestCommands::Apply { user_id } => cli::account::apply_interest(ledger, *user_id),
        },
    }
}

fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.debug {
        0 => log::set_max_level(log::LevelFilter::Info),
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    info!("Starting BlueBank");

    // Initialize config from the provided file
    match config::load_config(&cli.config) {
        Ok(_) => {
            info!("Configuration loaded successfully");
        }
        Err(err) => {
            error!("Failed to load configuration: {}", err);
            process::exit(1);
        }
    }

    // Open the store and run any pending migrations
    let ledger = match open_ledger() {
        Ok(ledger) => ledger,
        Err(err) => {
            error!("Failed to initialize database: {:#}", err);
            process::exit(1);
        }
    };

    if let Err(err) = run(&ledger, &cli.command) {
        error!("{:#}", err);
        process::exit(1);
    }
}
