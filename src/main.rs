use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use billing_admin::allocation::{self, parse_allocation_input, AllocationDraft, AllocationPath};
use billing_admin::backend::RestBackend;
use billing_admin::config::{config_dir, init_config_dir, load_config, resolve_actor, Config};
use billing_admin::dossier;
use billing_admin::model::{
    sort_for_display, AllocationMode, InvoiceQuery, NewCashSettlement, NewPayment, PaymentMethod,
    PaymentStatus,
};
use billing_admin::money::{format_money, parse_amount};
use billing_admin::{Actor, BillingError, Repository, Result};

#[derive(Parser)]
#[command(name = "billing")]
#[command(version, about = "Billing administration: payments, allocations and cash settlements", long_about = None)]
struct Cli {
    /// Path to config directory (default: XDG config dir or ~/.billing)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Operator recorded on changes (overrides BILLING_ACTOR and config)
    #[arg(long = "as", value_name = "NAME", global = true)]
    actor: Option<String>,

    /// Log backend requests to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with a template config.toml
    Init,

    /// Show configuration summary
    Status,

    /// List dossiers and their allocation mode
    Dossiers {
        /// Only dossiers of this customer
        #[arg(long)]
        customer: Option<String>,
    },

    /// Show or change the allocation mode of a dossier
    Mode {
        /// Dossier reference or id
        dossier: String,

        /// New mode: manual or automatic
        #[arg(long, conflicts_with = "toggle")]
        set: Option<String>,

        /// Switch between manual and automatic
        #[arg(long)]
        toggle: bool,
    },

    /// List open invoices
    Invoices {
        /// Only invoices of this customer
        #[arg(long)]
        customer: Option<String>,

        /// Include partially paid invoices
        #[arg(long)]
        include_partial: bool,
    },

    /// List recorded payments
    Payments {
        /// Only payments of this customer
        #[arg(long)]
        customer: Option<String>,
    },

    /// Record a payment
    Pay {
        /// Customer id
        #[arg(long)]
        customer: String,

        /// Payment amount
        #[arg(long)]
        amount: String,

        /// transfer, check, card, cash or other
        #[arg(long)]
        method: String,

        /// Bank or check reference
        #[arg(long)]
        reference: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Payment date (default: today)
        #[arg(long)]
        date: Option<String>,

        /// Dossier whose allocation mode applies
        #[arg(long)]
        dossier: Option<String>,

        /// Do not request automatic allocation
        #[arg(long)]
        no_auto: bool,

        /// Manual allocation in format "invoice:amount" (can be repeated).
        /// Required on the manual path unless --defer is given
        #[arg(short, long, value_name = "INVOICE:AMOUNT")]
        line: Vec<String>,

        /// On the manual path, record the payment unallocated and allocate later
        #[arg(long, conflicts_with = "line")]
        defer: bool,
    },

    /// Allocate a payment to invoices manually
    Allocate {
        /// Payment id
        payment: String,

        /// Allocation in format "invoice:amount" (can be repeated)
        #[arg(short, long, value_name = "INVOICE:AMOUNT")]
        line: Vec<String>,

        /// Then allocate whatever remains automatically
        #[arg(long)]
        rest: bool,
    },

    /// Allocate the unallocated remainder of a payment automatically
    AllocateRest {
        /// Payment id
        payment: String,
    },

    /// Show the allocations of a payment
    Allocations {
        /// Payment id
        payment: String,
    },

    /// Delete an allocation (the amount is not reallocated)
    Unallocate {
        /// Allocation id
        allocation: String,
    },

    /// Change the status of a payment
    SetStatus {
        /// Payment id
        payment: String,

        /// pending, completed or cancelled
        status: String,
    },

    /// Off-books cash settlements per dossier
    Cash {
        #[command(subcommand)]
        command: CashCommands,
    },
}

#[derive(Subcommand)]
enum CashCommands {
    /// Record cash received for a dossier
    Add {
        /// Dossier reference or id
        dossier: String,

        #[arg(long)]
        amount: String,

        /// Date received (default: today)
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List cash settlements of a dossier
    List {
        /// Dossier reference or id
        dossier: String,
    },

    /// Delete a cash settlement
    Remove {
        /// Settlement id
        settlement: String,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "billing_admin=debug,billing=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Determine config directory
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };
    let actor = cli.actor.as_deref();

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Status => cmd_status(&cfg_dir, actor),
        Commands::Dossiers { customer } => cmd_dossiers(&cfg_dir, customer),
        Commands::Mode {
            dossier,
            set,
            toggle,
        } => cmd_mode(&cfg_dir, actor, &dossier, set, toggle),
        Commands::Invoices {
            customer,
            include_partial,
        } => cmd_invoices(&cfg_dir, customer, include_partial),
        Commands::Payments { customer } => cmd_payments(&cfg_dir, customer),
        Commands::Pay {
            customer,
            amount,
            method,
            reference,
            notes,
            date,
            dossier,
            no_auto,
            line,
            defer,
        } => cmd_pay(
            &cfg_dir,
            actor,
            PayArgs {
                customer,
                amount,
                method,
                reference,
                notes,
                date,
                dossier,
                auto: !no_auto,
                lines: line,
                defer,
            },
        ),
        Commands::Allocate {
            payment,
            line,
            rest,
        } => cmd_allocate(&cfg_dir, actor, &payment, &line, rest),
        Commands::AllocateRest { payment } => cmd_allocate_rest(&cfg_dir, actor, &payment),
        Commands::Allocations { payment } => cmd_allocations(&cfg_dir, &payment),
        Commands::Unallocate { allocation } => cmd_unallocate(&cfg_dir, actor, &allocation),
        Commands::SetStatus { payment, status } => {
            cmd_set_status(&cfg_dir, actor, &payment, &status)
        }
        Commands::Cash { command } => match command {
            CashCommands::Add {
                dossier,
                amount,
                date,
                notes,
            } => cmd_cash_add(&cfg_dir, actor, &dossier, &amount, date, notes),
            CashCommands::List { dossier } => cmd_cash_list(&cfg_dir, &dossier),
            CashCommands::Remove { settlement } => cmd_cash_remove(&cfg_dir, actor, &settlement),
        },
    }
}

/// Everything `pay` needs, gathered from the command line
struct PayArgs {
    customer: String,
    amount: String,
    method: String,
    reference: Option<String>,
    notes: Option<String>,
    date: Option<String>,
    dossier: Option<String>,
    auto: bool,
    lines: Vec<String>,
    defer: bool,
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    let path = init_config_dir(cfg_dir)?;

    println!("Initialized billing config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!("  1. Point it at your backend:  $EDITOR {}", path.display());
    println!("  2. Export the API key:        export BILLING_API_KEY=...");
    println!("  3. Set your operator name:    [operator] name, or pass --as <name>");

    Ok(())
}

fn load(cfg_dir: &Path) -> Result<Config> {
    if !cfg_dir.exists() {
        return Err(BillingError::ConfigNotFound(cfg_dir.to_path_buf()));
    }
    load_config(cfg_dir)
}

fn open_repo(config: &Config) -> Repository<RestBackend> {
    Repository::new(RestBackend::new(&config.backend))
}

fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).map_err(|_| BillingError::InvalidId(input.to_string()))
}

fn parse_date(input: Option<String>) -> Result<chrono::NaiveDate> {
    match input {
        Some(s) => chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|_| BillingError::InvalidDate(s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Accept a dossier id directly, or look it up by reference.
fn resolve_dossier(repo: &mut Repository<RestBackend>, reference: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(reference.trim()) {
        return Ok(id);
    }
    repo.dossiers(None)?
        .iter()
        .find(|d| d.matches(reference))
        .map(|d| d.id)
        .ok_or_else(|| BillingError::DossierNotFound(reference.to_string()))
}

// Table row structs for tabled
#[derive(Tabled)]
struct DossierRow {
    #[tabled(rename = "REFERENCE")]
    reference: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "MODE")]
    mode: String,
    #[tabled(rename = "CHANGED BY")]
    changed_by: String,
    #[tabled(rename = "CHANGED AT")]
    changed_at: String,
}

#[derive(Tabled)]
struct InvoiceRow {
    #[tabled(rename = "NUMBER")]
    number: String,
    #[tabled(rename = "DUE")]
    due: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "PAID")]
    paid: String,
    #[tabled(rename = "REMAINING")]
    remaining: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "CUSTOMER")]
    customer: String,
}

#[derive(Tabled)]
struct PaymentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "METHOD")]
    method: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "REFERENCE")]
    reference: String,
}

#[derive(Tabled)]
struct AllocationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "INVOICE")]
    invoice: String,
    #[tabled(rename = "DUE")]
    due: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "BY")]
    by: String,
}

#[derive(Tabled)]
struct SettlementRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "RECEIVED")]
    received: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "BY")]
    by: String,
    #[tabled(rename = "NOTES")]
    notes: String,
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

/// Show configuration summary
fn cmd_status(cfg_dir: &Path, actor: Option<&str>) -> Result<()> {
    let config = load(cfg_dir)?;

    println!("Billing Status");
    println!("{}", "-".repeat(50));
    println!("Config directory: {}", cfg_dir.display());
    println!("Backend:          {}", config.backend.url);
    println!(
        "API key:          {}",
        if config.backend.api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    match resolve_actor(actor, &config) {
        Ok(operator) => println!("Operator:         {operator}"),
        Err(_) => println!("Operator:         (none; changes will be refused)"),
    }
    println!("Currency:         {}", config.display.currency_symbol);

    Ok(())
}

/// List dossiers and their allocation mode
fn cmd_dossiers(cfg_dir: &Path, customer: Option<String>) -> Result<()> {
    let config = load(cfg_dir)?;
    let customer = customer.as_deref().map(parse_id).transpose()?;
    let mut repo = open_repo(&config);

    let dossiers = repo.dossiers(customer)?;
    if dossiers.is_empty() {
        println!("No dossiers found.");
        return Ok(());
    }

    let rows: Vec<DossierRow> = dossiers
        .iter()
        .map(|d| DossierRow {
            reference: d.reference.clone(),
            id: d.id.to_string(),
            mode: d.mode().to_string(),
            changed_by: or_dash(d.mode_changed_by.clone()),
            changed_at: or_dash(d.mode_changed_at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

/// Show, set or toggle a dossier's allocation mode
fn cmd_mode(
    cfg_dir: &Path,
    actor: Option<&str>,
    reference: &str,
    set: Option<String>,
    toggle: bool,
) -> Result<()> {
    let config = load(cfg_dir)?;
    let target = set.as_deref().map(str::parse::<AllocationMode>).transpose()?;
    let operator = if target.is_some() || toggle {
        Some(resolve_actor(actor, &config)?)
    } else {
        None
    };

    let mut repo = open_repo(&config);
    let dossier_id = resolve_dossier(&mut repo, reference)?;

    match (target, operator) {
        (Some(mode), Some(operator)) => {
            dossier::set_mode(&mut repo, dossier_id, mode, &operator)?;
            println!("Dossier {reference} set to {mode} allocation");
        }
        (None, Some(operator)) => {
            let mode = dossier::toggle(&mut repo, dossier_id, &operator)?;
            println!("Dossier {reference} switched to {mode} allocation");
        }
        _ => {
            let mode = dossier::mode(&mut repo, dossier_id);
            println!("Dossier {reference}: {mode} allocation");
        }
    }

    Ok(())
}

fn invoice_rows(
    invoices: &[billing_admin::model::InvoiceSummary],
    symbol: &str,
) -> Vec<InvoiceRow> {
    invoices
        .iter()
        .map(|i| InvoiceRow {
            number: i.number.clone(),
            due: or_dash(i.due_date.map(|d| d.to_string())),
            total: format_money(i.amount_total, symbol),
            paid: format_money(i.amount_paid, symbol),
            remaining: format_money(i.remaining(), symbol),
            status: i.status().to_string(),
            customer: i.customer_name.clone().unwrap_or_else(|| i.customer_id.to_string()),
        })
        .collect()
}

/// List open invoices
fn cmd_invoices(cfg_dir: &Path, customer: Option<String>, include_partial: bool) -> Result<()> {
    let config = load(cfg_dir)?;
    let query = InvoiceQuery {
        customer_id: customer.as_deref().map(parse_id).transpose()?,
        include_partial,
    };
    let mut repo = open_repo(&config);

    let mut invoices = repo.unpaid_invoices(query)?.to_vec();
    if invoices.is_empty() {
        println!("No open invoices.");
        return Ok(());
    }
    sort_for_display(&mut invoices);

    let symbol = &config.display.currency_symbol;
    let outstanding: Decimal = invoices.iter().map(|i| i.remaining()).sum();
    let table = Table::new(invoice_rows(&invoices, symbol))
        .with(Style::rounded())
        .to_string();
    println!("{table}");
    println!();
    println!(
        "Total: {} invoices, {} outstanding",
        invoices.len(),
        format_money(outstanding, symbol)
    );

    Ok(())
}

/// List recorded payments
fn cmd_payments(cfg_dir: &Path, customer: Option<String>) -> Result<()> {
    let config = load(cfg_dir)?;
    let customer = customer.as_deref().map(parse_id).transpose()?;
    let mut repo = open_repo(&config);

    let payments = repo.payments(customer)?;
    if payments.is_empty() {
        println!("No payments recorded.");
        return Ok(());
    }

    let symbol = &config.display.currency_symbol;
    let rows: Vec<PaymentRow> = payments
        .iter()
        .map(|p| PaymentRow {
            id: p.id.to_string(),
            date: p.payment_date.to_string(),
            amount: format_money(p.amount, symbol),
            method: p.method.to_string(),
            status: p.status.to_string(),
            reference: or_dash(p.reference.clone()),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

/// Print the manual allocation form: open invoices and what is left to allocate
fn print_draft(draft: &AllocationDraft, symbol: &str) {
    if draft.candidates().is_empty() {
        println!("No open invoices for this customer.");
    } else {
        let table = Table::new(invoice_rows(draft.candidates(), symbol))
            .with(Style::rounded())
            .to_string();
        println!("{table}");
    }
    println!(
        "Available: {}, remaining to allocate: {}",
        format_money(draft.available(), symbol),
        format_money(draft.remaining_to_allocate(), symbol)
    );
}

/// Record a payment, automatically or with manual allocation lines
fn cmd_pay(cfg_dir: &Path, actor: Option<&str>, args: PayArgs) -> Result<()> {
    let config = load(cfg_dir)?;

    // Everything that can be checked locally is checked before any request
    let amount = parse_amount(&args.amount)?;
    let method: PaymentMethod = args.method.parse()?;
    let customer = parse_id(&args.customer)?;
    let request = NewPayment::new(customer, amount, method)
        .with_reference(args.reference)
        .with_notes(args.notes)
        .with_date(parse_date(args.date)?)
        .with_auto_allocate(args.auto);
    request.validate()?;
    let entries = args
        .lines
        .iter()
        .map(|l| parse_allocation_input(l))
        .collect::<Result<Vec<_>>>()?;
    let operator = resolve_actor(actor, &config)?;

    let mut repo = open_repo(&config);
    let dossier_id = args
        .dossier
        .as_deref()
        .map(|d| resolve_dossier(&mut repo, d))
        .transpose()?;
    let symbol = &config.display.currency_symbol;

    if !entries.is_empty() {
        let (payment, lines) =
            allocation::create_payment_with_allocations(&mut repo, request, &entries, &operator)?;
        let allocated: Decimal = lines.iter().map(|l| l.amount).sum();
        println!(
            "Recorded {} payment {}",
            format_money(payment.amount, symbol),
            payment.id
        );
        println!(
            "  Allocated {} across {} invoice(s), {} left unallocated",
            format_money(allocated, symbol),
            lines.len(),
            format_money(payment.amount - allocated, symbol)
        );
        return Ok(());
    }

    match allocation::path_for(&mut repo, dossier_id, request.auto_allocate) {
        AllocationPath::Automatic => {
            let created = allocation::create_payment(&mut repo, request, dossier_id, &operator)?;
            println!(
                "Recorded {} payment {} (automatic allocation requested)",
                format_money(created.payment.amount, symbol),
                created.payment.id
            );
            Ok(())
        }
        AllocationPath::Manual if args.defer => {
            let created = allocation::create_payment(&mut repo, request, dossier_id, &operator)?;
            println!(
                "Recorded {} payment {} (unallocated)",
                format_money(created.payment.amount, symbol),
                created.payment.id
            );
            println!(
                "  Allocate it with 'billing allocate {} --line <invoice>:<amount>'",
                created.payment.id
            );
            Ok(())
        }
        AllocationPath::Manual => {
            // Manual allocation form: show what can be allocated, create nothing
            let draft = allocation::draft_for_request(&mut repo, &request)?;
            println!("Manual allocation required. Open invoices:");
            print_draft(&draft, symbol);
            println!();
            println!("Repeat with --line <invoice>:<amount> for each invoice to pay,");
            println!("or with --defer to record the payment now and allocate later.");
            Err(BillingError::NoAllocations)
        }
    }
}

/// Allocate an existing payment to invoices
fn cmd_allocate(
    cfg_dir: &Path,
    actor: Option<&str>,
    payment_ref: &str,
    lines: &[String],
    rest: bool,
) -> Result<()> {
    if lines.is_empty() {
        return Err(BillingError::NoAllocations);
    }

    let config = load(cfg_dir)?;
    let payment_id = parse_id(payment_ref)?;
    let entries = lines
        .iter()
        .map(|l| parse_allocation_input(l))
        .collect::<Result<Vec<_>>>()?;
    let operator = resolve_actor(actor, &config)?;

    let mut repo = open_repo(&config);
    let payment = repo.payment(payment_id)?;
    let mut draft = allocation::draft_for_payment(&mut repo, &payment)?;
    for (reference, amount) in &entries {
        // Out-of-bounds entries stay in the draft and are reported below
        if let Err(e @ BillingError::UnknownInvoice(_)) =
            draft.set_by_reference(reference, *amount)
        {
            return Err(e);
        }
    }

    let symbol = &config.display.currency_symbol;
    let issues = draft.issues();
    if !issues.is_empty() {
        print_draft(&draft, symbol);
        for issue in &issues {
            eprintln!("  - {issue}");
        }
    }
    let saved = allocation::submit(&mut repo, payment_id, &draft, &operator)?;
    let allocated: Decimal = saved.iter().map(|l| l.amount).sum();
    println!(
        "Allocated {} of payment {} across {} invoice(s)",
        format_money(allocated, symbol),
        payment_id,
        saved.len()
    );

    let remaining = draft.remaining_to_allocate();
    if remaining > Decimal::ZERO {
        if rest {
            let handed_over = allocation::allocate_remainder(&mut repo, payment_id, &operator)?;
            println!(
                "  Remaining {} handed to automatic allocation",
                format_money(handed_over, symbol)
            );
        } else {
            println!(
                "  Remaining to allocate: {} (use 'billing allocate-rest {}')",
                format_money(remaining, symbol),
                payment_id
            );
        }
    } else {
        println!("  Payment fully allocated");
    }

    Ok(())
}

/// Allocate the remainder of a payment automatically
fn cmd_allocate_rest(cfg_dir: &Path, actor: Option<&str>, payment_ref: &str) -> Result<()> {
    let config = load(cfg_dir)?;
    let payment_id = parse_id(payment_ref)?;
    let operator = resolve_actor(actor, &config)?;
    let mut repo = open_repo(&config);

    let handed_over = allocation::allocate_remainder(&mut repo, payment_id, &operator)?;
    if handed_over.is_zero() {
        println!("Payment {payment_id} has nothing left to allocate");
    } else {
        println!(
            "Handed {} of payment {} to automatic allocation",
            format_money(handed_over, &config.display.currency_symbol),
            payment_id
        );
    }

    Ok(())
}

/// Show the allocations of a payment
fn cmd_allocations(cfg_dir: &Path, payment_ref: &str) -> Result<()> {
    let config = load(cfg_dir)?;
    let payment_id = parse_id(payment_ref)?;
    let mut repo = open_repo(&config);

    let payment = repo.payment(payment_id)?;
    let allocations = repo.allocations(payment_id)?;
    let symbol = &config.display.currency_symbol;

    println!("Allocations for payment {payment_id}");
    if allocations.is_empty() {
        println!("  No allocations recorded.");
    } else {
        let rows: Vec<AllocationRow> = allocations
            .iter()
            .map(|a| AllocationRow {
                id: a.allocation.id.to_string(),
                invoice: a.invoice_label(),
                due: or_dash(a.invoice.as_ref().and_then(|i| i.due_date).map(|d| d.to_string())),
                amount: format_money(a.allocation.amount, symbol),
                by: or_dash(a.allocation.created_by.clone()),
            })
            .collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{table}");
    }

    let allocated: Decimal = allocations.iter().map(|a| a.allocation.amount).sum();
    println!(
        "Allocated: {} / {} (remaining to allocate: {}, status: {})",
        format_money(allocated, symbol),
        format_money(payment.amount, symbol),
        format_money(payment.amount - allocated, symbol),
        payment.status
    );

    Ok(())
}

/// Delete an allocation
fn cmd_unallocate(cfg_dir: &Path, actor: Option<&str>, allocation_ref: &str) -> Result<()> {
    let config = load(cfg_dir)?;
    let allocation_id = parse_id(allocation_ref)?;
    let operator = resolve_actor(actor, &config)?;
    let mut repo = open_repo(&config);

    allocation::remove_allocation(&mut repo, allocation_id, &operator)?;
    println!("Removed allocation {allocation_id}; the freed amount stays unallocated");

    Ok(())
}

/// Change the status of a payment
fn cmd_set_status(
    cfg_dir: &Path,
    actor: Option<&str>,
    payment_ref: &str,
    status: &str,
) -> Result<()> {
    let config = load(cfg_dir)?;
    let payment_id = parse_id(payment_ref)?;
    let status: PaymentStatus = status.parse()?;
    let operator = resolve_actor(actor, &config)?;
    let mut repo = open_repo(&config);

    repo.update_payment_status(payment_id, status, &operator)?;
    println!("Payment {payment_id} marked {status}");

    Ok(())
}

/// Record cash received for a dossier
fn cmd_cash_add(
    cfg_dir: &Path,
    actor: Option<&str>,
    dossier_ref: &str,
    amount: &str,
    date: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let config = load(cfg_dir)?;
    let amount = parse_amount(amount)?;
    let received_on = parse_date(date)?;
    let operator = resolve_actor(actor, &config)?;

    let mut repo = open_repo(&config);
    let settlement = NewCashSettlement {
        dossier_id: resolve_dossier(&mut repo, dossier_ref)?,
        amount,
        received_on,
        notes: notes.filter(|n| !n.trim().is_empty()),
    };
    settlement.validate()?;

    let created = repo.record_cash_settlement(&settlement, &operator)?;
    println!(
        "Recorded {} cash for {} on {} ({})",
        format_money(created.amount, &config.display.currency_symbol),
        dossier_ref,
        created.received_on,
        created.id
    );

    Ok(())
}

/// List cash settlements of a dossier
fn cmd_cash_list(cfg_dir: &Path, dossier_ref: &str) -> Result<()> {
    let config = load(cfg_dir)?;
    let mut repo = open_repo(&config);
    let dossier_id = resolve_dossier(&mut repo, dossier_ref)?;

    let settlements = repo.cash_settlements(dossier_id)?;
    let symbol = &config.display.currency_symbol;
    println!("Cash settlements for {dossier_ref}");

    if settlements.is_empty() {
        println!("  No cash settlements recorded.");
        return Ok(());
    }

    let rows: Vec<SettlementRow> = settlements
        .iter()
        .map(|s| SettlementRow {
            id: s.id.to_string(),
            received: s.received_on.to_string(),
            amount: format_money(s.amount, symbol),
            by: or_dash(s.recorded_by.clone()),
            notes: or_dash(s.notes.clone()),
        })
        .collect();
    let total: Decimal = settlements.iter().map(|s| s.amount).sum();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!("Total cash received: {}", format_money(total, symbol));

    Ok(())
}

/// Delete a cash settlement
fn cmd_cash_remove(cfg_dir: &Path, actor: Option<&str>, settlement_ref: &str) -> Result<()> {
    let config = load(cfg_dir)?;
    let settlement_id = parse_id(settlement_ref)?;
    let operator: Actor = resolve_actor(actor, &config)?;
    let mut repo = open_repo(&config);

    repo.delete_cash_settlement(settlement_id, &operator)?;
    println!("Removed cash settlement {settlement_id}");

    Ok(())
}
