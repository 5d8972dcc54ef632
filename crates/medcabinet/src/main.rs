// medcabinet/crates/medcabinet/src/main.rs

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use medcabinet::{config::Config, run_server, CareDatabase};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[clap(
    name = "medcabinet",
    version = env!("CARGO_PKG_VERSION"),
    about = "Medication cabinet backend for caretakers and their patients"
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Create a caretaker with one patient and an empty cabinet
    Seed {
        #[clap(long)]
        caretaker_email: String,
        #[clap(long, default_value = "Caretaker")]
        caretaker_name: String,
        #[clap(long)]
        first_name: String,
        #[clap(long)]
        last_name: String,
        #[clap(long)]
        date_of_birth: Option<String>,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medcabinet::telemetry::init_tracing();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(cfg).await,
        Command::Migrate => {
            CareDatabase::new(&cfg.database_path, 1)?;
            println!("Database at {} is up to date", cfg.database_path.display());
            Ok(())
        }
        Command::Seed {
            caretaker_email,
            caretaker_name,
            first_name,
            last_name,
            date_of_birth,
        } => {
            let db = CareDatabase::new(&cfg.database_path, 1)?;
            let (caretaker, patient, cabinet) = db.with_transaction(|conn| {
                let caretaker = db.patients.create_caretaker_with_conn(conn, &caretaker_name, &caretaker_email)?;
                let patient = db.patients.create_patient_with_conn(
                    conn,
                    &first_name,
                    &last_name,
                    date_of_birth.as_deref(),
                    caretaker.id,
                )?;
                let cabinet = db.cabinets.create_cabinet_with_conn(conn, patient.id)?;
                Ok((caretaker, patient, cabinet))
            })?;
            println!(
                "caretaker_id={} patient_id={} cabinet_id={}",
                caretaker.id, patient.id, cabinet.id
            );
            Ok(())
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
