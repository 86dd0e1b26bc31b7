use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gantry-ctl")]
#[command(about = "Operator CLI for a running gantry admin surface", long_about = None)]
struct Cli {
    /// Base URL of the admin connector.
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness probe
    Ping,
    /// Runtime statistics snapshot
    Runtime,
    /// Run all registered health checks
    Healthcheck,
    /// Invoke an operator task by name
    Task {
        name: String,

        /// Query parameters as key=value pairs
        #[arg(short, long)]
        param: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let response = match cli.command {
        Commands::Ping => client.get(format!("{}/ping", cli.url)).send().await?,
        Commands::Runtime => client.get(format!("{}/runtime", cli.url)).send().await?,
        Commands::Healthcheck => client.get(format!("{}/healthcheck", cli.url)).send().await?,
        Commands::Task { name, param } => {
            let query: Vec<(String, String)> = param
                .iter()
                .filter_map(|p| p.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
                .collect();
            client
                .post(format!("{}/tasks/{}", cli.url, name))
                .query(&query)
                .send()
                .await?
        }
    };

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        eprintln!("Error: admin surface returned status {status}");
        eprint!("{body}");
        std::process::exit(1);
    }
    print!("{body}");
    Ok(())
}
