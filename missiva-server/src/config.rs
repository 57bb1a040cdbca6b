use clap::{Parser, Subcommand};
use std::net::SocketAddr;

/// missiva-server: messaggi diretti con consegna in tempo reale.
#[derive(Debug, Parser)]
#[command(name = "missiva-server", version)]
pub struct Cli {
    /// Indirizzo di binding HTTP
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000", global = true)]
    pub bind: SocketAddr,

    /// Percorso o URL del database SQLite ("sqlite::memory:" per un DB volatile)
    #[arg(long, env = "DATABASE_URL", default_value = "missiva.db", global = true)]
    pub database_url: String,

    /// Livello di log (RUST_LOG ha la precedenza)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Formato dei log: compact, pretty, json
    #[arg(long, env = "LOG_FORMAT", default_value = "compact", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Avvia il server (default)
    Serve,
    /// Crea un utente e stampa il suo token
    AddUser {
        username: String,
        /// Nome visualizzato (default: username)
        #[arg(long)]
        name: Option<String>,
        /// URL dell'avatar
        #[arg(long)]
        image: Option<String>,
    },
}
