use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::{constants::UNCATEGORIZED, models::quotes::Quote, models::sync::Resolution, Data};

pub mod quote;
pub mod session;
pub mod status;
pub mod sync;
pub mod transfer;

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// show a random quote.
    Show {
        /// only pick from this category ("all" for every category).
        #[arg(short, long)]
        category: Option<String>,
    },
    /// add a new quote.
    Add {
        #[arg(short, long, default_value = UNCATEGORIZED)]
        category: String,
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// list quotes, filtered by the selected category unless one is given.
    List {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// list every category.
    Categories,
    /// remember a category filter for `show` and `list`.
    Filter { category: String },
    /// import quotes from a JSON file.
    Import { path: PathBuf },
    /// export every quote to a timestamped JSON file.
    Export {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// delete every quote. this cannot be undone.
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// sync with the server once.
    Sync {
        /// how to settle conflicts when the manual policy holds them.
        #[arg(long, value_enum)]
        resolve: Option<ResolveArg>,
    },
    /// show version, storage and sync information.
    Status,
    /// start an interactive session with periodic sync in the background.
    Run,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ResolveArg {
    AcceptRemote,
    KeepLocal,
}

impl From<ResolveArg> for Resolution {
    fn from(arg: ResolveArg) -> Self {
        match arg {
            ResolveArg::AcceptRemote => Resolution::AcceptRemote,
            ResolveArg::KeepLocal => Resolution::KeepLocal,
        }
    }
}

pub async fn execute(data: &Data, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Show { category } => quote::show(data, category).await,
        Command::Add { category, text } => quote::add(data, &text.join(" "), &category).await,
        Command::List { category } => quote::list(data, category).await,
        Command::Categories => quote::categories(data).await,
        Command::Filter { category } => quote::filter(data, &category).await,
        Command::Import { path } => transfer::import(data, &path).await,
        Command::Export { dir } => transfer::export(data, &dir).await,
        Command::Clear { yes } => quote::clear(data, yes).await,
        Command::Sync { resolve } => sync::sync(data, resolve.map(Resolution::from)).await,
        Command::Status => status::status(data).await,
        Command::Run => anyhow::bail!("a session is already running."),
    }
}

pub(crate) fn format_quote(quote: &Quote) -> String {
    format!("\"{}\" ({})", quote.text, quote.category)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn add_joins_the_trailing_words() {
        let cli = Cli::try_parse_from(["quotesync", "add", "-c", "Life", "carpe", "diem"]).unwrap();

        let Command::Add { category, text } = cli.command else {
            panic!("expected add");
        };
        assert_eq!(category, "Life");
        assert_eq!(text.join(" "), "carpe diem");
    }

    #[test]
    fn add_defaults_the_category() {
        let cli = Cli::try_parse_from(["quotesync", "add", "hello"]).unwrap();

        assert!(matches!(cli.command, Command::Add { category, .. } if category == UNCATEGORIZED));
    }

    #[test]
    fn sync_accepts_a_resolution() {
        let cli = Cli::try_parse_from(["quotesync", "sync", "--resolve", "keep-local"]).unwrap();

        assert!(matches!(
            cli.command,
            Command::Sync {
                resolve: Some(ResolveArg::KeepLocal)
            }
        ));
    }

    #[test]
    fn format_quote_shows_text_and_category() {
        let quote = Quote::new("hi", "Life");

        assert_eq!(format_quote(&quote), "\"hi\" (Life)");
    }
}
