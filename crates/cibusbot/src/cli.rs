use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cibusbot")]
#[command(author, version, about = "Personal Telegram bot for listing and redeeming Cibus coupons", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Print the new coupons and exit
    List,

    /// Delete "new" copies of coupons that are already used, then exit
    Reconcile,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
