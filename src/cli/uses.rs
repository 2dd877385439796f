//! Print the dependency tree of a saved `cmt show uses` dump.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{CommandContext, print_json};
use crate::cmt::{DependencyGraph, PackageDb};

/// Parse a `cmt show uses` dump and display its dependency tree.
#[derive(Args, Debug)]
pub struct UsesCommand {
    /// Output of `cmt show uses`
    dump: PathBuf,

    /// Dump to canonicalize package names with (default: the same file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Only print the direct clients of this package
    #[arg(long, value_name = "PACKAGE")]
    clients_of: Option<String>,

    /// Output JSON (with --clients-of)
    #[arg(long, requires = "clients_of")]
    json: bool,
}

impl UsesCommand {
    pub async fn execute(self, _ctx: &CommandContext) -> Result<()> {
        let db_path = self.db.as_deref().unwrap_or(&self.dump);
        let db = PackageDb::from_show_uses_file(db_path)?;
        let graph = DependencyGraph::from_file(&self.dump, &db)?;

        let Some(package) = &self.clients_of else {
            print!("{}", graph.render_tree());
            return Ok(());
        };

        let clients = graph.direct_clients(package);
        if self.json {
            return print_json(&clients);
        }
        println!("{} is used by:", package.bold());
        for client in clients {
            println!("  {}", client.full_name());
        }
        Ok(())
    }
}
