//! Show the project graph.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, print_json};
use crate::cmt::project_release_with;

/// Display the projects of the current CMT environment.
#[derive(Args, Debug)]
pub struct ProjectsCommand {
    /// List the projects a project depends on, directly or not
    #[arg(long, value_name = "PROJECT", conflicts_with = "release")]
    deps: Option<String>,

    /// Print the release package of a project
    #[arg(long, value_name = "PROJECT")]
    release: Option<String>,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

impl ProjectsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        if let Some(project) = &self.release {
            let release = project_release_with(project, &ctx.config.project_releases);
            if self.json {
                return print_json(&serde_json::json!({ "project": project, "release": release }));
            }
            println!("{release}");
            return Ok(());
        }

        let cmt = ctx.connect().await?;
        if let Some(project) = &self.deps {
            let deps = cmt.project_deps(project).await?;
            if self.json {
                return print_json(&deps);
            }
            for dep in deps {
                println!("{dep}");
            }
            return Ok(());
        }

        let dag = cmt.projects_dag().await?;
        if self.json {
            return print_json(&dag);
        }
        for project in dag {
            println!("{} {}", project.name().bold(), project.version.cyan());
            if !project.children.is_empty() {
                println!("  {} {}", "uses".dimmed(), project.children.join(", "));
            }
        }
        Ok(())
    }
}
