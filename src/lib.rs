pub mod config;
pub mod manager;
pub mod model;
pub mod url;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::config::ManagerConfig;
use crate::manager::{MemoryNavigator, NavHandle, SearchCallbacks, SearchUrlManager};
use crate::model::SearchState;
use crate::url::{parse_state, split_href};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "search-url",
    version,
    about = "Inspect and replay search state stored in URL query strings"
)]
pub struct Cli {
    /// Config file (defaults to config.toml in the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tab id omitted from URLs (overrides config)
    #[arg(long, global = true)]
    pub default_tab: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a URL or query string and print the search state as JSON
    Parse {
        /// Full URL, path with query, or bare query string (`q=http/2&page=3`)
        url: String,
    },
    /// Replay operations against a URL and print the resulting href
    Apply {
        /// Starting URL, path with query, or bare query string
        url: String,

        /// Operations in order: term:<text>, page:<n>, tab:<id>,
        /// add:<facet>=<value>, remove:<facet>=<value>, clear-facets, clear-all
        #[arg(required = true)]
        ops: Vec<ReplayOp>,

        /// Print href, state and navigation count as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

/// One manager operation, as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOp {
    Term(String),
    Page(u32),
    Tab(String),
    AddFacet { facet: String, value: String },
    RemoveFacet { facet: String, value: String },
    ClearFacets,
    ClearAll,
}

impl FromStr for ReplayOp {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "clear-facets" => return Ok(Self::ClearFacets),
            "clear-all" => return Ok(Self::ClearAll),
            _ => {}
        }
        let (op, arg) = raw
            .split_once(':')
            .ok_or_else(|| format!("unknown operation `{raw}`"))?;
        match op {
            "term" => Ok(Self::Term(arg.to_string())),
            "page" => arg
                .parse()
                .map(Self::Page)
                .map_err(|_| format!("invalid page `{arg}`")),
            "tab" => Ok(Self::Tab(arg.to_string())),
            "add" | "remove" => {
                let (facet, value) = arg
                    .split_once('=')
                    .filter(|(facet, value)| !facet.is_empty() && !value.is_empty())
                    .ok_or_else(|| format!("expected <facet>=<value>, got `{arg}`"))?;
                let (facet, value) = (facet.to_string(), value.to_string());
                Ok(if op == "add" {
                    Self::AddFacet { facet, value }
                } else {
                    Self::RemoveFacet { facet, value }
                })
            }
            _ => Err(format!("unknown operation `{op}`")),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApplyReport {
    href: String,
    state: SearchState,
    navigations: usize,
}

pub async fn run() -> Result<()> {
    run_with(Cli::parse()).await
}

pub async fn run_with(cli: Cli) -> Result<()> {
    let mut cfg = ManagerConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(tab) = cli.default_tab {
        cfg = cfg.with_default_tab(tab);
    }

    match cli.command {
        Commands::Parse { url } => {
            let (_, params) = split_href(&url);
            let state = parse_state(&params, cfg.default_tab.as_deref());
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Commands::Apply { url, ops, json } => {
            let report = replay(cfg, &url, &ops).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.href);
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "search-url", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(())
        }
    }
}

async fn replay(cfg: ManagerConfig, url: &str, ops: &[ReplayOp]) -> ApplyReport {
    let memory = Arc::new(MemoryNavigator::new(url));
    let nav: NavHandle = memory.clone();
    let manager = SearchUrlManager::new(cfg);
    manager.initialize(&nav, SearchCallbacks::new());

    for op in ops {
        // Handles are not awaited: operations fire back to back like UI
        // events, and `flush` waits for the queue to drain.
        let handle = match op {
            ReplayOp::Term(term) => manager.set_search_term(&nav, term),
            ReplayOp::Page(page) => manager.set_page(&nav, *page),
            ReplayOp::Tab(tab) => manager.set_tab(&nav, tab),
            ReplayOp::AddFacet { facet, value } => manager.add_facet(&nav, facet, value),
            ReplayOp::RemoveFacet { facet, value } => manager.remove_facet(&nav, facet, value),
            ReplayOp::ClearFacets => manager.clear_all_facets(&nav),
            ReplayOp::ClearAll => manager.clear_all_filters(&nav),
        };
        drop(handle);
    }
    manager.flush().await;

    ApplyReport {
        href: memory.href(),
        state: manager.current_state(),
        navigations: memory.navigation_count(),
    }
}
