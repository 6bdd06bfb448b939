//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stakd_core::ListParams;
use stakd_core::models::NotificationFilter;

/// Stakd CRM client
#[derive(Parser, Debug)]
#[command(name = "stakd")]
#[command(author, version, about = "Query and watch Stakd CRM collections", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// REST base URL
    #[arg(long, global = true, env = "STAKD_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = "STAKD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Organization id
    #[arg(long, global = true, env = "STAKD_ORG")]
    pub org: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Contact records
    Contacts {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Tasks
    Tasks {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Messages
    Messages {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Notifications
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
    /// Print a list page every time it changes, until Ctrl-C
    Watch {
        /// Collection to watch
        #[arg(value_enum)]
        entity: WatchTarget,

        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the resolved configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

#[derive(Subcommand, Debug)]
pub enum EntityAction {
    /// Print one page as JSON
    List(ListArgs),
    /// Print one record as JSON
    Get {
        /// Record id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum NotificationAction {
    /// Print the unread count
    Count,
    /// Print one page of notifications
    List {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,

        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    Contacts,
    Tasks,
    Messages,
    Notifications,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// 1-based page number
    #[arg(long)]
    pub page: Option<u32>,

    /// Page size
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Free-text search
    #[arg(long)]
    pub search: Option<String>,

    /// Accepted status (repeatable)
    #[arg(long)]
    pub status: Vec<String>,

    /// Required tag (repeatable)
    #[arg(long)]
    pub tag: Vec<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

impl PageArgs {
    pub fn to_params(&self) -> ListParams {
        ListParams {
            page: self.page,
            limit: self.limit,
            ..ListParams::default()
        }
    }
}

impl ListArgs {
    pub fn to_params(&self) -> ListParams {
        let mut params = self.page.to_params();
        if let Some(search) = &self.search {
            params = params.search(search.clone());
        }
        for status in &self.status {
            params = params.status(status.clone());
        }
        for tag in &self.tag {
            params = params.tag(tag.clone());
        }
        params
    }
}

pub fn notification_filter(unread: bool, page: &PageArgs) -> NotificationFilter {
    let base = if unread {
        NotificationFilter::unread()
    } else {
        NotificationFilter::default()
    };
    NotificationFilter {
        page: page.page,
        limit: page.limit,
        ..base
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_flags() {
        let cli = Cli::try_parse_from([
            "stakd", "contacts", "list", "--search", "ada", "--status", "active", "--tag", "vip",
            "--tag", "donor", "--page", "2", "--limit", "10",
        ])
        .unwrap();
        let Command::Contacts {
            action: EntityAction::List(args),
        } = cli.command
        else {
            unreachable!()
        };
        let params = args.to_params();
        assert_eq!(params.filter.search.as_deref(), Some("ada"));
        assert_eq!(params.filter.status, vec!["active"]);
        assert_eq!(params.filter.tags, vec!["vip", "donor"]);
        assert_eq!((params.page, params.limit), (Some(2), Some(10)));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stakd", "tasks", "get", "t1", "--org", "org-9", "--api-url", "http://api.test",
        ])
        .unwrap();
        assert_eq!(cli.org.as_deref(), Some("org-9"));
        assert_eq!(cli.api_url.as_deref(), Some("http://api.test"));
    }

    #[test]
    fn test_watch_target() {
        let cli = Cli::try_parse_from(["stakd", "watch", "notifications", "--limit", "3"]).unwrap();
        let Command::Watch { entity, page } = cli.command else {
            unreachable!()
        };
        assert_eq!(entity, WatchTarget::Notifications);
        assert_eq!(page.limit, Some(3));
    }

    #[test]
    fn test_unread_filter() {
        let filter = notification_filter(true, &PageArgs::default());
        assert_eq!(filter.read, Some(false));
        assert_eq!(filter.page, None);
    }
}
