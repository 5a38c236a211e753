//! External collaborators the canvas delegates to.

use crate::error::CanvasError;
use crate::types::{ConnectionEntity, GroupContext, NodeEntity, Selection};
use async_trait::async_trait;

/// Dialog-driven connection configuration owned by the host.
#[async_trait(?Send)]
pub trait ConnectionConfigurator {
    /// Lets the user configure and create a connection from `source_id` to
    /// `destination_id`. Resolves with the created connection, or
    /// [`CanvasError::Cancelled`] when the user backs out.
    async fn create_connection(
        &self,
        source_id: &str,
        destination_id: &str,
    ) -> Result<ConnectionEntity, CanvasError>;

    /// Lets the user pick the port inside `destination` (a local or remote group) that
    /// `connection` should be reattached to. Resolves with the updated connection.
    async fn choose_port(
        &self,
        connection: &ConnectionEntity,
        destination: &NodeEntity,
    ) -> Result<ConnectionEntity, CanvasError>;
}

/// Moves components between groups by way of a snippet.
#[async_trait(?Send)]
pub trait SnippetService {
    /// Marshals `selection` out of `parent_group_id`, creates a snippet from it and
    /// moves the snippet into `destination_group_id`.
    async fn move_snippet(
        &self,
        selection: &Selection,
        parent_group_id: &str,
        destination_group_id: &str,
    ) -> Result<(), CanvasError>;
}

/// Everything shown for a group when it is entered.
#[derive(Debug, Clone)]
pub struct GroupContents {
    /// The group and its parent
    pub group: GroupContext,
    /// Processors, ports, child groups, funnels and labels
    pub nodes: Vec<NodeEntity>,
    /// Connections
    pub connections: Vec<ConnectionEntity>,
}

/// Loads the contents of a process group.
#[async_trait(?Send)]
pub trait GroupLoader {
    /// Fetches the group with `group_id`; `"root"` names the topmost group.
    async fn load_group(&self, group_id: &str) -> Result<GroupContents, CanvasError>;
}

/// The browser address bar.
pub trait History {
    /// The current address.
    fn current_url(&self) -> String;

    /// Replaces the current address without adding a history entry.
    fn replace_url(&self, url: &str);
}

/// Source of the current time.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}
