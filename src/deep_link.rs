//! Deep links: the displayed group and selection mirrored in the address bar.
//!
//! Two query parameters are used. `processGroupId` names the displayed group, with
//! `root` standing in for the topmost one, and `componentIds` holds the sorted,
//! comma-joined selection. Other parameters are left alone.

use crate::canvas::FlowCanvas;
use crate::constants::ROOT_GROUP_ALIAS;
use crate::error::{CanvasError, Result};
use crate::notify::escape_html;
use crate::types::EntityId;
use url::Url;

const PROCESS_GROUP_ID: &str = "processGroupId";
const COMPONENT_IDS: &str = "componentIds";

/// Header of every deep-link notice.
const ERROR: &str = "Error";

/// What a deep link asks the canvas to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepLink {
    /// Group to display; `None` keeps the current one
    pub group_id: Option<EntityId>,
    /// Members to select, in link order
    pub component_ids: Vec<EntityId>,
}

impl DeepLink {
    /// Reads the deep-link parameters out of `url`.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url)?;
        let mut link = DeepLink::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                PROCESS_GROUP_ID if !value.is_empty() => link.group_id = Some(value.into_owned()),
                COMPONENT_IDS => {
                    link.component_ids = value
                        .split(',')
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                _ => {}
            }
        }
        Ok(link)
    }

    /// Rewrites `current` so it links to `group_id` with `component_ids` selected.
    ///
    /// The topmost group with nothing selected links to the bare page. Component ids are
    /// sorted; when including them would make the address longer than `max_length`
    /// they are left out.
    ///
    /// # Arguments
    ///
    /// * `current` - The address to rewrite
    /// * `group_id` - Displayed group
    /// * `at_root` - Whether `group_id` is the topmost group
    /// * `component_ids` - Selected members
    /// * `max_length` - Longest acceptable address
    pub fn build_url(
        current: &str,
        group_id: &str,
        at_root: bool,
        component_ids: &[EntityId],
        max_length: usize,
    ) -> Result<String, url::ParseError> {
        let mut url = Url::parse(current)?;
        let others: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != PROCESS_GROUP_ID && key != COMPONENT_IDS)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.set_query(None);
        url.set_fragment(None);

        if at_root && component_ids.is_empty() {
            return Ok(url.into());
        }

        let group = if at_root { ROOT_GROUP_ALIAS } else { group_id };
        let mut sorted = component_ids.to_vec();
        sorted.sort();
        let joined = sorted.join(",");

        let with_ids = Self::with_query(&url, &others, group, Some(&joined));
        if with_ids.len() <= max_length {
            return Ok(with_ids);
        }
        log::debug!("deep link exceeds {max_length} characters, dropping component ids");
        Ok(Self::with_query(&url, &others, group, None))
    }

    fn with_query(base: &Url, others: &[(String, String)], group: &str, component_ids: Option<&str>) -> String {
        let mut url = base.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in others {
                query.append_pair(key, value);
            }
            query.append_pair(PROCESS_GROUP_ID, group);
            if let Some(ids) = component_ids.filter(|ids| !ids.is_empty()) {
                query.append_pair(COMPONENT_IDS, ids);
            }
        }
        url.into()
    }
}

impl FlowCanvas {
    /// Writes the displayed group and selection to the address bar.
    pub fn update_url(&self) {
        let group = self.group();
        let current = self.services.history.current_url();
        match DeepLink::build_url(
            &current,
            &group.group_id,
            group.is_root(),
            &self.selected_ids(),
            self.config.max_url_length,
        ) {
            Ok(url) => self.services.history.replace_url(&url),
            Err(e) => log::warn!("unable to rewrite address {current}: {e}"),
        }
    }

    /// Whether `group_id` names the displayed group, directly or through the root alias.
    fn is_displayed_group(&self, group_id: &str) -> bool {
        let group = self.group();
        group.group_id == group_id || (group.is_root() && group_id == ROOT_GROUP_ALIAS)
    }

    /// Shows whatever the current address links to.
    ///
    /// With component ids the named group is loaded and the components selected;
    /// otherwise the group is simply entered.
    pub async fn show_deep_link(&self) -> Result<()> {
        let current = self.services.history.current_url();
        let link = DeepLink::parse(&current).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable address {current}: {e}");
            DeepLink::default()
        });
        let group_id = link
            .group_id
            .unwrap_or_else(|| self.group().group_id);

        if link.component_ids.is_empty() {
            self.enter_group(&group_id).await
        } else {
            self.show_components(&group_id, &link.component_ids, true).await
        }
    }

    /// Loads `group_id` when needed and selects and centers on `component_ids`.
    ///
    /// Ids that are not found are listed in a notice; the rest are still shown.
    ///
    /// # Arguments
    ///
    /// * `group_id` - Group holding the components, or `"root"`
    /// * `component_ids` - Members to show
    /// * `force_load` - Reload the group even when it is already displayed
    pub async fn show_components(&self, group_id: &str, component_ids: &[EntityId], force_load: bool) -> Result<()> {
        if force_load || !self.is_displayed_group(group_id) {
            if let Err(e) = self.enter_group(group_id).await {
                log::warn!("unable to enter group {group_id}: {e}");
                self.services
                    .notifier
                    .show_notice(ERROR, "Unable to enter the selected group.");
                return Err(e);
            }
        }

        let (found, missing): (Vec<EntityId>, Vec<EntityId>) = {
            let graph = self.graph.borrow();
            component_ids
                .iter()
                .cloned()
                .partition(|id| graph.nodes.contains(id) || graph.connections.contains(id))
        };

        if !missing.is_empty() {
            let listed = escape_html(&format!(
                "Specified component(s) not found: {}.",
                missing.join(", ")
            ));
            self.services.notifier.show_notice(
                ERROR,
                &format!("{listed}<br/><br/>Unable to select component(s)."),
            );
        }

        self.show(&found);
        Ok(())
    }

    /// Loads `group_id` when needed and shows the single component `component_id`.
    pub async fn show_component(&self, group_id: &str, component_id: &str) -> Result<()> {
        if !self.is_displayed_group(group_id) {
            if let Err(e) = self.enter_group(group_id).await {
                log::warn!("unable to enter group {group_id}: {e}");
                self.services
                    .notifier
                    .show_notice(ERROR, "Unable to load the group for the specified component.");
                return Err(e);
            }
        }

        let held = {
            let graph = self.graph.borrow();
            graph.nodes.contains(component_id) || graph.connections.contains(component_id)
        };
        if !held {
            self.services
                .notifier
                .show_notice(ERROR, "Unable to find the specified component.");
            return Err(CanvasError::UnknownComponent(component_id.to_string()));
        }

        self.show(&[component_id.to_string()]);
        Ok(())
    }
}
