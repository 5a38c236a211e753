//! Requests to the flow authority.
//!
//! The [`Transport`] trait is the seam to whatever actually performs HTTP; everything
//! else in this module shapes requests and decodes responses on top of it.

use crate::error::{CanvasError, TransportError};
use crate::store::StoredEntity;
use crate::types::{ComponentStatus, ConnectableType, EntityId, EntityKind, Revision};
use async_trait::async_trait;
use egui::Pos2;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Performs JSON requests against the flow API.
#[async_trait(?Send)]
pub trait Transport {
    /// `GET url`, returning the decoded body.
    async fn get(&self, url: &str) -> Result<Value, TransportError>;

    /// `PUT url` with a JSON body, returning the decoded response body.
    async fn put(&self, url: &str, body: Value) -> Result<Value, TransportError>;
}

/// Body of a structural update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest<P> {
    /// Revision the change is based on, carrying this session's client id
    pub revision: Revision,
    /// Acknowledges edits made while a cluster node is disconnected
    pub disconnected_node_acknowledged: bool,
    /// Partial entity
    pub component: P,
}

/// Response to a structural update or entity reload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEnvelope<T> {
    /// Revision assigned by the authority
    #[serde(default)]
    pub revision: Option<Revision>,
    /// The full entity
    pub component: T,
}

impl<T: StoredEntity> EntityEnvelope<T> {
    /// The entity, stamped with the envelope's revision when one was returned.
    pub fn into_entity(self) -> T {
        let mut entity = self.component;
        if let Some(revision) = self.revision {
            *entity.revision_mut() = revision;
        }
        entity
    }
}

/// New destination for a connection being reattached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationPatch {
    /// Destination component id
    pub id: EntityId,
    /// Group owning the destination
    pub group_id: EntityId,
    /// Connectable kind of the destination
    #[serde(rename = "type")]
    pub kind: ConnectableType,
}

/// Partial connection sent in a structural update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPatch {
    /// Connection id
    pub id: EntityId,
    /// Replacement bends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bends: Option<Vec<Pos2>>,
    /// Replacement label index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_index: Option<usize>,
    /// Replacement destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationPatch>,
}

impl ConnectionPatch {
    /// A patch that only identifies the connection.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Partial node sent when repositioning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPatch {
    /// Node id
    pub id: EntityId,
    /// New top-left corner
    pub position: Pos2,
}

/// Sends a structural update to `uri` and decodes the returned entity.
pub async fn update_entity<T, P>(
    transport: &dyn Transport,
    uri: &str,
    request: UpdateRequest<P>,
) -> Result<T, CanvasError>
where
    T: StoredEntity + DeserializeOwned,
    P: Serialize,
{
    let body = serde_json::to_value(&request)?;
    let response = transport.put(uri, body).await?;
    let envelope: EntityEnvelope<T> = serde_json::from_value(response)?;
    Ok(envelope.into_entity())
}

/// Fetches the full entity at `uri`.
pub async fn fetch_entity<T>(transport: &dyn Transport, uri: &str) -> Result<T, CanvasError>
where
    T: StoredEntity + DeserializeOwned,
{
    let response = transport.get(uri).await?;
    let envelope: EntityEnvelope<T> = serde_json::from_value(response)?;
    Ok(envelope.into_entity())
}

/// Percent-encodes a single path or query component.
pub fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Fetches only the live status of the entity `id` of `kind`.
///
/// Kinds without live status (funnels, labels) resolve to `Ok(None)` without a request.
pub async fn fetch_status(
    transport: &dyn Transport,
    api_base: &str,
    kind: EntityKind,
    id: &str,
) -> Result<Option<ComponentStatus>, CanvasError> {
    let Some((collection, field)) = kind.status_resource() else {
        return Ok(None);
    };
    let url = format!("{api_base}/flow/{collection}/{}/status", encode_component(id));
    let mut response = transport.get(&url).await?;
    let status = match response.get_mut(field) {
        Some(status) => serde_json::from_value(status.take())?,
        None => ComponentStatus::default(),
    };
    Ok(Some(status))
}

/// One bulletin reported for a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinEntity {
    /// Monotonic bulletin id
    pub id: i64,
    /// Component that emitted the bulletin
    #[serde(default)]
    pub source_id: Option<EntityId>,
    /// Group of the emitting component
    #[serde(default)]
    pub group_id: Option<EntityId>,
    /// Time of day the bulletin was emitted
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Whether the bulletin details may be read
    #[serde(default)]
    pub can_read: bool,
    /// Bulletin details
    #[serde(default)]
    pub bulletin: Option<Value>,
}

/// Bulletins for a set of components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinBoard {
    /// When the board was generated
    #[serde(default)]
    pub generated: Option<String>,
    /// Bulletins, newest first
    #[serde(default)]
    pub bulletins: Vec<BulletinEntity>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulletinBoardResponse {
    bulletin_board: BulletinBoard,
}

/// Splits `ids` into query URLs that each fit within `max_url_length`.
///
/// A list whose URL is too long is halved (the left half takes the extra id) and each
/// half is split again. A single id is always queried even when its URL is too long.
pub fn bulletin_query_urls(api_base: &str, ids: &[EntityId], max_url_length: usize) -> Vec<String> {
    let mut urls = Vec::new();
    split_bulletin_query(api_base, ids, max_url_length, &mut urls);
    urls
}

fn split_bulletin_query(api_base: &str, ids: &[EntityId], max_url_length: usize, urls: &mut Vec<String>) {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("sourceId", &ids.join("|"))
        .finish();
    let endpoint = format!("{api_base}/flow/bulletin-board?{query}");

    if endpoint.len() > max_url_length && ids.len() > 1 {
        let mid = ids.len().div_ceil(2);
        let (left, right) = ids.split_at(mid);
        split_bulletin_query(api_base, left, max_url_length, urls);
        split_bulletin_query(api_base, right, max_url_length, urls);
    } else {
        urls.push(endpoint);
    }
}

/// Queries bulletins for `ids`, sharding the request so no URL exceeds `max_url_length`.
///
/// Shards are issued concurrently. The merged board takes its `generated` time from the
/// first shard and lists bulletins by descending id. Any failed shard fails the query.
pub async fn query_bulletins(
    transport: &dyn Transport,
    api_base: &str,
    ids: &[EntityId],
    max_url_length: usize,
) -> Result<BulletinBoard, CanvasError> {
    let urls = bulletin_query_urls(api_base, ids, max_url_length);
    log::debug!("querying bulletins for {} components in {} requests", ids.len(), urls.len());

    let requests = urls.iter().map(|url| transport.get(url));

    let mut merged = BulletinBoard::default();
    for (i, response) in join_all(requests).await.into_iter().enumerate() {
        let board: BulletinBoardResponse = serde_json::from_value(response?)?;
        if i == 0 {
            merged.generated = board.bulletin_board.generated;
        }
        merged.bulletins.extend(board.bulletin_board.bulletins);
    }
    merged.bulletins.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(merged)
}
