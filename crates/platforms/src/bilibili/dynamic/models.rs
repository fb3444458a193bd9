//! Raw shapes of the `feed/space` items.
//!
//! Every section is optional or defaulted: the upstream schema changes per
//! item type and the classifier decides which parts are mandatory.

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SpaceData {
    pub items: Option<Vec<serde_json::Value>>,
}

/// One feed item. A forward embeds the original item in `orig`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DynamicItem {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub id_str: String,
    #[serde(default)]
    pub modules: Modules,
    #[serde(default)]
    pub orig: Option<Box<DynamicItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Modules {
    #[serde(default)]
    pub module_author: Option<ModuleAuthor>,
    #[serde(default)]
    pub module_dynamic: Option<ModuleDynamic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleAuthor {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub pub_ts: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleDynamic {
    #[serde(default)]
    pub desc: Option<Desc>,
    #[serde(default)]
    pub major: Option<Major>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Desc {
    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Major {
    #[serde(default)]
    pub draw: Option<Draw>,
    #[serde(default)]
    pub archive: Option<Archive>,
    #[serde(default)]
    pub article: Option<Article>,
    #[serde(default)]
    pub music: Option<Music>,
    #[serde(default)]
    pub pgc: Option<Pgc>,
    #[serde(default)]
    pub live_rcmd: Option<LiveRcmd>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Draw {
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<DrawItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrawItem {
    #[serde(default, deserialize_with = "nullable")]
    pub src: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Archive {
    #[serde(default, deserialize_with = "nullable")]
    pub bvid: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub desc: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cover: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "nullable")]
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub desc: String,
    #[serde(default, deserialize_with = "nullable")]
    pub covers: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Music {
    #[serde(default, deserialize_with = "nullable")]
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cover: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pgc {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cover: String,
}

/// Live recommendation stub. `content` is itself a JSON document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveRcmd {
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LiveRcmdContent {
    #[serde(default)]
    pub live_play_info: LivePlayInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LivePlayInfo {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cover: String,
}
