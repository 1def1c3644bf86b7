//! Asset metadata carried by the descriptor's "Metadata" service.

use serde::{Deserialize, Deserializer, Serialize};

/// Descriptive metadata of an asset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    pub base: MetaDataBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curation: Option<Curation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_information: Option<AdditionalInformation>,
}

impl MetaData {
    pub fn price(&self) -> Option<u64> {
        self.base.price
    }
}

/// Core descriptive attributes.
///
/// `content_urls` holds plain locators when the publisher hands metadata in
/// and a single ciphertext once the asset is registered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDataBase {
    pub name: String,
    #[serde(rename = "type", default)]
    pub asset_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub copyright_holder: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub compression: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub work_example: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub content_urls: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub in_language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub price: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curation {
    pub rating: f64,
    pub num_votes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInformation {
    // Field name as published by the registry.
    #[serde(default)]
    pub update_frecuency: String,
    #[serde(default)]
    pub structured_markup: Vec<StructuredMarkup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredMarkup {
    pub uri: String,
    pub media_type: String,
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
