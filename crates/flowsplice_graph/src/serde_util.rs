// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lenient deserializers for the graph document format.
//!
//! Documents written by different editor versions disagree on whether an
//! empty collection is `null`, `[]` or missing, and on whether 2D values are
//! arrays or `{"0": x, "1": y}` objects.

use crate::link::LinkId;
use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Output link lists may be `null` and may contain `null` holes.
pub(crate) fn sparse_links<'de, D>(deserializer: D) -> Result<Vec<LinkId>, D::Error>
where
    D: Deserializer<'de>,
{
    let links: Option<Vec<Option<LinkId>>> = Option::deserialize(deserializer)?;
    Ok(links.unwrap_or_default().into_iter().flatten().collect())
}

/// Positions and sizes as either `[x, y]` or `{"0": x, "1": y}`.
pub(crate) fn vec2<'de, D>(deserializer: D) -> Result<[f32; 2], D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Array([f32; 2]),
        Indexed {
            #[serde(rename = "0")]
            x: f32,
            #[serde(rename = "1")]
            y: f32,
        },
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        Some(Repr::Array(v)) => v,
        Some(Repr::Indexed { x, y }) => [x, y],
        None => [0.0, 0.0],
    })
}
