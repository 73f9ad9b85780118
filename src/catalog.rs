//! Track source: turns catalog playlist dumps into [`Track`]s.
//!
//! The remote catalog is reached by an external fetcher that writes one JSON
//! file per playlist (`<playlist>.json`, the raw playlist items) and, when the
//! account is allowed to read them, `<playlist>.features.json` with audio
//! features.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::models::{AudioFeatures, Track};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to load playlist {playlist}: {reason}")]
    UpstreamUnavailable { playlist: String, reason: String },
    #[error("audio features for {playlist} are not available to this account (status {status})")]
    PermissionRestricted { playlist: String, status: u16 },
}

/// Anything that can hand over the full track list of a playlist.
pub trait TrackSource {
    fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, CatalogError>;
}

/// One item of a playlist tracks page.
#[derive(Debug, Deserialize)]
pub struct CatalogItem {
    pub track: Option<CatalogTrack>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogTrack {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
    pub album: Option<CatalogAlbum>,
    pub popularity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogArtist {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CatalogAlbum {
    #[serde(default)]
    pub name: String,
    pub release_date: Option<String>,
}

/// Audio features as returned by the catalog, one object per track.
#[derive(Debug, Deserialize)]
pub struct CatalogFeatures {
    pub id: String,
    pub energy: Option<f64>,
    pub tempo: Option<f64>,
    pub valence: Option<f64>,
    pub danceability: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeaturesPayload {
    List(Vec<Option<CatalogFeatures>>),
    Wrapped {
        audio_features: Vec<Option<CatalogFeatures>>,
    },
    Error {
        error: ErrorBody,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    status: u16,
}

/// Year from the leading four characters of a release date ("1997-06-16", "1997").
pub fn parse_year(release_date: &str) -> Option<i32> {
    release_date.get(..4)?.parse().ok()
}

/// Convert one catalog item. Local files and removed tracks carry no id and are dropped.
pub fn to_track(item: CatalogItem, features: Option<&CatalogFeatures>) -> Option<Track> {
    let t = item.track?;
    let id = t.id.filter(|id| !id.is_empty())?;
    let (album, year) = match t.album {
        Some(a) => {
            let year = a.release_date.as_deref().and_then(parse_year);
            (a.name, year)
        }
        None => (String::new(), None),
    };

    Some(Track {
        id,
        name: t.name,
        artists: t.artists.into_iter().map(|a| a.name).collect(),
        album,
        year,
        popularity: t
            .popularity
            .and_then(|p| u8::try_from(p).ok())
            .filter(|p| *p <= 100),
        audio: features
            .map(|f| AudioFeatures {
                energy: f.energy,
                tempo: f.tempo,
                valence: f.valence,
                danceability: f.danceability,
            })
            .unwrap_or_default(),
    })
}

/// Reads playlist dumps from a directory.
pub struct DumpSource {
    dir: PathBuf,
}

impl DumpSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn playlist_path(&self, playlist_id: &str) -> PathBuf {
        self.dir.join(format!("{playlist_id}.json"))
    }

    fn features_path(&self, playlist_id: &str) -> PathBuf {
        self.dir.join(format!("{playlist_id}.features.json"))
    }

    /// Audio features keyed by track id.
    fn load_features(
        &self,
        playlist_id: &str,
    ) -> Result<HashMap<String, CatalogFeatures>, CatalogError> {
        let path = self.features_path(playlist_id);
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let payload: FeaturesPayload = read_json(&path).map_err(|reason| {
            CatalogError::UpstreamUnavailable {
                playlist: playlist_id.to_string(),
                reason,
            }
        })?;
        let list = match payload {
            FeaturesPayload::List(list) | FeaturesPayload::Wrapped { audio_features: list } => list,
            FeaturesPayload::Error { error } => {
                return Err(CatalogError::PermissionRestricted {
                    playlist: playlist_id.to_string(),
                    status: error.status,
                });
            }
        };
        Ok(list
            .into_iter()
            .flatten()
            .map(|f| (f.id.clone(), f))
            .collect())
    }
}

impl TrackSource for DumpSource {
    fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, CatalogError> {
        let path = self.playlist_path(playlist_id);
        let items: Vec<CatalogItem> =
            read_json(&path).map_err(|reason| CatalogError::UpstreamUnavailable {
                playlist: playlist_id.to_string(),
                reason,
            })?;

        // Features are optional enrichment: any failure leaves them empty.
        let features = match self.load_features(playlist_id) {
            Ok(features) => features,
            Err(e @ CatalogError::PermissionRestricted { .. }) => {
                log::debug!("{e}; continuing without audio features");
                HashMap::new()
            }
            Err(e) => {
                log::warn!("{e}; continuing without audio features");
                HashMap::new()
            }
        };

        let total = items.len();
        let tracks: Vec<Track> = items
            .into_iter()
            .filter_map(|item| {
                let id = item.track.as_ref().and_then(|t| t.id.clone());
                let f = id.as_deref().and_then(|id| features.get(id));
                to_track(item, f)
            })
            .collect();

        log::info!(
            "Loaded {} tracks for {} ({} unavailable items skipped)",
            tracks.len(),
            playlist_id,
            total - tracks.len()
        );
        Ok(tracks)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}
