//! SourceRegistry - Webcam Source Definitions
//!
//! ## Responsibilities
//!
//! - Immutable description of each webcam source (location, URL, interval)
//! - Validation at load time (bounds-checked coordinates, positive interval,
//!   well-formed URL); a malformed source is fatal before the pipeline starts
//! - Enumerate all sources, lookup by id
//!
//! Read-only for process lifetime. Adding/removing sources at runtime is out
//! of scope.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Webcam source entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebcamSource {
    pub id: String,
    pub name: String,
    pub url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub country: String,
    pub fetch_interval_seconds: u64,
}

impl WebcamSource {
    /// Validate the source definition
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Validation("webcam id must not be empty".into()));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::Validation(format!(
                "webcam {}: latitude {} out of range [-90, 90]",
                self.id, self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::Validation(format!(
                "webcam {}: longitude {} out of range [-180, 180]",
                self.id, self.longitude
            )));
        }
        if self.fetch_interval_seconds == 0 {
            return Err(Error::Validation(format!(
                "webcam {}: fetch_interval_seconds must be positive",
                self.id
            )));
        }
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| Error::Validation(format!("webcam {}: invalid url: {}", self.id, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Validation(format!(
                "webcam {}: url scheme must be http(s), got {}",
                self.id,
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

/// Immutable registry of webcam sources
pub struct SourceRegistry {
    sources: Vec<WebcamSource>,
}

impl SourceRegistry {
    /// Build a registry from a list of sources, validating each
    ///
    /// Duplicate ids are rejected.
    pub fn from_sources(sources: Vec<WebcamSource>) -> Result<Self> {
        for source in &sources {
            source.validate()?;
        }
        for (i, source) in sources.iter().enumerate() {
            if sources[..i].iter().any(|s| s.id == source.id) {
                return Err(Error::Validation(format!(
                    "duplicate webcam id: {}",
                    source.id
                )));
            }
        }
        Ok(Self { sources })
    }

    /// Load sources from a JSON file, falling back to the built-in set when
    /// no path is configured or the file does not exist
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            tracing::info!("No webcam config path set, using built-in sources");
            return Self::from_sources(default_sources());
        };

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Webcam config file not found, using built-in sources"
            );
            return Self::from_sources(default_sources());
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let sources: Vec<WebcamSource> = serde_json::from_str(&raw)?;
        if sources.is_empty() {
            return Err(Error::Config(format!(
                "webcam config {} contains no sources",
                path.display()
            )));
        }
        tracing::info!(
            path = %path.display(),
            count = sources.len(),
            "Loaded webcam sources from config file"
        );
        Self::from_sources(sources)
    }

    /// Enumerate all sources
    pub fn all(&self) -> &[WebcamSource] {
        &self.sources
    }

    /// Lookup a source by id
    pub fn get(&self, id: &str) -> Result<&WebcamSource> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::NotFound(format!("webcam {}", id)))
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Built-in demo sources (public city webcams)
pub fn default_sources() -> Vec<WebcamSource> {
    vec![
        WebcamSource {
            id: "nyc_times_square".into(),
            name: "New York - Times Square".into(),
            url: "https://images-webcams.windy.com/90/1593596090/current/icon/1593596090.jpg"
                .into(),
            latitude: 40.7580,
            longitude: -73.9855,
            city: "New York".into(),
            country: "USA".into(),
            fetch_interval_seconds: 60,
        },
        WebcamSource {
            id: "london_tower_bridge".into(),
            name: "London - Tower Bridge".into(),
            url: "https://images-webcams.windy.com/12/1269348812/current/icon/1269348812.jpg"
                .into(),
            latitude: 51.5055,
            longitude: -0.0754,
            city: "London".into(),
            country: "UK".into(),
            fetch_interval_seconds: 60,
        },
        WebcamSource {
            id: "tokyo_shibuya".into(),
            name: "Tokyo - Shibuya Crossing".into(),
            url: "https://images-webcams.windy.com/47/1584692947/current/icon/1584692947.jpg"
                .into(),
            latitude: 35.6598,
            longitude: 139.7006,
            city: "Tokyo".into(),
            country: "Japan".into(),
            fetch_interval_seconds: 60,
        },
        WebcamSource {
            id: "paris_eiffel".into(),
            name: "Paris - Eiffel Tower".into(),
            url: "https://images-webcams.windy.com/85/1441619285/current/icon/1441619285.jpg"
                .into(),
            latitude: 48.8584,
            longitude: 2.2945,
            city: "Paris".into(),
            country: "France".into(),
            fetch_interval_seconds: 60,
        },
        WebcamSource {
            id: "sydney_harbor".into(),
            name: "Sydney - Harbor Bridge".into(),
            url: "https://images-webcams.windy.com/20/1441895820/current/icon/1441895820.jpg"
                .into(),
            latitude: -33.8523,
            longitude: 151.2108,
            city: "Sydney".into(),
            country: "Australia".into(),
            fetch_interval_seconds: 60,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_source() -> WebcamSource {
        WebcamSource {
            id: "cam-1".into(),
            name: "Test Cam".into(),
            url: "https://example.com/cam.jpg".into(),
            latitude: 35.0,
            longitude: 139.0,
            city: "Tokyo".into(),
            country: "Japan".into(),
            fetch_interval_seconds: 60,
        }
    }

    #[test]
    fn test_valid_source_accepted() {
        assert!(valid_source().validate().is_ok());
    }

    #[test]
    fn test_latitude_out_of_range_rejected() {
        let mut source = valid_source();
        source.latitude = 91.0;
        assert!(matches!(source.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_longitude_out_of_range_rejected() {
        let mut source = valid_source();
        source.longitude = -180.5;
        assert!(matches!(source.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut source = valid_source();
        source.fetch_interval_seconds = 0;
        assert!(matches!(source.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_malformed_url_rejected() {
        let mut source = valid_source();
        source.url = "not a url".into();
        assert!(matches!(source.validate(), Err(Error::Validation(_))));

        source.url = "ftp://example.com/cam.jpg".into();
        assert!(matches!(source.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = SourceRegistry::from_sources(vec![valid_source(), valid_source()]);
        assert!(registry.is_err());
    }

    #[test]
    fn test_lookup() {
        let registry = SourceRegistry::from_sources(vec![valid_source()]).unwrap();
        assert!(registry.get("cam-1").is_ok());
        assert!(matches!(registry.get("missing"), Err(Error::NotFound(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_sources_are_valid() {
        let registry = SourceRegistry::from_sources(default_sources()).unwrap();
        assert_eq!(registry.len(), 5);
    }
}
