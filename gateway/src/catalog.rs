//! Playlist catalog
//!
//! Maps product ids to ordered track lists. Unknown, missing or empty
//! product ids resolve to the default product, which must exist and hold at
//! least one track.
//!
//! ## File format
//!
//! ```toml
//! [[products.HOODIE123]]
//! url = "/audio/caliph-polygamy.mp3"
//! title = "Polygamy"
//! artist = "Caliph"
//! cover = "/covers/polygamy.jpg"
//! ```

use player_core::Track;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::types::{GatewayError, Result};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: HashMap<String, Vec<Track>>,
}

/// Product id to track list
#[derive(Debug, Clone)]
pub struct Catalog {
    default_product: String,
    products: HashMap<String, Vec<Track>>,
}

impl Catalog {
    /// Build a catalog, checking the default product
    pub fn new(default_product: impl Into<String>, products: HashMap<String, Vec<Track>>) -> Result<Self> {
        let default_product = default_product.into();
        match products.get(&default_product) {
            None => Err(GatewayError::Catalog(format!(
                "Default product {} is not in the catalog",
                default_product
            ))),
            Some(tracks) if tracks.is_empty() => Err(GatewayError::Catalog(format!(
                "Default product {} has no tracks",
                default_product
            ))),
            Some(_) => Ok(Self {
                default_product,
                products,
            }),
        }
    }

    /// The catalog shipped with the gateway
    pub fn builtin() -> Self {
        let mut products = HashMap::new();
        products.insert(
            player_core::DEFAULT_PRODUCT_ID.to_string(),
            vec![
                Track::new(
                    "/audio/caliph-polygamy.mp3",
                    "Polygamy",
                    "Caliph",
                    "/covers/polygamy.jpg",
                ),
                Track::new(
                    "/audio/caliph-mariajulia.mp3",
                    "Maria Julia",
                    "Caliph",
                    "/covers/mariajulia.jpg",
                ),
                Track::new(
                    "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-3.mp3",
                    "Demo Track",
                    "Caliph",
                    "/ui/cover-fallback.png",
                ),
            ],
        );
        Self {
            default_product: player_core::DEFAULT_PRODUCT_ID.to_string(),
            products,
        }
    }

    /// Same products, different default
    pub fn with_default(self, default_product: &str) -> Result<Self> {
        Self::new(default_product, self.products)
    }

    /// Parse a TOML catalog
    pub fn from_toml_str(source: &str, default_product: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(source)?;
        Self::new(default_product, file.products)
    }

    /// Load a TOML catalog from disk
    pub fn load(path: &Path, default_product: &str) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&source, default_product)?;
        info!(
            path = %path.display(),
            products = catalog.products.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn default_product(&self) -> &str {
        &self.default_product
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.products.contains_key(product_id)
    }

    /// Tracks for a product, falling back to the default product
    ///
    /// Returns the product id actually served alongside its tracks.
    pub fn resolve(&self, product_id: Option<&str>) -> (&str, &[Track]) {
        let requested = product_id.map(str::trim).filter(|p| !p.is_empty());
        if let Some((id, tracks)) = requested.and_then(|p| self.products.get_key_value(p)) {
            return (id.as_str(), tracks.as_slice());
        }
        let tracks = self
            .products
            .get(&self.default_product)
            .map(Vec::as_slice)
            .unwrap_or_default();
        (self.default_product.as_str(), tracks)
    }
}
