//! Domain models for the media catalog
//!
//! Assets are stored media objects; variants are the named renditions
//! (a pixel width, a format) every asset may be published in. The
//! [`Rendition`] binding carries the stored filename, MIME type and whether
//! that rendition is currently present on the CDN.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for an asset, assigned by the catalog database
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct AssetId(pub i64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a variant
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct VariantId(pub i64);

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A named rendition of assets (e.g. `"200w"`, `"thumb"`, `"1024"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Variant {
    pub id: VariantId,
    pub shortname: String,
}

impl Variant {
    pub fn new(id: VariantId, shortname: impl Into<String>) -> Self {
        Self {
            id,
            shortname: shortname.into(),
        }
    }

    /// Whether this variant is identified by `shortname`
    ///
    /// Shortnames are opaque text: `"200"` and `"200.0"` name different
    /// variants.
    pub fn matches(&self, shortname: &str) -> bool {
        self.shortname == shortname
    }
}

/// Binding between an asset and one of its variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub variant_id: VariantId,
    pub variant_shortname: String,
    /// Stored file name, e.g. `42.jpg`
    pub filename: String,
    pub mime_type: String,
    pub on_cdn: bool,
}

/// A stored media object tracked by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    /// Shortname of the media set the asset belongs to; used as path prefix
    pub set_shortname: String,
    pub renditions: Vec<Rendition>,
}

impl Asset {
    /// Find the rendition for a variant shortname
    pub fn rendition(&self, shortname: &str) -> Option<&Rendition> {
        self.renditions
            .iter()
            .find(|r| r.variant_shortname == shortname)
    }

    /// Find the rendition bound to a specific variant
    pub fn rendition_for(&self, variant_id: VariantId) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.variant_id == variant_id)
    }

    /// Whether the given variant is currently published
    pub fn is_on_cdn(&self, shortname: &str) -> bool {
        self.rendition(shortname).is_some_and(|r| r.on_cdn)
    }

    /// Flip the in-memory CDN flag for a variant
    ///
    /// Returns `false` if the asset has no such rendition.
    pub fn set_on_cdn(&mut self, shortname: &str, present: bool) -> bool {
        match self
            .renditions
            .iter_mut()
            .find(|r| r.variant_shortname == shortname)
        {
            Some(rendition) => {
                rendition.on_cdn = present;
                true
            }
            None => false,
        }
    }
}

/// Input for registering a rendition of an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRendition {
    pub variant_id: VariantId,
    pub filename: String,
    pub mime_type: String,
}

impl NewRendition {
    pub fn new(
        variant_id: VariantId,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            variant_id,
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.filename.trim().is_empty() {
            return Err("Filename cannot be empty".to_string());
        }
        if self.filename.contains('/') || self.filename.contains('\\') {
            return Err(format!(
                "Filename must not contain path separators: {}",
                self.filename
            ));
        }
        if !self.mime_type.contains('/') {
            return Err(format!("Invalid MIME type: {}", self.mime_type));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset() -> Asset {
        Asset {
            id: AssetId(42),
            set_shortname: "images".to_string(),
            renditions: vec![
                Rendition {
                    variant_id: VariantId(1),
                    variant_shortname: "200".to_string(),
                    filename: "42.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                    on_cdn: false,
                },
                Rendition {
                    variant_id: VariantId(2),
                    variant_shortname: "thumb".to_string(),
                    filename: "42.png".to_string(),
                    mime_type: "image/png".to_string(),
                    on_cdn: true,
                },
            ],
        }
    }

    #[test]
    fn test_rendition_lookup() {
        let asset = sample_asset();
        assert_eq!(asset.rendition("200").unwrap().filename, "42.jpg");
        assert_eq!(asset.rendition_for(VariantId(2)).unwrap().filename, "42.png");
        assert!(asset.rendition("400").is_none());
        assert!(asset.rendition_for(VariantId(9)).is_none());
        assert!(asset.is_on_cdn("thumb"));
        assert!(!asset.is_on_cdn("200"));
    }

    #[test]
    fn test_numerically_equal_shortnames_are_distinct() {
        let mut asset = sample_asset();
        asset.renditions.push(Rendition {
            variant_id: VariantId(3),
            variant_shortname: "200.0".to_string(),
            filename: "42.webp".to_string(),
            mime_type: "image/webp".to_string(),
            on_cdn: false,
        });

        assert_eq!(asset.rendition("200.0").unwrap().filename, "42.webp");
        assert!(asset.set_on_cdn("200.0", true));
        assert!(asset.is_on_cdn("200.0"));
        assert!(!asset.is_on_cdn("200"));
        assert!(asset.rendition(" 200").is_none());
    }

    #[test]
    fn test_set_on_cdn() {
        let mut asset = sample_asset();
        assert!(asset.set_on_cdn("200", true));
        assert!(asset.is_on_cdn("200"));
        assert!(!asset.set_on_cdn("missing", true));
    }

    #[test]
    fn test_variant_matches() {
        let variant = Variant::new(VariantId(7), "1024");
        assert!(variant.matches("1024"));
        assert!(!variant.matches("1024.0"));
        assert!(!variant.matches("1024w"));
    }

    #[test]
    fn test_new_rendition_validation() {
        assert!(NewRendition::new(VariantId(1), "42.jpg", "image/jpeg")
            .validate()
            .is_ok());
        assert!(NewRendition::new(VariantId(1), "", "image/jpeg")
            .validate()
            .is_err());
        assert!(NewRendition::new(VariantId(1), "../42.jpg", "image/jpeg")
            .validate()
            .is_err());
        assert!(NewRendition::new(VariantId(1), "42.jpg", "jpeg")
            .validate()
            .is_err());
    }
}
