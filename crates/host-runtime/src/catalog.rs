//! Source enumeration with best-effort thumbnails.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use veil_common::config::CatalogConfig;
use veil_common::error::VeilResult;
use veil_platform_core::{CapturePlatform, CaptureSource, SourceKind};

/// Builds fresh [`CaptureSource`] lists from the OS capture layer.
pub struct SourceCatalog {
    platform: Arc<dyn CapturePlatform>,
    config: CatalogConfig,
}

impl SourceCatalog {
    pub fn new(platform: Arc<dyn CapturePlatform>, config: CatalogConfig) -> Self {
        Self { platform, config }
    }

    /// Enumerate sources of the requested kinds.
    ///
    /// An empty `kinds` slice falls back to the configured defaults. Ids are
    /// unique in the result (first occurrence wins) and order follows the
    /// platform's listing. A source whose thumbnail fails to render is kept
    /// with `thumbnail: None`.
    pub async fn enumerate(&self, kinds: &[SourceKind]) -> VeilResult<Vec<CaptureSource>> {
        let kinds = self.effective_kinds(kinds);
        let raw = self.platform.list_sources(&kinds).await?;

        let mut seen = HashSet::with_capacity(raw.len());
        let mut sources = Vec::with_capacity(raw.len());
        for source in raw {
            if !kinds.contains(&source.kind) {
                continue;
            }
            if !seen.insert(source.id.clone()) {
                tracing::debug!(id = %source.id, "Dropping duplicate source");
                continue;
            }

            let thumbnail = match self
                .platform
                .render_thumbnail(
                    &source.id,
                    self.config.thumbnail_width,
                    self.config.thumbnail_height,
                )
                .await
            {
                Ok(png) => Some(png_data_url(&png)),
                Err(e) => {
                    tracing::warn!(id = %source.id, error = %e, "Thumbnail render failed");
                    None
                }
            };

            sources.push(CaptureSource {
                id: source.id,
                kind: source.kind,
                display_name: source.name,
                thumbnail,
            });
        }

        tracing::debug!(count = sources.len(), "Enumerated capture sources");
        Ok(sources)
    }

    fn effective_kinds(&self, requested: &[SourceKind]) -> Vec<SourceKind> {
        let mut kinds = Vec::with_capacity(2);
        if requested.is_empty() {
            if self.config.screens {
                kinds.push(SourceKind::Screen);
            }
            if self.config.windows {
                kinds.push(SourceKind::Window);
            }
        } else {
            for kind in [SourceKind::Screen, SourceKind::Window] {
                if requested.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }
}

/// Encode PNG bytes as a `data:` URL.
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix() {
        assert_eq!(png_data_url(&[0x89, 0x50]), "data:image/png;base64,iVA=");
    }
}
