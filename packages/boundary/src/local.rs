//! Boundary source backed by the rings bundled in the area code table.

use std::sync::Arc;

use async_trait::async_trait;
use odsynth_boundary_models::{AreaCode, CodeKind, RawRings};

use crate::table::AreaTable;
use crate::{BoundaryError, BoundarySource};

/// Serves boundaries straight from an [`AreaTable`]. Never touches the
/// network.
#[derive(Debug, Clone)]
pub struct LocalBoundaries {
    table: Arc<AreaTable>,
}

impl LocalBoundaries {
    #[must_use]
    pub const fn new(table: Arc<AreaTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl BoundarySource for LocalBoundaries {
    fn id(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, code: AreaCode, kind: CodeKind) -> Result<RawRings, BoundaryError> {
        self.table
            .find(code, kind)
            .and_then(|entry| entry.boundary.clone())
            .ok_or(BoundaryError::Unresolved { code, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::AreaEntry;

    fn table() -> Arc<AreaTable> {
        Arc::new(AreaTable::new(vec![
            AreaEntry {
                code: AreaCode(1_101_053),
                api_code: Some(AreaCode(11_010_530)),
                sido_name: None,
                sgg_name: None,
                dong_name: None,
                boundary: Some(RawRings::Ring(vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0]])),
            },
            AreaEntry {
                code: AreaCode(1_101_054),
                api_code: None,
                sido_name: None,
                sgg_name: None,
                dong_name: None,
                boundary: None,
            },
        ]))
    }

    #[tokio::test]
    async fn fetches_by_either_code_kind() {
        let source = LocalBoundaries::new(table());
        let by_dataset = source.fetch(AreaCode(1_101_053), CodeKind::Dataset).await.unwrap();
        let by_api = source.fetch(AreaCode(11_010_530), CodeKind::Api).await.unwrap();
        assert_eq!(by_dataset, by_api);
    }

    #[tokio::test]
    async fn missing_row_or_boundary_is_unresolved() {
        let source = LocalBoundaries::new(table());
        for code in [AreaCode(1_101_054), AreaCode(42)] {
            let err = source.fetch(code, CodeKind::Dataset).await.unwrap_err();
            assert!(err.is_unresolved(), "{err}");
        }
    }
}
