#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative boundary resolution.
//!
//! A [`BoundarySource`] delivers raw boundary rings for an area code. Two
//! sources exist: [`local::LocalBoundaries`] reads rings bundled in the
//! area code table, [`sgis::SgisBoundaries`] queries the SGIS Open API.
//! [`PolygonResolver`] sits in front of either one, classifies the rings
//! into polygon geometry and caches the outcome for the rest of the run.

pub mod local;
pub mod sgis;
pub mod table;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use odsynth_boundary_models::{AreaCode, AreaPolygon, CodeKind, GeometryError, RawRings};
use odsynth_geocoder::GeocodeError;

/// Errors that can occur while resolving a boundary.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// The area has no resolvable boundary (including the sentinel code).
    #[error("unresolved area {code} ({kind:?} code)")]
    Unresolved {
        /// The code that was looked up.
        code: AreaCode,
        /// How the code was interpreted.
        kind: CodeKind,
    },

    /// The remote geocoding service failed.
    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    /// The delivered rings do not form valid geometry.
    #[error("invalid boundary for {code}: {source}")]
    Geometry {
        /// The code whose boundary was malformed.
        code: AreaCode,
        /// The underlying geometry problem.
        source: GeometryError,
    },

    /// I/O error reading the area code table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The area code table is not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BoundaryError {
    /// Returns `true` for the "no boundary for this area" case, as opposed
    /// to an infrastructure failure.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }
}

/// Provider of raw boundary rings.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    /// Short identifier for logs (e.g. `"local"`).
    fn id(&self) -> &'static str;

    /// Fetches the boundary rings for `code`, interpreted as `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Unresolved`] if the source has no boundary
    /// for the code, or another [`BoundaryError`] if the lookup failed.
    async fn fetch(&self, code: AreaCode, kind: CodeKind) -> Result<RawRings, BoundaryError>;
}

#[derive(Debug, Clone)]
enum Cached {
    Resolved(Arc<AreaPolygon>),
    Unresolved,
}

/// Caching front end over a [`BoundarySource`].
///
/// Successful lookups and "unresolved" answers are both remembered, so each
/// distinct code hits the source at most once per run. Transient failures
/// are not cached.
pub struct PolygonResolver {
    source: Box<dyn BoundarySource>,
    cache: BTreeMap<(CodeKind, AreaCode), Cached>,
}

impl PolygonResolver {
    #[must_use]
    pub fn new(source: Box<dyn BoundarySource>) -> Self {
        Self {
            source,
            cache: BTreeMap::new(),
        }
    }

    /// Returns the polygon for `code`.
    ///
    /// The sentinel code is answered with [`BoundaryError::Unresolved`]
    /// without consulting the source.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the area is unresolved, the source
    /// fails, or the rings are not valid geometry.
    pub async fn resolve(
        &mut self,
        code: AreaCode,
        kind: CodeKind,
    ) -> Result<Arc<AreaPolygon>, BoundaryError> {
        if code.is_sentinel() {
            return Err(BoundaryError::Unresolved { code, kind });
        }

        match self.cache.get(&(kind, code)) {
            Some(Cached::Resolved(polygon)) => return Ok(Arc::clone(polygon)),
            Some(Cached::Unresolved) => return Err(BoundaryError::Unresolved { code, kind }),
            None => {}
        }

        let rings = match self.source.fetch(code, kind).await {
            Ok(rings) => rings,
            Err(e) if e.is_unresolved() => {
                log::debug!("[{}] No boundary for {code}", self.source.id());
                self.cache.insert((kind, code), Cached::Unresolved);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let polygon = Arc::new(
            AreaPolygon::from_rings(rings)
                .map_err(|source| BoundaryError::Geometry { code, source })?,
        );
        log::trace!(
            "[{}] Resolved {code} ({} part(s), {:.0} m²)",
            self.source.id(),
            polygon.parts().len(),
            polygon.area()
        );
        self.cache
            .insert((kind, code), Cached::Resolved(Arc::clone(&polygon)));
        Ok(polygon)
    }

    /// Number of distinct codes remembered so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a unit square for even codes, nothing for odd ones.
    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BoundarySource for CountingSource {
        fn id(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, code: AreaCode, kind: CodeKind) -> Result<RawRings, BoundaryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if code.value() % 2 == 0 {
                Ok(RawRings::Ring(vec![
                    [0.0, 0.0],
                    [1.0, 0.0],
                    [1.0, 1.0],
                    [0.0, 1.0],
                ]))
            } else if code.value() == 9 {
                Ok(RawRings::Ring(vec![[0.0, 0.0], [1.0, 1.0]]))
            } else {
                Err(BoundaryError::Unresolved { code, kind })
            }
        }
    }

    fn resolver() -> (PolygonResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            calls: Arc::clone(&calls),
        };
        (PolygonResolver::new(Box::new(source)), calls)
    }

    #[tokio::test]
    async fn repeated_codes_hit_the_source_once() {
        let (mut resolver, calls) = resolver();
        for _ in 0..5 {
            let polygon = resolver.resolve(AreaCode(2), CodeKind::Dataset).await.unwrap();
            assert!((polygon.area() - 1.0).abs() < 1e-12);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        resolver.resolve(AreaCode(2), CodeKind::Api).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(), 2);
    }

    #[tokio::test]
    async fn sentinel_never_reaches_the_source() {
        let (mut resolver, calls) = resolver();
        let err = resolver
            .resolve(AreaCode::SENTINEL, CodeKind::Dataset)
            .await
            .unwrap_err();
        assert!(err.is_unresolved());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unresolved_answers_are_cached() {
        let (mut resolver, calls) = resolver();
        for _ in 0..3 {
            let err = resolver.resolve(AreaCode(7), CodeKind::Dataset).await.unwrap_err();
            assert!(matches!(
                err,
                BoundaryError::Unresolved { code: AreaCode(7), kind: CodeKind::Dataset }
            ));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_rings_are_a_geometry_error() {
        let (mut resolver, _) = resolver();
        let err = resolver.resolve(AreaCode(9), CodeKind::Api).await.unwrap_err();
        assert!(matches!(err, BoundaryError::Geometry { code: AreaCode(9), .. }));
        assert_eq!(resolver.cached(), 0);
    }
}
