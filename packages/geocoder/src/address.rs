//! Administrative name normalization and code composition.
//!
//! The mobility dataset's area code table spells some dong names with an
//! ordinal "제" infix (`신당제1동`) that the SGIS geocoder does not accept
//! (`신당1동`). This module rewrites those names into a form suitable for
//! geocoding and rebuilds the service's eight-digit area code from the
//! component codes in a geocoding result.

use regex::Regex;
use std::sync::LazyLock;

use odsynth_boundary_models::AreaCode;

/// `…N가제M동` → `…N가M동` (e.g. `종로1가제1동`).
static GA_ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([ㄱ-ㅣ가-힣]+)([0-9]가)(제)([0-9]동)").expect("valid regex"));

/// `…로제M동` → `…로M동` (e.g. `을지로제1동`).
static RO_ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([ㄱ-ㅣ가-힣]+)(로)(제)([0-9]동)").expect("valid regex"));

/// `…제M동` → `…M동` (e.g. `신당제1동`).
static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([ㄱ-ㅣ가-힣]+)(제)([0-9]동)").expect("valid regex"));

/// Returns `true` if `re` matches at the very start of `text`.
fn matches_at_start(re: &Regex, text: &str) -> bool {
    re.find(text).is_some_and(|m| m.start() == 0)
}

/// Drops the ordinal "제" from a dong name. Only the first applicable
/// rule is used; names that match none are returned unchanged.
#[must_use]
pub fn normalize_dong_name(name: &str) -> String {
    if matches_at_start(&GA_ORDINAL_RE, name) {
        GA_ORDINAL_RE.replace_all(name, "$1$2$4").into_owned()
    } else if matches_at_start(&RO_ORDINAL_RE, name) {
        RO_ORDINAL_RE.replace_all(name, "$1$2$4").into_owned()
    } else if matches_at_start(&ORDINAL_RE, name) {
        ORDINAL_RE.replace_all(name, "$1$3").into_owned()
    } else {
        name.to_string()
    }
}

/// Builds a free-form geocoding query from area names. Missing levels are
/// left blank, matching how the service tolerates partial addresses.
#[must_use]
pub fn location_query(sido: &str, sgg: Option<&str>, dong: Option<&str>) -> String {
    let dong = dong.map(normalize_dong_name).unwrap_or_default();
    format!("{sido} {} {dong}", sgg.unwrap_or(""))
}

/// Composes the eight-digit service area code from a geocoding result:
/// two digits of province, the district part of `sgg_cd` (or `000`) and
/// the dong part of `adm_cd` (or `000`).
///
/// Returns `None` if the pieces are not numeric.
#[must_use]
pub fn compose_area_code(sido_cd: &str, sgg_cd: Option<&str>, adm_cd: Option<&str>) -> Option<AreaCode> {
    let district = sgg_cd
        .filter(|s| *s != "null")
        .map_or("000", |s| s.get(2..).unwrap_or(""));
    let dong = adm_cd
        .filter(|s| *s != "null")
        .map_or("000", |s| s.get(5..).unwrap_or(""));
    format!("{sido_cd}{district}{dong}").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_ordinal_after_ga() {
        assert_eq!(normalize_dong_name("종로1가제1동"), "종로1가1동");
    }

    #[test]
    fn drops_ordinal_after_ro() {
        assert_eq!(normalize_dong_name("을지로제1동"), "을지로1동");
    }

    #[test]
    fn drops_plain_ordinal() {
        assert_eq!(normalize_dong_name("신당제1동"), "신당1동");
    }

    #[test]
    fn leaves_plain_names_alone() {
        assert_eq!(normalize_dong_name("명동"), "명동");
        assert_eq!(normalize_dong_name("청운효자동"), "청운효자동");
    }

    #[test]
    fn builds_query_with_missing_district() {
        assert_eq!(
            location_query("세종특별자치시", None, Some("조치원읍")),
            "세종특별자치시  조치원읍"
        );
        assert_eq!(
            location_query("서울특별시", Some("중구"), Some("신당제5동")),
            "서울특별시 중구 신당5동"
        );
    }

    #[test]
    fn composes_full_code() {
        assert_eq!(
            compose_area_code("11", Some("11020"), Some("11020550")),
            Some(AreaCode(11_020_550))
        );
    }

    #[test]
    fn composes_code_with_null_parts() {
        assert_eq!(
            compose_area_code("29", Some("null"), None),
            Some(AreaCode(29_000_000))
        );
    }

    #[test]
    fn rejects_non_numeric_parts() {
        assert_eq!(compose_area_code("xx", None, None), None);
    }
}
