//! Built-in layer descriptors for the workbench views.

use crate::domain::{HttpMethod, LayerDescriptor, LayerId};

/// Reserved id of the static fallback layer.
pub const HOME_LAYER: &str = "home-layer";

pub fn home_layer_id() -> LayerId {
    LayerId::new(HOME_LAYER)
}

pub fn home() -> LayerDescriptor {
    LayerDescriptor::static_container(HOME_LAYER, "#home-layer").with_closeable(false)
}

pub fn add_sample() -> LayerDescriptor {
    LayerDescriptor::remote("add-sample", "/add_sample")
}

pub fn peak_grouping_match_samples() -> LayerDescriptor {
    LayerDescriptor::remote("peak-grouping-match-samples", "/peak_grouping_match_samples")
}

pub fn tandem_match_samples() -> LayerDescriptor {
    LayerDescriptor::remote("tandem-match-samples", "/tandem_match_samples")
}

pub fn glycopeptide_search_space() -> LayerDescriptor {
    LayerDescriptor::remote("glycopeptide-search-space", "/glycopeptide_search_space")
}

pub fn glycan_search_space() -> LayerDescriptor {
    LayerDescriptor::remote("glycan-search-space", "/glycan_search_space")
}

pub fn view_database_search_results() -> LayerDescriptor {
    LayerDescriptor::templated(
        "view-database-search-results",
        "/view_database_search_results/{hypothesis_sample_match_id}",
    )
    .with_method(HttpMethod::Post)
}

pub fn view_hypothesis() -> LayerDescriptor {
    LayerDescriptor::templated("view-hypothesis", "/view_hypothesis/{hypothesis_id}")
        .with_method(HttpMethod::Post)
}

/// Resolves a descriptor by its layer name.
pub fn lookup(name: &str) -> Option<LayerDescriptor> {
    let descriptor = match name {
        HOME_LAYER => home(),
        "add-sample" => add_sample(),
        "peak-grouping-match-samples" => peak_grouping_match_samples(),
        "tandem-match-samples" => tandem_match_samples(),
        "glycopeptide-search-space" => glycopeptide_search_space(),
        "glycan-search-space" => glycan_search_space(),
        "view-database-search-results" => view_database_search_results(),
        "view-hypothesis" => view_hypothesis(),
        _ => return None,
    };
    Some(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_layer_is_static_and_pinned() {
        let home = home();
        assert_eq!(home.container.as_deref(), Some("#home-layer"));
        assert!(!home.is_closeable());
    }

    #[test]
    fn lookup_resolves_every_named_action() {
        for name in [
            HOME_LAYER,
            "add-sample",
            "peak-grouping-match-samples",
            "tandem-match-samples",
            "glycopeptide-search-space",
            "glycan-search-space",
            "view-database-search-results",
            "view-hypothesis",
        ] {
            let descriptor = lookup(name).expect("known action");
            assert_eq!(descriptor.name.as_deref(), Some(name));
        }
        assert!(lookup("unknown").is_none());
    }
}
