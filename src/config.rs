//! Build- and compile-time configuration.
//!
//! Every toggle affects layout or execution strategy only; field values
//! observed through identities are the same under every combination.

use crate::topology::relation::LocalizeMode;

/// Layout and strategy toggles for building instances and compiling kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshConfig {
    /// Store relation targets as slots (apply the target permutation when
    /// the relation table is built).
    pub localize_to_end_mapping: bool,
    /// Keep relation rows in identity order and map the source slot at
    /// traversal time.
    pub localize_from_end_mapping: bool,
    /// Group every element kind by patch and expose patch slot ranges.
    pub patch_contiguous: bool,
    /// Honour local-cache declarations in kernels.
    pub local_cache: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            localize_to_end_mapping: true,
            localize_from_end_mapping: false,
            patch_contiguous: false,
            local_cache: true,
        }
    }
}

impl MeshConfig {
    pub fn with_localize_to_end(mut self, on: bool) -> Self {
        self.localize_to_end_mapping = on;
        self
    }

    pub fn with_localize_from_end(mut self, on: bool) -> Self {
        self.localize_from_end_mapping = on;
        self
    }

    pub fn with_patch_contiguous(mut self, on: bool) -> Self {
        self.patch_contiguous = on;
        self
    }

    pub fn with_local_cache(mut self, on: bool) -> Self {
        self.local_cache = on;
        self
    }

    /// Relation table strategy implied by the two localization axes.
    pub fn localize_mode(&self) -> LocalizeMode {
        LocalizeMode {
            to_end: self.localize_to_end_mapping,
            from_end: self.localize_from_end_mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_setters() {
        let c = MeshConfig::default();
        assert_eq!(c.localize_mode(), LocalizeMode::default());
        assert!(c.local_cache && !c.patch_contiguous);
        let c = c
            .with_localize_to_end(false)
            .with_localize_from_end(true)
            .with_patch_contiguous(true)
            .with_local_cache(false);
        assert_eq!(
            c.localize_mode(),
            LocalizeMode {
                to_end: false,
                from_end: true
            }
        );
        assert!(c.patch_contiguous && !c.local_cache);
    }
}
