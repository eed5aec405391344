//! Record filtering and name rewriting

use convert_core::{ConversionRules, NameMapping};

/// Path delimiter of checkpoint tensor names
pub const NAME_DELIMITER: char = '/';

/// Whether a checkpoint record takes part in the conversion
///
/// The first name segment must start with the scope prefix and the last
/// segment must not start with the excluded leaf prefix (optimizer slots).
pub fn is_included(rules: &ConversionRules, name: &str) -> bool {
    let mut segments = name.split(NAME_DELIMITER);
    let first = segments.next().unwrap_or_default();
    let last = name.rsplit(NAME_DELIMITER).next().unwrap_or_default();

    first.starts_with(&rules.scope_prefix) && !last.starts_with(&rules.excluded_leaf_prefix)
}

/// Apply the rename table in order
///
/// Each pattern replaces every occurrence in the working name before the
/// next pattern is checked, so text produced by one mapping may be matched
/// again by a later one. Patterns are expected to be non-empty, see
/// [`ConversionRules::validate`].
pub fn rename(name_map: &[NameMapping], name: &str) -> String {
    name_map.iter().fold(name.to_string(), |current, mapping| {
        if current.contains(&mapping.pattern) {
            current.replace(&mapping.pattern, &mapping.replacement)
        } else {
            current
        }
    })
}

/// Whether a tensor of this shape is treated as a convolution kernel
pub fn is_kernel(rules: &ConversionRules, shape: &[usize]) -> bool {
    shape.len() == rules.kernel_rank
}
