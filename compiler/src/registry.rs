// registry.rs — Composite specialization allow-list
//
// `stablehlo.composite` ops are opaque wrappers around a decomposition. A
// composite whose declared name is listed here has a dedicated downstream
// kernel, so it is legalized under that name with its own composite
// attributes. The built-in list is a process-wide constant; a config may add
// names when it is constructed and only reads the list afterwards.

use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Composite names with a downstream specialization.
pub const BUILTIN_COMPOSITES: &[&str] = &[
    "odml.update_kv_cache",
    "odml.scaled_dot_product_attention",
];

static BUILTIN: LazyLock<BTreeSet<String>> =
    LazyLock::new(|| BUILTIN_COMPOSITES.iter().map(|s| s.to_string()).collect());

/// An immutable set of accepted composite names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeAllowList {
    names: BTreeSet<String>,
}

impl CompositeAllowList {
    /// The built-in list.
    pub fn builtin() -> Self {
        Self {
            names: BUILTIN.clone(),
        }
    }

    /// The built-in list plus `extra` names.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = BUILTIN.clone();
        names.extend(extra.into_iter().map(Into::into));
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for CompositeAllowList {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names() {
        let list = CompositeAllowList::builtin();
        assert!(list.contains("odml.update_kv_cache"));
        assert!(list.contains("odml.scaled_dot_product_attention"));
        assert!(!list.contains("odml.rms_norm"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn extra_names_extend_the_builtin_list() {
        let list = CompositeAllowList::with_extra(["odml.rms_norm"]);
        assert!(list.contains("odml.rms_norm"));
        assert!(list.contains("odml.update_kv_cache"));
        assert_eq!(
            list.iter().collect::<Vec<_>>(),
            vec![
                "odml.rms_norm",
                "odml.scaled_dot_product_attention",
                "odml.update_kv_cache",
            ]
        );
    }

    #[test]
    fn lookup_is_exact() {
        let list = CompositeAllowList::builtin();
        assert!(!list.contains("ODML.UPDATE_KV_CACHE"));
        assert!(!list.contains("odml.update_kv_cache "));
    }
}
