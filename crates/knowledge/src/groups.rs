//! Group qualification — mapping categories onto storage group ids.
//!
//! Tenant-scoped groups become `{namespace}__{group}`; shared groups pass
//! through untouched. A name that already carries the delimiter is taken
//! to be qualified and is returned as-is, so qualifying twice is a no-op.

use ctxforge_core::{Category, ConfigError, NAMESPACE_DELIMITER, Namespace, Scope};

/// Qualify a raw group name, classifying its scope by name.
pub fn qualify_group(namespace: Option<&Namespace>, group: &str) -> Result<String, ConfigError> {
    qualify_group_as(namespace, group, Category::scope_of_group(group))
}

/// Qualify a raw group name under an explicit scope.
pub fn qualify_group_as(
    namespace: Option<&Namespace>,
    group: &str,
    scope: Scope,
) -> Result<String, ConfigError> {
    if group.is_empty() {
        return Err(ConfigError::EmptyGroupName);
    }
    if group.contains(NAMESPACE_DELIMITER) {
        return Ok(group.to_string());
    }
    match scope {
        Scope::Shared => Ok(group.to_string()),
        Scope::Tenant => namespace
            .map(|ns| ns.prefix(group))
            .ok_or_else(|| ConfigError::MissingNamespace {
                group: group.to_string(),
            }),
    }
}

/// Qualify a category's group.
pub fn qualify_category(
    namespace: Option<&Namespace>,
    category: Category,
) -> Result<String, ConfigError> {
    qualify_group_as(namespace, category.group_name(), category.scope())
}

/// Qualify a category list for a search.
///
/// An empty list means "no group filter" and yields `None`.
pub fn qualify_groups(
    namespace: Option<&Namespace>,
    categories: &[Category],
) -> Result<Option<Vec<String>>, ConfigError> {
    if categories.is_empty() {
        return Ok(None);
    }
    categories
        .iter()
        .map(|c| qualify_category(namespace, *c))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
