//! Soft deletion.
//!
//! The API server only removes an object once its finalizer list is empty.
//! Every kind owning external side effects carries [`FINALIZER`] while it is
//! alive so that teardown always runs before the object disappears.

use kube::Resource;

pub const FINALIZER: &str = "frpc.yoogo.top/finalizer";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// No deletion has been requested.
    Active,
    /// Deletion was requested and teardown has not completed.
    Terminating,
    /// Deletion was requested and nothing holds the object anymore.
    Gone,
}

impl Lifecycle {
    pub fn of<K: Resource>(obj: &K) -> Self {
        if obj.meta().deletion_timestamp.is_none() {
            return Self::Active;
        }
        if has_finalizer(obj) {
            Self::Terminating
        } else {
            Self::Gone
        }
    }
}

pub fn has_finalizer<K: Resource>(obj: &K) -> bool {
    obj.meta()
        .finalizers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|f| f == FINALIZER)
}

/// Adds the finalizer, returning false if it was already present.
pub fn add_finalizer<K: Resource>(obj: &mut K) -> bool {
    if has_finalizer(obj) {
        return false;
    }
    obj.meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER.to_string());
    true
}

/// Removes the finalizer, returning false if it was not present.
pub fn remove_finalizer<K: Resource>(obj: &mut K) -> bool {
    if !has_finalizer(obj) {
        return false;
    }
    if let Some(finalizers) = obj.meta_mut().finalizers.as_mut() {
        finalizers.retain(|f| f != FINALIZER);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    fn cm(finalizers: &[&str], deleting: bool) -> ConfigMap {
        let deletion_timestamp = deleting.then(|| {
            serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z"))
                .expect("timestamp must parse")
        });
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("cm".to_string()),
                finalizers: Some(finalizers.iter().map(|f| f.to_string()).collect()),
                deletion_timestamp,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn states() {
        assert_eq!(Lifecycle::of(&cm(&[], false)), Lifecycle::Active);
        assert_eq!(Lifecycle::of(&cm(&[FINALIZER], false)), Lifecycle::Active);
        assert_eq!(Lifecycle::of(&cm(&[FINALIZER], true)), Lifecycle::Terminating);
        assert_eq!(Lifecycle::of(&cm(&["other/finalizer"], true)), Lifecycle::Gone);
        assert_eq!(Lifecycle::of(&cm(&[], true)), Lifecycle::Gone);
    }

    #[test]
    fn add_and_remove() {
        let mut obj = cm(&["other/finalizer"], false);
        assert!(add_finalizer(&mut obj));
        assert!(!add_finalizer(&mut obj));
        assert_eq!(
            obj.metadata.finalizers,
            Some(vec!["other/finalizer".to_string(), FINALIZER.to_string()])
        );

        assert!(remove_finalizer(&mut obj));
        assert!(!remove_finalizer(&mut obj));
        assert_eq!(
            obj.metadata.finalizers,
            Some(vec!["other/finalizer".to_string()])
        );
    }

    #[test]
    fn add_to_empty_metadata() {
        let mut obj = ConfigMap::default();
        assert!(add_finalizer(&mut obj));
        assert!(has_finalizer(&obj));
    }
}
