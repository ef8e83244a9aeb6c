//! Macros to reduce boilerplate in layer implementations

/// Implements the identity part of `LayerTrait` for a type that keeps its
/// `LayerProperties` in a named field.
///
/// Usage:
/// ```ignore
/// impl LayerTrait for MyLayer {
///     markercluster::impl_layer_trait!(properties);
///     fn options(&self) -> serde_json::Value { serde_json::Value::Null }
/// }
/// ```
#[macro_export]
macro_rules! impl_layer_trait {
    ($properties_field:ident) => {
        fn id(&self) -> &str {
            &self.$properties_field.id
        }

        fn layer_type(&self) -> $crate::layers::base::LayerType {
            self.$properties_field.layer_type
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    };
}
