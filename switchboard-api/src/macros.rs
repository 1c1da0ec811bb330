//! Utility macros for reducing boilerplate

/// Macro to implement `FromRef<AppState>` for state extractors.
///
/// Lets handlers take `State<TaskLifecycle>` (or any other service held by
/// [`AppState`](crate::state::AppState)) instead of the whole state.
///
/// # Example
/// ```ignore
/// impl_from_ref!(TaskLifecycle, lifecycle);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for TaskLifecycle {
///     fn from_ref(state: &AppState) -> Self {
///         state.lifecycle.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
