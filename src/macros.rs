//! Declarative macros for task parameters
//!
//! `expand_fields!` implements [`Expand`](crate::tasks::Expand) for a
//! parameter record by expanding the listed fields in order. `inputs!`
//! builds the untyped input mapping of a task.

/// Implements `Expand` for a struct by expanding the listed fields
///
/// ```rust,ignore
/// expand_fields!(BashParameters { command, arguments, working_directory });
/// ```
#[macro_export]
macro_rules! expand_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::tasks::Expand for $ty {
            fn expand(
                &mut self,
                resolver: &$crate::vault::VariableResolver,
            ) -> ::std::result::Result<(), $crate::vault::ResolverError> {
                $( $crate::tasks::Expand::expand(&mut self.$field, resolver)?; )*
                Ok(())
            }
        }
    };
}

/// Implements a no-op `Expand` for types without string content
#[macro_export]
macro_rules! expand_nothing {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::tasks::Expand for $ty {
                fn expand(
                    &mut self,
                    _resolver: &$crate::vault::VariableResolver,
                ) -> ::std::result::Result<(), $crate::vault::ResolverError> {
                    Ok(())
                }
            }
        )*
    };
}

/// Creates a task input mapping
///
/// ```rust
/// use locally::inputs;
///
/// let inputs = inputs! { "command" => "echo hello", "retryCount" => 2 };
/// assert_eq!(inputs.len(), 2);
/// ```
#[macro_export]
macro_rules! inputs {
    () => {
        ::serde_json::Map::new()
    };
    ( $( $key:expr => $value:expr ),* $(,)? ) => {{
        let mut map = ::serde_json::Map::new();
        $(
            map.insert(::std::string::String::from($key), ::serde_json::json!($value));
        )*
        map
    }};
}

/// Creates a task of the given kind with inputs
///
/// ```rust
/// use locally::task;
///
/// let t = task!(bash "hello", { "command" => "echo hello" });
/// assert_eq!(t.kind.as_str(), "bash");
/// ```
#[macro_export]
macro_rules! task {
    ($kind:tt $name:expr, { $($body:tt)* }) => {
        $crate::pipeline::Task::new($name, $crate::pipeline::TaskKind::from(stringify!($kind)))
            .with_inputs($crate::inputs! { $($body)* })
    };
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    #[test]
    fn test_inputs_macro() {
        let inputs = inputs! { "verb" => "GET", "retryCount" => 2 };
        assert_eq!(inputs.get("verb"), Some(&json!("GET")));
        assert_eq!(inputs.get("retryCount"), Some(&json!(2)));
    }

    #[test]
    fn test_empty_inputs_macro() {
        let inputs = inputs! {};
        assert!(inputs.is_empty());
    }

    #[test]
    fn test_task_macro() {
        let t = task!(curl "ping", { "host" => "http://localhost" });
        assert_eq!(t.kind, crate::pipeline::TaskKind::Curl);
        assert_eq!(t.name, "ping");
    }
}
