// ============================================================================
// spark-sim - Ergonomic Macros
// ============================================================================

/// Build an [`InputBatch`](crate::InputBatch) from `name => value` pairs.
///
/// # Usage
///
/// ```rust
/// use spark_sim::inputs;
///
/// let batch = inputs! { "x" => 1i64, "y" => 1i64, "label" => "total" };
/// assert_eq!(batch.len(), 3);
/// ```
#[macro_export]
macro_rules! inputs {
    () => {
        $crate::InputBatch::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::InputBatch::new()$(.with($name, $value))+
    };
}

/// Clone variables into a move closure.
///
/// Handles are `Copy`, but values captured by compute functions often are
/// not (strings, vectors, `Rc`s shared between several declarations).
///
/// # Usage
///
/// ```rust
/// use spark_sim::{cloned, Result, Scope, ServerBuilder, ServerReturn};
///
/// fn server(server: &mut ServerBuilder, prefix: &String) -> Result<ServerReturn> {
///     let prefix = prefix.clone();
///     server.output("a", cloned!(prefix => move |cx: &mut Scope<'_>| -> Result<String> {
///         Ok(format!("{prefix}{}", cx.input::<i64>("a")?))
///     }))?;
///     server.output("b", move |cx| Ok(format!("{prefix}{}", cx.input::<i64>("b")?)))?;
///     Ok(ServerReturn::nothing())
/// }
/// # let _ = server;
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}
