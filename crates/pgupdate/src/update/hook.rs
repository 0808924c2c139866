use super::CompiledUpdate;
use tracing::Level;

/// Called once, right after an update compiles successfully.
///
/// Hooks run in registration order and only observe the compiled statement.
/// Closures taking `&CompiledUpdate` implement this trait.
pub trait CompileHook: Send + Sync {
    fn on_compile(&self, compiled: &CompiledUpdate);
}

impl<F> CompileHook for F
where
    F: Fn(&CompiledUpdate) + Send + Sync,
{
    fn on_compile(&self, compiled: &CompiledUpdate) {
        self(compiled)
    }
}

/// A `tracing`-based hook that emits the compiled SQL and its parameter types.
#[derive(Debug, Clone)]
pub struct TracingCompileHook {
    /// Tracing event level to emit at.
    pub level: Level,
}

impl Default for TracingCompileHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }
}

impl TracingCompileHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl CompileHook for TracingCompileHook {
    fn on_compile(&self, compiled: &CompiledUpdate) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let types: Vec<&str> = compiled.column_types().iter().map(|t| t.name()).collect();
        emit_at_level!(
            self.level,
            target: "pgupdate.sql",
            sql = %compiled.sql(),
            types = ?types,
            "update compiled"
        );
    }
}
