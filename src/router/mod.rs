use crate::engines::{
    ConvertEngine, DocumentEngine, EngineType, ImageEngine, PdfEngine, Target, ToolContext,
};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Smart router that selects an engine by sniffing the input's signature
pub struct SmartRouter {
    engines: Vec<Arc<dyn ConvertEngine>>,
    /// Cached availability results from startup
    availability: HashMap<EngineType, bool>,
}

impl SmartRouter {
    pub async fn new(ctx: ToolContext) -> Self {
        let engines: Vec<Arc<dyn ConvertEngine>> = vec![
            Arc::new(DocumentEngine::new(ctx.clone())),
            Arc::new(ImageEngine::new(ctx.clone())),
            Arc::new(PdfEngine::new(ctx)),
        ];
        Self::with_engines(engines).await
    }

    pub async fn with_engines(engines: Vec<Arc<dyn ConvertEngine>>) -> Self {
        // Cache engine availability at startup
        let mut availability = HashMap::new();
        for engine in &engines {
            let available = engine.is_available().await;
            let status = if available { "✓" } else { "✗" };
            tracing::info!(
                "{} {:?} engine - {:?} to {:?}",
                status,
                engine.engine_type(),
                engine.family(),
                engine.target()
            );
            availability.insert(engine.engine_type(), available);
        }

        Self {
            engines,
            availability,
        }
    }

    /// Find the engine for `target` whose signature table accepts the file.
    ///
    /// Signature errors (file too small, unreadable) are only returned when
    /// no candidate accepts the file.
    pub async fn find_engine_for_file(
        &self,
        path: &Path,
        target: Target,
    ) -> Result<Arc<dyn ConvertEngine>> {
        let candidates: Vec<_> = self
            .engines
            .iter()
            .filter(|e| e.target() == target)
            .collect();

        if candidates.is_empty() {
            return Err(AppError::UnsupportedFormat(format!(
                "No engine produces {:?}",
                target
            )));
        }

        // Use cached availability instead of checking every request
        let available: Vec<_> = candidates
            .iter()
            .filter(|e| self.is_available(e.engine_type()))
            .collect();

        if available.is_empty() {
            let supported_by = candidates
                .iter()
                .map(|e| format!("{:?}", e.engine_type()))
                .collect::<Vec<_>>()
                .join(", ");

            return Err(AppError::EngineNotAvailable(format!(
                "{:?} output is produced by {} but the required tools are not installed",
                target, supported_by
            )));
        }

        let mut first_error = None;
        for engine in available {
            match engine.is_valid(path).await {
                Ok(true) => return Ok(Arc::clone(engine)),
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(
                        "{:?} engine rejected {}: {}",
                        engine.engine_type(),
                        path.display(),
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| {
            AppError::UnsupportedFormat(format!(
                "No {:?} converter recognises the file signature",
                target
            ))
        }))
    }

    pub fn is_available(&self, engine_type: EngineType) -> bool {
        *self.availability.get(&engine_type).unwrap_or(&false)
    }

    /// Availability of every engine, in registration order
    pub fn engine_status(&self) -> Vec<(EngineType, bool)> {
        self.engines
            .iter()
            .map(|e| (e.engine_type(), self.is_available(e.engine_type())))
            .collect()
    }
}
