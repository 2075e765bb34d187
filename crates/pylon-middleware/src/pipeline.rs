//! Middleware pipeline.
//!
//! A pipeline is an ordered, immutable list of stages in front of a handler.
//! Stages run in the order they were added; the handler runs last.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An ordered chain of middleware stages.
///
/// # Example
///
/// ```ignore
/// use pylon_middleware::{Pipeline, stages::{ContractValidationMiddleware, RequestIdMiddleware}};
///
/// let pipeline = Pipeline::builder()
///     .stage(RequestIdMiddleware::new())
///     .stage(ContractValidationMiddleware::new(contract))
///     .build();
///
/// let response = pipeline.process(MiddlewareContext::new(), request, handler).await;
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Processes a request through every stage, then the handler.
    pub async fn process<H>(
        &self,
        mut ctx: MiddlewareContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(&mut ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn shared_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{empty, full};
    use http::StatusCode;

    struct Stamp(&'static str);

    impl Middleware for Stamp {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let mut response = next.run(ctx, request).await;
                response
                    .headers_mut()
                    .append("x-stage", http::HeaderValue::from_static(self.0));
                response
            })
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn name(&self) -> &'static str {
            "short_circuit"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut MiddlewareContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async {
                let mut response = http::Response::new(empty());
                *response.status_mut() = StatusCode::FORBIDDEN;
                response
            })
        }
    }

    fn handler() -> impl FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> {
        |_ctx, _req| Box::pin(async { http::Response::new(full("ok")) })
    }

    #[tokio::test]
    async fn test_pipeline_executes_in_order() {
        let pipeline = Pipeline::builder()
            .stage(Stamp("outer"))
            .stage(Stamp("inner"))
            .build();
        assert_eq!(pipeline.stage_names(), vec!["outer", "inner"]);

        let response = pipeline
            .process(MiddlewareContext::new(), http::Request::new(empty()), handler())
            .await;

        // Post-processing unwinds inner first.
        let stamps: Vec<_> = response
            .headers()
            .get_all("x-stage")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(stamps, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn test_stage_can_short_circuit() {
        let pipeline = Pipeline::builder()
            .stage(ShortCircuit)
            .stage(Stamp("never"))
            .build();

        let response = pipeline
            .process(MiddlewareContext::new(), http::Request::new(empty()), handler())
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("x-stage").is_none());
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_handler() {
        let pipeline = Pipeline::builder().build();
        assert_eq!(pipeline.stage_count(), 0);

        let response = pipeline
            .process(MiddlewareContext::new(), http::Request::new(empty()), handler())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
